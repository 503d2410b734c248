//! OpenAPI documentation for the material generation API, served at `/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::errors::{ErrorBody, ErrorResponse};

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Material generation API")
    ),
    paths(api::handlers::materials::generate_material_image),
    components(schemas(
        api::models::materials::GenerateMaterialJson,
        api::models::materials::MaterialImageResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "materials", description = "Standalone material image generation")
    )
)]
pub struct ApiDoc;
