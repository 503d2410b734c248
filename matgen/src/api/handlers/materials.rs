use crate::AppState;
use crate::api::models::materials::{GenerateMaterialJson, GenerationBody, MaterialImageResponse};
use crate::db::handlers::ProjectTransaction;
use crate::errors::{Error, ErrorResponse, Result};
use axum::{
    Json,
    extract::{FromRequest, Path, Request, State},
};
use tracing::{info, instrument, warn};

#[utoipa::path(
    post,
    path = "/projects/{project_id}/materials/generate",
    tag = "materials",
    summary = "Generate material image",
    description = "Generate a standalone material image from a prompt and optional reference images.

Send either `application/json` with `{\"prompt\": \"...\"}`, or `multipart/form-data` with a `prompt` field, an optional `ref_image` file and any number of `extra_images` files. The prompt is passed to the model unmodified.",
    params(
        ("project_id" = String, Path, description = "Project to store the generated image under")
    ),
    request_body(
        content = GenerateMaterialJson,
        description = "Prompt as JSON, or the same `prompt` field plus reference image files as multipart"
    ),
    responses(
        (status = 200, description = "Image generated and stored", body = MaterialImageResponse),
        (status = 400, description = "Missing prompt or malformed body", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 503, description = "Image generation or storage failed", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(project_id = %project_id))]
pub async fn generate_material_image(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    request: Request,
) -> Result<Json<MaterialImageResponse>> {
    let mut tx = state.projects.begin().await?;

    match generate(&state, tx.as_mut(), &project_id, request).await {
        Ok(response) => {
            tx.commit().await?;
            Ok(Json(response))
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

/// The body is only read once the project is known to exist.
async fn generate(state: &AppState, tx: &mut dyn ProjectTransaction, project_id: &str, raw: Request) -> Result<MaterialImageResponse> {
    if tx.find_project(project_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Project".to_string(),
            id: project_id.to_string(),
        });
    }

    let request = GenerationBody::from_request(raw, state).await?.into_request()?;
    info!(
        has_reference = request.reference_image().is_some(),
        extra_images = request.extra_images().len(),
        "Generating material image"
    );

    let asset = state.generator.run(&request).await?;
    let stored = state.persister.persist(&asset, project_id).await?;

    Ok(MaterialImageResponse {
        image_url: stored.public_url,
        relative_path: stored.relative_path,
    })
}
