//! Request and response types for material image generation.
//!
//! The endpoint accepts two encodings. [`GenerationBody`] captures which one arrived, resolved once
//! through its `FromRequest` impl; [`GenerationBody::into_request`] then validates it into the single
//! canonical [`GenerationRequest`] the rest of the flow works with.

use crate::errors::{Error, Result};
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request, multipart::Field, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

pub const PROMPT_FIELD: &str = "prompt";
pub const REFERENCE_IMAGE_FIELD: &str = "ref_image";
pub const EXTRA_IMAGES_FIELD: &str = "extra_images";

/// An uploaded file with a non-empty declared name.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as declared by the client. Not safe to use as a path.
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// Read a multipart file field. Entries without a file name count as "no file supplied".
    async fn from_field(field: Field<'_>) -> Result<Option<Self>> {
        let Some(file_name) = field.file_name().filter(|name| !name.is_empty()).map(str::to_string) else {
            return Ok(None);
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        Ok(Some(Self {
            file_name,
            content_type,
            data,
        }))
    }
}

/// JSON request shape. No files can be sent this way.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GenerateMaterialJson {
    /// Text-to-image prompt, passed to the model verbatim
    #[serde(default)]
    pub prompt: Option<String>,
}

/// The request body as received, before validation.
#[derive(Debug)]
pub enum GenerationBody {
    Json {
        prompt: String,
    },
    /// Multipart (or url-encoded) form. Url-encoded forms never carry files.
    Form {
        prompt: String,
        reference_image: Option<UploadedFile>,
        extra_images: Vec<UploadedFile>,
    },
}

impl GenerationBody {
    /// Validate the body into a [`GenerationRequest`].
    pub fn into_request(self) -> Result<GenerationRequest> {
        match self {
            GenerationBody::Json { prompt } => GenerationRequest::new(&prompt, None, Vec::new()),
            GenerationBody::Form {
                prompt,
                reference_image,
                extra_images,
            } => GenerationRequest::new(&prompt, reference_image, extra_images),
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut prompt: Option<String> = None;
        let mut reference_image: Option<UploadedFile> = None;
        let mut extra_images = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                PROMPT_FIELD => {
                    let text = field.text().await.map_err(multipart_error)?;
                    // First occurrence wins
                    prompt.get_or_insert(text);
                }
                REFERENCE_IMAGE_FIELD => {
                    if let Some(file) = UploadedFile::from_field(field).await?
                        && reference_image.is_none()
                    {
                        reference_image = Some(file);
                    }
                }
                EXTRA_IMAGES_FIELD => {
                    if let Some(file) = UploadedFile::from_field(field).await? {
                        extra_images.push(file);
                    }
                }
                other => {
                    tracing::debug!(field = other, "Ignoring unexpected multipart field");
                }
            }
        }

        Ok(GenerationBody::Form {
            prompt: prompt.unwrap_or_default(),
            reference_image,
            extra_images,
        })
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message: e.body_text() }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

/// Map an extractor rejection, keeping body-limit overflows distinct from malformed input.
fn rejection_error(status: StatusCode, message: String) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { message }
    } else {
        Error::BadRequest { message }
    }
}

/// Which shape a request body is in, judged from its `Content-Type`.
#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    Multipart,
    UrlEncoded,
    Other,
}

fn body_kind(req: &Request) -> BodyKind {
    let Some(content_type) = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return BodyKind::Other;
    };
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        BodyKind::Json
    } else if essence == "multipart/form-data" {
        BodyKind::Multipart
    } else if essence == "application/x-www-form-urlencoded" {
        BodyKind::UrlEncoded
    } else {
        BodyKind::Other
    }
}

impl<S> FromRequest<S> for GenerationBody
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        match body_kind(&req) {
            BodyKind::Json => {
                let Json(body) = Json::<GenerateMaterialJson>::from_request(req, state)
                    .await
                    .map_err(|e| rejection_error(e.status(), e.body_text()))?;
                Ok(GenerationBody::Json {
                    prompt: body.prompt.unwrap_or_default(),
                })
            }
            BodyKind::Multipart => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|e| rejection_error(e.status(), e.body_text()))?;
                Self::from_multipart(multipart).await
            }
            BodyKind::UrlEncoded => {
                let Form(mut fields) = Form::<HashMap<String, String>>::from_request(req, state)
                    .await
                    .map_err(|e| rejection_error(e.status(), e.body_text()))?;
                Ok(GenerationBody::Form {
                    prompt: fields.remove(PROMPT_FIELD).unwrap_or_default(),
                    reference_image: None,
                    extra_images: Vec::new(),
                })
            }
            // Treated like a form that carried nothing
            BodyKind::Other => Ok(GenerationBody::Form {
                prompt: String::new(),
                reference_image: None,
                extra_images: Vec::new(),
            }),
        }
    }
}

/// A validated generation request. The prompt is trimmed and never empty.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    reference_image: Option<UploadedFile>,
    extra_images: Vec<UploadedFile>,
}

impl GenerationRequest {
    pub fn new(prompt: &str, reference_image: Option<UploadedFile>, extra_images: Vec<UploadedFile>) -> Result<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::BadRequest {
                message: "prompt is required".to_string(),
            });
        }

        Ok(Self {
            prompt: prompt.to_string(),
            reference_image,
            extra_images,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reference_image(&self) -> Option<&UploadedFile> {
        self.reference_image.as_ref()
    }

    pub fn extra_images(&self) -> &[UploadedFile] {
        &self.extra_images
    }
}

/// Response for a successfully generated material image
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialImageResponse {
    /// Publicly reachable URL of the stored image
    pub image_url: String,
    /// Path relative to the upload root, `{project_id}/materials/{file}`
    pub relative_path: String,
}
