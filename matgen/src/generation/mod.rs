//! Material image generation: orchestration of a single synthesis attempt and persistence of
//! its result.
//!
//! ```text
//! GenerationRequest ──► GenerationOrchestrator::run ──► GeneratedAsset ──► MaterialPersister::persist
//!                        │ acquire Workspace                                 │ MaterialStorage
//!                        │ materialize references                            ▼
//!                        │ ImageSynthesizer::generate_image              StoredMaterial
//!                        └ release Workspace (always)
//! ```

pub mod workspace;

use crate::api::models::materials::GenerationRequest;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::storage::{MATERIALS_CATEGORY, MaterialStorage};
use crate::synthesis::{ImageSynthesizer, SynthesisRequest, SynthesizedImage};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub use workspace::Workspace;

/// Fixed parameters for every synthesis call, taken from configuration at startup.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub workspace_root: PathBuf,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workspace_root: config.workspace_folder.clone(),
            aspect_ratio: config.generation.aspect_ratio.clone(),
            resolution: config.generation.resolution.clone(),
        }
    }
}

/// A generated image that has not been stored yet.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub data: Bytes,
    pub mime_type: String,
}

impl From<SynthesizedImage> for GeneratedAsset {
    fn from(image: SynthesizedImage) -> Self {
        Self {
            data: image.data,
            mime_type: image.mime_type,
        }
    }
}

fn service_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::ServiceUnavailable {
        message: format!("{context}: {e}"),
    }
}

pub struct GenerationOrchestrator {
    synthesizer: Arc<dyn ImageSynthesizer>,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(synthesizer: Arc<dyn ImageSynthesizer>, settings: GenerationSettings) -> Self {
        Self { synthesizer, settings }
    }

    /// Run one synthesis attempt. The workspace acquired here is released before this returns,
    /// whatever the outcome; no retry is attempted.
    #[instrument(skip_all, fields(extra_images = request.extra_images().len(), has_reference = request.reference_image().is_some()))]
    pub async fn run(&self, request: &GenerationRequest) -> Result<GeneratedAsset> {
        let mut workspace =
            Workspace::acquire(&self.settings.workspace_root).map_err(|e| service_error("Failed to create workspace", e))?;

        let result = self.synthesize(&mut workspace, request).await;
        workspace.release();
        result
    }

    async fn synthesize(&self, workspace: &mut Workspace, request: &GenerationRequest) -> Result<GeneratedAsset> {
        let reference_image = match request.reference_image() {
            Some(file) => Some(
                workspace
                    .materialize(file)
                    .await
                    .map_err(|e| service_error("Failed to store reference image", e))?,
            ),
            None => None,
        };

        let extra_paths = workspace
            .materialize_all(request.extra_images())
            .await
            .map_err(|e| service_error("Failed to store reference image", e))?;

        let synthesis = SynthesisRequest {
            prompt: request.prompt().to_string(),
            reference_image,
            aspect_ratio: self.settings.aspect_ratio.clone(),
            resolution: self.settings.resolution.clone(),
            additional_reference_images: (!extra_paths.is_empty()).then_some(extra_paths),
        };

        let image = self.synthesizer.generate_image(synthesis).await.map_err(|e| {
            let message = format!("{e:#}");
            error!(error = %message, "Image synthesis failed");
            Error::ServiceUnavailable { message }
        })?;

        match image {
            Some(image) => {
                info!(bytes = image.data.len(), mime_type = %image.mime_type, "Image synthesized");
                Ok(image.into())
            }
            None => {
                warn!("Image synthesis returned no image");
                Err(Error::ServiceUnavailable {
                    message: "Failed to generate image".to_string(),
                })
            }
        }
    }
}

/// Where a persisted asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMaterial {
    /// `{project_id}/materials/{file_name}`
    pub relative_path: String,
    pub public_url: String,
}

/// Hands generated images to durable storage and derives their public URL.
#[derive(Clone)]
pub struct MaterialPersister {
    storage: Arc<dyn MaterialStorage>,
}

impl MaterialPersister {
    pub fn new(storage: Arc<dyn MaterialStorage>) -> Self {
        Self { storage }
    }

    #[instrument(skip(self, asset), fields(bytes = asset.data.len()))]
    pub async fn persist(&self, asset: &GeneratedAsset, project_id: &str) -> Result<StoredMaterial> {
        let relative_path = self
            .storage
            .save_material_image(&asset.data, &asset.mime_type, project_id)
            .await
            .map_err(|e| service_error("Failed to store generated image", format!("{e:#}")))?;

        let file_name = Path::new(&relative_path)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::ServiceUnavailable {
                message: format!("Storage returned an unusable path: {relative_path}"),
            })?;

        let public_url = self.storage.file_url(project_id, MATERIALS_CATEGORY, file_name);
        info!(%relative_path, %public_url, "Stored generated material");

        Ok(StoredMaterial {
            relative_path,
            public_url,
        })
    }
}
