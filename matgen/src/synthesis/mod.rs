//! The external image-synthesis capability.
//!
//! The orchestrator only sees [`ImageSynthesizer`]; [`gemini::GeminiImageSynthesizer`] is the
//! production implementation and tests substitute their own.

pub mod gemini;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

pub use gemini::GeminiImageSynthesizer;

/// Everything a synthesis call receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// User prompt, verbatim
    pub prompt: String,
    pub reference_image: Option<PathBuf>,
    pub aspect_ratio: String,
    pub resolution: String,
    /// `None` rather than an empty list when there are no additional references
    pub additional_reference_images: Option<Vec<PathBuf>>,
}

/// Raw image returned by the synthesis service.
#[derive(Debug, Clone)]
pub struct SynthesizedImage {
    pub data: Bytes,
    pub mime_type: String,
}

#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Generate one image. `Ok(None)` means the service answered but produced no image; transport
    /// and service failures are errors.
    async fn generate_image(&self, request: SynthesisRequest) -> anyhow::Result<Option<SynthesizedImage>>;
}
