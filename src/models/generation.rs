use serde::{Deserialize, Serialize};

use super::reference::{ReferenceImage, ReferenceItem, ReferenceWarning};
use super::gallery::StoredArtifact;

/// Aspect ratio recorded when the caller leaves the choice to the model.
pub const AUTO_ASPECT_RATIO: &str = "Auto";
pub const DEFAULT_RESOLUTION: &str = "2K";

/// A validated `/generate` request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub resolution: String,
    pub api_key: String,
    /// References in declared order, not yet read or decoded.
    pub reference_items: Vec<ReferenceItem>,
    /// Problems found while pairing slots with uploads, before resolution.
    pub reference_warnings: Vec<ReferenceWarning>,
}

impl GenerationRequest {
    pub fn image_config(&self) -> ImageConfig {
        ImageConfig::new(&self.resolution, self.aspect_ratio.as_deref())
    }

    /// Metadata stored with the artifact. `reference_images` holds the
    /// canonical URLs, foreign ones included.
    pub fn metadata(&self, reference_images: Vec<String>) -> GenerationMetadata {
        GenerationMetadata {
            prompt: self.prompt.clone(),
            aspect_ratio: self
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| AUTO_ASPECT_RATIO.to_string()),
            resolution: self.resolution.clone(),
            reference_images,
        }
    }
}

/// Image options forwarded to the generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub image_size: String,
    /// `None` when the caller asked for "Auto".
    pub aspect_ratio: Option<String>,
}

impl ImageConfig {
    pub fn new(resolution: &str, aspect_ratio: Option<&str>) -> Self {
        let aspect_ratio = aspect_ratio
            .map(str::trim)
            .filter(|ratio| !ratio.is_empty() && !ratio.eq_ignore_ascii_case(AUTO_ASPECT_RATIO))
            .map(str::to_string);

        Self {
            image_size: resolution.to_string(),
            aspect_ratio,
        }
    }
}

/// Prompt plus decoded references, in the order they are sent upstream.
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub prompt: String,
    pub images: Vec<ReferenceImage>,
}

/// Everything one upstream generation needs.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub model: String,
    pub content: ResolvedContent,
    pub image_config: ImageConfig,
    pub api_key: String,
}

/// The first inline image returned upstream, already base64-decoded.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// MIME type reported by the upstream, if any.
    pub mime_type: Option<String>,
}

/// Generation settings embedded in every stored PNG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub reference_images: Vec<String>,
}

/// Result of a successful generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// URL of the stored artifact.
    pub image: String,
    /// Base64 of the stored PNG, metadata chunk included.
    pub image_data: String,
    pub metadata: GenerationMetadata,
    pub artifact: StoredArtifact,
    /// References skipped or recorded without being attached.
    pub warnings: Vec<ReferenceWarning>,
}

/// JSON body of a successful `/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub image: String,
    pub image_data: String,
    pub metadata: GenerationMetadata,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            image: outcome.image,
            image_data: outcome.image_data,
            metadata: outcome.metadata,
        }
    }
}
