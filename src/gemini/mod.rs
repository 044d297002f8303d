pub mod image_client;

use crate::{
    error::Result,
    models::{GeneratedImage, GenerationCall},
};
use async_trait::async_trait;

pub use image_client::GeminiImageClient;

/// The single upstream call made per generation request.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, call: &GenerationCall) -> Result<GeneratedImage>;
}
