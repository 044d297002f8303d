use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Prompt is required")]
    MissingPrompt,
    #[error("API Key is required.")]
    MissingApiKey,
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("File not found")]
    NotFound,
    #[error("No image generated")]
    NoImageGenerated,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("{0}")]
    RequestError(String),
    /// Upstream failures are surfaced verbatim.
    #[error("{0}")]
    UpstreamError(String),
    #[error("Image error: {0}")]
    ImageError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        StudioError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
