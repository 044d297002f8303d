use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A PNG in the generated directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub filename: String,
    pub filepath: PathBuf,
    pub modified: SystemTime,
}

/// `GET /gallery` body, newest first.
#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub images: Vec<String>,
}

/// `POST /delete_image` body. Only the final path component is honoured.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteImageRequest {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteImageResponse {
    pub success: bool,
}
