pub mod config;
pub mod error;
pub mod gemini;
pub mod logger;
pub mod models;
pub mod server;
pub mod storage;
pub mod studio;

pub use config::{Config, GeminiConfig, StorageConfig};
pub use error::{Result, StudioError};
pub use gemini::{GeminiImageClient, ImageGenerator};
pub use models::*;
pub use storage::{
    embed_metadata, read_metadata, ArtifactNamer, ArtifactPrefix, DirectoryScan, ImageStore,
    InMemorySequence, LockedDirectoryScan, Recycler, SequenceAllocator, SystemTrash,
    TrashDirectory,
};
pub use studio::{GenerateForm, Studio};
