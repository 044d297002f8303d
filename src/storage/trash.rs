use crate::{
    error::{Result, StudioError},
    storage::traits::Recycler,
};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// The operating system's recycle bin.
pub struct SystemTrash;

#[async_trait]
impl Recycler for SystemTrash {
    async fn recycle(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || trash::delete(&path))
            .await
            .map_err(|e| StudioError::InternalError(e.to_string()))?
            .map_err(|e| StudioError::IoError(e.to_string()))
    }
}

/// Moves files into a plain directory, prefixed with a timestamp so repeated
/// names never clobber each other.
pub struct TrashDirectory {
    dir: PathBuf,
}

impl TrashDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Recycler for TrashDirectory {
    async fn recycle(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(StudioError::InvalidFilename)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.dir.join(format!(
            "{}-{}",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            name
        ));
        if tokio::fs::rename(path, &target).await.is_err() {
            // Different filesystem.
            tokio::fs::copy(path, &target).await?;
            tokio::fs::remove_file(path).await?;
        }
        log::debug!("Moved {} to {}", path.display(), target.display());
        Ok(())
    }
}
