pub mod metadata;
pub mod naming;
pub mod traits;
pub mod trash;

use crate::{
    config::StorageConfig,
    error::{Result, StudioError},
    models::StoredArtifact,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub use metadata::{embed_metadata, read_metadata, METADATA_KEYWORD};
pub use naming::{ArtifactNamer, DirectoryScan, InMemorySequence, LockedDirectoryScan};
pub use traits::{ArtifactPrefix, Recycler, SequenceAllocator};
pub use trash::{SystemTrash, TrashDirectory};

pub const GENERATED_URL_PREFIX: &str = "/static/generated";
pub const UPLOADS_URL_PREFIX: &str = "/static/uploads";

/// Where a declared reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedReference {
    Stored { path: PathBuf, url: String },
    Foreign(String),
}

/// Reduces user input to a bare file name. `None` for empty, `.` or `..`.
pub fn bare_file_name(input: &str) -> Option<&str> {
    let name = input.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name)
}

/// The two flat directories behind the gallery and the reference uploads.
#[derive(Debug, Clone)]
pub struct ImageStore {
    generated_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl ImageStore {
    /// Creates both directories if they are missing.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        for dir in [&config.generated_dir, &config.uploads_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                StudioError::ConfigError(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }

        Ok(Self {
            generated_dir: config.generated_dir.clone(),
            uploads_dir: config.uploads_dir.clone(),
        })
    }

    pub fn generated_dir(&self) -> &Path {
        &self.generated_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn generated_url(&self, file_name: &str) -> String {
        format!("{}/{}", GENERATED_URL_PREFIX, file_name)
    }

    pub fn uploads_url(&self, file_name: &str) -> String {
        format!("{}/{}", UPLOADS_URL_PREFIX, file_name)
    }

    fn roots(&self) -> [(&'static str, &Path); 2] {
        [
            (GENERATED_URL_PREFIX, self.generated_dir.as_path()),
            (UPLOADS_URL_PREFIX, self.uploads_dir.as_path()),
        ]
    }

    fn locate_url_path(&self, url_path: &str) -> Option<LocatedReference> {
        for (prefix, dir) in self.roots() {
            let Some(rest) = url_path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };
            if rest.contains('/') || rest.contains('\\') {
                return None;
            }
            let name = bare_file_name(rest)?;
            return Some(LocatedReference::Stored {
                path: dir.join(name),
                url: format!("{}/{}", prefix, name),
            });
        }
        None
    }

    fn locate_fs_path(&self, path: &Path) -> Option<LocatedReference> {
        let name = path.file_name()?.to_str()?;
        let parent = std::fs::canonicalize(path.parent()?).ok()?;
        for (prefix, dir) in self.roots() {
            if std::fs::canonicalize(dir).ok().as_deref() == Some(parent.as_path()) {
                return Some(LocatedReference::Stored {
                    path: dir.join(name),
                    url: format!("{}/{}", prefix, name),
                });
            }
        }
        None
    }

    /// Maps an absolute URL or absolute path onto local storage. Returns
    /// `None` for relative references.
    pub fn locate(&self, reference: &str) -> Option<LocatedReference> {
        let reference = reference.trim();
        let foreign = || LocatedReference::Foreign(reference.to_string());

        if let Ok(url) = reqwest::Url::parse(reference) {
            return Some(match url.scheme() {
                "file" => url
                    .to_file_path()
                    .ok()
                    .and_then(|path| self.locate_fs_path(&path))
                    .unwrap_or_else(foreign),
                _ => self.locate_url_path(url.path()).unwrap_or_else(foreign),
            });
        }

        if !reference.starts_with('/') {
            return None;
        }
        let url_path = reference.split(['?', '#']).next().unwrap_or(reference);
        Some(
            self.locate_url_path(url_path)
                .or_else(|| self.locate_fs_path(Path::new(reference)))
                .unwrap_or_else(foreign),
        )
    }

    /// Persists an uploaded reference under a fresh name and returns its URL.
    pub async fn save_upload(&self, bytes: &[u8], original_filename: &str) -> Result<String> {
        let extension = Path::new(original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "png".to_string());
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::write(self.uploads_dir.join(&file_name), bytes).await?;
        Ok(self.uploads_url(&file_name))
    }

    /// Writes a finished PNG under `file_name` in the generated directory.
    pub async fn write_artifact(&self, file_name: &str, bytes: &[u8]) -> Result<StoredArtifact> {
        let filepath = self.generated_dir.join(file_name);
        tokio::fs::write(&filepath, bytes).await?;
        let modified = tokio::fs::metadata(&filepath).await?.modified()?;

        Ok(StoredArtifact {
            filename: file_name.to_string(),
            filepath,
            modified,
        })
    }

    /// Every stored PNG, newest first.
    pub async fn list_artifacts(&self) -> Result<Vec<StoredArtifact>> {
        let mut entries = match tokio::fs::read_dir(&self.generated_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filepath = entry.path();
            let is_png = filepath
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
            let metadata = entry.metadata().await?;
            if !is_png || !metadata.is_file() {
                continue;
            }
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            artifacts.push(StoredArtifact {
                filename,
                filepath,
                modified: metadata.modified()?,
            });
        }

        artifacts.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(artifacts)
    }

    /// Canonical URLs of [`Self::list_artifacts`].
    pub async fn gallery_urls(&self) -> Result<Vec<String>> {
        Ok(self
            .list_artifacts()
            .await?
            .iter()
            .map(|artifact| self.generated_url(&artifact.filename))
            .collect())
    }

    /// Moves a generated image to `recycler`. Only the final path component
    /// of `filename` is used.
    pub async fn delete_artifact(&self, filename: &str, recycler: &Arc<dyn Recycler>) -> Result<()> {
        let name = bare_file_name(filename).ok_or(StudioError::InvalidFilename)?;
        let path = self.generated_dir.join(name);

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return Err(StudioError::NotFound),
        }

        recycler.recycle(&path).await?;
        log::info!("Deleted generated image {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn store() -> (TempDir, ImageStore) {
        let root = TempDir::new().unwrap();
        let store = ImageStore::new(&StorageConfig::rooted_at(root.path())).unwrap();
        (root, store)
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn bare_file_name_strips_directories() {
        assert_eq!(bare_file_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(bare_file_name("..\\..\\boot.ini"), Some("boot.ini"));
        assert_eq!(bare_file_name("a.png"), Some("a.png"));
        assert_eq!(bare_file_name("dir/.."), None);
        assert_eq!(bare_file_name(""), None);
        assert_eq!(bare_file_name("trailing/"), None);
    }

    #[test]
    fn locates_urls_and_paths_in_storage() {
        let (_root, store) = store();

        assert_eq!(
            store.locate("/static/generated/a.png?t=123"),
            Some(LocatedReference::Stored {
                path: store.generated_dir().join("a.png"),
                url: "/static/generated/a.png".to_string(),
            })
        );
        assert_eq!(
            store.locate("http://localhost:8888/static/uploads/b.jpg"),
            Some(LocatedReference::Stored {
                path: store.uploads_dir().join("b.jpg"),
                url: "/static/uploads/b.jpg".to_string(),
            })
        );

        let absolute = store.uploads_dir().canonicalize().unwrap().join("c.png");
        assert_eq!(
            store.locate(absolute.to_str().unwrap()),
            Some(LocatedReference::Stored {
                path: store.uploads_dir().join("c.png"),
                url: "/static/uploads/c.png".to_string(),
            })
        );
    }

    #[test]
    fn foreign_and_relative_references() {
        let (_root, store) = store();

        assert_eq!(
            store.locate("https://example.com/cat.png"),
            Some(LocatedReference::Foreign("https://example.com/cat.png".to_string()))
        );
        assert_eq!(
            store.locate("/etc/passwd"),
            Some(LocatedReference::Foreign("/etc/passwd".to_string()))
        );
        assert_eq!(
            store.locate("/static/generated/../../secret.png"),
            Some(LocatedReference::Foreign(
                "/static/generated/../../secret.png".to_string()
            ))
        );
        assert_eq!(store.locate("cat.png"), None);
    }

    #[tokio::test]
    async fn uploads_keep_extension_or_default_to_png() {
        let (_root, store) = store();

        let jpg = store.save_upload(b"x", "Photo.JPG").await.unwrap();
        let bare = store.save_upload(b"y", "blob").await.unwrap();

        assert!(jpg.starts_with("/static/uploads/") && jpg.ends_with(".jpg"));
        assert!(bare.ends_with(".png"));
        let name = jpg.rsplit('/').next().unwrap();
        assert_eq!(std::fs::read(store.uploads_dir().join(name)).unwrap(), b"x");
    }

    #[tokio::test]
    async fn gallery_is_newest_first() {
        let (_root, store) = store();
        for (name, secs) in [("t1.png", 1_000), ("t3.png", 3_000), ("t2.png", 2_000)] {
            let path = store.generated_dir().join(name);
            std::fs::write(&path, b"png").unwrap();
            set_mtime(&path, secs);
        }
        std::fs::write(store.generated_dir().join("notes.txt"), b"skip").unwrap();

        assert_eq!(
            store.gallery_urls().await.unwrap(),
            vec![
                "/static/generated/t3.png",
                "/static/generated/t2.png",
                "/static/generated/t1.png",
            ]
        );
    }

    #[tokio::test]
    async fn delete_never_escapes_generated_dir() {
        let (root, store) = store();
        let outside = root.path().join("passwd");
        std::fs::write(&outside, b"root").unwrap();
        let recycler: Arc<dyn Recycler> = Arc::new(TrashDirectory::new(root.path().join("trash")));

        let err = store
            .delete_artifact("../passwd", &recycler)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::NotFound));
        assert!(outside.exists());

        let inside = store.generated_dir().join("passwd");
        std::fs::write(&inside, b"png").unwrap();
        store.delete_artifact("../../etc/passwd", &recycler).await.unwrap();
        assert!(!inside.exists());
        assert!(outside.exists());
    }

    #[tokio::test]
    async fn delete_rejects_empty_names() {
        let (root, store) = store();
        let recycler: Arc<dyn Recycler> = Arc::new(TrashDirectory::new(root.path().join("trash")));
        let err = store.delete_artifact("../", &recycler).await.unwrap_err();
        assert!(matches!(err, StudioError::InvalidFilename));
    }
}
