use crate::{
    error::{Result, StudioError},
    storage::traits::{ArtifactPrefix, SequenceAllocator},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Highest sequence already on disk for `prefix`, or 0.
pub async fn max_sequence_on_disk(dir: &Path, prefix: &ArtifactPrefix) -> Result<u64> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut max = 0;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(sequence) = entry.file_name().to_str().and_then(|n| prefix.sequence_of(n)) {
            max = max.max(sequence);
        }
    }
    Ok(max)
}

/// Scan-then-compute. Two callers scanning before either writes get the
/// same number.
pub struct DirectoryScan {
    dir: PathBuf,
}

impl DirectoryScan {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SequenceAllocator for DirectoryScan {
    async fn allocate(&self, prefix: &ArtifactPrefix) -> Result<u64> {
        prefix.next_sequence(max_sequence_on_disk(&self.dir, prefix).await?)
    }
}

/// Directory scan serialized behind a lock, with a per-prefix high-water
/// mark so a number handed out is never handed out again in this process.
pub struct LockedDirectoryScan {
    dir: PathBuf,
    reserved: tokio::sync::Mutex<HashMap<ArtifactPrefix, u64>>,
}

impl LockedDirectoryScan {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            reserved: tokio::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SequenceAllocator for LockedDirectoryScan {
    async fn allocate(&self, prefix: &ArtifactPrefix) -> Result<u64> {
        let mut reserved = self.reserved.lock().await;
        let on_disk = max_sequence_on_disk(&self.dir, prefix).await?;
        let high_water = reserved.get(prefix).copied().unwrap_or(0);
        let next = prefix.next_sequence(on_disk.max(high_water))?;
        reserved.insert(prefix.clone(), next);
        Ok(next)
    }
}

/// Per-prefix counters that never touch disk.
#[derive(Default)]
pub struct InMemorySequence {
    counters: Mutex<HashMap<ArtifactPrefix, u64>>,
}

impl InMemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `prefix` so its next allocation is `last + 1`.
    pub fn starting_after(prefix: ArtifactPrefix, last: u64) -> Self {
        let sequence = Self::new();
        if let Ok(mut counters) = sequence.counters.lock() {
            counters.insert(prefix, last);
        }
        sequence
    }
}

#[async_trait]
impl SequenceAllocator for InMemorySequence {
    async fn allocate(&self, prefix: &ArtifactPrefix) -> Result<u64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| StudioError::InternalError(e.to_string()))?;
        let counter = counters.entry(prefix.clone()).or_insert(0);
        *counter = prefix.next_sequence(*counter)?;
        Ok(*counter)
    }
}

/// Computes `<model>_<YYYYMMDD>_<N>.png` names for new artifacts.
#[derive(Clone)]
pub struct ArtifactNamer {
    allocator: Arc<dyn SequenceAllocator>,
}

impl ArtifactNamer {
    pub fn new(allocator: Arc<dyn SequenceAllocator>) -> Self {
        Self { allocator }
    }

    pub async fn next_filename(&self, model: &str, day: NaiveDate) -> Result<String> {
        let prefix = ArtifactPrefix::new(model, day);
        let sequence = self.allocator.allocate(&prefix).await?;
        Ok(prefix.file_name(sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"png").unwrap();
    }

    #[test]
    fn sequence_parsing_requires_exact_prefix_and_digits() {
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));
        assert_eq!(prefix.sequence_of("model_20240101_3.png"), Some(3));
        assert_eq!(prefix.sequence_of("model_20240101_12.png"), Some(12));
        assert_eq!(prefix.sequence_of("model_20240101_x.png"), None);
        assert_eq!(prefix.sequence_of("model_20240101_+4.png"), None);
        assert_eq!(prefix.sequence_of("model_20240101_.png"), None);
        assert_eq!(prefix.sequence_of("model_20240102_7.png"), None);
        assert_eq!(prefix.sequence_of("model2_20240101_7.png"), None);
        assert_eq!(prefix.sequence_of("model_20240101_5.jpg"), None);
    }

    #[tokio::test]
    async fn sequences_past_u32_keep_counting() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "model_20240101_5000000000.png");

        let namer = ArtifactNamer::new(Arc::new(DirectoryScan::new(dir.path())));
        assert_eq!(
            namer.next_filename("model", day(2024, 1, 1)).await.unwrap(),
            "model_20240101_5000000001.png"
        );

        touch(dir.path(), "model_20240101_4294967295.png");
        let locked = LockedDirectoryScan::new(dir.path());
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));
        assert_eq!(locked.allocate(&prefix).await.unwrap(), 5_000_000_001);
    }

    #[tokio::test]
    async fn exhausted_sequence_is_an_error() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &format!("model_20240101_{}.png", u64::MAX));
        touch(dir.path(), "other_20240101_99999999999999999999999.png");
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));
        let other = ArtifactPrefix::new("other", day(2024, 1, 1));

        for allocator in [
            Arc::new(DirectoryScan::new(dir.path())) as Arc<dyn SequenceAllocator>,
            Arc::new(LockedDirectoryScan::new(dir.path())),
        ] {
            assert!(matches!(
                allocator.allocate(&prefix).await,
                Err(StudioError::InternalError(_))
            ));
            assert!(allocator.allocate(&other).await.is_err());
        }

        let sequence = InMemorySequence::starting_after(prefix.clone(), u64::MAX);
        assert!(sequence.allocate(&prefix).await.is_err());
    }

    #[test]
    fn model_path_segments_are_stripped() {
        let prefix = ArtifactPrefix::new("models/gemini-3-pro-image-preview", day(2024, 3, 9));
        assert_eq!(
            prefix.file_name(2),
            "gemini-3-pro-image-preview_20240309_2.png"
        );
    }

    #[tokio::test]
    async fn gap_is_never_filled() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "model_20240101_1.png");
        touch(dir.path(), "model_20240101_3.png");
        touch(dir.path(), "model_20240101_notes.png");

        let namer = ArtifactNamer::new(Arc::new(DirectoryScan::new(dir.path())));
        let name = namer.next_filename("model", day(2024, 1, 1)).await.unwrap();
        assert_eq!(name, "model_20240101_4.png");
    }

    #[tokio::test]
    async fn starts_at_one_and_ignores_other_models_and_days() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "model_20240101_9.png");
        touch(dir.path(), "other_20240102_5.png");

        let namer = ArtifactNamer::new(Arc::new(DirectoryScan::new(dir.path())));
        assert_eq!(
            namer.next_filename("model", day(2024, 1, 2)).await.unwrap(),
            "model_20240102_1.png"
        );
        assert_eq!(
            namer.next_filename("other", day(2024, 1, 1)).await.unwrap(),
            "other_20240101_1.png"
        );
        assert_eq!(
            namer.next_filename("other", day(2024, 1, 2)).await.unwrap(),
            "other_20240102_6.png"
        );
    }

    #[tokio::test]
    async fn missing_directory_starts_at_one() {
        let dir = TempDir::new().unwrap();
        let scan = DirectoryScan::new(dir.path().join("absent"));
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));
        assert_eq!(scan.allocate(&prefix).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn plain_scan_races_before_write() {
        let dir = TempDir::new().unwrap();
        let scan = DirectoryScan::new(dir.path());
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));

        let first = scan.allocate(&prefix).await.unwrap();
        let second = scan.allocate(&prefix).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn locked_scan_never_repeats() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "model_20240101_2.png");
        let scan = Arc::new(LockedDirectoryScan::new(dir.path()));
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scan = scan.clone();
                let prefix = prefix.clone();
                tokio::spawn(async move { scan.allocate(&prefix).await.unwrap() })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (3..=10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn locked_scan_does_not_reuse_after_delete() {
        let dir = TempDir::new().unwrap();
        let scan = LockedDirectoryScan::new(dir.path());
        let prefix = ArtifactPrefix::new("model", day(2024, 1, 1));

        let first = scan.allocate(&prefix).await.unwrap();
        touch(dir.path(), &prefix.file_name(first));
        std::fs::remove_file(dir.path().join(prefix.file_name(first))).unwrap();

        assert_eq!(scan.allocate(&prefix).await.unwrap(), first + 1);
    }

    #[tokio::test]
    async fn in_memory_sequence_is_per_prefix() {
        let a = ArtifactPrefix::new("model", day(2024, 1, 1));
        let b = ArtifactPrefix::new("model", day(2024, 1, 2));
        let sequence = InMemorySequence::starting_after(a.clone(), 4);

        assert_eq!(sequence.allocate(&a).await.unwrap(), 5);
        assert_eq!(sequence.allocate(&b).await.unwrap(), 1);
        assert_eq!(sequence.allocate(&a).await.unwrap(), 6);
    }
}
