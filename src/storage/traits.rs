use crate::error::{Result, StudioError};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;

/// Model and calendar day an artifact sequence is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPrefix {
    pub model: String,
    pub day: NaiveDate,
}

impl ArtifactPrefix {
    pub fn new(model: &str, day: NaiveDate) -> Self {
        let model = model.rsplit('/').next().unwrap_or(model).trim();
        Self {
            model: model.to_string(),
            day,
        }
    }

    /// `<model>_<YYYYMMDD>`
    pub fn stem(&self) -> String {
        format!("{}_{}", self.model, self.day.format("%Y%m%d"))
    }

    pub fn file_name(&self, sequence: u64) -> String {
        format!("{}_{}.png", self.stem(), sequence)
    }

    /// Sequence number of `file_name` if it belongs to this prefix. Integers
    /// too large for `u64` saturate so the next allocation fails instead of
    /// restarting at 1.
    pub fn sequence_of(&self, file_name: &str) -> Option<u64> {
        let digits = file_name
            .strip_prefix(self.stem().as_str())?
            .strip_prefix('_')?
            .strip_suffix(".png")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(digits.parse().unwrap_or(u64::MAX))
    }

    /// The sequence after `current`. Errors once the counter is exhausted.
    pub fn next_sequence(&self, current: u64) -> Result<u64> {
        current.checked_add(1).ok_or_else(|| {
            StudioError::InternalError(format!("sequence exhausted for {}", self.stem()))
        })
    }
}

#[async_trait]
pub trait SequenceAllocator: Send + Sync {
    /// Returns the next sequence number for `prefix`, starting at 1.
    async fn allocate(&self, prefix: &ArtifactPrefix) -> Result<u64>;
}

#[async_trait]
pub trait Recycler: Send + Sync {
    /// Moves `path` somewhere recoverable.
    async fn recycle(&self, path: &Path) -> Result<()>;
}
