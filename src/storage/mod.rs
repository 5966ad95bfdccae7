//! Storage abstractions for acquisition results.
//!
//! A finished run is stored per class and semester so rankings and trends can
//! be recomputed later without fetching again.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! └── results/
//!     └── 24-105-107/       # {batch}-{branch}-{college}
//!         ├── sem1.json
//!         └── sem3.json
//! ```

pub mod local;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{AcquisitionResult, RegistrationRange};

// Re-export for convenience
pub use local::LocalStorage;

/// Identifies one stored run: a class and a semester.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultKey {
    /// `{batch}-{branch}-{college}`
    pub class: String,
    pub semester: u8,
}

impl ResultKey {
    pub fn new(class: impl Into<String>, semester: u8) -> Self {
        Self {
            class: class.into(),
            semester,
        }
    }

    pub fn for_range(range: &RegistrationRange) -> Self {
        Self::new(range.class_key(), range.semester)
    }

    /// Relative path of the stored file.
    pub fn path(&self) -> String {
        format!("results/{}/sem{}.json", self.class, self.semester)
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} semester {}", self.class, self.semester)
    }
}

/// Options for writing a result.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Replace a complete stored run even with a cancelled one
    pub force: bool,
}

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    pub key: ResultKey,
    /// Number of records written
    pub records: usize,
    /// True when the write was refused to protect a complete stored run
    pub skipped: bool,
    pub timestamp: DateTime<Utc>,
}

/// Trait for result storage backends.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    /// Store a run under the key derived from its range.
    ///
    /// A cancelled run does not replace a complete one unless
    /// `options.force` is set.
    async fn save_result(
        &self,
        result: &AcquisitionResult,
        options: &WriteOptions,
    ) -> Result<WriteMetadata>;

    async fn load_result(&self, key: &ResultKey) -> Result<Option<AcquisitionResult>>;

    /// Semesters stored for a class, ascending.
    async fn list_semesters(&self, class: &str) -> Result<Vec<u8>>;

    /// Every stored run of a class, in semester order.
    async fn load_class(&self, class: &str) -> Result<Vec<AcquisitionResult>> {
        let mut results = Vec::new();
        for semester in self.list_semesters(class).await? {
            if let Some(result) = self.load_result(&ResultKey::new(class, semester)).await? {
                results.push(result);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path() {
        let range = RegistrationRange::new(1, 60, 3, 24, "105", "107");
        let key = ResultKey::for_range(&range);
        assert_eq!(key.path(), "results/24-105-107/sem3.json");
        assert_eq!(key.to_string(), "24-105-107 semester 3");
    }
}
