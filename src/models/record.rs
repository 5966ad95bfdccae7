//! Student record data structures.

use serde::{Deserialize, Serialize};

use crate::models::EntryType;

/// Outcome of acquiring one registration number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchStatus {
    Success,
    NotFound,
    ParseError,
    NetworkError,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::NotFound => "not found",
            FetchStatus::ParseError => "parse error",
            FetchStatus::NetworkError => "network error",
        }
    }
}

/// One subject row of a result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectScore {
    /// Subject code, e.g. "105301"
    pub code: String,

    /// Subject title
    pub name: String,

    /// Total marks, when the page gives a number
    pub marks: Option<f64>,

    /// Upper bound for `marks`
    pub max_marks: Option<f64>,

    /// Letter grade as printed, e.g. "A+"
    pub grade: Option<String>,

    /// Grade point derived from the letter grade
    pub grade_point: Option<f64>,

    pub passed: bool,
}

/// One cell of the semester grade table ("I" -> 7.8, "Cur. CGPA" -> 7.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterGrade {
    pub label: String,
    pub value: f64,
}

/// Immutable snapshot of one student's result for the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub registration_no: u64,

    #[serde(default)]
    pub entry: EntryType,

    pub name: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,

    /// Semester grade point average
    pub sgpa: Option<f64>,

    /// Cumulative grade point average, absent in the first semester
    pub cgpa: Option<f64>,

    #[serde(default)]
    pub semester_grades: Vec<SemesterGrade>,

    #[serde(default)]
    pub subjects: Vec<SubjectScore>,

    /// Overall pass status
    pub passed: bool,

    /// URL the page was fetched from
    pub source_url: Option<String>,

    pub status: FetchStatus,

    /// Retries spent on this number
    #[serde(default)]
    pub retries: u32,

    /// Failure description for non-success records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StudentRecord {
    /// Placeholder for a number that could not be acquired.
    pub fn failed(registration_no: u64, status: FetchStatus, detail: impl Into<String>) -> Self {
        Self {
            registration_no,
            entry: EntryType::Regular,
            name: None,
            father_name: None,
            mother_name: None,
            sgpa: None,
            cgpa: None,
            semester_grades: Vec::new(),
            subjects: Vec::new(),
            passed: false,
            source_url: None,
            status,
            retries: 0,
            detail: Some(detail.into()),
        }
    }

    /// Attach acquisition context before the record is handed out.
    pub fn with_fetch_context(
        mut self,
        entry: EntryType,
        source_url: Option<String>,
        retries: u32,
    ) -> Self {
        self.entry = entry;
        self.source_url = source_url;
        self.retries = retries;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// Name for display, falling back to the registration number.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.registration_no.to_string())
    }

    pub fn subject(&self, code: &str) -> Option<&SubjectScore> {
        self.subjects.iter().find(|s| s.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_placeholder() {
        let record = StudentRecord::failed(24105107001, FetchStatus::NotFound, "no record");
        assert!(!record.is_success());
        assert_eq!(record.display_name(), "24105107001");
        assert_eq!(record.detail.as_deref(), Some("no record"));
    }

    #[test]
    fn test_with_fetch_context() {
        let record = StudentRecord::failed(1, FetchStatus::NetworkError, "timeout")
            .with_fetch_context(EntryType::Lateral, Some("https://example.com".into()), 2);
        assert_eq!(record.entry, EntryType::Lateral);
        assert_eq!(record.retries, 2);
    }
}
