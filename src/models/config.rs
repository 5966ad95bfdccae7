//! Application configuration structures.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RegistrationRange;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, concurrency and retry policy
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Where results are published and how pages are read
    #[serde(default)]
    pub source: SourceConfig,

    /// Default registration range (CLI flags override it)
    #[serde(default)]
    pub range: Option<RegistrationRange>,

    /// Console output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(AppError::config(format!("{}: {}", path.display(), e))),
            ok => ok,
        }
    }

    /// Validate policy values before any acquisition starts.
    pub fn validate(&self) -> Result<()> {
        self.fetcher.validate()?;
        self.source.validate()?;
        if let Some(range) = &self.range {
            range.validate()?;
        }
        Ok(())
    }
}

/// HTTP client, concurrency and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Deadline for a single attempt in milliseconds
    #[serde(default = "defaults::timeout")]
    pub timeout_ms: u64,

    /// Minimum spacing between request starts in milliseconds (0 disables)
    #[serde(default = "defaults::rate_limit")]
    pub rate_limit_ms: u64,

    /// Maximum in-flight requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per candidate URL on transient failures
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// First retry delay in milliseconds, doubled on every further retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single retry delay
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,
}

impl FetcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(AppError::invalid_range("fetcher.user_agent is empty"));
        }
        if self.timeout_ms == 0 {
            return Err(AppError::invalid_range("fetcher.timeout_ms must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(AppError::invalid_range(
                "fetcher.max_concurrent must be > 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(AppError::invalid_range("fetcher.max_attempts must be > 0"));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(AppError::invalid_range(
                "fetcher.backoff_base_ms must not exceed fetcher.backoff_max_ms",
            ));
        }
        Ok(())
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_ms: defaults::timeout(),
            rate_limit_ms: defaults::rate_limit(),
            max_concurrent: defaults::max_concurrent(),
            max_attempts: defaults::max_attempts(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
        }
    }
}

/// Result publisher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Candidate URL templates, most preferred first
    #[serde(default = "defaults::url_templates")]
    pub url_templates: Vec<String>,

    /// Selectors for reading a result page
    #[serde(default)]
    pub selectors: ResultSelectors,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url_templates.is_empty() {
            return Err(AppError::invalid_range("source.url_templates is empty"));
        }
        if let Some(t) = self
            .url_templates
            .iter()
            .find(|t| !t.contains("{reg_no}"))
        {
            return Err(AppError::invalid_range(format!(
                "URL template has no {{reg_no}} placeholder: {t}"
            )));
        }
        if self.selectors.max_marks <= 0.0 {
            return Err(AppError::invalid_range(
                "source.selectors.max_marks must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_templates: defaults::url_templates(),
            selectors: ResultSelectors::default(),
        }
    }
}

/// CSS selectors and table layout of a result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSelectors {
    #[serde(default = "defaults::sel_registration_no")]
    pub registration_no: String,

    #[serde(default = "defaults::sel_student_name")]
    pub student_name: String,

    #[serde(default = "defaults::sel_father_name")]
    pub father_name: String,

    #[serde(default = "defaults::sel_mother_name")]
    pub mother_name: String,

    #[serde(default = "defaults::sel_sgpa")]
    pub sgpa: String,

    /// Two-row table: semester labels in `th`, grades in `td`
    #[serde(default = "defaults::sel_semester_table")]
    pub semester_table: String,

    /// Rows of the theory and practical subject tables
    #[serde(default = "defaults::sel_subject_rows")]
    pub subject_rows: String,

    /// Overall PASS/FAIL remark
    #[serde(default = "defaults::sel_remarks")]
    pub remarks: String,

    #[serde(default)]
    pub columns: SubjectColumns,

    /// Upper bound for numeric subject marks
    #[serde(default = "defaults::max_marks")]
    pub max_marks: f64,

    /// Page text that marks a "no such registration number" response
    #[serde(default = "defaults::not_found_markers")]
    pub not_found_markers: Vec<String>,
}

impl Default for ResultSelectors {
    fn default() -> Self {
        Self {
            registration_no: defaults::sel_registration_no(),
            student_name: defaults::sel_student_name(),
            father_name: defaults::sel_father_name(),
            mother_name: defaults::sel_mother_name(),
            sgpa: defaults::sel_sgpa(),
            semester_table: defaults::sel_semester_table(),
            subject_rows: defaults::sel_subject_rows(),
            remarks: defaults::sel_remarks(),
            columns: SubjectColumns::default(),
            max_marks: defaults::max_marks(),
            not_found_markers: defaults::not_found_markers(),
        }
    }
}

/// Zero-based cell positions inside a subject row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubjectColumns {
    pub code: usize,
    pub name: usize,
    pub marks: usize,
    pub grade: usize,
}

impl Default for SubjectColumns {
    fn default() -> Self {
        Self {
            code: 0,
            name: 1,
            marks: 4,
            grade: 5,
        }
    }
}

/// Console output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Print progress lines while fetching
    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; result-analyser/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10_000
    }
    pub fn rate_limit() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        15
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        200
    }
    pub fn backoff_max() -> u64 {
        5_000
    }

    // Source defaults
    pub fn url_templates() -> Vec<String> {
        vec![
            "https://results.beup.ac.in/ResultsBTech{sem_ordinal}Sem{exam_year}_B20{batch}Pub.aspx?Sem={sem_roman}&RegNo={reg_no}".into(),
            "https://results.beup.ac.in/ResultsBTech{sem_ordinal}Sem{exam_year}Pub.aspx?Sem={sem_roman}&RegNo={reg_no}".into(),
        ]
    }

    // Selector defaults
    pub fn sel_registration_no() -> String {
        "#ContentPlaceHolder1_DataList1_RegistrationNoLabel_0".into()
    }
    pub fn sel_student_name() -> String {
        "#ContentPlaceHolder1_DataList1_StudentNameLabel_0".into()
    }
    pub fn sel_father_name() -> String {
        "#ContentPlaceHolder1_DataList1_FatherNameLabel_0".into()
    }
    pub fn sel_mother_name() -> String {
        "#ContentPlaceHolder1_DataList1_MotherNameLabel_0".into()
    }
    pub fn sel_sgpa() -> String {
        "#ContentPlaceHolder1_DataList5_GROSSTHEORYTOTALLabel_0".into()
    }
    pub fn sel_semester_table() -> String {
        "#ContentPlaceHolder1_GridView3".into()
    }
    pub fn sel_subject_rows() -> String {
        "#ContentPlaceHolder1_GridView1 tr, #ContentPlaceHolder1_GridView2 tr".into()
    }
    pub fn sel_remarks() -> String {
        "#ContentPlaceHolder1_DataList3_remarkLabel_0".into()
    }
    pub fn max_marks() -> f64 {
        100.0
    }
    pub fn not_found_markers() -> Vec<String> {
        vec![
            "No Record Found".into(),
            "Record Not Found".into(),
            "Invalid Registration".into(),
        ]
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
}
