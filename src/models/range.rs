//! Registration range and its expansion into per-student tasks.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Largest serial that fits the three-digit suffix of a registration number.
pub const MAX_SERIAL: u32 = 999;

/// Lateral entrants join in the third semester.
const LATERAL_FIRST_SEMESTER: u8 = 3;

const SEM_ORDINALS: [&str; 8] = ["1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th"];
const SEM_ROMANS: [&str; 8] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII"];

/// Admission pathway, which decides the numbering convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    #[default]
    Regular,
    Lateral,
}

/// A contiguous block of registration numbers for one class.
///
/// `start` and `end` are the three-digit serials (the "short" registration
/// number). The full number is `{batch}{branch}{college}{serial:03}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRange {
    pub start: u32,
    pub end: u32,
    pub semester: u8,

    /// Last two digits of the admission year, e.g. 24 for 2024-28
    pub batch: u8,

    /// Three-digit branch code, e.g. "105"
    pub branch: String,

    /// Three-digit college code, e.g. "107"
    pub college: String,

    /// Also fetch lateral entrants (from the third semester on)
    #[serde(default)]
    pub lateral_entry: bool,

    #[serde(default = "defaults::lateral_start")]
    pub lateral_start: u32,

    #[serde(default = "defaults::lateral_end")]
    pub lateral_end: u32,
}

/// One registration number to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationTask {
    pub reg_no: u64,
    pub serial: u32,
    pub entry: EntryType,
}

impl RegistrationRange {
    /// Create a regular-entry range with default lateral serials.
    pub fn new(
        start: u32,
        end: u32,
        semester: u8,
        batch: u8,
        branch: impl Into<String>,
        college: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            semester,
            batch,
            branch: branch.into(),
            college: college.into(),
            lateral_entry: false,
            lateral_start: defaults::lateral_start(),
            lateral_end: defaults::lateral_end(),
        }
    }

    /// Single-number range with the class codes read from `reg_no`.
    ///
    /// A lateral entrant's number carries the following year's batch, so the
    /// class batch is one less.
    pub fn for_registration_no(reg_no: u64, semester: u8, entry: EntryType) -> Result<Self> {
        if !(10_000_000_000..=99_999_999_999).contains(&reg_no) {
            return Err(AppError::invalid_range(format!(
                "registration number {reg_no} must have eleven digits"
            )));
        }
        let number_batch = (reg_no / 1_000_000_000) as u8;
        let batch = match entry {
            EntryType::Regular => number_batch,
            EntryType::Lateral => number_batch.saturating_sub(1),
        };
        let serial = (reg_no % 1_000) as u32;

        let range = Self::new(
            serial,
            serial,
            semester,
            batch,
            format!("{:03}", reg_no / 1_000_000 % 1_000),
            format!("{:03}", reg_no / 1_000 % 1_000),
        )
        .with_lateral_entry(entry == EntryType::Lateral);
        range.validate()?;
        Ok(range)
    }

    /// Include lateral entrants in the expansion.
    pub fn with_lateral_entry(mut self, enabled: bool) -> Self {
        self.lateral_entry = enabled;
        self
    }

    /// Check every field before acquisition begins.
    pub fn validate(&self) -> Result<()> {
        if self.start == 0 {
            return Err(AppError::invalid_range("start serial must be >= 1"));
        }
        if self.start > self.end {
            return Err(AppError::invalid_range(format!(
                "start serial {} is greater than end serial {}",
                self.start, self.end
            )));
        }
        if self.end > MAX_SERIAL {
            return Err(AppError::invalid_range(format!(
                "end serial {} exceeds {MAX_SERIAL}",
                self.end
            )));
        }
        if !(1..=8).contains(&self.semester) {
            return Err(AppError::invalid_range(format!(
                "semester {} is not in 1..=8",
                self.semester
            )));
        }
        if !(10..=98).contains(&self.batch) {
            return Err(AppError::invalid_range(format!(
                "batch {} must be the last two digits of the admission year",
                self.batch
            )));
        }
        check_code("branch", &self.branch)?;
        check_code("college", &self.college)?;
        if self.lateral_entry
            && (self.lateral_start == 0
                || self.lateral_start > self.lateral_end
                || self.lateral_end > MAX_SERIAL)
        {
            return Err(AppError::invalid_range(format!(
                "lateral serials {}..={} are not a valid range",
                self.lateral_start, self.lateral_end
            )));
        }
        Ok(())
    }

    /// Whether the lateral sub-range takes part in this semester.
    pub fn includes_lateral(&self) -> bool {
        self.lateral_entry && self.semester >= LATERAL_FIRST_SEMESTER
    }

    /// Full registration number for a serial.
    ///
    /// Lateral entrants are numbered under the following year's batch.
    pub fn registration_number(&self, serial: u32, entry: EntryType) -> u64 {
        let batch = match entry {
            EntryType::Regular => u64::from(self.batch),
            EntryType::Lateral => u64::from(self.batch) + 1,
        };
        let branch: u64 = self.branch.parse().unwrap_or(0);
        let college: u64 = self.college.parse().unwrap_or(0);
        batch * 1_000_000_000 + branch * 1_000_000 + college * 1_000 + u64::from(serial)
    }

    /// Expand into tasks ordered by registration number.
    pub fn expand(&self) -> Vec<RegistrationTask> {
        let regular = (self.start..=self.end).map(|serial| RegistrationTask {
            reg_no: self.registration_number(serial, EntryType::Regular),
            serial,
            entry: EntryType::Regular,
        });

        let lateral_serials = if self.includes_lateral() {
            self.lateral_start..=self.lateral_end
        } else {
            // Empty range keeps a single iterator type.
            1..=0
        };
        let lateral = lateral_serials.map(|serial| RegistrationTask {
            reg_no: self.registration_number(serial, EntryType::Lateral),
            serial,
            entry: EntryType::Lateral,
        });

        let mut tasks: Vec<_> = regular.chain(lateral).collect();
        tasks.sort_by_key(|t| t.reg_no);
        tasks.dedup_by_key(|t| t.reg_no);
        tasks
    }

    /// Number of tasks `expand` produces.
    pub fn task_count(&self) -> usize {
        let regular = (self.end - self.start + 1) as usize;
        if self.includes_lateral() {
            regular + (self.lateral_end - self.lateral_start + 1) as usize
        } else {
            regular
        }
    }

    /// Year of the examination, as used in the publisher's page names.
    pub fn exam_year(&self) -> u32 {
        2000 + u32::from(self.batch) + u32::from(self.semester) / 2
    }

    /// "1st" .. "8th"
    pub fn sem_ordinal(&self) -> &'static str {
        SEM_ORDINALS[usize::from(self.semester.clamp(1, 8)) - 1]
    }

    /// "I" .. "VIII"
    pub fn sem_roman(&self) -> &'static str {
        SEM_ROMANS[usize::from(self.semester.clamp(1, 8)) - 1]
    }

    /// Storage key shared by every semester of the same class.
    pub fn class_key(&self) -> String {
        format!("{}-{}-{}", self.batch, self.branch, self.college)
    }
}

fn check_code(field: &str, code: &str) -> Result<()> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::invalid_range(format!(
            "{field} code must be three digits, got '{code}'"
        )))
    }
}

mod defaults {
    pub fn lateral_start() -> u32 {
        901
    }
    pub fn lateral_end() -> u32 {
        930
    }
}
