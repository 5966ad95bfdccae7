//! Acquisition result and run counters.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FetchStatus, RegistrationRange, StudentRecord};

/// Per-category counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub attempted: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub parse_error: usize,
    pub network_error: usize,
    /// Retries across all numbers
    pub retries: u64,
}

impl RunCounters {
    /// Count a finished record.
    pub fn record(&mut self, record: &StudentRecord) {
        self.attempted += 1;
        self.retries += u64::from(record.retries);
        match record.status {
            FetchStatus::Success => self.succeeded += 1,
            FetchStatus::NotFound => self.not_found += 1,
            FetchStatus::ParseError => self.parse_error += 1,
            FetchStatus::NetworkError => self.network_error += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.not_found + self.parse_error + self.network_error
    }
}

/// Record ordering for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewOrder {
    #[default]
    RegistrationNo,
    CgpaDesc,
    SgpaDesc,
}

/// Every record of a run, ordered by registration number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionResult {
    pub range: RegistrationRange,
    pub records: Vec<StudentRecord>,
    pub counters: RunCounters,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,

    /// The run was stopped before every number finished
    #[serde(default)]
    pub cancelled: bool,

    /// Numbers that never finished because of cancellation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unfinished: Vec<u64>,
}

impl AcquisitionResult {
    /// Assemble a result, establishing registration-number order.
    pub fn new(
        range: RegistrationRange,
        mut records: Vec<StudentRecord>,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        records.sort_by_key(|r| r.registration_no);
        let mut counters = RunCounters::default();
        for record in &records {
            counters.record(record);
        }
        Self {
            range,
            records,
            counters,
            started_at,
            elapsed_ms,
            cancelled: false,
            unfinished: Vec::new(),
        }
    }

    /// Mark the result as partial.
    pub fn into_cancelled(mut self, mut unfinished: Vec<u64>) -> Self {
        unfinished.sort_unstable();
        self.cancelled = true;
        self.unfinished = unfinished;
        self
    }

    pub fn successful(&self) -> impl Iterator<Item = &StudentRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn with_status(&self, status: FetchStatus) -> impl Iterator<Item = &StudentRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    pub fn get(&self, registration_no: u64) -> Option<&StudentRecord> {
        self.records
            .binary_search_by_key(&registration_no, |r| r.registration_no)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Successful records in the requested order; missing values sort last.
    pub fn view(&self, order: ViewOrder) -> Vec<&StudentRecord> {
        let mut records: Vec<_> = self.successful().collect();
        match order {
            ViewOrder::RegistrationNo => {}
            ViewOrder::CgpaDesc => records.sort_by(|a, b| desc_missing_last(a.cgpa, b.cgpa)),
            ViewOrder::SgpaDesc => records.sort_by(|a, b| desc_missing_last(a.sgpa, b.sgpa)),
        }
        records
    }

    /// Case-insensitive match on name or registration number.
    pub fn search(&self, term: &str) -> Vec<&StudentRecord> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.successful().collect();
        }
        self.successful()
            .filter(|r| {
                r.registration_no.to_string().contains(&needle)
                    || r
                        .name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

fn desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
