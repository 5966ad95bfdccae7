// src/models/mod.rs

//! Domain models for the result analyser.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod range;
mod record;
mod result;

// Re-export all public types
pub use config::{
    Config, FetcherConfig, LoggingConfig, ResultSelectors, SourceConfig, SubjectColumns,
};
pub use range::{EntryType, MAX_SERIAL, RegistrationRange, RegistrationTask};
pub use record::{FetchStatus, SemesterGrade, StudentRecord, SubjectScore};
pub use result::{AcquisitionResult, RunCounters, ViewOrder};
