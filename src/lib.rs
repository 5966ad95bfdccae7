// src/lib.rs

//! Result Analyser Library
//!
//! Fetches published semester results for a range of registration numbers,
//! parses them into typed records and ranks the class.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod ranking;
pub mod services;
pub mod storage;
pub mod utils;
