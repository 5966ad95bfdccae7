// src/services/acquisition.rs

//! Acquisition orchestrator.
//!
//! Expands a registration range into tasks, drives each through the
//! [`Fetcher`] and [`RecordParser`] with bounded concurrency, and assembles an
//! [`AcquisitionResult`] ordered by registration number.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchFailure, ParseError, Result};
use crate::models::{
    AcquisitionResult, Config, EntryType, FetchStatus, RegistrationRange, RegistrationTask,
    RunCounters, StudentRecord,
};
use crate::services::{Fetched, Fetcher, RecordParser};
use crate::utils::{candidate_urls, validate_templates};

/// How long the final progress update may wait for room in the channel.
const FINAL_UPDATE_WAIT: Duration = Duration::from_secs(1);

/// Snapshot sent after every finished registration number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub registration_no: u64,
    pub last_status: FetchStatus,
}

/// Drives range acquisitions and single lookups.
pub struct Acquisition {
    fetcher: Arc<Fetcher>,
    parser: RecordParser,
    templates: Vec<String>,
    concurrency: usize,
    progress: Option<mpsc::Sender<ProgressUpdate>>,
}

impl Acquisition {
    /// Build an HTTP-backed acquisition from a validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.fetcher.validate()?;
        let fetcher = Arc::new(Fetcher::new(&config.fetcher)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Build an acquisition around an existing fetcher.
    pub fn with_fetcher(config: &Config, fetcher: Arc<Fetcher>) -> Result<Self> {
        config.fetcher.validate()?;
        config.source.validate()?;
        Ok(Self {
            fetcher,
            parser: RecordParser::new(&config.source.selectors)?,
            templates: config.source.url_templates.clone(),
            concurrency: config.fetcher.max_concurrent,
            progress: None,
        })
    }

    /// Send progress updates to `sender`.
    ///
    /// Intermediate updates are dropped when the channel is full. The final
    /// `completed == total` update waits up to one second for room, after
    /// which observers should read the counters from the returned result.
    pub fn with_progress(mut self, sender: mpsc::Sender<ProgressUpdate>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// Acquire every registration number of `range`.
    ///
    /// Per-number failures are recorded on the returned records. The call
    /// itself only fails when the range is invalid. When `cancel` fires,
    /// in-flight work is abandoned and the records finished so far are
    /// returned as a partial result.
    pub async fn run(
        &self,
        range: &RegistrationRange,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionResult> {
        range.validate()?;
        validate_templates(&self.templates, range)?;

        let tasks = range.expand();
        let total = tasks.len();
        let started_at = Utc::now();
        let clock = Instant::now();

        log::info!(
            "Acquiring {} registration numbers (semester {}, concurrency {})",
            total,
            range.semester,
            self.concurrency
        );

        let mut pending: BTreeSet<u64> = tasks.iter().map(|t| t.reg_no).collect();
        let mut records = Vec::with_capacity(total);
        let mut counters = RunCounters::default();
        let mut cancelled = false;

        let mut results = stream::iter(tasks)
            .map(|task| self.acquire_one(range, task))
            .buffer_unordered(self.concurrency);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = results.next() => {
                    let Some(record) = next else { break };
                    pending.remove(&record.registration_no);
                    counters.record(&record);
                    self.report(ProgressUpdate {
                        completed: counters.attempted,
                        total,
                        succeeded: counters.succeeded,
                        failed: counters.failed(),
                        registration_no: record.registration_no,
                        last_status: record.status,
                    })
                    .await;
                    records.push(record);
                }
            }
        }
        drop(results);

        let elapsed_ms = clock.elapsed().as_millis() as u64;
        let result = AcquisitionResult::new(range.clone(), records, started_at, elapsed_ms);

        log::info!(
            "Acquisition finished in {} ms: {} succeeded, {} not found, {} parse errors, {} network errors",
            elapsed_ms,
            result.counters.succeeded,
            result.counters.not_found,
            result.counters.parse_error,
            result.counters.network_error
        );

        if cancelled {
            log::warn!(
                "Acquisition cancelled with {} of {} numbers unfinished",
                pending.len(),
                total
            );
            return Ok(result.into_cancelled(pending.into_iter().collect()));
        }
        Ok(result)
    }

    /// Fetch and parse exactly one registration number.
    ///
    /// `range` supplies the semester and class codes for the URL templates;
    /// its start/end serials are not used.
    pub async fn lookup(&self, range: &RegistrationRange, reg_no: u64) -> Result<StudentRecord> {
        range.validate()?;
        validate_templates(&self.templates, range)?;

        let entry = if reg_no / 1_000_000_000 == u64::from(range.batch) + 1 {
            EntryType::Lateral
        } else {
            EntryType::Regular
        };
        let task = RegistrationTask {
            reg_no,
            serial: (reg_no % 1_000) as u32,
            entry,
        };
        Ok(self.acquire_one(range, task).await)
    }

    async fn acquire_one(&self, range: &RegistrationRange, task: RegistrationTask) -> StudentRecord {
        let urls = candidate_urls(&self.templates, range, task.reg_no);
        let parser = &self.parser;

        let outcome = self
            .fetcher
            .fetch_with(&urls, |body| match parser.parse(body, task.reg_no) {
                Err(ParseError::NotFoundShape) => None,
                other => Some(other),
            })
            .await;

        match outcome {
            Ok(Fetched {
                value: Ok(record),
                url,
                retries,
            }) => record.with_fetch_context(task.entry, Some(url), retries),
            Ok(Fetched {
                value: Err(error),
                url,
                retries,
            }) => {
                log::warn!("Parse error for {} ({}): {}", task.reg_no, url, error);
                StudentRecord::failed(task.reg_no, FetchStatus::ParseError, error.to_string())
                    .with_fetch_context(task.entry, Some(url), retries)
            }
            Err(failure @ FetchFailure::NotFound { .. }) => {
                log::debug!("No result for {}", task.reg_no);
                StudentRecord::failed(task.reg_no, FetchStatus::NotFound, failure.to_string())
                    .with_fetch_context(task.entry, None, failure.retries())
            }
            Err(failure @ FetchFailure::Network { .. }) => {
                log::warn!("Failed to fetch {}: {}", task.reg_no, failure);
                StudentRecord::failed(task.reg_no, FetchStatus::NetworkError, failure.to_string())
                    .with_fetch_context(task.entry, None, failure.retries())
            }
        }
    }

    async fn report(&self, update: ProgressUpdate) {
        let Some(sender) = &self.progress else {
            return;
        };
        if update.completed == update.total {
            let _ = sender.send_timeout(update, FINAL_UPDATE_WAIT).await;
        } else {
            let _ = sender.try_send(update);
        }
    }
}
