// src/pipeline/acquire.rs

//! Range acquisition and single lookups.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{AcquisitionResult, Config, FetchStatus, RegistrationRange, StudentRecord};
use crate::pipeline::rank::{report_class, report_record};
use crate::ranking::{ClassSummary, RankingTable, TrendSeries};
use crate::services::{Acquisition, ProgressUpdate};
use crate::storage::{ResultStorage, WriteOptions};
use crate::utils::log;

const PROGRESS_BUFFER: usize = 64;
const BAR_WIDTH: usize = 30;

/// Fetch a range, store it and print the class report.
///
/// Cancelling `cancel` stops the run early; the partial result is still
/// stored (unless it would replace a complete one) and reported.
pub async fn run_acquisition(
    config: &Config,
    range: &RegistrationRange,
    storage: &dyn ResultStorage,
    cancel: CancellationToken,
    options: &WriteOptions,
    top_n: usize,
) -> Result<AcquisitionResult> {
    log::header(&format!(
        "Fetching {} semester results for {}",
        range.sem_ordinal(),
        range.class_key()
    ));
    log::sub_item(&format!(
        "Serials {}..={}{}, {} numbers",
        range.start,
        range.end,
        if range.includes_lateral() {
            format!(" plus lateral {}..={}", range.lateral_start, range.lateral_end)
        } else {
            String::new()
        },
        range.task_count()
    ));

    let mut acquisition = Acquisition::new(config)?;

    let printer = if config.logging.show_progress {
        let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
        acquisition = acquisition.with_progress(tx);
        Some(tokio::spawn(print_progress(rx)))
    } else {
        None
    };

    let result = acquisition.run(range, &cancel).await;
    if cancel.is_cancelled() {
        acquisition.fetcher().shutdown();
    }
    // Closes the progress channel so the printer finishes.
    drop(acquisition);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let result = result?;

    report_counters(&result);

    let written = storage.save_result(&result, options).await?;
    if written.skipped {
        log::sub_item(&format!(
            "Kept the complete stored result for {}; rerun with --force to replace it",
            written.key
        ));
    } else {
        log::success(&format!(
            "Stored {} records as {}",
            written.records,
            written.key.path()
        ));
    }

    let table = RankingTable::compute(&result);
    let summary = ClassSummary::compute(&result, &table, top_n);
    report_class(&result, &summary);

    Ok(result)
}

/// Fetch one registration number and print it.
pub async fn run_lookup(
    config: &Config,
    range: &RegistrationRange,
    reg_no: u64,
) -> Result<StudentRecord> {
    let acquisition = Acquisition::new(config)?;
    let record = acquisition.lookup(range, reg_no).await?;

    report_record(&record);
    if record.is_success() {
        let series = TrendSeries::from_record(&record);
        if series.points.len() > 1 {
            let points: Vec<String> = series
                .points
                .iter()
                .map(|p| format!("{}: {:.2}", p.semester, p.sgpa))
                .collect();
            log::sub_item(&format!("Trend: {} ({})", series.trend(), points.join(", ")));
        }
    }
    Ok(record)
}

async fn print_progress(mut rx: mpsc::Receiver<ProgressUpdate>) {
    let mut printed = false;
    while let Some(update) = rx.recv().await {
        log::progress(&format!(
            "{} ok {} / failed {}",
            log::progress_bar(update.completed, update.total, BAR_WIDTH),
            update.succeeded,
            update.failed
        ));
        printed = true;
    }
    if printed {
        log::progress_done();
    }
}

fn report_counters(result: &AcquisitionResult) {
    let counters = &result.counters;
    let mut items = vec![
        ("Attempted", counters.attempted.to_string()),
        ("Succeeded", counters.succeeded.to_string()),
        ("Not found", counters.not_found.to_string()),
        ("Parse errors", counters.parse_error.to_string()),
        ("Network errors", counters.network_error.to_string()),
        ("Retries", counters.retries.to_string()),
        ("Elapsed", format!("{:.1}s", result.elapsed_ms as f64 / 1000.0)),
    ];
    if result.cancelled {
        items.push(("Unfinished", result.unfinished.len().to_string()));
    }
    log::summary(
        if result.cancelled {
            "Acquisition cancelled (partial result)"
        } else {
            "Acquisition complete"
        },
        &items,
    );

    let failures = result
        .records
        .iter()
        .filter(|r| matches!(r.status, FetchStatus::ParseError | FetchStatus::NetworkError));
    for record in failures {
        log::sub_item(&format!(
            "{} {}: {}",
            record.registration_no,
            record.status.as_str(),
            record.detail.as_deref().unwrap_or("-")
        ));
    }
}
