// src/pipeline/rank.rs

//! Rankings and trends recomputed from stored results.

use crate::error::{AppError, Result};
use crate::models::{AcquisitionResult, StudentRecord};
use crate::ranking::{ClassSummary, RankingTable, TopperGap, Trend, TrendSeries};
use crate::storage::{ResultKey, ResultStorage};
use crate::utils::log;

/// Recompute and print the ranking of a stored run.
///
/// With `gap_for`, also prints that student's topper-gap analysis.
pub async fn run_ranking(
    storage: &dyn ResultStorage,
    key: &ResultKey,
    top_n: usize,
    gap_for: Option<u64>,
) -> Result<RankingTable> {
    let result = storage
        .load_result(key)
        .await?
        .ok_or_else(|| AppError::storage(format!("no stored result for {key}, run fetch first")))?;

    log::header(&format!("Ranking for {key}"));
    if result.cancelled {
        log::sub_item(&format!(
            "Stored run was cancelled; {} numbers are missing",
            result.unfinished.len()
        ));
    }

    let table = RankingTable::compute(&result);
    let summary = ClassSummary::compute(&result, &table, top_n);
    report_class(&result, &summary);

    if let Some(reg_no) = gap_for {
        match table.topper_gap(reg_no) {
            Some(gap) => report_gap(&gap),
            None => ::log::warn!("{} is not in the class ranking", reg_no),
        }
    }

    Ok(table)
}

/// Classify SGPA trends over every stored semester of a class.
pub async fn run_trend(
    storage: &dyn ResultStorage,
    class: &str,
    registration_no: Option<u64>,
) -> Result<Vec<TrendSeries>> {
    let results = storage.load_class(class).await?;
    if results.is_empty() {
        return Err(AppError::storage(format!("no stored results for class {class}")));
    }

    let semesters: Vec<String> = results
        .iter()
        .map(|r| r.range.semester.to_string())
        .collect();
    log::header(&format!(
        "SGPA trends for {class} (semesters {})",
        semesters.join(", ")
    ));

    let mut series = TrendSeries::from_results(&results);
    if let Some(reg_no) = registration_no {
        series.retain(|s| s.registration_no == reg_no);
        if series.is_empty() {
            ::log::warn!("No stored SGPA for {}", reg_no);
        }
    }

    let count = |trend: Trend| series.iter().filter(|s| s.trend() == trend).count();
    log::summary(
        "Trend classification",
        &[
            ("Students", series.len().to_string()),
            ("Improving", count(Trend::Improving).to_string()),
            ("Declining", count(Trend::Declining).to_string()),
            ("Stable", count(Trend::Stable).to_string()),
            ("Mixed", count(Trend::Mixed).to_string()),
        ],
    );

    if registration_no.is_some() {
        for s in &series {
            let points: Vec<String> = s
                .points
                .iter()
                .map(|p| format!("sem {}: {:.2}", p.semester, p.sgpa))
                .collect();
            log::sub_item(&format!(
                "{} {}: {} [{}]",
                s.registration_no,
                s.name.as_deref().unwrap_or("-"),
                s.trend(),
                points.join(", ")
            ));
        }
    }

    Ok(series)
}

pub(crate) fn report_class(result: &AcquisitionResult, summary: &ClassSummary) {
    let fmt = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    log::summary(
        "Class statistics",
        &[
            ("Ranked students", summary.count.to_string()),
            ("Average SGPA", fmt(summary.average)),
            ("Highest SGPA", fmt(summary.highest)),
            ("Lowest SGPA", fmt(summary.lowest)),
            (
                "Pass rate",
                format!("{:.1}% ({} of {})", summary.pass_rate, summary.passed, summary.count),
            ),
        ],
    );

    if summary.count == 0 {
        return;
    }

    for band in &summary.bands {
        log::sub_item(&format!("{:<24} {}", band.band.label(), band.count));
    }
    if !summary.semester_averages.is_empty() {
        log::separator();
        for average in &summary.semester_averages {
            log::sub_item(&format!(
                "{:<10} avg {:.2} over {}",
                average.label, average.average, average.count
            ));
        }
    }

    log::separator();
    for entry in &summary.top {
        let cgpa = result
            .get(entry.registration_no)
            .and_then(|r| r.cgpa)
            .map_or_else(|| "-".to_string(), |c| format!("{c:.2}"));
        log::sub_item(&format!(
            "#{:<3} {} {:<28} SGPA {:.2}  CGPA {}  {:>5.1}%",
            entry.rank,
            entry.registration_no,
            entry.name.as_deref().unwrap_or("-"),
            entry.sgpa,
            cgpa,
            entry.percentile
        ));
    }
}

pub(crate) fn report_record(record: &StudentRecord) {
    log::header(&format!("Result for {}", record.registration_no));
    if !record.is_success() {
        log::sub_item(&format!(
            "{}: {}",
            record.status.as_str(),
            record.detail.as_deref().unwrap_or("-")
        ));
        return;
    }

    let fmt = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    log::summary(
        &record.display_name(),
        &[
            ("Father", record.father_name.clone().unwrap_or_default()),
            ("SGPA", fmt(record.sgpa)),
            ("CGPA", fmt(record.cgpa)),
            ("Result", if record.passed { "PASS" } else { "FAIL" }.to_string()),
            ("Source", record.source_url.clone().unwrap_or_default()),
        ],
    );
    for subject in &record.subjects {
        log::sub_item(&format!(
            "{:<8} {:<36} {:>6} {:<3}{}",
            subject.code,
            subject.name,
            subject
                .marks
                .map_or_else(|| "-".to_string(), |m| format!("{m:.0}")),
            subject.grade.as_deref().unwrap_or("-"),
            if subject.passed { "" } else { "  (back)" }
        ));
    }
}

fn report_gap(gap: &TopperGap) {
    let toppers: Vec<String> = gap.toppers.iter().map(u64::to_string).collect();
    log::summary(
        &format!("Topper gap for {}", gap.registration_no),
        &[
            ("Rank", gap.rank.to_string()),
            ("SGPA", format!("{:.2}", gap.sgpa)),
            ("Topper SGPA", format!("{:.2} ({})", gap.topper_sgpa, toppers.join(", "))),
            ("Gap", format!("{:.2}", gap.sgpa_gap)),
        ],
    );
    for subject in &gap.subjects {
        log::sub_item(&format!(
            "{:<8} {:<36} {:>6.1} / {:>6.1}  gap {:>5.1}  rank {}",
            subject.code, subject.name, subject.score, subject.topper_score, subject.gap, subject.rank
        ));
    }
}
