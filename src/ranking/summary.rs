// src/ranking/summary.rs

//! Class-level statistics for a run.

use serde::Serialize;

use crate::models::AcquisitionResult;
use crate::ranking::{RankEntry, RankingTable, round_to};

/// Minimum SGPA counted as a pass in the class statistics.
pub const PASS_SGPA: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceBand {
    Excellent,
    VeryGood,
    Good,
    Average,
    NeedsImprovement,
}

impl PerformanceBand {
    pub const ALL: [PerformanceBand; 5] = [
        PerformanceBand::Excellent,
        PerformanceBand::VeryGood,
        PerformanceBand::Good,
        PerformanceBand::Average,
        PerformanceBand::NeedsImprovement,
    ];

    pub fn for_sgpa(sgpa: f64) -> Self {
        match sgpa {
            s if s >= 9.0 => PerformanceBand::Excellent,
            s if s >= 8.0 => PerformanceBand::VeryGood,
            s if s >= 7.0 => PerformanceBand::Good,
            s if s >= PASS_SGPA => PerformanceBand::Average,
            _ => PerformanceBand::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceBand::Excellent => "Excellent (9+)",
            PerformanceBand::VeryGood => "Very Good (8-9)",
            PerformanceBand::Good => "Good (7-8)",
            PerformanceBand::Average => "Average (6-7)",
            PerformanceBand::NeedsImprovement => "Needs Improvement (<6)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandCount {
    pub band: PerformanceBand,
    pub count: usize,
}

/// Class average of one column of the semester grade table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterAverage {
    pub label: String,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    /// Students with an SGPA
    pub count: usize,
    pub average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub passed: usize,

    /// Percentage of `count` at or above the pass SGPA
    pub pass_rate: f64,

    pub bands: Vec<BandCount>,
    pub semester_averages: Vec<SemesterAverage>,
    pub top: Vec<RankEntry>,
}

impl ClassSummary {
    pub fn compute(result: &AcquisitionResult, table: &RankingTable, top_n: usize) -> Self {
        let sgpas: Vec<f64> = result.successful().filter_map(|r| r.sgpa).collect();
        let count = sgpas.len();
        let passed = sgpas.iter().filter(|&&s| s >= PASS_SGPA).count();

        let bands = PerformanceBand::ALL
            .iter()
            .map(|&band| BandCount {
                band,
                count: sgpas
                    .iter()
                    .filter(|&&s| PerformanceBand::for_sgpa(s) == band)
                    .count(),
            })
            .collect();

        Self {
            count,
            average: (count > 0).then(|| round_to(sgpas.iter().sum::<f64>() / count as f64, 2)),
            highest: sgpas.iter().copied().reduce(f64::max),
            lowest: sgpas.iter().copied().reduce(f64::min),
            passed,
            pass_rate: if count == 0 {
                0.0
            } else {
                round_to(passed as f64 / count as f64 * 100.0, 1)
            },
            bands,
            semester_averages: semester_averages(result),
            top: table.top(top_n).to_vec(),
        }
    }
}

/// Averages per semester grade column, in the order the columns first appear.
fn semester_averages(result: &AcquisitionResult) -> Vec<SemesterAverage> {
    let mut columns: Vec<(String, f64, usize)> = Vec::new();
    for record in result.successful() {
        for grade in &record.semester_grades {
            match columns.iter_mut().find(|(label, _, _)| *label == grade.label) {
                Some((_, sum, n)) => {
                    *sum += grade.value;
                    *n += 1;
                }
                None => columns.push((grade.label.clone(), grade.value, 1)),
            }
        }
    }

    columns
        .into_iter()
        .map(|(label, sum, count)| SemesterAverage {
            label,
            average: round_to(sum / count as f64, 2),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{
        EntryType, FetchStatus, RegistrationRange, SemesterGrade, StudentRecord,
    };

    fn record(reg: u64, sgpa: f64, grades: &[(&str, f64)]) -> StudentRecord {
        StudentRecord {
            registration_no: reg,
            entry: EntryType::Regular,
            name: None,
            father_name: None,
            mother_name: None,
            sgpa: Some(sgpa),
            cgpa: None,
            semester_grades: grades
                .iter()
                .map(|(label, value)| SemesterGrade {
                    label: label.to_string(),
                    value: *value,
                })
                .collect(),
            subjects: vec![],
            passed: true,
            source_url: None,
            status: FetchStatus::Success,
            retries: 0,
            detail: None,
        }
    }

    fn sample() -> AcquisitionResult {
        let range = RegistrationRange::new(1, 5, 2, 24, "105", "107");
        AcquisitionResult::new(
            range,
            vec![
                record(1, 9.2, &[("I", 8.8), ("II", 9.2)]),
                record(2, 8.0, &[("I", 7.6), ("II", 8.0)]),
                record(3, 5.5, &[("I", 6.1), ("II", 5.5)]),
                record(4, 7.3, &[("I", 7.5)]),
                StudentRecord::failed(5, FetchStatus::NotFound, "none"),
            ],
            Utc::now(),
            0,
        )
    }

    #[test]
    fn test_summary_statistics() {
        let result = sample();
        let table = RankingTable::compute(&result);
        let summary = ClassSummary::compute(&result, &table, 2);

        assert_eq!(summary.count, 4);
        assert_eq!(summary.average, Some(7.5));
        assert_eq!(summary.highest, Some(9.2));
        assert_eq!(summary.lowest, Some(5.5));
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.pass_rate, 75.0);
        assert_eq!(summary.top.len(), 2);
        assert_eq!(summary.top[0].registration_no, 1);
    }

    #[test]
    fn test_bands() {
        let result = sample();
        let summary = ClassSummary::compute(&result, &RankingTable::compute(&result), 3);
        let counts: Vec<_> = summary.bands.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 0, 1]);
        assert_eq!(PerformanceBand::for_sgpa(6.0), PerformanceBand::Average);
    }

    #[test]
    fn test_semester_averages() {
        let result = sample();
        let summary = ClassSummary::compute(&result, &RankingTable::compute(&result), 3);
        assert_eq!(summary.semester_averages.len(), 2);
        assert_eq!(summary.semester_averages[0].label, "I");
        assert_eq!(summary.semester_averages[0].count, 4);
        assert_eq!(summary.semester_averages[0].average, 7.5);
        assert_eq!(summary.semester_averages[1].count, 3);
    }

    #[test]
    fn test_empty_summary() {
        let range = RegistrationRange::new(1, 1, 1, 24, "105", "107");
        let result = AcquisitionResult::new(range, vec![], Utc::now(), 0);
        let summary = ClassSummary::compute(&result, &RankingTable::compute(&result), 5);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, None);
        assert_eq!(summary.pass_rate, 0.0);
        assert!(summary.top.is_empty());
    }
}
