// src/ranking/trend.rs

//! SGPA trends across semesters.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{AcquisitionResult, StudentRecord};

/// Direction of a student's SGPA over the semesters seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    Mixed,
}

impl Trend {
    /// Classify an ordered series of values.
    ///
    /// Improving is non-decreasing with at least one strict rise, Declining is
    /// the mirror image, Stable is constant. Fewer than two values count as
    /// Stable.
    pub fn classify(values: &[f64]) -> Self {
        let mut rose = false;
        let mut fell = false;
        for pair in values.windows(2) {
            if pair[1] > pair[0] {
                rose = true;
            } else if pair[1] < pair[0] {
                fell = true;
            }
        }
        match (rose, fell) {
            (true, false) => Trend::Improving,
            (false, true) => Trend::Declining,
            (false, false) => Trend::Stable,
            (true, true) => Trend::Mixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub semester: u8,
    pub sgpa: f64,
}

/// One student's SGPA by semester, in semester order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub registration_no: u64,
    pub name: Option<String>,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Build series from stored runs of different semesters.
    ///
    /// Only successful records with an SGPA contribute. When two runs cover
    /// the same semester the later one in `results` wins.
    pub fn from_results(results: &[AcquisitionResult]) -> Vec<TrendSeries> {
        let mut series: BTreeMap<u64, (Option<String>, BTreeMap<u8, f64>)> = BTreeMap::new();
        for result in results {
            let semester = result.range.semester;
            for record in result.successful() {
                let Some(sgpa) = record.sgpa else { continue };
                let slot = series.entry(record.registration_no).or_default();
                if record.name.is_some() {
                    slot.0 = record.name.clone();
                }
                slot.1.insert(semester, sgpa);
            }
        }

        series
            .into_iter()
            .map(|(registration_no, (name, points))| TrendSeries {
                registration_no,
                name,
                points: points
                    .into_iter()
                    .map(|(semester, sgpa)| TrendPoint { semester, sgpa })
                    .collect(),
            })
            .collect()
    }

    /// Build a series from the semester grade table printed on one result.
    ///
    /// Only cells labelled with a roman semester numeral are used; cumulative
    /// columns are skipped.
    pub fn from_record(record: &StudentRecord) -> TrendSeries {
        let points: BTreeMap<u8, f64> = record
            .semester_grades
            .iter()
            .filter_map(|g| roman_semester(&g.label).map(|sem| (sem, g.value)))
            .collect();

        TrendSeries {
            registration_no: record.registration_no,
            name: record.name.clone(),
            points: points
                .into_iter()
                .map(|(semester, sgpa)| TrendPoint { semester, sgpa })
                .collect(),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.sgpa).collect()
    }

    pub fn trend(&self) -> Trend {
        Trend::classify(&self.values())
    }

    /// Last SGPA minus first SGPA.
    pub fn change(&self) -> Option<f64> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => {
                Some(crate::ranking::round_to(last.sgpa - first.sgpa, 2))
            }
            _ => None,
        }
    }
}

fn roman_semester(label: &str) -> Option<u8> {
    let semester = match label.trim().to_ascii_uppercase().as_str() {
        "I" => 1,
        "II" => 2,
        "III" => 3,
        "IV" => 4,
        "V" => 5,
        "VI" => 6,
        "VII" => 7,
        "VIII" => 8,
        _ => return None,
    };
    Some(semester)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{EntryType, FetchStatus, RegistrationRange, SemesterGrade};

    fn record(reg: u64, sgpa: Option<f64>) -> StudentRecord {
        StudentRecord {
            registration_no: reg,
            entry: EntryType::Regular,
            name: Some(format!("Student {reg}")),
            father_name: None,
            mother_name: None,
            sgpa,
            cgpa: None,
            semester_grades: vec![],
            subjects: vec![],
            passed: true,
            source_url: None,
            status: FetchStatus::Success,
            retries: 0,
            detail: None,
        }
    }

    fn run(semester: u8, records: Vec<StudentRecord>) -> AcquisitionResult {
        let range = RegistrationRange::new(1, 3, semester, 24, "105", "107");
        AcquisitionResult::new(range, records, Utc::now(), 0)
    }

    #[test]
    fn test_classify() {
        assert_eq!(Trend::classify(&[7.0, 7.0, 7.4]), Trend::Improving);
        assert_eq!(Trend::classify(&[8.1, 7.5, 7.5]), Trend::Declining);
        assert_eq!(Trend::classify(&[7.0, 7.0, 7.0]), Trend::Stable);
        assert_eq!(Trend::classify(&[7.0, 8.0, 7.5]), Trend::Mixed);
        assert_eq!(Trend::classify(&[6.5]), Trend::Stable);
        assert_eq!(Trend::classify(&[]), Trend::Stable);
    }

    #[test]
    fn test_from_results_orders_by_semester() {
        let results = vec![
            run(3, vec![record(1, Some(8.0)), record(2, Some(6.9))]),
            run(1, vec![record(1, Some(7.2)), record(2, Some(7.4))]),
            run(2, vec![record(1, Some(7.6)), record(2, None)]),
        ];
        let series = TrendSeries::from_results(&results);
        assert_eq!(series.len(), 2);

        assert_eq!(series[0].values(), vec![7.2, 7.6, 8.0]);
        assert_eq!(series[0].trend(), Trend::Improving);
        assert_eq!(series[0].change(), Some(0.8));

        assert_eq!(series[1].points.len(), 2);
        assert_eq!(series[1].trend(), Trend::Declining);
    }

    #[test]
    fn test_failed_records_do_not_contribute() {
        let results = vec![run(
            1,
            vec![StudentRecord::failed(5, FetchStatus::NotFound, "none")],
        )];
        assert!(TrendSeries::from_results(&results).is_empty());
    }

    #[test]
    fn test_from_record_uses_roman_columns() {
        let mut student = record(1, Some(6.8));
        student.semester_grades = vec![
            SemesterGrade { label: "I".into(), value: 7.9 },
            SemesterGrade { label: "II".into(), value: 7.3 },
            SemesterGrade { label: "III".into(), value: 6.8 },
            SemesterGrade { label: "Cur. CGPA".into(), value: 7.33 },
        ];
        let series = TrendSeries::from_record(&student);
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[2].semester, 3);
        assert_eq!(series.trend(), Trend::Declining);
        assert_eq!(series.change(), Some(-1.1));
    }
}
