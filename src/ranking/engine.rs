// src/ranking/engine.rs

//! Class and subject rankings.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{AcquisitionResult, StudentRecord, SubjectScore};
use crate::ranking::{competition_rank, round_to};

/// One student's place in the class ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub registration_no: u64,
    pub name: Option<String>,
    pub sgpa: f64,

    /// 1 = highest SGPA; ties share a rank
    pub rank: usize,

    /// `(N - rank) / N * 100`, one decimal place
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRankEntry {
    pub registration_no: u64,
    pub score: f64,
    pub rank: usize,
}

/// What the scores of one subject ranking are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreScale {
    /// Numeric marks; every ranked student has them
    Marks,
    /// Grade points, used when any student's marks are missing
    GradePoint,
}

impl ScoreScale {
    /// Pick the scale for one subject: marks only when every row has them.
    fn for_rows(rows: &[(u64, &SubjectScore)]) -> Self {
        if rows.iter().all(|(_, s)| s.marks.is_some()) {
            ScoreScale::Marks
        } else {
            ScoreScale::GradePoint
        }
    }

    fn value(&self, subject: &SubjectScore) -> Option<f64> {
        match self {
            ScoreScale::Marks => subject.marks,
            ScoreScale::GradePoint => subject.grade_point,
        }
    }
}

/// Ranking among the students who have a score for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRanking {
    pub code: String,
    pub name: String,
    pub scale: ScoreScale,
    pub entries: Vec<SubjectRankEntry>,
}

impl SubjectRanking {
    /// Highest score in the subject.
    pub fn top_score(&self) -> Option<f64> {
        self.entries.first().map(|e| e.score)
    }

    pub fn entry(&self, registration_no: u64) -> Option<&SubjectRankEntry> {
        self.entries
            .iter()
            .find(|e| e.registration_no == registration_no)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectGap {
    pub code: String,
    pub name: String,
    pub score: f64,
    pub topper_score: f64,
    pub gap: f64,
    pub rank: usize,
}

/// Distance between one student and the toppers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopperGap {
    pub registration_no: u64,
    pub rank: usize,
    pub sgpa: f64,
    pub topper_sgpa: f64,

    /// Zero for the toppers themselves, positive for everyone else
    pub sgpa_gap: f64,

    /// Registration numbers sharing rank 1
    pub toppers: Vec<u64>,

    pub subjects: Vec<SubjectGap>,
}

/// Derived rankings over the successful records of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingTable {
    entries: Vec<RankEntry>,
    subjects: BTreeMap<String, SubjectRanking>,
}

impl RankingTable {
    pub fn compute(result: &AcquisitionResult) -> Self {
        Self::from_records(&result.records)
    }

    /// Rank `records`, ignoring everything that was not acquired successfully.
    ///
    /// Records without an SGPA are left out of the class ranking but still
    /// take part in the subject rankings.
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let successful: Vec<&StudentRecord> = records.iter().filter(|r| r.is_success()).collect();

        let mut scored: Vec<(u64, f64)> = successful
            .iter()
            .filter_map(|r| r.sgpa.map(|sgpa| (r.registration_no, sgpa)))
            .collect();
        let ranks = competition_rank(&mut scored);
        let total = scored.len() as f64;

        let names: BTreeMap<u64, &StudentRecord> =
            successful.iter().map(|r| (r.registration_no, *r)).collect();

        let entries = scored
            .iter()
            .zip(ranks)
            .map(|(&(registration_no, sgpa), rank)| RankEntry {
                registration_no,
                name: names.get(&registration_no).and_then(|r| r.name.clone()),
                sgpa,
                rank,
                percentile: round_to((total - rank as f64) / total * 100.0, 1),
            })
            .collect();

        Self {
            entries,
            subjects: rank_subjects(&successful),
        }
    }

    /// Class ranking, best first.
    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, registration_no: u64) -> Option<&RankEntry> {
        self.entries
            .iter()
            .find(|e| e.registration_no == registration_no)
    }

    pub fn rank_of(&self, registration_no: u64) -> Option<usize> {
        self.entry(registration_no).map(|e| e.rank)
    }

    /// Students sharing rank 1.
    pub fn toppers(&self) -> &[RankEntry] {
        let count = self.entries.iter().take_while(|e| e.rank == 1).count();
        &self.entries[..count]
    }

    pub fn top(&self, n: usize) -> &[RankEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn subject(&self, code: &str) -> Option<&SubjectRanking> {
        self.subjects.get(code)
    }

    /// Subject rankings ordered by subject code.
    pub fn subjects(&self) -> impl Iterator<Item = &SubjectRanking> {
        self.subjects.values()
    }

    /// `(subject code, rank)` for every subject the student is ranked in.
    pub fn subject_ranks(&self, registration_no: u64) -> Vec<(&str, usize)> {
        self.subjects
            .values()
            .filter_map(|s| {
                s.entry(registration_no)
                    .map(|e| (s.code.as_str(), e.rank))
            })
            .collect()
    }

    /// Gap between `registration_no` and the class and subject toppers.
    ///
    /// `None` when the student is not in the class ranking.
    pub fn topper_gap(&self, registration_no: u64) -> Option<TopperGap> {
        let target = self.entry(registration_no)?;
        let topper_sgpa = self.entries.first()?.sgpa;

        let subjects = self
            .subjects
            .values()
            .filter_map(|s| {
                let entry = s.entry(registration_no)?;
                let topper_score = s.top_score()?;
                Some(SubjectGap {
                    code: s.code.clone(),
                    name: s.name.clone(),
                    score: entry.score,
                    topper_score,
                    gap: round_to(topper_score - entry.score, 2),
                    rank: entry.rank,
                })
            })
            .collect();

        Some(TopperGap {
            registration_no,
            rank: target.rank,
            sgpa: target.sgpa,
            topper_sgpa,
            sgpa_gap: round_to(topper_sgpa - target.sgpa, 2),
            toppers: self.toppers().iter().map(|e| e.registration_no).collect(),
            subjects,
        })
    }
}

fn rank_subjects(records: &[&StudentRecord]) -> BTreeMap<String, SubjectRanking> {
    let mut rows: BTreeMap<&str, Vec<(u64, &SubjectScore)>> = BTreeMap::new();
    for record in records {
        for subject in &record.subjects {
            if subject.marks.is_none() && subject.grade_point.is_none() {
                continue;
            }
            rows.entry(subject.code.as_str())
                .or_default()
                .push((record.registration_no, subject));
        }
    }

    rows.into_iter()
        .filter_map(|(code, rows)| {
            let name = rows.first()?.1.name.clone();
            let scale = ScoreScale::for_rows(&rows);
            let mut scored: Vec<(u64, f64)> = rows
                .iter()
                .filter_map(|(reg, subject)| scale.value(subject).map(|v| (*reg, v)))
                .collect();
            if scored.is_empty() {
                return None;
            }

            let ranks = competition_rank(&mut scored);
            let entries = scored
                .into_iter()
                .zip(ranks)
                .map(|((registration_no, score), rank)| SubjectRankEntry {
                    registration_no,
                    score,
                    rank,
                })
                .collect();
            Some((
                code.to_string(),
                SubjectRanking {
                    code: code.to_string(),
                    name,
                    scale,
                    entries,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{EntryType, FetchStatus, RegistrationRange, SubjectScore};

    fn subject(code: &str, marks: f64) -> SubjectScore {
        SubjectScore {
            code: code.into(),
            name: format!("Subject {code}"),
            marks: Some(marks),
            max_marks: Some(100.0),
            grade: None,
            grade_point: None,
            passed: true,
        }
    }

    fn student(reg: u64, sgpa: Option<f64>, subjects: Vec<SubjectScore>) -> StudentRecord {
        StudentRecord {
            registration_no: reg,
            entry: EntryType::Regular,
            name: Some(format!("Student {reg}")),
            father_name: None,
            mother_name: None,
            sgpa,
            cgpa: None,
            semester_grades: vec![],
            subjects,
            passed: true,
            source_url: None,
            status: FetchStatus::Success,
            retries: 0,
            detail: None,
        }
    }

    fn five_students() -> Vec<StudentRecord> {
        [8.5, 7.2, 9.1, 8.5, 6.0]
            .iter()
            .enumerate()
            .map(|(i, &sgpa)| student(1900001 + i as u64, Some(sgpa), vec![]))
            .collect()
    }

    #[test]
    fn test_ties_share_rank_and_skip() {
        let table = RankingTable::from_records(&five_students());
        let ranks: Vec<_> = (1900001..=1900005)
            .map(|reg| table.rank_of(reg).unwrap())
            .collect();
        assert_eq!(ranks, vec![2, 4, 1, 2, 5]);

        // Tie broken by registration number.
        let order: Vec<_> = table.entries().iter().map(|e| e.registration_no).collect();
        assert_eq!(order, vec![1900003, 1900001, 1900004, 1900002, 1900005]);
    }

    #[test]
    fn test_percentiles() {
        let table = RankingTable::from_records(&five_students());
        assert_eq!(table.entry(1900003).unwrap().percentile, 80.0);
        assert_eq!(table.entry(1900001).unwrap().percentile, 60.0);
        assert_eq!(table.entry(1900004).unwrap().percentile, 60.0);
        assert_eq!(table.entry(1900005).unwrap().percentile, 0.0);
        assert!(table.entries().iter().all(|e| e.percentile >= 0.0));
    }

    #[test]
    fn test_recomputation_is_deterministic() {
        let mut records = five_students();
        let first = RankingTable::from_records(&records);
        records.reverse();
        assert_eq!(first, RankingTable::from_records(&records));
    }

    #[test]
    fn test_higher_sgpa_never_ranks_lower() {
        let table = RankingTable::from_records(&five_students());
        for a in table.entries() {
            for b in table.entries() {
                if a.sgpa > b.sgpa {
                    assert!(a.rank < b.rank);
                }
            }
        }
    }

    #[test]
    fn test_failed_and_unscored_records_excluded() {
        let mut records = five_students();
        records.push(StudentRecord::failed(1900006, FetchStatus::ParseError, "bad"));
        records.push(StudentRecord::failed(1900007, FetchStatus::NetworkError, "down"));
        records.push(student(1900008, None, vec![subject("105301", 90.0)]));

        let table = RankingTable::from_records(&records);
        assert_eq!(table.len(), 5);
        assert!(table.entry(1900006).is_none());
        assert!(table.entry(1900008).is_none());
        assert_eq!(table.subject("105301").unwrap().entries.len(), 1);
    }

    #[test]
    fn test_empty_input_yields_empty_table() {
        let table = RankingTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(table.toppers().is_empty());
        assert!(table.topper_gap(1).is_none());
    }

    #[test]
    fn test_subject_ranks_are_independent() {
        let records = vec![
            student(1, Some(9.0), vec![subject("A", 70.0), subject("B", 88.0)]),
            student(2, Some(8.0), vec![subject("A", 95.0)]),
            student(3, Some(7.0), vec![subject("A", 70.0), subject("B", 91.0)]),
        ];
        let table = RankingTable::from_records(&records);

        assert_eq!(table.subject_ranks(1), vec![("A", 2), ("B", 2)]);
        assert_eq!(table.subject_ranks(2), vec![("A", 1)]);
        assert_eq!(table.subject_ranks(3), vec![("A", 2), ("B", 1)]);
        assert_eq!(table.subject("B").unwrap().entries.len(), 2);
    }

    #[test]
    fn test_topper_gap() {
        let records = vec![
            student(1, Some(9.1), vec![subject("A", 80.0)]),
            student(2, Some(8.4), vec![subject("A", 92.0)]),
            student(3, Some(9.1), vec![subject("A", 75.5)]),
        ];
        let table = RankingTable::from_records(&records);

        let gap = table.topper_gap(2).unwrap();
        assert_eq!(gap.rank, 3);
        assert_eq!(gap.sgpa_gap, 0.7);
        assert_eq!(gap.toppers, vec![1, 3]);
        assert_eq!(gap.subjects[0].gap, 0.0);
        assert_eq!(gap.subjects[0].rank, 1);

        let topper = table.topper_gap(3).unwrap();
        assert_eq!(topper.sgpa_gap, 0.0);
        assert_eq!(topper.subjects[0].gap, 16.5);
    }

    fn graded(code: &str, marks: Option<f64>, grade: &str, grade_point: f64) -> SubjectScore {
        SubjectScore {
            code: code.into(),
            name: format!("Subject {code}"),
            marks,
            max_marks: Some(100.0),
            grade: Some(grade.into()),
            grade_point: Some(grade_point),
            passed: true,
        }
    }

    #[test]
    fn test_blank_marks_rank_subject_on_grade_points() {
        let records = vec![
            student(24105107001, Some(8.0), vec![graded("105301", None, "A+", 10.0)]),
            student(24105107002, Some(7.0), vec![graded("105301", Some(40.0), "E", 5.0)]),
        ];
        let table = RankingTable::from_records(&records);

        let ranking = table.subject("105301").unwrap();
        assert_eq!(ranking.scale, ScoreScale::GradePoint);
        assert_eq!(ranking.entry(24105107001).unwrap().rank, 1);
        assert_eq!(ranking.entry(24105107001).unwrap().score, 10.0);
        assert_eq!(ranking.entry(24105107002).unwrap().score, 5.0);

        let gap = table.topper_gap(24105107002).unwrap();
        assert_eq!(gap.subjects[0].gap, 5.0);
        assert_eq!(table.topper_gap(24105107001).unwrap().subjects[0].gap, 0.0);
    }

    #[test]
    fn test_full_marks_rank_subject_on_marks() {
        let records = vec![
            student(1, Some(8.0), vec![graded("A", Some(81.0), "A", 9.0)]),
            student(2, Some(7.0), vec![graded("A", Some(88.0), "A", 9.0)]),
        ];
        let table = RankingTable::from_records(&records);

        let ranking = table.subject("A").unwrap();
        assert_eq!(ranking.scale, ScoreScale::Marks);
        assert_eq!(ranking.top_score(), Some(88.0));
        assert_eq!(table.subject_ranks(1), vec![("A", 2)]);
    }

    #[test]
    fn test_compute_from_result() {
        let range = RegistrationRange::new(1, 5, 3, 24, "105", "107");
        let result = AcquisitionResult::new(range, five_students(), Utc::now(), 0);
        let table = RankingTable::compute(&result);
        assert_eq!(table.top(2).len(), 2);
        assert_eq!(table.toppers()[0].registration_no, 1900003);
    }
}
