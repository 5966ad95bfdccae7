// src/services/parser.rs

//! Result page parser.
//!
//! Turns one fetched page into a [`StudentRecord`] or a typed [`ParseError`].
//! Performs no I/O.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, ParseError, Result};
use crate::models::{
    EntryType, FetchStatus, ResultSelectors, SemesterGrade, StudentRecord, SubjectColumns,
    SubjectScore,
};

/// Grade point averages are on a ten-point scale.
const MAX_GRADE_POINT: f64 = 10.0;

/// Cell contents that mean "no value" rather than a malformed number.
const PLACEHOLDERS: &[&str] = &["", "-", "--", "—", "NA", "N/A", "AB", "ABS", "NIL"];

/// Parses result pages with a fixed set of selectors.
pub struct RecordParser {
    registration_no: Selector,
    student_name: Selector,
    father_name: Selector,
    mother_name: Selector,
    sgpa: Selector,
    semester_table: Selector,
    subject_rows: Selector,
    remarks: Selector,
    row: Selector,
    header_cell: Selector,
    cell: Selector,
    columns: SubjectColumns,
    max_marks: f64,
    not_found_markers: Vec<String>,
    number: Regex,
}

impl RecordParser {
    /// Compile the configured selectors.
    pub fn new(selectors: &ResultSelectors) -> Result<Self> {
        Ok(Self {
            registration_no: parse_selector(&selectors.registration_no)?,
            student_name: parse_selector(&selectors.student_name)?,
            father_name: parse_selector(&selectors.father_name)?,
            mother_name: parse_selector(&selectors.mother_name)?,
            sgpa: parse_selector(&selectors.sgpa)?,
            semester_table: parse_selector(&selectors.semester_table)?,
            subject_rows: parse_selector(&selectors.subject_rows)?,
            remarks: parse_selector(&selectors.remarks)?,
            row: parse_selector("tr")?,
            header_cell: parse_selector("th")?,
            cell: parse_selector("td")?,
            columns: selectors.columns,
            max_marks: selectors.max_marks,
            not_found_markers: selectors
                .not_found_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            // Optional "/ 10" suffix and trailing percent sign; comma or dot decimals.
            number: Regex::new(r"^([+-]?\d+(?:[.,]\d+)?)\s*(?:/\s*\d+(?:[.,]\d+)?)?\s*%?$")
                .map_err(|e| AppError::config(format!("number pattern: {e}")))?,
        })
    }

    /// Parse one page fetched for `expected`.
    pub fn parse(&self, html: &str, expected: u64) -> std::result::Result<StudentRecord, ParseError> {
        let document = Html::parse_document(html);

        let Some(reg_text) = self.text(&document, &self.registration_no) else {
            return Err(ParseError::NotFoundShape);
        };
        if self.has_not_found_marker(html) {
            return Err(ParseError::NotFoundShape);
        }

        let digits: String = reg_text.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.parse::<u64>().ok() != Some(expected) {
            return Err(ParseError::Mismatch {
                expected,
                found: reg_text,
            });
        }

        let sgpa = match self.text(&document, &self.sgpa) {
            Some(raw) => self.grade_average("sgpa", &raw)?,
            None => None,
        };
        let (semester_grades, cgpa) = self.semester_table(&document)?;
        let subjects = self.subjects(&document)?;

        let remark = self.text(&document, &self.remarks).map(|r| r.to_uppercase());
        let explicit_fail = remark.as_deref().is_some_and(|r| r.contains("FAIL"));
        let explicit_pass = remark.as_deref().is_some_and(|r| r.contains("PASS"));

        if subjects.is_empty() && !explicit_fail {
            return Err(ParseError::MissingField("subjects"));
        }

        let passed = if explicit_fail {
            false
        } else if explicit_pass {
            true
        } else {
            subjects.iter().all(|s| s.passed)
        };

        Ok(StudentRecord {
            registration_no: expected,
            entry: EntryType::Regular,
            name: self.text(&document, &self.student_name),
            father_name: self.text(&document, &self.father_name),
            mother_name: self.text(&document, &self.mother_name),
            sgpa,
            cgpa,
            semester_grades,
            subjects,
            passed,
            source_url: None,
            status: FetchStatus::Success,
            retries: 0,
            detail: None,
        })
    }

    fn has_not_found_marker(&self, html: &str) -> bool {
        if self.not_found_markers.is_empty() {
            return false;
        }
        let lower = html.to_lowercase();
        self.not_found_markers.iter().any(|m| lower.contains(m))
    }

    /// Trimmed text of the first match; empty and "N/A" count as absent.
    fn text(&self, document: &Html, selector: &Selector) -> Option<String> {
        let element = document.select(selector).next()?;
        let text = normalize(&element.text().collect::<String>());
        if text.is_empty() || text.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(text)
        }
    }

    /// Semester labels with their grades, plus the cumulative column.
    fn semester_table(
        &self,
        document: &Html,
    ) -> std::result::Result<(Vec<SemesterGrade>, Option<f64>), ParseError> {
        let Some(table) = document.select(&self.semester_table).next() else {
            return Ok((Vec::new(), None));
        };
        let mut rows = table.select(&self.row);
        let (Some(header), Some(values)) = (rows.next(), rows.next()) else {
            return Ok((Vec::new(), None));
        };

        let labels = cell_texts(header, &self.header_cell);
        let cells = cell_texts(values, &self.cell);

        let mut grades = Vec::new();
        let mut cgpa = None;
        for (label, raw) in labels.into_iter().zip(cells) {
            if label.is_empty() {
                continue;
            }
            let Some(value) = self.grade_average(&label, &raw)? else {
                continue;
            };
            if label.to_uppercase().contains("CGPA") {
                cgpa = Some(value);
            } else {
                grades.push(SemesterGrade { label, value });
            }
        }
        Ok((grades, cgpa))
    }

    fn subjects(&self, document: &Html) -> std::result::Result<Vec<SubjectScore>, ParseError> {
        let columns = self.columns;
        let width = columns
            .code
            .max(columns.name)
            .max(columns.marks)
            .max(columns.grade);

        let mut subjects = Vec::new();
        for row in document.select(&self.subject_rows) {
            let cells = cell_texts(row, &self.cell);
            // Header rows carry `th` cells only.
            if cells.len() <= width || cells[columns.code].is_empty() {
                continue;
            }

            let code = cells[columns.code].clone();
            let marks = self.number(&format!("{code} marks"), &cells[columns.marks])?;
            if let Some(value) = marks {
                if !(0.0..=self.max_marks).contains(&value) {
                    return Err(ParseError::OutOfRange {
                        field: format!("{code} marks"),
                        value,
                    });
                }
            }

            let grade = Some(cells[columns.grade].to_uppercase()).filter(|g| !g.is_empty());
            let grade_point = grade.as_deref().and_then(grade_point);
            let passed = grade.as_deref().is_none_or(|g| !is_failing_grade(g));

            subjects.push(SubjectScore {
                code,
                name: cells[columns.name].clone(),
                marks,
                max_marks: marks.map(|_| self.max_marks),
                grade,
                grade_point,
                passed,
            });
        }
        Ok(subjects)
    }

    /// A ten-point average; placeholders read as absent.
    fn grade_average(&self, field: &str, raw: &str) -> std::result::Result<Option<f64>, ParseError> {
        let value = self.number(field, raw)?;
        match value {
            Some(v) if !(0.0..=MAX_GRADE_POINT).contains(&v) => Err(ParseError::OutOfRange {
                field: field.to_string(),
                value: v,
            }),
            other => Ok(other),
        }
    }

    /// Locale-tolerant number: "8.5", "8,5", "8.50 / 10", "78%".
    fn number(&self, field: &str, raw: &str) -> std::result::Result<Option<f64>, ParseError> {
        let text = normalize(raw);
        if PLACEHOLDERS.iter().any(|p| text.eq_ignore_ascii_case(p)) {
            return Ok(None);
        }
        let malformed = || ParseError::Malformed {
            field: field.to_string(),
            raw: text.clone(),
        };
        let captures = self.number.captures(&text).ok_or_else(malformed)?;
        captures[1]
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| malformed())
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn cell_texts(row: ElementRef<'_>, cell: &Selector) -> Vec<String> {
    row.select(cell)
        .map(|c| normalize(&c.text().collect::<String>()))
        .collect()
}

/// Collapse whitespace, including non-breaking spaces.
fn normalize(s: &str) -> String {
    s.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Grade point on the ten-point scale.
fn grade_point(grade: &str) -> Option<f64> {
    let point = match grade {
        "O" | "A+" => 10.0,
        "A" => 9.0,
        "B" => 8.0,
        "C" => 7.0,
        "D" => 6.0,
        "E" | "P" => 5.0,
        "F" | "AB" | "X" | "I" => 0.0,
        other => return other.parse().ok().filter(|p| (0.0..=MAX_GRADE_POINT).contains(p)),
    };
    Some(point)
}

fn is_failing_grade(grade: &str) -> bool {
    matches!(grade, "F" | "AB" | "X" | "I" | "FAIL")
}
