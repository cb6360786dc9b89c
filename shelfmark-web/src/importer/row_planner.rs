//! Row planning: classify one raw CSV row into a row plan
//!
//! Pure and deterministic. Malformed fields degrade to warnings on the
//! plan, never to errors; the only error-severity outcome is a row with
//! no title at all, which nothing downstream could persist.

use crate::models::import_job::{codes, IssueSeverity};
use crate::models::{ImportOptions, Judgment};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw row of the reading-history export
///
/// Header names follow the source export; lowercase aliases tolerate
/// hand-edited files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Title", alias = "title", default)]
    pub title: String,
    #[serde(rename = "Author", alias = "author", default)]
    pub author: String,
    #[serde(rename = "ISBN", alias = "isbn", default)]
    pub isbn: String,
    #[serde(rename = "ISBN13", alias = "isbn13", default)]
    pub isbn13: String,
    #[serde(rename = "My Rating", alias = "my_rating", default)]
    pub my_rating: String,
    #[serde(rename = "Exclusive Shelf", alias = "exclusive_shelf", default)]
    pub exclusive_shelf: String,
    #[serde(rename = "Date Read", alias = "date_read", default)]
    pub date_read: String,
    #[serde(rename = "Date Added", alias = "date_added", default)]
    pub date_added: String,
}

/// Where a planned row is headed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBucket {
    /// Currently reading, or finished (finished rows carry a finish date)
    Reading,
    /// Planned, no dates expected
    ToRead,
    /// Nothing to persist for this row
    Skip,
}

/// One warning or error accumulated while planning a row
#[derive(Debug, Clone)]
pub struct PlanWarning {
    pub severity: IssueSeverity,
    pub code: &'static str,
    pub message: String,
    pub inference: Option<String>,
}

impl PlanWarning {
    fn warning(code: &'static str, message: String) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            code,
            message,
            inference: None,
        }
    }

    fn error(code: &'static str, message: String) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code,
            message,
            inference: None,
        }
    }
}

/// The classified, normalized interpretation of one row
#[derive(Debug, Clone)]
pub struct RowPlan {
    pub target: TargetBucket,
    pub started_at: Option<NaiveDate>,
    pub finished_at: Option<NaiveDate>,
    pub progress_percent: Option<u8>,
    pub judgment: Option<Judgment>,
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,
    pub warnings: Vec<PlanWarning>,
}

impl RowPlan {
    fn skip(warnings: Vec<PlanWarning>) -> Self {
        Self {
            target: TargetBucket::Skip,
            started_at: None,
            finished_at: None,
            progress_percent: None,
            judgment: None,
            isbn13: None,
            isbn10: None,
            warnings,
        }
    }
}

/// Classify one raw row under the user's options
pub fn plan(row: &RawRow, options: &ImportOptions) -> RowPlan {
    let mut warnings = Vec::new();

    let title = row.title.trim();
    if title.is_empty() {
        warnings.push(PlanWarning::error(
            codes::MISSING_TITLE,
            "Row has no title and cannot be imported".to_string(),
        ));
        return RowPlan::skip(warnings);
    }

    let shelf = row.exclusive_shelf.trim().to_ascii_lowercase();
    let (target, finish_expected) = match shelf.as_str() {
        "currently-reading" => (TargetBucket::Reading, false),
        "read" => (TargetBucket::Reading, true),
        "to-read" => (TargetBucket::ToRead, false),
        _ => {
            let message = if shelf.is_empty() {
                "Row has no shelf".to_string()
            } else {
                format!("Unrecognized shelf '{}'", shelf)
            };
            warnings.push(PlanWarning::warning(codes::UNKNOWN_SHELF, message));
            return RowPlan::skip(warnings);
        }
    };

    let (isbn13, isbn10) = normalize_identifiers(row, &mut warnings);
    let judgment = judgment_for_row(row, options, &mut warnings);

    let (started_at, finished_at) = match target {
        TargetBucket::ToRead => (None, None),
        _ => plan_dates(row, finish_expected, &mut warnings),
    };

    let progress_percent = if finish_expected { Some(100) } else { None };

    RowPlan {
        target,
        started_at,
        finished_at,
        progress_percent,
        judgment,
        isbn13,
        isbn10,
        warnings,
    }
}

fn plan_dates(
    row: &RawRow,
    finish_expected: bool,
    warnings: &mut Vec<PlanWarning>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let mut started_at = parse_date(&row.date_added, "Date Added", warnings);
    let finished_at = if finish_expected {
        parse_date(&row.date_read, "Date Read", warnings)
    } else {
        None
    };

    if started_at.is_none() {
        match finished_at {
            Some(finish) => {
                started_at = Some(finish);
                let mut warning = PlanWarning::warning(
                    codes::INFERRED_START_DATE,
                    "Start date missing; assumed equal to finish date".to_string(),
                );
                warning.inference = Some(format!(
                    "No 'Date Added' value, so the start date was taken from 'Date Read' ({})",
                    finish.format("%Y/%m/%d")
                ));
                warnings.push(warning);
            }
            None => {
                warnings.push(PlanWarning::warning(
                    codes::MISSING_START_DATE,
                    "Row has no usable start date".to_string(),
                ));
            }
        }
    }

    (started_at, finished_at)
}

/// Parse a `YYYY/MM/DD` date cell; any other non-empty form is a
/// warning, not a failure
fn parse_date(
    raw: &str,
    field: &str,
    warnings: &mut Vec<PlanWarning>,
) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y/%m/%d") {
        Ok(date) => Some(date),
        Err(_) => {
            warnings.push(PlanWarning::warning(
                codes::INVALID_DATE_FORMAT,
                format!("{} value '{}' is not in YYYY/MM/DD form", field, raw),
            ));
            None
        }
    }
}

fn judgment_for_row(
    row: &RawRow,
    options: &ImportOptions,
    warnings: &mut Vec<PlanWarning>,
) -> Option<Judgment> {
    let raw = row.my_rating.trim();
    let stars = if raw.is_empty() {
        0
    } else {
        match raw.parse::<u8>() {
            Ok(stars) if stars <= 5 => stars,
            _ => {
                warnings.push(PlanWarning::warning(
                    codes::INVALID_RATING,
                    format!("Rating '{}' is not a star value between 0 and 5", raw),
                ));
                0
            }
        }
    };
    options.judgment_for_rating(stars)
}

fn normalize_identifiers(
    row: &RawRow,
    warnings: &mut Vec<PlanWarning>,
) -> (Option<String>, Option<String>) {
    let mut isbn13 = None;
    let mut isbn10 = None;

    for raw in [row.isbn13.as_str(), row.isbn.as_str()] {
        let unquoted = strip_export_quoting(raw);
        if unquoted.is_empty() {
            continue;
        }
        match validate_isbn(&unquoted) {
            Some(normalized) if normalized.len() == 13 => {
                isbn13.get_or_insert(normalized);
            }
            Some(normalized) => {
                isbn10.get_or_insert(normalized);
            }
            None => {
                warnings.push(PlanWarning::warning(
                    codes::INVALID_ISBN,
                    format!("ISBN value '{}' is not a plausible ISBN", raw.trim()),
                ));
            }
        }
    }

    (isbn13, isbn10)
}

/// Normalize one raw ISBN cell
///
/// Strips the spreadsheet quoting artifact (`="..."`, or the bare
/// `=""""` sentinel for an empty cell) and hyphens, then rejects
/// anything that is not a plausible ISBN-10 or ISBN-13 digit string.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let unquoted = strip_export_quoting(raw);
    if unquoted.is_empty() {
        return None;
    }
    validate_isbn(&unquoted)
}

fn strip_export_quoting(raw: &str) -> String {
    let mut value = raw.trim();
    if let Some(rest) = value.strip_prefix('=') {
        value = rest.trim_matches('"');
    }
    value.trim().to_string()
}

fn validate_isbn(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .collect::<String>()
        .to_ascii_uppercase();

    match compact.len() {
        13 if compact.bytes().all(|b| b.is_ascii_digit()) => Some(compact),
        10 => {
            let (head, tail) = compact.split_at(9);
            let head_ok = head.bytes().all(|b| b.is_ascii_digit());
            let tail_ok = tail.bytes().all(|b| b.is_ascii_digit()) || tail == "X";
            (head_ok && tail_ok).then_some(compact)
        }
        _ => None,
    }
}
