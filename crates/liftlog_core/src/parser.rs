//! Tabular export parsing.
//!
//! Turns the raw bytes of a workout-log export into [`RawSetRecord`]s. Only a
//! missing required column is fatal; everything else is recorded as a
//! [`RowDiagnostic`] and parsing continues with the next row.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use schemars::JsonSchema;
use serde::Serialize;

use crate::diagnostics::{RowDiagnostic, RowIssue};
use crate::utils::{parse_duration_secs, parse_export_date};
use crate::{LiftlogError, Result};

pub const COL_WORKOUT_ID: &str = "Workout #";
pub const COL_DATE: &str = "Date";
pub const COL_WORKOUT_NAME: &str = "Workout Name";
pub const COL_EXERCISE_NAME: &str = "Exercise Name";
pub const COL_SET_ORDER: &str = "Set Order";
pub const COL_WEIGHT: &str = "Weight (kg)";
pub const COL_REPS: &str = "Reps";

/// Required columns with the header spellings accepted for each.
const REQUIRED: &[(&str, &[&str])] = &[
    (COL_WORKOUT_ID, &["workout #", "workout id"]),
    (COL_DATE, &["date"]),
    (COL_WORKOUT_NAME, &["workout name"]),
    (COL_EXERCISE_NAME, &["exercise name"]),
    (COL_SET_ORDER, &["set order"]),
    (COL_WEIGHT, &["weight (kg)", "weight (lbs)", "weight"]),
    (COL_REPS, &["reps"]),
];

const OPT_DURATION: &[&str] = &["duration (sec)", "duration"];
const OPT_RPE: &[&str] = &["rpe"];
const OPT_DISTANCE: &[&str] = &["distance (meters)", "distance"];
const OPT_SECONDS: &[&str] = &["seconds"];
const OPT_NOTES: &[&str] = &["notes"];
const OPT_WORKOUT_NOTES: &[&str] = &["workout notes"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Auto,
    Semicolon,
    Comma,
    Tab,
}

impl Delimiter {
    fn byte(self) -> Option<u8> {
        match self {
            Delimiter::Auto => None,
            Delimiter::Semicolon => Some(b';'),
            Delimiter::Comma => Some(b','),
            Delimiter::Tab => Some(b'\t'),
        }
    }

    /// Pick the delimiter from the header line. Strong exports use `;`, so it
    /// wins ties.
    pub fn sniff(bytes: &[u8]) -> Delimiter {
        let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let count = |c: u8| header.iter().filter(|b| **b == c).count();
        let candidates = [
            (Delimiter::Semicolon, count(b';')),
            (Delimiter::Comma, count(b',')),
            (Delimiter::Tab, count(b'\t')),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.1 > best.1 {
                best = *candidate;
            }
        }
        best.0
    }
}

impl FromStr for Delimiter {
    type Err = LiftlogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Delimiter::Auto),
            ";" | "semicolon" => Ok(Delimiter::Semicolon),
            "," | "comma" => Ok(Delimiter::Comma),
            "\t" | "tab" => Ok(Delimiter::Tab),
            other => Err(LiftlogError::Config(format!("unknown delimiter: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Kilograms,
    Pounds,
}

/// Position of a set within an exercise. Strong marks special sets with a
/// letter instead of a number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SetOrder {
    Working(u32),
    Warmup,
    Drop,
    Failure,
    Other(String),
}

impl SetOrder {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(n) = s.parse::<u32>() {
            return SetOrder::Working(n);
        }
        if let Ok(f) = s.parse::<f64>()
            && f >= 0.0
            && f.fract() == 0.0
        {
            return SetOrder::Working(f as u32);
        }
        match s.to_ascii_uppercase().as_str() {
            "W" => SetOrder::Warmup,
            "D" => SetOrder::Drop,
            "F" => SetOrder::Failure,
            _ => SetOrder::Other(s.to_string()),
        }
    }

    pub fn is_warmup(&self) -> bool {
        matches!(self, SetOrder::Warmup)
    }
}

/// One row of the source export, as read. Never mutated after parsing.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RawSetRecord {
    /// 1-based data row index (header excluded).
    pub row: usize,
    pub workout_id: String,
    pub date: NaiveDate,
    pub performed_at: NaiveDateTime,
    pub workout_name: String,
    pub exercise_name: String,
    pub set_order: SetOrder,
    pub weight: Option<f64>,
    pub reps: Option<f64>,
    pub rpe: Option<f64>,
    pub distance_m: Option<f64>,
    pub duration_secs: Option<f64>,
    pub seconds: Option<f64>,
    pub notes: Option<String>,
    pub workout_notes: Option<String>,
    /// Coercion problems found while reading the row; a non-empty list makes
    /// the row invalid during normalization.
    pub issues: Vec<RowIssue>,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct ParsedExport {
    pub records: Vec<RawSetRecord>,
    pub diagnostics: Vec<RowDiagnostic>,
    pub rows_read: usize,
    /// Strong's "Rest Timer" pseudo rows, which carry no set data.
    pub rest_timer_rows: usize,
    pub delimiter: Delimiter,
    pub weight_unit: WeightUnit,
    pub columns: Vec<String>,
}

struct Columns {
    workout_id: usize,
    date: usize,
    workout_name: usize,
    exercise_name: usize,
    set_order: usize,
    weight: usize,
    reps: usize,
    duration: Option<usize>,
    rpe: Option<usize>,
    distance: Option<usize>,
    seconds: Option<usize>,
    notes: Option<usize>,
    workout_notes: Option<usize>,
    weight_unit: WeightUnit,
}

fn clean_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_lowercase()
}

fn find(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

impl Columns {
    fn resolve(headers: &[String]) -> Result<Self> {
        let mut found = Vec::with_capacity(REQUIRED.len());
        let mut missing = Vec::new();
        for (display, aliases) in REQUIRED {
            match find(headers, aliases) {
                Some(idx) => found.push(idx),
                None => missing.push((*display).to_string()),
            }
        }
        if !missing.is_empty() {
            tracing::error!(missing = %missing.join(", "), "export is missing required columns");
            return Err(LiftlogError::Schema { missing });
        }

        let weight_unit = if headers[found[5]].contains("lbs") {
            WeightUnit::Pounds
        } else {
            WeightUnit::Kilograms
        };

        Ok(Self {
            workout_id: found[0],
            date: found[1],
            workout_name: found[2],
            exercise_name: found[3],
            set_order: found[4],
            weight: found[5],
            reps: found[6],
            duration: find(headers, OPT_DURATION),
            rpe: find(headers, OPT_RPE),
            distance: find(headers, OPT_DISTANCE),
            seconds: find(headers, OPT_SECONDS),
            notes: find(headers, OPT_NOTES),
            workout_notes: find(headers, OPT_WORKOUT_NOTES),
            weight_unit,
        })
    }
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn opt_cell(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.map(|i| cell(record, i)).filter(|s| !s.is_empty())
}

fn parse_number(s: &str) -> Option<f64> {
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    // decimal comma, as written by exports from European locales
    if s.matches(',').count() == 1 && !s.contains('.') {
        return s.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite());
    }
    None
}

/// Coerce a required numeric cell. Blank means "not recorded" and is not an
/// issue; anything else that fails to parse is.
fn required_number(raw: &str, column: &str, issues: &mut Vec<RowIssue>) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    match parse_number(raw) {
        Some(v) => Some(v),
        None => {
            issues.push(RowIssue::NonNumeric {
                column: column.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

fn optional_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(parse_number)
}

/// Parse an export into raw set records.
///
/// Fails only when a required column is missing or the header itself cannot
/// be read.
pub fn parse_export(bytes: &[u8], delimiter: Delimiter) -> Result<ParsedExport> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = match delimiter {
        Delimiter::Auto => Delimiter::sniff(bytes),
        other => other,
    };
    let sep = delimiter.byte().unwrap_or(b';');

    let mut reader = ReaderBuilder::new()
        .delimiter(sep)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let raw_headers = reader.headers()?.clone();
    let headers: Vec<String> = raw_headers.iter().map(clean_header).collect();
    tracing::debug!(columns = %headers.join(", "), ?delimiter, "export header read");
    let cols = Columns::resolve(&headers)?;

    let weight_column = raw_headers_name(&raw_headers, cols.weight);

    let mut records = Vec::new();
    let mut diagnostics = Vec::new();
    let mut rows_read = 0usize;
    let mut rest_timer_rows = 0usize;

    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                diagnostics.push(RowDiagnostic::new(
                    row,
                    RowIssue::Malformed {
                        message: e.to_string(),
                    },
                ));
                continue;
            }
        };

        let set_order = SetOrder::parse(cell(&record, cols.set_order));
        if matches!(&set_order, SetOrder::Other(s) if s.eq_ignore_ascii_case("rest timer")) {
            rest_timer_rows += 1;
            continue;
        }

        let date_raw = cell(&record, cols.date);
        let Some(performed_at) = parse_export_date(date_raw) else {
            diagnostics.push(RowDiagnostic::new(
                row,
                RowIssue::InvalidDate {
                    value: date_raw.to_string(),
                },
            ));
            continue;
        };

        let mut issues = Vec::new();
        let weight = required_number(cell(&record, cols.weight), &weight_column, &mut issues);
        let reps = required_number(cell(&record, cols.reps), COL_REPS, &mut issues);

        records.push(RawSetRecord {
            row,
            workout_id: cell(&record, cols.workout_id).to_string(),
            date: performed_at.date(),
            performed_at,
            workout_name: cell(&record, cols.workout_name).to_string(),
            exercise_name: cell(&record, cols.exercise_name).to_string(),
            set_order,
            weight,
            reps,
            rpe: optional_number(opt_cell(&record, cols.rpe)),
            distance_m: optional_number(opt_cell(&record, cols.distance)),
            duration_secs: opt_cell(&record, cols.duration).and_then(parse_duration_secs),
            seconds: optional_number(opt_cell(&record, cols.seconds)),
            notes: opt_cell(&record, cols.notes).map(str::to_string),
            workout_notes: opt_cell(&record, cols.workout_notes).map(str::to_string),
            issues,
        });
    }

    tracing::info!(
        rows = rows_read,
        parsed = records.len(),
        skipped = diagnostics.len(),
        rest_timer_rows,
        "export parsed"
    );

    Ok(ParsedExport {
        records,
        diagnostics,
        rows_read,
        rest_timer_rows,
        delimiter,
        weight_unit: cols.weight_unit,
        columns: raw_headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect(),
    })
}

fn raw_headers_name(headers: &StringRecord, idx: usize) -> String {
    headers
        .get(idx)
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .unwrap_or_else(|| COL_WEIGHT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Workout #;Date;Workout Name;Duration (sec);Exercise Name;Set Order;Weight (kg);Reps;RPE;Distance (meters);Seconds;Notes;Workout Notes";

    fn export(rows: &[&str]) -> Vec<u8> {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.into_bytes()
    }

    #[test]
    fn parses_strong_rows() {
        let bytes = export(&[
            "1;2024-01-01 08:00:00;Push;3600;Bench Press (Barbell);1;80;8;8;;;;",
            "1;2024-01-01 08:00:00;Push;3600;Bench Press (Barbell);W;40;10;;;;warmup;",
        ]);
        let parsed = parse_export(&bytes, Delimiter::Auto).expect("parse");
        assert_eq!(parsed.delimiter, Delimiter::Semicolon);
        assert_eq!(parsed.records.len(), 2);
        let first = &parsed.records[0];
        assert_eq!(first.row, 1);
        assert_eq!(first.workout_id, "1");
        assert_eq!(first.weight, Some(80.0));
        assert_eq!(first.reps, Some(8.0));
        assert_eq!(first.rpe, Some(8.0));
        assert_eq!(first.duration_secs, Some(3600.0));
        assert_eq!(first.set_order, SetOrder::Working(1));
        assert_eq!(parsed.records[1].set_order, SetOrder::Warmup);
        assert_eq!(parsed.records[1].notes.as_deref(), Some("warmup"));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn missing_optional_columns_do_not_fail() {
        let bytes = b"Workout #,Date,Workout Name,Exercise Name,Set Order,Weight (kg),Reps\n\
                      1,2024-01-01,Legs,Squat,1,100,5\n";
        let parsed = parse_export(bytes, Delimiter::Auto).expect("parse");
        assert_eq!(parsed.delimiter, Delimiter::Comma);
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.records[0].rpe.is_none());
        assert!(parsed.records[0].notes.is_none());
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let bytes =
            b"Workout #;Date;Workout Name;Exercise Name;Set Order;Reps\n1;2024-01-01;A;Squat;1;5\n";
        match parse_export(bytes, Delimiter::Auto) {
            Err(LiftlogError::Schema { missing }) => assert_eq!(missing, vec!["Weight (kg)"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_skips_row_only() {
        let bytes = export(&[
            "1;not a date;Push;;Bench Press;1;80;8;;;;;",
            "2;2024-01-02 08:00:00;Push;;Bench Press;1;82.5;8;;;;;",
        ]);
        let parsed = parse_export(&bytes, Delimiter::Semicolon).expect("parse");
        assert_eq!(parsed.rows_read, 2);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].row, 1);
        assert!(matches!(
            parsed.diagnostics[0].issue,
            RowIssue::InvalidDate { .. }
        ));
    }

    #[test]
    fn non_numeric_weight_is_flagged_not_fatal() {
        let bytes = export(&["1;2024-01-01;Push;;Bench Press;1;heavy;8;;;;;"]);
        let parsed = parse_export(&bytes, Delimiter::Semicolon).expect("parse");
        let rec = &parsed.records[0];
        assert_eq!(rec.weight, None);
        assert_eq!(
            rec.issues,
            vec![RowIssue::NonNumeric {
                column: "Weight (kg)".into(),
                value: "heavy".into()
            }]
        );
    }

    #[test]
    fn blank_weight_is_not_an_issue() {
        let bytes = export(&["1;2024-01-01;Cardio;;Running;1;;;;5000;1500;;"]);
        let parsed = parse_export(&bytes, Delimiter::Semicolon).expect("parse");
        let rec = &parsed.records[0];
        assert!(rec.issues.is_empty());
        assert_eq!(rec.distance_m, Some(5000.0));
        assert_eq!(rec.seconds, Some(1500.0));
    }

    #[test]
    fn header_quotes_bom_and_case_are_tolerated() {
        let bytes = "\u{feff}\"workout #\";\"DATE\";\"Workout Name\";\"Exercise Name\";\"Set Order\";\"Weight (lbs)\";\"Reps\"\n7;2024-02-02;Pull;Deadlift;1;225;5\n";
        let parsed = parse_export(bytes.as_bytes(), Delimiter::Auto).expect("parse");
        assert_eq!(parsed.weight_unit, WeightUnit::Pounds);
        assert_eq!(parsed.records[0].workout_id, "7");
    }

    #[test]
    fn rest_timer_rows_are_counted_and_skipped() {
        let bytes = export(&[
            "1;2024-01-01;Push;;Bench Press;Rest Timer;;;;;90;;",
            "1;2024-01-01;Push;;Bench Press;1;80;8;;;;;",
        ]);
        let parsed = parse_export(&bytes, Delimiter::Semicolon).expect("parse");
        assert_eq!(parsed.rest_timer_rows, 1);
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn invalid_utf8_row_is_malformed_and_neighbours_parse() {
        let mut bytes = export(&["1;2024-01-01;Push;;Bench Press;1;80;8;;;;;"]);
        bytes.extend_from_slice(b"\n1;2024-01-01;Push;;Bench \xff\xfe Press;2;80;8;;;;;");
        bytes.extend_from_slice(b"\n1;2024-01-01;Push;;Bench Press;3;80;8;;;;;\n");
        let parsed = parse_export(&bytes, Delimiter::Semicolon).expect("parse");
        assert_eq!(parsed.rows_read, 3);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].set_order, SetOrder::Working(1));
        assert_eq!(parsed.records[1].set_order, SetOrder::Working(3));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].row, 2);
        assert!(matches!(
            parsed.diagnostics[0].issue,
            RowIssue::Malformed { .. }
        ));
    }

    #[test]
    fn decimal_comma_is_accepted() {
        assert_eq!(parse_number("82,5"), Some(82.5));
        assert_eq!(parse_number("1,000.5"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn set_order_variants() {
        assert_eq!(SetOrder::parse("3"), SetOrder::Working(3));
        assert_eq!(SetOrder::parse("2.0"), SetOrder::Working(2));
        assert_eq!(SetOrder::parse("d"), SetOrder::Drop);
        assert_eq!(SetOrder::parse("F"), SetOrder::Failure);
        assert_eq!(SetOrder::parse("x"), SetOrder::Other("x".into()));
    }

    #[test]
    fn delimiter_from_str() {
        assert_eq!("tab".parse::<Delimiter>().unwrap(), Delimiter::Tab);
        assert_eq!(";".parse::<Delimiter>().unwrap(), Delimiter::Semicolon);
        assert!("pipe".parse::<Delimiter>().is_err());
    }
}
