//! Normalization of raw rows into the canonical per-set schema.
//!
//! Adds unit-consistent weight, volume, estimated one-rep max and ISO
//! calendar keys, and decides row validity. Invalid rows stay in the output
//! (flagged) so every exclusion can be traced to a reason.

use std::str::FromStr;

use chrono::Datelike;
use schemars::JsonSchema;
use serde::Serialize;

use crate::LiftlogError;
use crate::diagnostics::{RowDiagnostic, RowIssue};
use crate::parser::{ParsedExport, RawSetRecord, WeightUnit};

pub const KG_PER_LB: f64 = 0.453_592_37;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OneRmFormula {
    /// `w * (1 + r / 30)`
    #[default]
    Epley,
    /// `w * 36 / (37 - r)`
    Brzycki,
}

impl OneRmFormula {
    /// Estimated one-rep max, or `None` when either input is zero or absent.
    /// A single rep is its own max.
    pub fn estimate(self, weight: f64, reps: f64) -> Option<f64> {
        if weight <= 0.0 || reps <= 0.0 {
            return None;
        }
        if reps == 1.0 {
            return Some(weight);
        }
        let est = match self {
            OneRmFormula::Epley => weight * (1.0 + reps / 30.0),
            OneRmFormula::Brzycki if reps > 36.0 => weight * 1.1,
            OneRmFormula::Brzycki => weight * (36.0 / (37.0 - reps)),
        };
        Some(est)
    }
}

impl FromStr for OneRmFormula {
    type Err = LiftlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epley" => Ok(OneRmFormula::Epley),
            "brzycki" => Ok(OneRmFormula::Brzycki),
            other => Err(LiftlogError::Config(format!(
                "unknown one-rep-max formula: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// 0 for Monday through 6 for Sunday.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(w: chrono::Weekday) -> Self {
        Weekday::ALL[w.num_days_from_monday() as usize]
    }
}

/// Calendar keys. Weeks follow ISO-8601: Monday starts the week and week 1
/// holds the year's first Thursday, so `iso_year` can differ from `year`
/// around New Year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CalendarKeys {
    pub year: i32,
    pub month: u32,
    pub iso_year: i32,
    pub week: u32,
    pub weekday: Weekday,
}

impl CalendarKeys {
    pub fn from_date(date: chrono::NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: date.year(),
            month: date.month(),
            iso_year: iso.year(),
            week: iso.week(),
            weekday: date.weekday().into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct NormalizedSetRecord {
    pub set: RawSetRecord,
    pub weight_kg: Option<f64>,
    pub volume: f64,
    pub estimated_1rm: Option<f64>,
    pub calendar: CalendarKeys,
    pub is_valid: bool,
    pub invalid_reason: Option<RowIssue>,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct NormalizedBatch {
    /// Every parsed row in input order, valid or not.
    pub records: Vec<NormalizedSetRecord>,
    pub dropped: usize,
    /// Validation failures found here; parse-time skips are reported by the
    /// parser.
    pub diagnostics: Vec<RowDiagnostic>,
}

impl NormalizedBatch {
    pub fn valid(&self) -> impl Iterator<Item = &NormalizedSetRecord> {
        self.records.iter().filter(|r| r.is_valid)
    }
}

fn validate(raw: &RawSetRecord, weight_column: &str) -> Option<RowIssue> {
    if let Some(issue) = raw.issues.first() {
        return Some(issue.clone());
    }
    if let Some(w) = raw.weight
        && w < 0.0
    {
        return Some(RowIssue::NegativeValue {
            column: weight_column.to_string(),
            value: w,
        });
    }
    if let Some(r) = raw.reps
        && r < 0.0
    {
        return Some(RowIssue::NegativeValue {
            column: crate::parser::COL_REPS.to_string(),
            value: r,
        });
    }
    None
}

pub fn normalize_record(
    raw: RawSetRecord,
    unit: WeightUnit,
    formula: OneRmFormula,
) -> NormalizedSetRecord {
    let weight_column = match unit {
        WeightUnit::Kilograms => "Weight (kg)",
        WeightUnit::Pounds => "Weight (lbs)",
    };
    let invalid_reason = validate(&raw, weight_column);
    let is_valid = invalid_reason.is_none();

    let weight_kg = raw.weight.map(|w| match unit {
        WeightUnit::Kilograms => w,
        WeightUnit::Pounds => w * KG_PER_LB,
    });

    let (volume, estimated_1rm) = match (is_valid, weight_kg, raw.reps) {
        (true, Some(w), Some(r)) => (w * r, formula.estimate(w, r)),
        _ => (0.0, None),
    };

    NormalizedSetRecord {
        calendar: CalendarKeys::from_date(raw.date),
        set: raw,
        weight_kg,
        volume,
        estimated_1rm,
        is_valid,
        invalid_reason,
    }
}

/// Normalize every parsed row, preserving input order.
pub fn normalize(parsed: ParsedExport, formula: OneRmFormula) -> NormalizedBatch {
    let unit = parsed.weight_unit;
    let mut diagnostics = Vec::new();
    let records: Vec<NormalizedSetRecord> = parsed
        .records
        .into_iter()
        .map(|raw| {
            let rec = normalize_record(raw, unit, formula);
            if let Some(reason) = &rec.invalid_reason {
                diagnostics.push(RowDiagnostic::new(rec.set.row, reason.clone()));
            }
            rec
        })
        .collect();

    let dropped = diagnostics.len();
    if dropped > 0 {
        tracing::warn!(dropped, "rows failed validation and are excluded from aggregation");
    }
    tracing::info!(rows = records.len(), dropped, ?formula, "export normalized");

    NormalizedBatch {
        records,
        dropped,
        diagnostics,
    }
}
