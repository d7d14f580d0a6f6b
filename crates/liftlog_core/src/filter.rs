//! Time bucketing and record filters applied before aggregation.

use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichedSetRecord;
use crate::mapping::MuscleGroup;
use crate::utils::normalize_exercise_key;
use crate::{LiftlogError, Result};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl TimeBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeBucket::Day => "day",
            TimeBucket::Week => "week",
            TimeBucket::Month => "month",
            TimeBucket::Year => "year",
        }
    }

    /// Sortable label for the bucket containing `date`: `2024-03-07`,
    /// `2024-W10`, `2024-03` or `2024`. Weeks use the ISO week-numbering year.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            TimeBucket::Day => date.format("%Y-%m-%d").to_string(),
            TimeBucket::Week => {
                let iso = date.iso_week();
                format!("{:04}-W{:02}", iso.year(), iso.week())
            }
            TimeBucket::Month => format!("{:04}-{:02}", date.year(), date.month()),
            TimeBucket::Year => format!("{:04}", date.year()),
        }
    }

    /// First calendar day of the bucket containing `date`.
    pub fn start(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeBucket::Day => date,
            TimeBucket::Week => {
                date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            TimeBucket::Month => date.with_day(1).unwrap_or(date),
            TimeBucket::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }
}

/// Inclusive date range; an open end is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(s), Some(e)) = (self.start, self.end)
            && s > e
        {
            return Err(LiftlogError::Config(format!(
                "date range start {s} is after end {e}"
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// Row filter. Empty lists and absent bounds match everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordFilter {
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub muscle_groups: Vec<MuscleGroup>,
    /// Case-insensitive substrings of the exercise name.
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default)]
    pub min_weight: Option<f64>,
    #[serde(default)]
    pub max_weight: Option<f64>,
    #[serde(default)]
    pub min_reps: Option<f64>,
    #[serde(default)]
    pub max_reps: Option<f64>,
}

fn check_bounds(name: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let (Some(lo), Some(hi)) = (min, max)
        && lo > hi
    {
        return Err(LiftlogError::Config(format!(
            "{name} range minimum {lo} exceeds maximum {hi}"
        )));
    }
    Ok(())
}

fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    match value {
        Some(v) => min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi),
        None => false,
    }
}

impl RecordFilter {
    pub fn validate(&self) -> Result<()> {
        self.date_range.validate()?;
        check_bounds("weight", self.min_weight, self.max_weight)?;
        check_bounds("reps", self.min_reps, self.max_reps)
    }

    pub fn matches(&self, rec: &EnrichedSetRecord) -> bool {
        if !self.date_range.contains(rec.date()) {
            return false;
        }
        if !self.muscle_groups.is_empty() && !self.muscle_groups.contains(&rec.muscle_group) {
            return false;
        }
        if !self.exercises.is_empty() {
            let key = normalize_exercise_key(rec.exercise());
            if !self
                .exercises
                .iter()
                .any(|e| key.contains(&normalize_exercise_key(e)))
            {
                return false;
            }
        }
        within(rec.record.weight_kg, self.min_weight, self.max_weight)
            && within(rec.record.set.reps, self.min_reps, self.max_reps)
    }

    /// Valid records passing the filter, in input order.
    pub fn apply<'a>(&self, records: &'a [EnrichedSetRecord]) -> Vec<&'a EnrichedSetRecord> {
        records
            .iter()
            .filter(|r| r.is_valid() && self.matches(r))
            .collect()
    }
}
