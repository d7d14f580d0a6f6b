//! Aggregated views over enriched records.
//!
//! Every view is a pure function of the filtered valid records and the
//! [`AnalysisRequest`]. Grouping uses ordered maps so output order never
//! depends on hashing.
//!
//! - [`consistency`]: training days, streaks, weekday and month histograms
//! - [`balance`]: volume per muscle group and movement category, ratios,
//!   training frequency
//! - [`progress`]: per-exercise series, PR events, plateaus, strength trends
//! - [`records`]: bests per exercise, muscle group and overall
//! - [`intensity`]: RPE, percentage of 1RM and rep-range volume
//! - [`variety`]: distinct exercises per bucket and newly introduced ones
//! - [`workouts`]: per-session summaries and type classification
//! - [`overview`]: headline totals

use std::collections::BTreeSet;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_MAX_GAP_DAYS, DEFAULT_PLATEAU_WINDOW, PipelineConfig};
use crate::enrich::EnrichedSetRecord;
use crate::filter::{RecordFilter, TimeBucket};
use crate::{LiftlogError, Result};

pub mod balance;
pub mod consistency;
pub mod intensity;
pub mod overview;
pub mod progress;
pub mod records;
pub mod variety;
pub mod workouts;

pub use balance::{BalanceView, GroupFrequency, Ratio, Recommendation, Severity};
pub use consistency::{ConsistencyView, Streak};
pub use intensity::{IntensityView, RepRange};
pub use overview::Overview;
pub use progress::{
    ExerciseProgress, GroupStrength, Plateau, PrEvent, ProgressView, StrengthPeriod,
};
pub use records::{PersonalRecord, RecordBook};
pub use variety::VarietyView;
pub use workouts::{WorkoutSummary, WorkoutType};

fn default_max_gap_days() -> u32 {
    DEFAULT_MAX_GAP_DAYS
}

fn default_plateau_window() -> usize {
    DEFAULT_PLATEAU_WINDOW
}

/// Parameters shared by every view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub bucket: TimeBucket,
    #[serde(default)]
    pub filter: RecordFilter,
    /// Largest gap in days between two sessions that still continues a
    /// streak. 1 means consecutive days only.
    #[serde(default = "default_max_gap_days")]
    pub max_gap_days: u32,
    /// Minimum number of sessions without a new best weight that counts as a
    /// plateau.
    #[serde(default = "default_plateau_window")]
    pub plateau_window: usize,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            bucket: TimeBucket::default(),
            filter: RecordFilter::default(),
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
            plateau_window: DEFAULT_PLATEAU_WINDOW,
        }
    }
}

impl AnalysisRequest {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_gap_days: config.max_gap_days,
            plateau_window: config.plateau_window,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_gap_days == 0 {
            return Err(LiftlogError::Config("max_gap_days must be at least 1".into()));
        }
        if self.plateau_window < 2 {
            return Err(LiftlogError::Config(
                "plateau_window must be at least 2".into(),
            ));
        }
        self.filter.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct AnalyticsReport {
    pub overview: Overview,
    pub consistency: ConsistencyView,
    pub balance: BalanceView,
    pub progress: ProgressView,
    pub records: RecordBook,
    pub intensity: IntensityView,
    pub variety: VarietyView,
    pub workouts: Vec<WorkoutSummary>,
}

/// Run every view over the valid records that pass the request filter.
///
/// Fails with [`LiftlogError::EmptyResult`] when nothing is left to
/// aggregate.
pub fn aggregate(
    records: &[EnrichedSetRecord],
    request: &AnalysisRequest,
) -> Result<AnalyticsReport> {
    request.validate()?;
    let selected = request.filter.apply(records);
    if selected.is_empty() {
        tracing::info!(total = records.len(), "no records left after filtering");
        return Err(LiftlogError::EmptyResult);
    }

    let workouts = workouts::summarize(&selected);
    let progress = progress::build(&selected, request.bucket, request.plateau_window);
    let records_book = records::build(&selected);
    let intensity = intensity::build(&selected);
    let consistency = consistency::build(&selected, request.bucket, request.max_gap_days);
    let balance = balance::build(&selected, request.bucket);
    let variety = variety::build(&selected, request.bucket);
    let overview = overview::build(&selected, &workouts, &progress, &consistency);

    tracing::info!(
        records = selected.len(),
        workouts = workouts.len(),
        exercises = progress.exercises.len(),
        pr_events = progress.pr_events.len(),
        bucket = ?request.bucket,
        "analysis complete"
    );

    Ok(AnalyticsReport {
        overview,
        consistency,
        balance,
        progress,
        records: records_book,
        intensity,
        variety,
        workouts,
    })
}

/// A training session: one workout identifier on one date.
pub(crate) type SessionKey<'a> = (NaiveDate, &'a str);

pub(crate) fn session_key<'a>(rec: &'a EnrichedSetRecord) -> SessionKey<'a> {
    (rec.date(), rec.record.set.workout_id.as_str())
}

pub(crate) fn sessions<'a>(records: &[&'a EnrichedSetRecord]) -> BTreeSet<SessionKey<'a>> {
    records.iter().map(|&r| session_key(r)).collect()
}

/// `part / total * 100`, or 0 when the total is 0.
pub(crate) fn share_pct(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total * 100.0 } else { 0.0 }
}

/// Percent change from `first` to `last`; undefined when `first` is not
/// positive.
pub(crate) fn pct_change(first: f64, last: f64) -> Option<f64> {
    (first > 0.0).then(|| (last - first) / first * 100.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::enrich::EnrichedSetRecord;
    use crate::mapping::MuscleGroupMapping;
    use crate::normalize::{OneRmFormula, normalize_record};
    use crate::parser::{RawSetRecord, SetOrder, WeightUnit};

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// One valid set, enriched against the built-in mapping.
    pub fn set(
        workout: &str,
        day: &str,
        exercise: &str,
        weight: f64,
        reps: f64,
    ) -> EnrichedSetRecord {
        let d = date(day);
        let raw = RawSetRecord {
            row: 0,
            workout_id: workout.into(),
            date: d,
            performed_at: d.and_hms_opt(18, 0, 0).unwrap(),
            workout_name: format!("Workout {workout}"),
            exercise_name: exercise.into(),
            set_order: SetOrder::Working(1),
            weight: Some(weight),
            reps: Some(reps),
            rpe: None,
            distance_m: None,
            duration_secs: None,
            seconds: None,
            notes: None,
            workout_notes: None,
            issues: vec![],
        };
        let mapping = MuscleGroupMapping::builtin().unwrap();
        let hit = mapping.lookup(exercise);
        let normalized = normalize_record(raw, WeightUnit::Kilograms, OneRmFormula::Epley);
        EnrichedSetRecord::new(normalized, hit)
    }

    pub fn refs(records: &[EnrichedSetRecord]) -> Vec<&EnrichedSetRecord> {
        records.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::filter::DateRange;

    #[test]
    fn empty_selection_is_empty_result() {
        let records = vec![set("1", "2024-01-01", "Squat", 100.0, 5.0)];
        let request = AnalysisRequest {
            filter: RecordFilter {
                date_range: DateRange::new(Some(date("2025-01-01")), None).unwrap(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            aggregate(&records, &request),
            Err(LiftlogError::EmptyResult)
        ));
        assert!(matches!(
            aggregate(&[], &AnalysisRequest::default()),
            Err(LiftlogError::EmptyResult)
        ));
    }

    #[test]
    fn invalid_request_is_rejected() {
        let records = vec![set("1", "2024-01-01", "Squat", 100.0, 5.0)];
        let request = AnalysisRequest {
            max_gap_days: 0,
            ..Default::default()
        };
        assert!(matches!(aggregate(&records, &request), Err(LiftlogError::Config(_))));
    }

    #[test]
    fn invalid_rows_never_reach_aggregation() {
        let mut bad = set("1", "2024-01-02", "Squat", 500.0, 5.0);
        bad.record.is_valid = false;
        let records = vec![set("1", "2024-01-01", "Squat", 100.0, 5.0), bad];
        let report = aggregate(&records, &AnalysisRequest::default()).unwrap();
        assert_eq!(report.overview.total_sets, 1);
        let squat = &report.records.exercises[0];
        assert_eq!(squat.best_weight.as_ref().unwrap().value, 100.0);
    }

    #[test]
    fn aggregate_is_deterministic() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 80.0, 5.0),
            set("1", "2024-01-01", "Barbell Row", 70.0, 8.0),
            set("2", "2024-01-03", "Squat", 120.0, 5.0),
            set("3", "2024-01-05", "Bench Press", 82.5, 5.0),
        ];
        let a = aggregate(&records, &AnalysisRequest::default()).unwrap();
        let b = aggregate(&records, &AnalysisRequest::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn request_defaults_from_json() {
        let req: AnalysisRequest = serde_json::from_str(r#"{"bucket":"month"}"#).unwrap();
        assert_eq!(req.bucket, TimeBucket::Month);
        assert_eq!(req.max_gap_days, DEFAULT_MAX_GAP_DAYS);
        assert_eq!(req.plateau_window, DEFAULT_PLATEAU_WINDOW);
    }

    #[test]
    fn pct_helpers() {
        assert_eq!(pct_change(100.0, 150.0), Some(50.0));
        assert_eq!(pct_change(0.0, 10.0), None);
        assert_eq!(share_pct(1.0, 0.0), 0.0);
        assert_eq!(share_pct(1.0, 4.0), 25.0);
    }
}
