use std::collections::BTreeSet;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use super::consistency::ConsistencyView;
use super::progress::ProgressView;
use super::workouts::WorkoutSummary;
use crate::enrich::EnrichedSetRecord;
use crate::normalize::Weekday;
use crate::utils::{normalize_exercise_key, round2};

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Overview {
    pub total_workouts: usize,
    pub total_sets: usize,
    pub total_volume: f64,
    pub total_reps: f64,
    pub distinct_exercises: usize,
    pub distinct_muscle_groups: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub span_days: i64,
    pub training_days: usize,
    pub pr_events: usize,
    pub longest_streak_days: usize,
    pub avg_sets_per_workout: f64,
    pub avg_volume_per_workout: f64,
    pub avg_workout_duration_secs: Option<f64>,
    pub most_common_weekday: Option<Weekday>,
    pub most_improved_exercise: Option<String>,
}

pub fn build(
    records: &[&EnrichedSetRecord],
    workouts: &[WorkoutSummary],
    progress: &ProgressView,
    consistency: &ConsistencyView,
) -> Overview {
    let total_volume: f64 = records.iter().map(|r| r.record.volume).sum();
    let total_reps: f64 = records.iter().map(|r| r.record.set.reps.unwrap_or(0.0)).sum();
    let distinct_exercises = records
        .iter()
        .map(|r| normalize_exercise_key(r.exercise()))
        .collect::<BTreeSet<_>>()
        .len();
    let distinct_muscle_groups = records
        .iter()
        .map(|r| r.muscle_group)
        .collect::<BTreeSet<_>>()
        .len();

    let n = workouts.len().max(1) as f64;
    let durations: Vec<f64> = workouts.iter().filter_map(|w| w.duration_secs).collect();
    let avg_workout_duration_secs = (!durations.is_empty())
        .then(|| durations.iter().sum::<f64>() / durations.len() as f64);

    // earliest weekday wins ties
    let most_common_weekday = consistency
        .by_weekday
        .iter()
        .filter(|w| w.sessions > 0)
        .reduce(|best, w| if w.sessions > best.sessions { w } else { best })
        .map(|w| w.weekday);

    Overview {
        total_workouts: workouts.len(),
        total_sets: records.len(),
        total_volume,
        total_reps,
        distinct_exercises,
        distinct_muscle_groups,
        first_date: consistency.first_date,
        last_date: consistency.last_date,
        span_days: (consistency.last_date - consistency.first_date).num_days() + 1,
        training_days: consistency.training_days,
        pr_events: progress.pr_events.len(),
        longest_streak_days: consistency.longest_streak.days,
        avg_sets_per_workout: round2(records.len() as f64 / n),
        avg_volume_per_workout: round2(total_volume / n),
        avg_workout_duration_secs,
        most_common_weekday,
        most_improved_exercise: progress.most_improved.first().map(|i| i.exercise.clone()),
    }
}
