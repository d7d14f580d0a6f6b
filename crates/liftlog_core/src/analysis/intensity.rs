//! Effort and load intensity: RPE, percentage of 1RM and rep ranges.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Serialize;

use super::progress::positive;
use super::share_pct;
use crate::enrich::EnrichedSetRecord;
use crate::mapping::MuscleGroup;
use crate::utils::normalize_exercise_key;

const HIGHEST_RPE_TOP: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepRange {
    /// 1-5 reps
    Strength,
    /// 6-8 reps
    HypertrophyStrength,
    /// 9-12 reps
    Hypertrophy,
    /// 13-15 reps
    HypertrophyEndurance,
    /// 16 or more
    Endurance,
}

impl RepRange {
    pub const ALL: [RepRange; 5] = [
        RepRange::Strength,
        RepRange::HypertrophyStrength,
        RepRange::Hypertrophy,
        RepRange::HypertrophyEndurance,
        RepRange::Endurance,
    ];

    pub fn of(reps: f64) -> Self {
        if reps <= 5.0 {
            RepRange::Strength
        } else if reps <= 8.0 {
            RepRange::HypertrophyStrength
        } else if reps <= 12.0 {
            RepRange::Hypertrophy
        } else if reps <= 15.0 {
            RepRange::HypertrophyEndurance
        } else {
            RepRange::Endurance
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GroupAverage {
    pub muscle_group: MuscleGroup,
    pub average: f64,
    pub sets: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExerciseAverage {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub average: f64,
    pub sets: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RepRangeShare {
    pub range: RepRange,
    pub sets: usize,
    pub volume: f64,
    pub share_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct IntensityView {
    /// Sets with a recorded RPE above zero.
    pub rpe_sets: usize,
    pub avg_rpe: Option<f64>,
    pub rpe_by_muscle_group: Vec<GroupAverage>,
    /// Highest average RPE first.
    pub highest_rpe_exercises: Vec<ExerciseAverage>,
    /// Mean set weight as a percentage of the exercise's best estimated 1RM
    /// in the selection.
    pub avg_intensity_pct: Option<f64>,
    pub intensity_by_muscle_group: Vec<GroupAverage>,
    /// Every range in ascending rep order, with its share of total volume.
    pub volume_by_rep_range: Vec<RepRangeShare>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn add(&mut self, v: f64) {
        self.sum += v;
        self.n += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

fn group_averages(by_group: BTreeMap<MuscleGroup, Mean>) -> Vec<GroupAverage> {
    by_group
        .into_iter()
        .filter_map(|(muscle_group, m)| {
            Some(GroupAverage {
                muscle_group,
                average: m.value()?,
                sets: m.n,
            })
        })
        .collect()
}

type RpeSummary = (Mean, Vec<GroupAverage>, Vec<ExerciseAverage>);

fn rpe_summary(records: &[&EnrichedSetRecord]) -> RpeSummary {
    let mut overall = Mean::default();
    let mut by_group: BTreeMap<MuscleGroup, Mean> = BTreeMap::new();
    let mut by_exercise: BTreeMap<String, (&str, MuscleGroup, Mean)> = BTreeMap::new();
    for rec in records {
        let Some(rpe) = positive(rec.record.set.rpe) else {
            continue;
        };
        overall.add(rpe);
        by_group.entry(rec.muscle_group).or_default().add(rpe);
        by_exercise
            .entry(normalize_exercise_key(rec.exercise()))
            .or_insert_with(|| (rec.exercise(), rec.muscle_group, Mean::default()))
            .2
            .add(rpe);
    }

    let mut exercises: Vec<ExerciseAverage> = by_exercise
        .into_values()
        .filter_map(|(name, muscle_group, m)| {
            Some(ExerciseAverage {
                exercise: name.to_string(),
                muscle_group,
                average: m.value()?,
                sets: m.n,
            })
        })
        .collect();
    exercises.sort_by(|a, b| {
        b.average
            .total_cmp(&a.average)
            .then_with(|| a.exercise.cmp(&b.exercise))
    });
    exercises.truncate(HIGHEST_RPE_TOP);

    (overall, group_averages(by_group), exercises)
}

fn load_intensity(records: &[&EnrichedSetRecord]) -> (Mean, Vec<GroupAverage>) {
    let mut best_1rm: BTreeMap<String, f64> = BTreeMap::new();
    for rec in records {
        if let Some(e) = rec.record.estimated_1rm {
            let best = best_1rm
                .entry(normalize_exercise_key(rec.exercise()))
                .or_insert(e);
            *best = best.max(e);
        }
    }

    let mut overall = Mean::default();
    let mut by_group: BTreeMap<MuscleGroup, Mean> = BTreeMap::new();
    for rec in records {
        let Some(weight) = positive(rec.record.weight_kg) else {
            continue;
        };
        let Some(&best) = best_1rm.get(&normalize_exercise_key(rec.exercise())) else {
            continue;
        };
        if best <= 0.0 {
            continue;
        }
        let pct = weight / best * 100.0;
        overall.add(pct);
        by_group.entry(rec.muscle_group).or_default().add(pct);
    }
    (overall, group_averages(by_group))
}

fn rep_ranges(records: &[&EnrichedSetRecord]) -> Vec<RepRangeShare> {
    let mut totals: BTreeMap<RepRange, (usize, f64)> = BTreeMap::new();
    let mut total_volume = 0.0;
    for rec in records {
        let Some(reps) = positive(rec.record.set.reps) else {
            continue;
        };
        let t = totals.entry(RepRange::of(reps)).or_default();
        t.0 += 1;
        t.1 += rec.record.volume;
        total_volume += rec.record.volume;
    }
    RepRange::ALL
        .iter()
        .map(|range| {
            let (sets, volume) = totals.get(range).copied().unwrap_or_default();
            RepRangeShare {
                range: *range,
                sets,
                volume,
                share_pct: share_pct(volume, total_volume),
            }
        })
        .collect()
}

pub fn build(records: &[&EnrichedSetRecord]) -> IntensityView {
    let (rpe, rpe_by_muscle_group, highest_rpe_exercises) = rpe_summary(records);
    let (intensity, intensity_by_muscle_group) = load_intensity(records);
    IntensityView {
        rpe_sets: rpe.n,
        avg_rpe: rpe.value(),
        rpe_by_muscle_group,
        highest_rpe_exercises,
        avg_intensity_pct: intensity.value(),
        intensity_by_muscle_group,
        volume_by_rep_range: rep_ranges(records),
    }
}
