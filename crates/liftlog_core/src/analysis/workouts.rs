use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::Serialize;

use super::{SessionKey, session_key, share_pct};
use crate::enrich::EnrichedSetRecord;
use crate::mapping::{BodyRegion, MovementCategory, MuscleGroup};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    ChestFocused,
    BackFocused,
    LegDay,
    ShoulderFocused,
    ArmDay,
    CoreFocused,
    CardioSession,
    OlympicLifting,
    Push,
    Pull,
    UpperBody,
    LowerBody,
    FullBody,
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GroupShare {
    pub muscle_group: MuscleGroup,
    pub sets: usize,
    pub share_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct WorkoutSummary {
    pub workout_id: String,
    pub date: NaiveDate,
    pub workout_name: String,
    pub started_at: NaiveDateTime,
    pub duration_secs: Option<f64>,
    pub sets: usize,
    /// Sets marked as warm-up in the export; included in `sets`.
    pub warmup_sets: usize,
    /// Distinct exercises in first-performed order.
    pub exercises: Vec<String>,
    pub exercise_count: usize,
    pub total_volume: f64,
    pub total_reps: f64,
    /// Volume per minute, when the duration is known.
    pub density: Option<f64>,
    /// Share of sets per muscle group.
    pub muscle_groups: Vec<GroupShare>,
    pub workout_type: WorkoutType,
}

fn classify(shares: &[GroupShare], records: &[&EnrichedSetRecord]) -> WorkoutType {
    let share = |g: MuscleGroup| {
        shares
            .iter()
            .find(|s| s.muscle_group == g)
            .map_or(0.0, |s| s.share_pct)
    };
    let focus = [
        (MuscleGroup::Chest, 50.0, WorkoutType::ChestFocused),
        (MuscleGroup::Back, 50.0, WorkoutType::BackFocused),
        (MuscleGroup::Legs, 50.0, WorkoutType::LegDay),
        (MuscleGroup::Shoulders, 40.0, WorkoutType::ShoulderFocused),
        (MuscleGroup::Arms, 40.0, WorkoutType::ArmDay),
        (MuscleGroup::Core, 40.0, WorkoutType::CoreFocused),
        (MuscleGroup::Cardio, 40.0, WorkoutType::CardioSession),
        (MuscleGroup::Olympic, 30.0, WorkoutType::OlympicLifting),
    ];
    if let Some((_, _, kind)) = focus.iter().find(|(g, min, _)| share(*g) >= *min) {
        return *kind;
    }

    let has_region = |region: BodyRegion| records.iter().any(|r| r.body_region == Some(region));
    let has_upper = has_region(BodyRegion::Upper);
    let has_lower = has_region(BodyRegion::Lower);
    if has_upper && has_lower {
        return WorkoutType::FullBody;
    }

    let total = records.len() as f64;
    let category_share = |c: MovementCategory| {
        share_pct(
            records.iter().filter(|r| r.movement_category == c).count() as f64,
            total,
        )
    };
    if category_share(MovementCategory::Push) >= 70.0 {
        return WorkoutType::Push;
    }
    if category_share(MovementCategory::Pull) >= 70.0 {
        return WorkoutType::Pull;
    }
    if has_upper {
        return WorkoutType::UpperBody;
    }
    if has_lower {
        return WorkoutType::LowerBody;
    }
    if shares.len() >= 3 {
        return WorkoutType::FullBody;
    }
    WorkoutType::Other
}

fn summarize_one(records: &[&EnrichedSetRecord]) -> Option<WorkoutSummary> {
    let first = records.first()?;
    let sets = records.len();

    let mut exercises: Vec<String> = Vec::new();
    let mut group_sets: BTreeMap<MuscleGroup, usize> = BTreeMap::new();
    let mut total_volume = 0.0;
    let mut total_reps = 0.0;
    for rec in records {
        if !exercises.iter().any(|e| e == rec.exercise()) {
            exercises.push(rec.exercise().to_string());
        }
        *group_sets.entry(rec.muscle_group).or_default() += 1;
        total_volume += rec.record.volume;
        total_reps += rec.record.set.reps.unwrap_or(0.0);
    }

    let duration_secs = records
        .iter()
        .find_map(|r| r.record.set.duration_secs)
        .filter(|d| *d > 0.0);
    let density = duration_secs.map(|d| total_volume / (d / 60.0));

    let muscle_groups: Vec<GroupShare> = group_sets
        .into_iter()
        .map(|(muscle_group, n)| GroupShare {
            muscle_group,
            sets: n,
            share_pct: share_pct(n as f64, sets as f64),
        })
        .collect();
    let workout_type = classify(&muscle_groups, records);

    Some(WorkoutSummary {
        workout_id: first.record.set.workout_id.clone(),
        date: first.date(),
        workout_name: first.record.set.workout_name.clone(),
        started_at: records
            .iter()
            .map(|r| r.record.set.performed_at)
            .min()
            .unwrap_or(first.record.set.performed_at),
        duration_secs,
        sets,
        warmup_sets: records.iter().filter(|r| r.record.set.set_order.is_warmup()).count(),
        exercise_count: exercises.len(),
        exercises,
        total_volume,
        total_reps,
        density,
        muscle_groups,
        workout_type,
    })
}

/// One summary per session, ordered by date, start time, then identifier.
pub fn summarize(records: &[&EnrichedSetRecord]) -> Vec<WorkoutSummary> {
    let mut by_session: BTreeMap<SessionKey<'_>, Vec<&EnrichedSetRecord>> = BTreeMap::new();
    for &rec in records {
        by_session.entry(session_key(rec)).or_default().push(rec);
    }
    let mut out: Vec<WorkoutSummary> = by_session
        .values()
        .filter_map(|recs| summarize_one(recs))
        .collect();
    out.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.started_at.cmp(&b.started_at))
            .then_with(|| a.workout_id.cmp(&b.workout_id))
    });
    out
}
