//! Record book: bests per exercise, per muscle group and overall.
//!
//! Every mark needs a strictly greater value to replace the current one, so
//! the earliest occurrence wins ties.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use schemars::JsonSchema;
use serde::Serialize;

use super::progress::{by_exercise, positive};
use super::{SessionKey, session_key};
use crate::enrich::EnrichedSetRecord;
use crate::mapping::MuscleGroup;

/// A single set that holds a record.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RecordMark {
    pub value: f64,
    pub date: NaiveDate,
    pub exercise: String,
    pub weight: Option<f64>,
    pub reps: Option<f64>,
}

/// The session with the highest summed volume.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct SessionMark {
    pub value: f64,
    pub date: NaiveDate,
    pub workout_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct PersonalRecord {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub best_weight: Option<RecordMark>,
    pub best_estimated_1rm: Option<RecordMark>,
    pub max_reps: Option<RecordMark>,
    /// Heaviest single set by weight times reps.
    pub max_volume_set: Option<RecordMark>,
    /// Most volume of this exercise in one session.
    pub max_volume_session: Option<SessionMark>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct MuscleGroupRecord {
    pub muscle_group: MuscleGroup,
    pub best_weight: Option<RecordMark>,
    pub best_estimated_1rm: Option<RecordMark>,
    /// Most volume for this group in one session.
    pub max_volume_session: Option<SessionMark>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, JsonSchema)]
pub struct OverallRecords {
    pub best_weight: Option<RecordMark>,
    pub best_estimated_1rm: Option<RecordMark>,
    pub max_reps: Option<RecordMark>,
    pub max_volume_set: Option<RecordMark>,
    /// Session with the most total volume.
    pub max_volume_session: Option<SessionMark>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RecordBook {
    /// Sorted by normalized exercise name.
    pub exercises: Vec<PersonalRecord>,
    pub muscle_groups: Vec<MuscleGroupRecord>,
    pub overall: OverallRecords,
}

fn set_at(slot: &mut Option<RecordMark>, value: Option<f64>, rec: &EnrichedSetRecord) {
    if let Some(v) = value
        && slot.as_ref().is_none_or(|m| v > m.value)
    {
        *slot = Some(RecordMark {
            value: v,
            date: rec.date(),
            exercise: rec.exercise().to_string(),
            weight: positive(rec.record.weight_kg),
            reps: rec.record.set.reps,
        });
    }
}

/// Best weight, best estimated 1RM, most reps and biggest set volume.
#[derive(Default)]
struct SetMarks {
    weight: Option<RecordMark>,
    estimated_1rm: Option<RecordMark>,
    reps: Option<RecordMark>,
    volume: Option<RecordMark>,
}

impl SetMarks {
    fn add(&mut self, rec: &EnrichedSetRecord) {
        set_at(&mut self.weight, positive(rec.record.weight_kg), rec);
        set_at(&mut self.estimated_1rm, rec.record.estimated_1rm, rec);
        set_at(&mut self.reps, positive(rec.record.set.reps), rec);
        set_at(&mut self.volume, positive(Some(rec.record.volume)), rec);
    }
}

/// Highest per-session volume; sessions are visited in date order so the
/// earliest wins ties.
fn best_session<'a>(records: impl Iterator<Item = &'a EnrichedSetRecord>) -> Option<SessionMark> {
    let mut per_session: BTreeMap<SessionKey<'a>, f64> = BTreeMap::new();
    for rec in records {
        *per_session.entry(session_key(rec)).or_default() += rec.record.volume;
    }
    let mut best: Option<SessionMark> = None;
    for ((date, workout_id), volume) in per_session {
        if volume > 0.0 && best.as_ref().is_none_or(|m| volume > m.value) {
            best = Some(SessionMark {
                value: volume,
                date,
                workout_id: workout_id.to_string(),
            });
        }
    }
    best
}

pub fn build(records: &[&EnrichedSetRecord]) -> RecordBook {
    let mut ordered: Vec<&EnrichedSetRecord> = records.to_vec();
    ordered.sort_by_key(|r| r.record.set.performed_at);

    let exercises = by_exercise(&ordered)
        .into_values()
        .map(|group| {
            let mut marks = SetMarks::default();
            for rec in &group.records {
                marks.add(rec);
            }
            PersonalRecord {
                exercise: group.name.to_string(),
                muscle_group: group.muscle_group,
                best_weight: marks.weight,
                best_estimated_1rm: marks.estimated_1rm,
                max_reps: marks.reps,
                max_volume_set: marks.volume,
                max_volume_session: best_session(group.records.iter().copied()),
            }
        })
        .collect();

    let mut groups: BTreeMap<MuscleGroup, (SetMarks, Vec<&EnrichedSetRecord>)> = BTreeMap::new();
    let mut overall = SetMarks::default();
    for &rec in &ordered {
        overall.add(rec);
        let (marks, recs) = groups.entry(rec.muscle_group).or_default();
        marks.add(rec);
        recs.push(rec);
    }
    let muscle_groups = groups
        .into_iter()
        .map(|(muscle_group, (marks, recs))| MuscleGroupRecord {
            muscle_group,
            best_weight: marks.weight,
            best_estimated_1rm: marks.estimated_1rm,
            max_volume_session: best_session(recs.into_iter()),
        })
        .collect();

    RecordBook {
        exercises,
        muscle_groups,
        overall: OverallRecords {
            best_weight: overall.weight,
            best_estimated_1rm: overall.estimated_1rm,
            max_reps: overall.reps,
            max_volume_set: overall.volume,
            max_volume_session: best_session(ordered.iter().copied()),
        },
    }
}

fn recent_mark(mark: &Option<RecordMark>, cutoff: NaiveDate) -> Option<RecordMark> {
    mark.as_ref().filter(|m| m.date >= cutoff).cloned()
}

fn recent_session(mark: &Option<SessionMark>, cutoff: NaiveDate) -> Option<SessionMark> {
    mark.as_ref().filter(|m| m.date >= cutoff).cloned()
}

impl PersonalRecord {
    fn latest(&self) -> Option<NaiveDate> {
        [
            &self.best_weight,
            &self.best_estimated_1rm,
            &self.max_reps,
            &self.max_volume_set,
        ]
        .into_iter()
        .flatten()
        .map(|m| m.date)
        .chain(self.max_volume_session.as_ref().map(|s| s.date))
        .max()
    }
}

impl MuscleGroupRecord {
    fn latest(&self) -> Option<NaiveDate> {
        [&self.best_weight, &self.best_estimated_1rm]
            .into_iter()
            .flatten()
            .map(|m| m.date)
            .chain(self.max_volume_session.as_ref().map(|s| s.date))
            .max()
    }
}

impl RecordBook {
    /// Records set within `days` days before `reference`, inclusive.
    ///
    /// Exercise and muscle-group entries are kept whole when any of their
    /// marks is recent; overall marks are kept one by one.
    pub fn recent(&self, days: u32, reference: NaiveDate) -> RecordBook {
        let cutoff = reference - Duration::days(i64::from(days));
        RecordBook {
            exercises: self
                .exercises
                .iter()
                .filter(|r| r.latest().is_some_and(|d| d >= cutoff))
                .cloned()
                .collect(),
            muscle_groups: self
                .muscle_groups
                .iter()
                .filter(|r| r.latest().is_some_and(|d| d >= cutoff))
                .cloned()
                .collect(),
            overall: OverallRecords {
                best_weight: recent_mark(&self.overall.best_weight, cutoff),
                best_estimated_1rm: recent_mark(&self.overall.best_estimated_1rm, cutoff),
                max_reps: recent_mark(&self.overall.max_reps, cutoff),
                max_volume_set: recent_mark(&self.overall.max_volume_set, cutoff),
                max_volume_session: recent_session(&self.overall.max_volume_session, cutoff),
            },
        }
    }
}
