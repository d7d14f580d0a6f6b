use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use super::session_key;
use crate::enrich::EnrichedSetRecord;
use crate::filter::TimeBucket;
use crate::mapping::MuscleGroup;
use crate::utils::normalize_exercise_key;

const TOP_EXERCISES: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct BucketVariety {
    pub bucket: String,
    pub start: NaiveDate,
    pub distinct_exercises: usize,
    /// Change against the previous bucket; `None` for the first one.
    pub delta: Option<i64>,
    /// Exercises performed for the first time in this bucket.
    pub new_exercises: Vec<String>,
    pub muscle_groups: Vec<MuscleGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExerciseUsage {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub sets: usize,
    pub sessions: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct VarietyView {
    pub distinct_exercises: usize,
    pub distinct_muscle_groups: usize,
    pub per_bucket: Vec<BucketVariety>,
    /// Most sets first.
    pub top_exercises: Vec<ExerciseUsage>,
}

#[derive(Default)]
struct BucketAcc {
    start: Option<NaiveDate>,
    exercises: BTreeSet<String>,
    groups: BTreeSet<MuscleGroup>,
}

pub fn build(records: &[&EnrichedSetRecord], bucket: TimeBucket) -> VarietyView {
    // key -> (display name, first date)
    let mut first_seen: BTreeMap<String, (&str, NaiveDate)> = BTreeMap::new();
    let mut buckets: BTreeMap<String, BucketAcc> = BTreeMap::new();
    let mut usage: BTreeMap<String, (ExerciseUsage, BTreeSet<(NaiveDate, &str)>)> = BTreeMap::new();

    for rec in records {
        let key = normalize_exercise_key(rec.exercise());
        let date = rec.date();
        first_seen
            .entry(key.clone())
            .and_modify(|(_, d)| *d = (*d).min(date))
            .or_insert((rec.exercise(), date));

        let acc = buckets.entry(bucket.label(date)).or_default();
        acc.start.get_or_insert(bucket.start(date));
        acc.exercises.insert(key.clone());
        acc.groups.insert(rec.muscle_group);

        let (u, seen) = usage.entry(key).or_insert_with(|| {
            (
                ExerciseUsage {
                    exercise: rec.exercise().to_string(),
                    muscle_group: rec.muscle_group,
                    sets: 0,
                    sessions: 0,
                },
                BTreeSet::new(),
            )
        });
        u.sets += 1;
        seen.insert(session_key(*rec));
    }

    let mut introduced: HashMap<String, Vec<String>> = HashMap::new();
    for (name, date) in first_seen.values() {
        introduced
            .entry(bucket.label(*date))
            .or_default()
            .push((*name).to_string());
    }

    let mut prev: Option<usize> = None;
    let per_bucket = buckets
        .into_iter()
        .map(|(label, acc)| {
            let count = acc.exercises.len();
            let delta = prev.map(|p| count as i64 - p as i64);
            prev = Some(count);
            let mut new_exercises = introduced.remove(&label).unwrap_or_default();
            new_exercises.sort();
            BucketVariety {
                start: acc.start.unwrap_or(NaiveDate::MIN),
                bucket: label,
                distinct_exercises: count,
                delta,
                new_exercises,
                muscle_groups: acc.groups.into_iter().collect(),
            }
        })
        .collect();

    let mut top_exercises: Vec<ExerciseUsage> = usage
        .into_values()
        .map(|(mut u, seen)| {
            u.sessions = seen.len();
            u
        })
        .collect();
    top_exercises.sort_by(|a, b| b.sets.cmp(&a.sets).then_with(|| a.exercise.cmp(&b.exercise)));
    let distinct_exercises = top_exercises.len();
    top_exercises.truncate(TOP_EXERCISES);

    let distinct_muscle_groups = records
        .iter()
        .map(|r| r.muscle_group)
        .collect::<BTreeSet<_>>()
        .len();

    VarietyView {
        distinct_exercises,
        distinct_muscle_groups,
        per_bucket,
        top_exercises,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::*;

    #[test]
    fn per_bucket_counts_delta_and_new() {
        let records = vec![
            set("1", "2024-01-02", "Squat", 100.0, 5.0),
            set("1", "2024-01-02", "Bench Press", 80.0, 5.0),
            set("2", "2024-02-05", "Squat", 100.0, 5.0),
            set("2", "2024-02-05", "Deadlift", 140.0, 5.0),
            set("2", "2024-02-05", "Pull Up", 0.0, 10.0),
            set("3", "2024-03-01", "squat", 105.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Month);
        assert_eq!(view.distinct_exercises, 4);
        assert_eq!(view.per_bucket.len(), 3);

        let jan = &view.per_bucket[0];
        assert_eq!(jan.distinct_exercises, 2);
        assert_eq!(jan.delta, None);
        assert_eq!(jan.new_exercises, vec!["Bench Press", "Squat"]);

        let feb = &view.per_bucket[1];
        assert_eq!(feb.distinct_exercises, 3);
        assert_eq!(feb.delta, Some(1));
        assert_eq!(feb.new_exercises, vec!["Deadlift", "Pull Up"]);
        assert_eq!(feb.muscle_groups, vec![MuscleGroup::Back, MuscleGroup::Legs]);

        let mar = &view.per_bucket[2];
        assert_eq!(mar.delta, Some(-2));
        assert!(mar.new_exercises.is_empty());
    }

    #[test]
    fn top_exercises_by_set_count() {
        let records = vec![
            set("1", "2024-01-02", "Squat", 100.0, 5.0),
            set("1", "2024-01-02", "Squat", 100.0, 5.0),
            set("2", "2024-01-04", "Squat", 100.0, 5.0),
            set("2", "2024-01-04", "Bench Press", 80.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week);
        assert_eq!(view.top_exercises[0].exercise, "Squat");
        assert_eq!(view.top_exercises[0].sets, 3);
        assert_eq!(view.top_exercises[0].sessions, 2);
        assert_eq!(view.distinct_muscle_groups, 2);
    }
}
