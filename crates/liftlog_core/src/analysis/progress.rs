//! Per-exercise progression, PR detection and plateaus.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use super::pct_change;
use crate::enrich::EnrichedSetRecord;
use crate::filter::TimeBucket;
use crate::mapping::MuscleGroup;
use crate::utils::normalize_exercise_key;

const MOST_IMPROVED_MIN_SESSIONS: usize = 3;
const MOST_IMPROVED_TOP: usize = 5;
const STRENGTH_ROLLING_PERIODS: usize = 3;

/// One exercise on one training day.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ProgressPoint {
    pub date: NaiveDate,
    pub max_weight: Option<f64>,
    pub max_estimated_1rm: Option<f64>,
    pub volume: f64,
    pub sets: usize,
    pub total_reps: f64,
    pub weight_pr: bool,
    pub estimated_1rm_pr: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrKind {
    Weight,
    EstimatedOneRm,
}

/// A session that beat every earlier session of the same exercise.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct PrEvent {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub date: NaiveDate,
    pub kinds: Vec<PrKind>,
    pub weight: Option<f64>,
    pub previous_best_weight: Option<f64>,
    pub estimated_1rm: Option<f64>,
    pub previous_best_1rm: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Plateau {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub sessions: usize,
    /// Best weight that was not exceeded during the run.
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExerciseProgress {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub sessions: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub points: Vec<ProgressPoint>,
    pub best_weight: Option<f64>,
    pub best_estimated_1rm: Option<f64>,
    /// First to last session; `None` with fewer than two sessions or a zero
    /// starting value.
    pub weight_change_pct: Option<f64>,
    pub estimated_1rm_change_pct: Option<f64>,
    pub volume_change_pct: Option<f64>,
    pub plateaus: Vec<Plateau>,
    pub pr_events: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Improvement {
    pub exercise: String,
    pub muscle_group: MuscleGroup,
    pub sessions: usize,
    pub weight_change_pct: Option<f64>,
    pub estimated_1rm_change_pct: Option<f64>,
    pub volume_change_pct: Option<f64>,
    /// Mean of the defined change percentages.
    pub overall_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ProgressBucket {
    pub bucket: String,
    pub start: NaiveDate,
    pub volume: f64,
    pub sets: usize,
    pub pr_events: usize,
}

/// Average loads in one period.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct StrengthPeriod {
    pub bucket: String,
    pub start: NaiveDate,
    pub sets: usize,
    /// Mean over sets with a positive weight.
    pub avg_weight: Option<f64>,
    pub avg_estimated_1rm: Option<f64>,
    /// Mean of this and up to two earlier periods.
    pub rolling_avg_weight: Option<f64>,
    pub rolling_avg_estimated_1rm: Option<f64>,
    /// Against the previous period.
    pub weight_change_pct: Option<f64>,
    pub estimated_1rm_change_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GroupStrength {
    pub muscle_group: MuscleGroup,
    pub periods: Vec<StrengthPeriod>,
    /// First to last period with a value; `None` with fewer than two.
    pub weight_change_pct: Option<f64>,
    pub estimated_1rm_change_pct: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ProgressView {
    /// Sorted by normalized exercise name.
    pub exercises: Vec<ExerciseProgress>,
    /// Sorted by date, then exercise.
    pub pr_events: Vec<PrEvent>,
    pub per_bucket: Vec<ProgressBucket>,
    pub most_improved: Vec<Improvement>,
    pub strength_by_bucket: Vec<StrengthPeriod>,
    pub strength_by_muscle_group: Vec<GroupStrength>,
}

pub(super) fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x > 0.0)
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

pub(super) struct ExerciseGroup<'a> {
    pub(super) name: &'a str,
    pub(super) muscle_group: MuscleGroup,
    pub(super) records: Vec<&'a EnrichedSetRecord>,
}

/// Group by normalized exercise name; the first spelling seen is displayed.
pub(super) fn by_exercise<'a>(
    records: &[&'a EnrichedSetRecord],
) -> BTreeMap<String, ExerciseGroup<'a>> {
    let mut groups: BTreeMap<String, ExerciseGroup<'a>> = BTreeMap::new();
    for &rec in records {
        groups
            .entry(normalize_exercise_key(rec.exercise()))
            .or_insert_with(|| ExerciseGroup {
                name: rec.exercise(),
                muscle_group: rec.muscle_group,
                records: Vec::new(),
            })
            .records
            .push(rec);
    }
    groups
}

fn points_for(records: &[&EnrichedSetRecord]) -> Vec<ProgressPoint> {
    let mut per_day: BTreeMap<NaiveDate, ProgressPoint> = BTreeMap::new();
    for rec in records {
        let p = per_day.entry(rec.date()).or_insert_with(|| ProgressPoint {
            date: rec.date(),
            max_weight: None,
            max_estimated_1rm: None,
            volume: 0.0,
            sets: 0,
            total_reps: 0.0,
            weight_pr: false,
            estimated_1rm_pr: false,
        });
        p.max_weight = max_opt(p.max_weight, positive(rec.record.weight_kg));
        p.max_estimated_1rm = max_opt(p.max_estimated_1rm, rec.record.estimated_1rm);
        p.volume += rec.record.volume;
        p.sets += 1;
        p.total_reps += rec.record.set.reps.unwrap_or(0.0);
    }
    per_day.into_values().collect()
}

/// Flag points that strictly exceed every earlier point. The first
/// observation sets the baseline and is never flagged.
fn flag_prs(
    exercise: &str,
    muscle_group: MuscleGroup,
    points: &mut [ProgressPoint],
) -> Vec<PrEvent> {
    let mut events = Vec::new();
    let mut best_weight: Option<f64> = None;
    let mut best_1rm: Option<f64> = None;
    for p in points.iter_mut() {
        let prev_weight = best_weight;
        let prev_1rm = best_1rm;
        if let Some(w) = p.max_weight {
            p.weight_pr = prev_weight.is_some_and(|b| w > b);
            best_weight = max_opt(best_weight, Some(w));
        }
        if let Some(e) = p.max_estimated_1rm {
            p.estimated_1rm_pr = prev_1rm.is_some_and(|b| e > b);
            best_1rm = max_opt(best_1rm, Some(e));
        }
        let mut kinds = Vec::new();
        if p.weight_pr {
            kinds.push(PrKind::Weight);
        }
        if p.estimated_1rm_pr {
            kinds.push(PrKind::EstimatedOneRm);
        }
        if !kinds.is_empty() {
            events.push(PrEvent {
                exercise: exercise.to_string(),
                muscle_group,
                date: p.date,
                kinds,
                weight: p.max_weight,
                previous_best_weight: prev_weight,
                estimated_1rm: p.max_estimated_1rm,
                previous_best_1rm: prev_1rm,
            });
        }
    }
    events
}

/// Runs of at least `window` sessions in which the top weight never rises
/// above the weight at the start of the run.
pub fn detect_plateaus(series: &[(NaiveDate, f64)], window: usize) -> Vec<Plateau> {
    let mut out = Vec::new();
    let Some(&(first_date, first_weight)) = series.first() else {
        return out;
    };
    let mut best = first_weight;
    let mut start = first_date;
    let mut end = first_date;
    let mut count = 1usize;
    for &(date, weight) in &series[1..] {
        if weight <= best {
            count += 1;
            end = date;
        } else {
            if count >= window {
                out.push(Plateau {
                    start,
                    end,
                    sessions: count,
                    weight: best,
                });
            }
            best = weight;
            start = date;
            end = date;
            count = 1;
        }
    }
    if count >= window {
        out.push(Plateau {
            start,
            end,
            sessions: count,
            weight: best,
        });
    }
    out
}

fn first_last<T: Copy>(values: impl Iterator<Item = T>) -> Option<(T, T)> {
    let mut it = values;
    let first = it.next()?;
    let last = it.last()?;
    Some((first, last))
}

fn exercise_progress(group: &ExerciseGroup<'_>, window: usize) -> (ExerciseProgress, Vec<PrEvent>) {
    let mut points = points_for(&group.records);
    let events = flag_prs(group.name, group.muscle_group, &mut points);

    let weights: Vec<(NaiveDate, f64)> = points
        .iter()
        .filter_map(|p| p.max_weight.map(|w| (p.date, w)))
        .collect();
    let plateaus = detect_plateaus(&weights, window);

    let weight_change_pct =
        first_last(weights.iter().map(|(_, w)| *w)).and_then(|(a, b)| pct_change(a, b));
    let estimated_1rm_change_pct = first_last(points.iter().filter_map(|p| p.max_estimated_1rm))
        .and_then(|(a, b)| pct_change(a, b));
    let volume_change_pct =
        first_last(points.iter().map(|p| p.volume)).and_then(|(a, b)| pct_change(a, b));

    let first_date = points.first().map(|p| p.date).unwrap_or(NaiveDate::MIN);
    let last_date = points.last().map(|p| p.date).unwrap_or(NaiveDate::MIN);

    let progress = ExerciseProgress {
        exercise: group.name.to_string(),
        muscle_group: group.muscle_group,
        sessions: points.len(),
        first_date,
        last_date,
        best_weight: weights.iter().map(|(_, w)| *w).reduce(f64::max),
        best_estimated_1rm: points.iter().filter_map(|p| p.max_estimated_1rm).reduce(f64::max),
        points,
        weight_change_pct,
        estimated_1rm_change_pct,
        volume_change_pct,
        plateaus,
        pr_events: events.len(),
    };
    (progress, events)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn change(prev: Option<f64>, cur: Option<f64>) -> Option<f64> {
    prev.zip(cur).and_then(|(a, b)| pct_change(a, b))
}

/// Average weight and estimated 1RM per period, with rolling means and
/// period-over-period change.
pub fn strength_periods(
    records: &[&EnrichedSetRecord],
    bucket: TimeBucket,
) -> Vec<StrengthPeriod> {
    let mut grouped: BTreeMap<String, (NaiveDate, Vec<&EnrichedSetRecord>)> = BTreeMap::new();
    for &rec in records {
        grouped
            .entry(bucket.label(rec.date()))
            .or_insert_with(|| (bucket.start(rec.date()), Vec::new()))
            .1
            .push(rec);
    }
    let mut periods: Vec<StrengthPeriod> = grouped
        .into_iter()
        .map(|(label, (start, recs))| StrengthPeriod {
            bucket: label,
            start,
            sets: recs.len(),
            avg_weight: mean(recs.iter().filter_map(|r| positive(r.record.weight_kg))),
            avg_estimated_1rm: mean(recs.iter().filter_map(|r| r.record.estimated_1rm)),
            rolling_avg_weight: None,
            rolling_avg_estimated_1rm: None,
            weight_change_pct: None,
            estimated_1rm_change_pct: None,
        })
        .collect();

    for i in 0..periods.len() {
        let window = &periods[i.saturating_sub(STRENGTH_ROLLING_PERIODS - 1)..=i];
        let rolling_weight = mean(window.iter().filter_map(|p| p.avg_weight));
        let rolling_1rm = mean(window.iter().filter_map(|p| p.avg_estimated_1rm));
        let (weight_change, e1rm_change) = match i.checked_sub(1) {
            Some(j) => (
                change(periods[j].avg_weight, periods[i].avg_weight),
                change(periods[j].avg_estimated_1rm, periods[i].avg_estimated_1rm),
            ),
            None => (None, None),
        };
        let p = &mut periods[i];
        p.rolling_avg_weight = rolling_weight;
        p.rolling_avg_estimated_1rm = rolling_1rm;
        p.weight_change_pct = weight_change;
        p.estimated_1rm_change_pct = e1rm_change;
    }
    periods
}

fn strength_by_muscle_group(
    records: &[&EnrichedSetRecord],
    bucket: TimeBucket,
) -> Vec<GroupStrength> {
    let mut groups: BTreeMap<MuscleGroup, Vec<&EnrichedSetRecord>> = BTreeMap::new();
    for &rec in records {
        groups.entry(rec.muscle_group).or_default().push(rec);
    }
    groups
        .into_iter()
        .map(|(muscle_group, recs)| {
            let periods = strength_periods(&recs, bucket);
            let weight_change_pct = first_last(periods.iter().filter_map(|p| p.avg_weight))
                .and_then(|(a, b)| pct_change(a, b));
            let estimated_1rm_change_pct =
                first_last(periods.iter().filter_map(|p| p.avg_estimated_1rm))
                    .and_then(|(a, b)| pct_change(a, b));
            GroupStrength {
                muscle_group,
                periods,
                weight_change_pct,
                estimated_1rm_change_pct,
            }
        })
        .collect()
}

fn most_improved(exercises: &[ExerciseProgress]) -> Vec<Improvement> {
    let mut out: Vec<Improvement> = exercises
        .iter()
        .filter(|e| e.sessions >= MOST_IMPROVED_MIN_SESSIONS)
        .filter_map(|e| {
            let defined: Vec<f64> = [
                e.weight_change_pct,
                e.estimated_1rm_change_pct,
                e.volume_change_pct,
            ]
            .into_iter()
            .flatten()
            .collect();
            if defined.is_empty() {
                return None;
            }
            Some(Improvement {
                exercise: e.exercise.clone(),
                muscle_group: e.muscle_group,
                sessions: e.sessions,
                weight_change_pct: e.weight_change_pct,
                estimated_1rm_change_pct: e.estimated_1rm_change_pct,
                volume_change_pct: e.volume_change_pct,
                overall_pct: defined.iter().sum::<f64>() / defined.len() as f64,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.overall_pct
            .total_cmp(&a.overall_pct)
            .then_with(|| a.exercise.cmp(&b.exercise))
    });
    out.truncate(MOST_IMPROVED_TOP);
    out
}

pub fn build(
    records: &[&EnrichedSetRecord],
    bucket: TimeBucket,
    plateau_window: usize,
) -> ProgressView {
    let mut exercises = Vec::new();
    let mut pr_events = Vec::new();
    for group in by_exercise(records).values() {
        let (progress, events) = exercise_progress(group, plateau_window);
        exercises.push(progress);
        pr_events.extend(events);
    }
    pr_events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.exercise.cmp(&b.exercise)));

    let mut buckets: BTreeMap<String, ProgressBucket> = BTreeMap::new();
    for rec in records {
        let b = buckets
            .entry(bucket.label(rec.date()))
            .or_insert_with(|| ProgressBucket {
                bucket: bucket.label(rec.date()),
                start: bucket.start(rec.date()),
                volume: 0.0,
                sets: 0,
                pr_events: 0,
            });
        b.volume += rec.record.volume;
        b.sets += 1;
    }
    for event in &pr_events {
        if let Some(b) = buckets.get_mut(&bucket.label(event.date)) {
            b.pr_events += 1;
        }
    }

    ProgressView {
        most_improved: most_improved(&exercises),
        exercises,
        pr_events,
        per_bucket: buckets.into_values().collect(),
        strength_by_bucket: strength_periods(records, bucket),
        strength_by_muscle_group: strength_by_muscle_group(records, bucket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::*;

    #[test]
    fn tie_is_not_a_pr_and_first_is_baseline() {
        let records = vec![
            set("1", "2024-01-01", "Squat", 100.0, 5.0),
            set("2", "2024-01-03", "Squat", 100.0, 5.0),
            set("3", "2024-01-05", "Squat", 105.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week, 5);
        assert_eq!(view.pr_events.len(), 1);
        let event = &view.pr_events[0];
        assert_eq!(event.date, date("2024-01-05"));
        assert_eq!(event.weight, Some(105.0));
        assert_eq!(event.previous_best_weight, Some(100.0));
        assert!(event.kinds.contains(&PrKind::Weight));

        let squat = &view.exercises[0];
        let flags: Vec<bool> = squat.points.iter().map(|p| p.weight_pr).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert_eq!(squat.pr_events, 1);
        assert_eq!(squat.weight_change_pct, Some(5.0));
    }

    #[test]
    fn rep_pr_at_same_weight_is_an_estimated_1rm_pr_only() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 80.0, 5.0),
            set("2", "2024-01-08", "Bench Press", 80.0, 8.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week, 5);
        assert_eq!(view.pr_events.len(), 1);
        assert_eq!(view.pr_events[0].kinds, vec![PrKind::EstimatedOneRm]);
    }

    #[test]
    fn sets_on_one_day_form_one_point() {
        let records = vec![
            set("1", "2024-01-01", "Deadlift", 140.0, 3.0),
            set("1", "2024-01-01", "Deadlift", 150.0, 1.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week, 5);
        let dl = &view.exercises[0];
        assert_eq!(dl.points.len(), 1);
        assert_eq!(dl.points[0].max_weight, Some(150.0));
        assert_eq!(dl.points[0].sets, 2);
        assert_eq!(dl.points[0].volume, 140.0 * 3.0 + 150.0);
        assert!(view.pr_events.is_empty());
        assert_eq!(dl.weight_change_pct, None);
    }

    #[test]
    fn plateau_detection() {
        let d = |day: u32| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let series = vec![
            (d(1), 100.0),
            (d(3), 100.0),
            (d(5), 97.5),
            (d(8), 100.0),
            (d(10), 100.0),
            (d(12), 102.5),
            (d(15), 102.5),
        ];
        let found = detect_plateaus(&series, 5);
        assert_eq!(
            found,
            vec![Plateau {
                start: d(1),
                end: d(10),
                sessions: 5,
                weight: 100.0
            }]
        );
        assert!(detect_plateaus(&series, 6).is_empty());
        assert!(detect_plateaus(&[], 2).is_empty());
    }

    #[test]
    fn most_improved_needs_three_sessions() {
        let records = vec![
            set("1", "2024-01-01", "Squat", 100.0, 5.0),
            set("2", "2024-01-08", "Squat", 110.0, 5.0),
            set("3", "2024-01-15", "Squat", 120.0, 5.0),
            set("1", "2024-01-01", "Bench Press", 80.0, 5.0),
            set("3", "2024-01-15", "Bench Press", 100.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week, 5);
        assert_eq!(view.most_improved.len(), 1);
        assert_eq!(view.most_improved[0].exercise, "Squat");
        assert_eq!(view.per_bucket.len(), 3);
        assert_eq!(view.per_bucket[2].pr_events, 2);
    }

    #[test]
    fn strength_periods_average_and_roll() {
        let records = vec![
            set("1", "2024-01-02", "Squat", 100.0, 5.0),
            set("1", "2024-01-02", "Squat", 80.0, 5.0),
            set("2", "2024-02-05", "Squat", 99.0, 5.0),
            set("3", "2024-03-04", "Squat", 120.0, 5.0),
            set("4", "2024-04-01", "Squat", 150.0, 5.0),
        ];
        let periods = strength_periods(&refs(&records), TimeBucket::Month);
        assert_eq!(periods.len(), 4);
        assert_eq!(periods[0].bucket, "2024-01");
        assert_eq!(periods[0].sets, 2);
        assert_eq!(periods[0].avg_weight, Some(90.0));
        assert_eq!(periods[0].weight_change_pct, None);
        assert_eq!(periods[1].weight_change_pct, Some(10.0));
        assert_eq!(periods[2].rolling_avg_weight, Some(103.0));
        // window drops the first month
        assert_eq!(periods[3].rolling_avg_weight, Some(123.0));
        assert_eq!(periods[3].weight_change_pct, Some(25.0));
    }

    #[test]
    fn strength_change_per_muscle_group() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 80.0, 5.0),
            set("1", "2024-01-01", "Squat", 100.0, 5.0),
            set("2", "2024-02-01", "Bench Press", 100.0, 5.0),
            set("3", "2024-02-02", "Plank", 0.0, 1.0),
        ];
        let view = build(&refs(&records), TimeBucket::Month, 5);
        let by_group = &view.strength_by_muscle_group;
        let chest = by_group
            .iter()
            .find(|g| g.muscle_group == MuscleGroup::Chest)
            .unwrap();
        assert_eq!(chest.periods.len(), 2);
        assert_eq!(chest.weight_change_pct, Some(25.0));
        assert!((chest.estimated_1rm_change_pct.unwrap() - 25.0).abs() < 1e-9);

        let legs = by_group
            .iter()
            .find(|g| g.muscle_group == MuscleGroup::Legs)
            .unwrap();
        assert_eq!(legs.weight_change_pct, None);

        let core = by_group
            .iter()
            .find(|g| g.muscle_group == MuscleGroup::Core)
            .unwrap();
        assert_eq!(core.periods[0].avg_weight, None);
        assert_eq!(view.strength_by_bucket.len(), 2);
    }
}
