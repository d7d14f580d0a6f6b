use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::Serialize;

use super::{session_key, share_pct};
use crate::enrich::EnrichedSetRecord;
use crate::filter::TimeBucket;
use crate::mapping::{BodyRegion, MovementCategory, MuscleGroup};

pub const PUSH_PULL_HIGH: f64 = 1.3;
pub const PUSH_PULL_LOW: f64 = 0.7;
pub const UPPER_LOWER_HIGH: f64 = 2.0;
pub const UPPER_LOWER_LOW: f64 = 0.5;
pub const CORE_SHARE_MIN_PCT: f64 = 5.0;
pub const MAJOR_GROUP_SHARE_MIN_PCT: f64 = 10.0;

/// A ratio whose denominator may be zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Ratio {
    Defined { value: f64 },
    /// The denominator was zero.
    Undefined,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator > 0.0 {
            Ratio::Defined {
                value: numerator / denominator,
            }
        } else {
            Ratio::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Defined { value } => Some(value),
            Ratio::Undefined => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Recommendation {
    pub issue: String,
    pub suggestion: String,
    pub severity: Severity,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GroupVolume {
    pub muscle_group: MuscleGroup,
    pub volume: f64,
    pub sets: usize,
    pub share_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct CategoryVolume {
    pub category: MovementCategory,
    pub volume: f64,
    pub sets: usize,
    pub share_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct BucketBalance {
    pub bucket: String,
    pub start: NaiveDate,
    pub total_volume: f64,
    pub by_muscle_group: Vec<GroupVolume>,
    pub by_category: Vec<CategoryVolume>,
    pub push_pull_ratio: Ratio,
}

/// How often a muscle group is trained.
#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GroupFrequency {
    pub muscle_group: MuscleGroup,
    /// Distinct dates with at least one set for the group.
    pub training_days: usize,
    pub sessions: usize,
    pub last_trained: NaiveDate,
    /// Training days per week over the whole selection.
    pub days_per_week: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct BalanceView {
    pub total_volume: f64,
    pub by_muscle_group: Vec<GroupVolume>,
    pub by_category: Vec<CategoryVolume>,
    pub per_bucket: Vec<BucketBalance>,
    /// Push volume over pull volume.
    pub push_pull_ratio: Ratio,
    /// Upper-body volume over lower-body volume.
    pub upper_lower_ratio: Ratio,
    pub recommendations: Vec<Recommendation>,
    pub is_balanced: bool,
    /// Most frequently trained first.
    pub frequency: Vec<GroupFrequency>,
}

#[derive(Default)]
struct Totals {
    total: f64,
    groups: BTreeMap<MuscleGroup, (f64, usize)>,
    categories: BTreeMap<MovementCategory, (f64, usize)>,
    upper: f64,
    lower: f64,
}

impl Totals {
    fn add(&mut self, rec: &EnrichedSetRecord) {
        let v = rec.record.volume;
        self.total += v;
        let g = self.groups.entry(rec.muscle_group).or_default();
        g.0 += v;
        g.1 += 1;
        let c = self.categories.entry(rec.movement_category).or_default();
        c.0 += v;
        c.1 += 1;
        match rec.body_region {
            Some(BodyRegion::Upper) => self.upper += v,
            Some(BodyRegion::Lower) => self.lower += v,
            _ => {}
        }
    }

    fn category_volume(&self, category: MovementCategory) -> f64 {
        self.categories.get(&category).map_or(0.0, |c| c.0)
    }

    fn group_share(&self, group: MuscleGroup) -> Option<f64> {
        self.groups.get(&group).map(|g| share_pct(g.0, self.total))
    }

    fn push_pull(&self) -> Ratio {
        Ratio::of(
            self.category_volume(MovementCategory::Push),
            self.category_volume(MovementCategory::Pull),
        )
    }

    fn by_group(&self) -> Vec<GroupVolume> {
        self.groups
            .iter()
            .map(|(group, (volume, sets))| GroupVolume {
                muscle_group: *group,
                volume: *volume,
                sets: *sets,
                share_pct: share_pct(*volume, self.total),
            })
            .collect()
    }

    fn by_category(&self) -> Vec<CategoryVolume> {
        self.categories
            .iter()
            .map(|(category, (volume, sets))| CategoryVolume {
                category: *category,
                volume: *volume,
                sets: *sets,
                share_pct: share_pct(*volume, self.total),
            })
            .collect()
    }
}

fn recommend(totals: &Totals, push_pull: Ratio, upper_lower: Ratio) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if totals.total <= 0.0 {
        return out;
    }

    if let Some(r) = push_pull.value() {
        if r > PUSH_PULL_HIGH {
            out.push(Recommendation {
                issue: "Push volume is significantly higher than pull volume".into(),
                suggestion: "Add more back and rowing work to balance the routine".into(),
                severity: if r < 1.6 { Severity::Moderate } else { Severity::High },
            });
        } else if r < PUSH_PULL_LOW {
            out.push(Recommendation {
                issue: "Pull volume is significantly higher than push volume".into(),
                suggestion: "Add more chest and shoulder pressing to balance the routine".into(),
                severity: if r > 0.4 { Severity::Moderate } else { Severity::High },
            });
        }
    }

    if let Some(r) = upper_lower.value() {
        if r > UPPER_LOWER_HIGH {
            out.push(Recommendation {
                issue: "Upper-body volume is much higher than lower-body volume".into(),
                suggestion: "Add more leg exercises".into(),
                severity: if r < 3.0 { Severity::Moderate } else { Severity::High },
            });
        } else if r < UPPER_LOWER_LOW {
            out.push(Recommendation {
                issue: "Lower-body volume is much higher than upper-body volume".into(),
                suggestion: "Add more upper-body exercises".into(),
                severity: if r > 0.3 { Severity::Moderate } else { Severity::High },
            });
        }
    }

    if let Some(share) = totals.group_share(MuscleGroup::Core)
        && share < CORE_SHARE_MIN_PCT
    {
        out.push(Recommendation {
            issue: format!("Core training volume is low ({share:.1}% of total)"),
            suggestion: "Add dedicated core exercises".into(),
            severity: Severity::Low,
        });
    }

    for group in [MuscleGroup::Back, MuscleGroup::Shoulders, MuscleGroup::Legs] {
        if let Some(share) = totals.group_share(group)
            && share < MAJOR_GROUP_SHARE_MIN_PCT
        {
            out.push(Recommendation {
                issue: format!(
                    "{group} volume is low relative to other groups ({share:.1}% of total)"
                ),
                suggestion: format!("Add more {group} exercises"),
                severity: Severity::Moderate,
            });
        }
    }
    out
}

/// Distinct training days and sessions per muscle group.
pub fn frequency(records: &[&EnrichedSetRecord]) -> Vec<GroupFrequency> {
    let mut days: BTreeMap<MuscleGroup, BTreeSet<NaiveDate>> = BTreeMap::new();
    let mut sessions: BTreeMap<MuscleGroup, BTreeSet<_>> = BTreeMap::new();
    for &rec in records {
        days.entry(rec.muscle_group).or_default().insert(rec.date());
        sessions.entry(rec.muscle_group).or_default().insert(session_key(rec));
    }
    let first = records.iter().map(|r| r.date()).min();
    let last = records.iter().map(|r| r.date()).max();
    let span_days = first.zip(last).map_or(1, |(a, b)| (b - a).num_days() + 1);
    let weeks = (span_days as f64 / 7.0).max(1.0);

    let mut out: Vec<GroupFrequency> = days
        .into_iter()
        .filter_map(|(muscle_group, dates)| {
            Some(GroupFrequency {
                muscle_group,
                training_days: dates.len(),
                sessions: sessions.get(&muscle_group).map_or(0, BTreeSet::len),
                last_trained: *dates.last()?,
                days_per_week: dates.len() as f64 / weeks,
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.training_days
            .cmp(&a.training_days)
            .then_with(|| a.muscle_group.cmp(&b.muscle_group))
    });
    out
}

pub fn build(records: &[&EnrichedSetRecord], bucket: TimeBucket) -> BalanceView {
    let mut overall = Totals::default();
    let mut buckets: BTreeMap<String, (NaiveDate, Totals)> = BTreeMap::new();
    for rec in records {
        overall.add(rec);
        buckets
            .entry(bucket.label(rec.date()))
            .or_insert_with(|| (bucket.start(rec.date()), Totals::default()))
            .1
            .add(rec);
    }

    let push_pull_ratio = overall.push_pull();
    let upper_lower_ratio = Ratio::of(overall.upper, overall.lower);
    let recommendations = recommend(&overall, push_pull_ratio, upper_lower_ratio);

    BalanceView {
        total_volume: overall.total,
        by_muscle_group: overall.by_group(),
        by_category: overall.by_category(),
        per_bucket: buckets
            .into_iter()
            .map(|(label, (start, totals))| BucketBalance {
                bucket: label,
                start,
                total_volume: totals.total,
                by_muscle_group: totals.by_group(),
                by_category: totals.by_category(),
                push_pull_ratio: totals.push_pull(),
            })
            .collect(),
        push_pull_ratio,
        upper_lower_ratio,
        is_balanced: recommendations.is_empty(),
        recommendations,
        frequency: frequency(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::*;

    #[test]
    fn push_pull_undefined_without_pull_volume() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 100.0, 5.0),
            set("1", "2024-01-01", "Overhead Press", 50.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week);
        assert_eq!(view.push_pull_ratio, Ratio::Undefined);
        assert_eq!(view.upper_lower_ratio, Ratio::Undefined);
        let json = serde_json::to_value(view.push_pull_ratio).unwrap();
        assert_eq!(json["state"], "undefined");
    }

    #[test]
    fn ratios_and_shares() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 100.0, 10.0),
            set("1", "2024-01-01", "Barbell Row", 100.0, 5.0),
            set("2", "2024-01-03", "Squat", 100.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week);
        assert_eq!(view.total_volume, 2000.0);
        assert_eq!(view.push_pull_ratio, Ratio::Defined { value: 2.0 });
        assert_eq!(view.upper_lower_ratio, Ratio::Defined { value: 3.0 });
        let chest = &view.by_muscle_group[0];
        assert_eq!(chest.muscle_group, MuscleGroup::Chest);
        assert_eq!(chest.share_pct, 50.0);
        assert!(!view.is_balanced);
        assert!(
            view.recommendations
                .iter()
                .any(|r| r.issue.starts_with("Push volume") && r.severity == Severity::High)
        );
        assert!(
            view.recommendations
                .iter()
                .any(|r| r.issue.starts_with("Upper-body") && r.severity == Severity::High)
        );
    }

    #[test]
    fn balanced_routine_has_no_recommendations() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 100.0, 5.0),
            set("1", "2024-01-01", "Overhead Press", 100.0, 5.0),
            set("1", "2024-01-01", "Barbell Row", 100.0, 5.0),
            set("1", "2024-01-01", "Lat Pulldown", 100.0, 5.0),
            set("2", "2024-01-02", "Squat", 150.0, 5.0),
            set("2", "2024-01-02", "Leg Press", 150.0, 5.0),
            set("2", "2024-01-02", "Cable Crunch", 50.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Week);
        assert_eq!(view.push_pull_ratio.value(), Some(1.0));
        assert!(view.is_balanced, "{:?}", view.recommendations);
    }

    #[test]
    fn per_bucket_split() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 100.0, 5.0),
            set("2", "2024-02-01", "Barbell Row", 100.0, 5.0),
        ];
        let view = build(&refs(&records), TimeBucket::Month);
        assert_eq!(view.per_bucket.len(), 2);
        assert_eq!(view.per_bucket[0].bucket, "2024-01");
        assert_eq!(view.per_bucket[0].push_pull_ratio, Ratio::Undefined);
        assert_eq!(view.per_bucket[1].push_pull_ratio, Ratio::Defined { value: 0.0 });
    }

    #[test]
    fn frequency_counts_distinct_days_per_group() {
        let records = vec![
            set("1", "2024-01-01", "Bench Press", 100.0, 5.0),
            set("1", "2024-01-01", "Incline Bench Press", 80.0, 5.0),
            set("2", "2024-01-01", "Bench Press", 60.0, 12.0),
            set("3", "2024-01-04", "Bench Press", 100.0, 5.0),
            set("4", "2024-01-14", "Squat", 120.0, 5.0),
        ];
        let freq = frequency(&refs(&records));
        assert_eq!(freq.len(), 2);
        assert_eq!(freq[0].muscle_group, MuscleGroup::Chest);
        assert_eq!(freq[0].training_days, 2);
        assert_eq!(freq[0].sessions, 3);
        assert_eq!(freq[0].last_trained, date("2024-01-04"));
        assert_eq!(freq[0].days_per_week, 1.0);
        assert_eq!(freq[1].muscle_group, MuscleGroup::Legs);
        assert_eq!(freq[1].training_days, 1);

        let view = build(&refs(&records), TimeBucket::Week);
        assert_eq!(view.frequency, freq);
    }
}
