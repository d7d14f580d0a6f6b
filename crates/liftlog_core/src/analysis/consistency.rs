use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::Serialize;

use super::sessions;
use crate::enrich::EnrichedSetRecord;
use crate::filter::TimeBucket;
use crate::normalize::Weekday;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Streak {
    /// Number of training days in the run.
    pub days: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DayIndicator {
    pub date: NaiveDate,
    pub sessions: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct WeekdayCount {
    pub weekday: Weekday,
    pub sessions: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct MonthCount {
    /// 1 = January.
    pub month: u32,
    pub sessions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BucketSessions {
    pub bucket: String,
    pub start: NaiveDate,
    pub sessions: usize,
    pub training_days: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ConsistencyView {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub total_sessions: usize,
    pub training_days: usize,
    pub max_gap_days: u32,
    pub longest_streak: Streak,
    /// The run that ends on the last training day.
    pub current_streak: Streak,
    /// One entry per calendar day from first to last training day.
    pub daily: Vec<DayIndicator>,
    /// Monday first, always seven entries.
    pub by_weekday: Vec<WeekdayCount>,
    /// January first, always twelve entries.
    pub by_month: Vec<MonthCount>,
    pub per_bucket: Vec<BucketSessions>,
    pub avg_sessions_per_week: f64,
    /// Rest days between consecutive training days.
    pub avg_rest_days: Option<f64>,
    pub longest_rest_days: Option<i64>,
}

/// Split ascending distinct dates into runs where consecutive dates are at
/// most `max_gap_days` apart.
pub fn streaks(dates: &[NaiveDate], max_gap_days: u32) -> Vec<Streak> {
    let mut out = Vec::new();
    let Some(&first) = dates.first() else {
        return out;
    };
    let mut current = Streak {
        days: 1,
        start: first,
        end: first,
    };
    for pair in dates.windows(2) {
        let gap = (pair[1] - pair[0]).num_days();
        if gap <= i64::from(max_gap_days) {
            current.days += 1;
            current.end = pair[1];
        } else {
            out.push(current);
            current = Streak {
                days: 1,
                start: pair[1],
                end: pair[1],
            };
        }
    }
    out.push(current);
    out
}

/// Longest of `runs`; the earliest wins ties.
pub fn longest_streak(runs: &[Streak]) -> Option<Streak> {
    runs.iter()
        .copied()
        .reduce(|best, s| if s.days > best.days { s } else { best })
}

/// Callers pass a non-empty record list.
pub fn build(
    records: &[&EnrichedSetRecord],
    bucket: TimeBucket,
    max_gap_days: u32,
) -> ConsistencyView {
    let sessions = sessions(records);
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for (date, _) in &sessions {
        *per_day.entry(*date).or_default() += 1;
    }
    let dates: Vec<NaiveDate> = per_day.keys().copied().collect();

    let runs = streaks(&dates, max_gap_days);
    let fallback = Streak {
        days: 0,
        start: NaiveDate::MIN,
        end: NaiveDate::MIN,
    };
    let longest = longest_streak(&runs).unwrap_or(fallback);
    let current = runs.last().copied().unwrap_or(fallback);

    let first_date = dates.first().copied().unwrap_or(NaiveDate::MIN);
    let last_date = dates.last().copied().unwrap_or(NaiveDate::MIN);

    let daily = first_date
        .iter_days()
        .take_while(|d| *d <= last_date)
        .map(|date| DayIndicator {
            date,
            sessions: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect();

    let mut weekday_counts = [0usize; 7];
    let mut month_counts = [0usize; 12];
    let mut buckets: BTreeMap<String, (NaiveDate, usize, BTreeSet<NaiveDate>)> = BTreeMap::new();
    for (date, _) in &sessions {
        weekday_counts[Weekday::from(date.weekday()).index()] += 1;
        month_counts[date.month0() as usize] += 1;
        let entry = buckets
            .entry(bucket.label(*date))
            .or_insert_with(|| (bucket.start(*date), 0, BTreeSet::new()));
        entry.1 += 1;
        entry.2.insert(*date);
    }

    let rest_gaps: Vec<i64> = dates
        .windows(2)
        .map(|p| (p[1] - p[0]).num_days() - 1)
        .collect();
    let avg_rest_days = (!rest_gaps.is_empty())
        .then(|| rest_gaps.iter().sum::<i64>() as f64 / rest_gaps.len() as f64);

    let span_days = (last_date - first_date).num_days() + 1;
    let weeks = (span_days as f64 / 7.0).max(1.0);

    ConsistencyView {
        first_date,
        last_date,
        total_sessions: sessions.len(),
        training_days: dates.len(),
        max_gap_days,
        longest_streak: longest,
        current_streak: current,
        daily,
        by_weekday: Weekday::ALL
            .iter()
            .map(|w| WeekdayCount {
                weekday: *w,
                sessions: weekday_counts[w.index()],
            })
            .collect(),
        by_month: (1..=12u32)
            .map(|month| MonthCount {
                month,
                sessions: month_counts[(month - 1) as usize],
            })
            .collect(),
        per_bucket: buckets
            .into_iter()
            .map(|(label, (start, sessions, days))| BucketSessions {
                bucket: label,
                start,
                sessions,
                training_days: days.len(),
            })
            .collect(),
        avg_sessions_per_week: sessions.len() as f64 / weeks,
        avg_rest_days,
        longest_rest_days: rest_gaps.iter().copied().max(),
    }
}
