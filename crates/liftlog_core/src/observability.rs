//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding binary installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

pub const ROWS_PARSED: &str = "liftlog_rows_parsed_total";
pub const ROWS_DROPPED: &str = "liftlog_rows_dropped_total";
pub const MAPPING_MISSES: &str = "liftlog_mapping_misses_total";
pub const CACHE_HITS: &str = "liftlog_cache_hits_total";
pub const CACHE_MISSES: &str = "liftlog_cache_misses_total";
pub const PIPELINE_DURATION: &str = "liftlog_pipeline_duration_seconds";

pub fn record_rows(parsed: usize, dropped: usize) {
    counter!(ROWS_PARSED).increment(parsed as u64);
    counter!(ROWS_DROPPED).increment(dropped as u64);
}

pub fn record_mapping_misses(distinct: usize) {
    counter!(MAPPING_MISSES).increment(distinct as u64);
}

/// `scope` is `"export"` for whole loads and `"report"` for analysis results.
pub fn record_cache(hit: bool, scope: &'static str) {
    if hit {
        counter!(CACHE_HITS, "scope" => scope).increment(1);
    } else {
        counter!(CACHE_MISSES, "scope" => scope).increment(1);
    }
}

pub fn record_pipeline_duration(stage: &'static str, elapsed: Duration) {
    histogram!(PIPELINE_DURATION, "stage" => stage).record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_rows(10, 2);
        record_mapping_misses(1);
        record_cache(true, "export");
        record_cache(false, "report");
        record_pipeline_duration("load", Duration::from_millis(3));
    }

    #[test]
    fn metric_names_are_prometheus_safe() {
        for name in [
            ROWS_PARSED,
            ROWS_DROPPED,
            MAPPING_MISSES,
            CACHE_HITS,
            CACHE_MISSES,
            PIPELINE_DURATION,
        ] {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
