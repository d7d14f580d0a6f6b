use std::path::PathBuf;

use liftlog_core::analysis::progress::PrKind;
use liftlog_core::diagnostics::RowIssue;
use liftlog_core::parser::WeightUnit;
use liftlog_core::{
    AnalysisRequest, DateRange, ExportCache, LiftlogError, MuscleGroup, Pipeline, PipelineConfig,
    RecordFilter, TimeBucket,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn pipeline() -> Pipeline {
    Pipeline::from_config(PipelineConfig::default()).expect("pipeline")
}

#[test]
fn strong_export_loads_with_row_diagnostics() {
    let export = pipeline()
        .load_path(&fixture("strong_export.csv"))
        .expect("load");
    let s = &export.summary;
    assert_eq!(s.rows_read, 13);
    assert_eq!(s.rest_timer_rows, 1);
    assert_eq!(s.records, 11);
    assert_eq!(s.valid_records, 10);
    assert_eq!(s.skipped_rows, 2);
    assert_eq!(s.weight_unit, WeightUnit::Kilograms);

    assert_eq!(export.diagnostics.len(), 2);
    assert_eq!(export.diagnostics[0].row, 10);
    assert!(matches!(export.diagnostics[0].issue, RowIssue::InvalidDate { .. }));
    assert_eq!(export.diagnostics[1].row, 12);
    assert!(matches!(export.diagnostics[1].issue, RowIssue::NonNumeric { .. }));

    assert_eq!(export.mapping_misses.len(), 1);
    assert_eq!(export.mapping_misses[0].exercise, "Zumba");
}

#[test]
fn strong_export_views() {
    let p = pipeline();
    let export = p.load_path(&fixture("strong_export.csv")).expect("load");
    let report = p.analyze(&export, &p.default_request()).expect("report");

    let o = &report.overview;
    assert_eq!(o.total_workouts, 4);
    assert_eq!(o.total_sets, 10);
    assert!((o.total_volume - 4425.0).abs() < 1e-9);

    // Jan 1-3 consecutive, then Jan 5 after a one-day gap
    let c = &report.consistency;
    assert_eq!(c.longest_streak.days, 3);
    assert_eq!(c.longest_streak.start.to_string(), "2024-01-01");
    assert_eq!(c.current_streak.days, 1);
    assert_eq!(c.training_days, 4);

    // bench best weight per session: 100, 100, 105
    assert_eq!(report.progress.pr_events.len(), 1);
    let pr = &report.progress.pr_events[0];
    assert_eq!(pr.exercise, "Bench Press (Barbell)");
    assert_eq!(pr.date.to_string(), "2024-01-05");
    assert_eq!(pr.weight, Some(105.0));
    assert_eq!(pr.previous_best_weight, Some(100.0));
    assert!(pr.kinds.contains(&PrKind::Weight));
    assert!(pr.kinds.contains(&PrKind::EstimatedOneRm));

    let bench = report
        .records
        .exercises
        .iter()
        .find(|r| r.exercise == "Bench Press (Barbell)")
        .expect("bench record");
    assert_eq!(bench.muscle_group, MuscleGroup::Chest);
    assert_eq!(bench.best_weight.as_ref().map(|m| m.value), Some(105.0));
    // the warm-up set holds the rep and set-volume records
    assert_eq!(bench.max_reps.as_ref().map(|m| m.value), Some(10.0));
    assert_eq!(bench.max_volume_set.as_ref().map(|m| m.value), Some(600.0));
    let session = bench.max_volume_session.as_ref().expect("bench session");
    assert_eq!(session.value, 1100.0);
    assert_eq!(session.workout_id, "1");

    let overall = &report.records.overall;
    let heaviest = overall.best_weight.as_ref().expect("overall best");
    assert_eq!(heaviest.exercise, "Deadlift (Barbell)");
    assert_eq!(heaviest.value, 140.0);

    assert_eq!(report.workouts[0].warmup_sets, 1);

    // only one set carries an RPE
    assert_eq!(report.intensity.rpe_sets, 1);
    assert_eq!(report.intensity.avg_rpe, Some(8.0));
    assert_eq!(report.intensity.volume_by_rep_range.len(), 5);
}

#[test]
fn pound_exports_are_converted() {
    let p = pipeline();
    let export = p.load_path(&fixture("pounds_export.csv")).expect("load");
    assert_eq!(export.summary.weight_unit, WeightUnit::Pounds);
    let squat = export
        .records
        .iter()
        .find(|r| r.exercise() == "Squat (Barbell)")
        .expect("squat");
    let kg = squat.record.weight_kg.expect("weight");
    assert!((kg - 225.0 * 0.453_592_37).abs() < 1e-9);

    let request = AnalysisRequest {
        bucket: TimeBucket::Week,
        ..Default::default()
    };
    let report = p.analyze(&export, &request).expect("report");
    let labels: Vec<&str> = report
        .consistency
        .per_bucket
        .iter()
        .map(|b| b.bucket.as_str())
        .collect();
    assert_eq!(labels, vec!["2024-W10", "2024-W11"]);
    assert_eq!(report.progress.pr_events.len(), 1);
}

#[test]
fn missing_required_column_is_schema_error() {
    let err = pipeline()
        .load_path(&fixture("missing_reps.csv"))
        .expect_err("schema error");
    match err {
        LiftlogError::Schema { missing } => assert_eq!(missing, vec!["Reps".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn filters_narrow_every_view() {
    let p = pipeline();
    let export = p.load_path(&fixture("strong_export.csv")).expect("load");
    let request = AnalysisRequest {
        filter: RecordFilter {
            muscle_groups: vec![MuscleGroup::Chest],
            ..Default::default()
        },
        ..Default::default()
    };
    let report = p.analyze(&export, &request).expect("report");
    assert_eq!(report.overview.distinct_muscle_groups, 1);
    assert_eq!(report.overview.total_workouts, 3);
    assert!(
        report
            .balance
            .by_muscle_group
            .iter()
            .all(|g| g.muscle_group == MuscleGroup::Chest)
    );

    let empty = AnalysisRequest {
        filter: RecordFilter {
            date_range: DateRange::new(
                Some("2023-01-01".parse().unwrap()),
                Some("2023-12-31".parse().unwrap()),
            )
            .unwrap(),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(p.analyze(&export, &empty), Err(LiftlogError::EmptyResult)));
}

#[test]
fn identical_input_gives_identical_json() {
    let bytes = std::fs::read(fixture("strong_export.csv")).unwrap();
    let request = AnalysisRequest::default();
    let (_, a) = pipeline().run(&bytes, &request).unwrap();
    let (_, b) = pipeline().run(&bytes, &request).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn cache_hits_on_same_bytes_and_evicts_on_new() {
    let p = pipeline();
    let strong = std::fs::read(fixture("strong_export.csv")).unwrap();
    let pounds = std::fs::read(fixture("pounds_export.csv")).unwrap();
    let mut cache = ExportCache::new();

    assert!(!cache.load(&p, &strong).unwrap().cache_hit);
    assert!(cache.load(&p, &strong).unwrap().cache_hit);
    cache.report(&p, &AnalysisRequest::default()).unwrap();
    assert_eq!(cache.report_count(), 1);

    assert!(!cache.load(&p, &pounds).unwrap().cache_hit);
    assert_eq!(cache.report_count(), 0);
    assert_eq!(
        cache.current().unwrap().summary.weight_unit,
        WeightUnit::Pounds
    );
}
