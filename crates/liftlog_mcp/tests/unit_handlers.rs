use liftlog_core::{AnalysisRequest, MuscleGroup, TimeBucket};
use liftlog_mcp::{AnalysisParams, McpError, PersonalRecordsParams, WorkoutsParams};

#[test]
fn analysis_params_deserialize_from_tool_arguments() {
    let args = serde_json::json!({
        "bucket": "month",
        "start_date": "2024-01-01",
        "muscle_groups": ["chest", "back"],
        "exercises": ["bench"],
        "min_reps": 3
    });
    let params: AnalysisParams = serde_json::from_value(args).expect("params");
    let request = params
        .into_request(AnalysisRequest::default())
        .expect("request");
    assert_eq!(request.bucket, TimeBucket::Month);
    assert_eq!(request.filter.muscle_groups, vec![MuscleGroup::Chest, MuscleGroup::Back]);
    assert_eq!(request.filter.exercises, vec!["bench".to_string()]);
    assert_eq!(request.filter.min_reps, Some(3.0));
    assert_eq!(
        request.filter.date_range.start.map(|d| d.to_string()),
        Some("2024-01-01".to_string())
    );
    assert!(request.filter.date_range.end.is_none());
}

#[test]
fn empty_arguments_keep_defaults() {
    let params: AnalysisParams = serde_json::from_value(serde_json::json!({})).expect("params");
    let defaults = AnalysisRequest {
        max_gap_days: 3,
        ..Default::default()
    };
    let request = params.into_request(defaults.clone()).expect("request");
    assert_eq!(request, defaults);
}

#[test]
fn workouts_params_flatten_analysis_fields() {
    let params: WorkoutsParams =
        serde_json::from_value(serde_json::json!({ "bucket": "year", "limit": 5 }))
            .expect("params");
    assert_eq!(params.limit, Some(5));
    assert_eq!(params.analysis.bucket, Some(TimeBucket::Year));
}

#[test]
fn records_params_take_recent_days_next_to_filters() {
    let params: PersonalRecordsParams = serde_json::from_value(serde_json::json!({
        "recent_days": 30,
        "muscle_groups": ["legs"]
    }))
    .expect("params");
    assert_eq!(params.recent_days, Some(30));
    assert_eq!(params.analysis.muscle_groups, Some(vec![MuscleGroup::Legs]));
}

#[test]
fn invalid_bounds_are_validation_errors() {
    let params = AnalysisParams {
        min_weight: Some(100.0),
        max_weight: Some(50.0),
        ..Default::default()
    };
    let err = params.into_request(AnalysisRequest::default()).unwrap_err();
    assert!(matches!(err, McpError::Validation(_)));

    let params = AnalysisParams {
        plateau_window: Some(1),
        ..Default::default()
    };
    assert!(params.into_request(AnalysisRequest::default()).is_err());
}

#[test]
fn unknown_muscle_group_is_rejected_by_serde() {
    let res: Result<AnalysisParams, _> =
        serde_json::from_value(serde_json::json!({ "muscle_groups": ["wings"] }));
    assert!(res.is_err());
}
