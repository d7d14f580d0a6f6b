use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rmcp::Json;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    AnnotateAble, GetPromptRequestParams, GetPromptResult, ListPromptsResult, ListResourcesResult,
    PaginatedRequestParams, RawResource, ReadResourceRequestParams, ReadResourceResult,
    ResourceContents,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer};
use rmcp::{prompt, prompt_handler, prompt_router, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use liftlog_core::analysis::{
    BalanceView, ConsistencyView, IntensityView, Overview, ProgressView, RecordBook, VarietyView,
    WorkoutSummary,
};
use liftlog_core::diagnostics::{DiagnosticsSummary, RowDiagnostic};
use liftlog_core::mapping::MappingMatch;
use liftlog_core::pipeline::LoadSummary;
use liftlog_core::utils::parse_iso_date;
use liftlog_core::{
    AnalysisRequest, AnalyticsReport, DateRange, MappingMiss, MuscleGroup, Pipeline, RecordFilter,
    TimeBucket,
};

pub mod error;
mod prompts;
pub mod state;

pub use error::{McpError, McpResult};
pub use state::SessionState;

pub const MAPPING_RESOURCE_URI: &str = "liftlog://mapping";
const DEFAULT_DIAGNOSTICS_LIMIT: usize = 100;

#[derive(Clone)]
pub struct LiftlogMcpHandler {
    state: SessionState,
    metrics: Option<PrometheusHandle>,
    tool_router: rmcp::handler::server::tool::ToolRouter<LiftlogMcpHandler>,
    prompt_router: rmcp::handler::server::router::prompt::PromptRouter<LiftlogMcpHandler>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct LoadExportParams {
    /// Path to the export file. Defaults to LIFTLOG_EXPORT_PATH when neither
    /// path nor content is given.
    pub path: Option<String>,
    /// Raw export text, as an alternative to `path`.
    pub content: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LoadExportResult {
    pub cache_hit: bool,
    pub summary: LoadSummary,
    pub mapping_misses: Vec<MappingMiss>,
}

/// Filters and parameters shared by every analysis tool.
#[derive(Debug, Default, Clone, Deserialize, Serialize, JsonSchema)]
pub struct AnalysisParams {
    /// Period used for per-bucket series: day, week (default), month or year.
    pub bucket: Option<TimeBucket>,
    /// Inclusive start date, YYYY-MM-DD.
    pub start_date: Option<String>,
    /// Inclusive end date, YYYY-MM-DD.
    pub end_date: Option<String>,
    pub muscle_groups: Option<Vec<MuscleGroup>>,
    /// Case-insensitive fragments of exercise names.
    pub exercises: Option<Vec<String>>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub min_reps: Option<f64>,
    pub max_reps: Option<f64>,
    /// Largest gap in days that still continues a streak.
    pub max_gap_days: Option<u32>,
    /// Sessions without a new best weight before a plateau is reported.
    pub plateau_window: Option<usize>,
}

fn parse_date(field: &str, raw: Option<&str>) -> McpResult<Option<NaiveDate>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_iso_date(s).ok_or_else(|| {
                McpError::Validation(format!("{field} must be YYYY-MM-DD, got {s:?}"))
            })
        })
        .transpose()
}

impl AnalysisParams {
    /// Merge onto `defaults`, validating dates and bounds.
    pub fn into_request(self, defaults: AnalysisRequest) -> McpResult<AnalysisRequest> {
        let start = parse_date("start_date", self.start_date.as_deref())?;
        let end = parse_date("end_date", self.end_date.as_deref())?;
        let date_range =
            DateRange::new(start, end).map_err(|e| McpError::Validation(e.to_string()))?;
        let request = AnalysisRequest {
            bucket: self.bucket.unwrap_or(defaults.bucket),
            filter: RecordFilter {
                date_range,
                muscle_groups: self.muscle_groups.unwrap_or_default(),
                exercises: self.exercises.unwrap_or_default(),
                min_weight: self.min_weight,
                max_weight: self.max_weight,
                min_reps: self.min_reps,
                max_reps: self.max_reps,
            },
            max_gap_days: self.max_gap_days.unwrap_or(defaults.max_gap_days),
            plateau_window: self.plateau_window.unwrap_or(defaults.plateau_window),
        };
        request
            .validate()
            .map_err(|e| McpError::Validation(e.to_string()))?;
        Ok(request)
    }
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct WorkoutsParams {
    #[serde(flatten)]
    pub analysis: AnalysisParams,
    /// Only the most recent N sessions.
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct PersonalRecordsParams {
    #[serde(flatten)]
    pub analysis: AnalysisParams,
    /// Only records set within this many days of the last training day.
    pub recent_days: Option<u32>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PersonalRecordsResult {
    /// Earliest date a record may carry when `recent_days` is given.
    pub since: Option<NaiveDate>,
    pub records: RecordBook,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct WorkoutsResult {
    pub total: usize,
    pub workouts: Vec<WorkoutSummary>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct DiagnosticsParams {
    /// Maximum number of skipped rows to list (default 100).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DiagnosticsResult {
    pub content_hash: String,
    pub rows_read: usize,
    pub valid_records: usize,
    pub summary: DiagnosticsSummary,
    pub rows: Vec<RowDiagnostic>,
    pub truncated: bool,
    pub mapping_misses: Vec<MappingMiss>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ClassifyParams {
    /// Exercise name as written in the export.
    pub name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ClassifyResult {
    pub exercise: String,
    pub mapping_version: String,
    pub classification: MappingMatch,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct MetricsResult {
    pub content_hash: Option<String>,
    pub cached_reports: usize,
    /// Prometheus text exposition, when a recorder is installed.
    pub prometheus: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct TrainingReviewParams {
    pub bucket: Option<TimeBucket>,
    /// Exercise or goal to emphasise.
    pub focus: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct BalanceCheckParams {
    pub bucket: Option<TimeBucket>,
}

#[tool_router]
#[prompt_router]
impl LiftlogMcpHandler {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            state: SessionState::new(pipeline),
            metrics: None,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    /// Expose the installed Prometheus recorder through `get_pipeline_metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_router.list_all().len()
    }

    pub async fn load(&self, params: LoadExportParams) -> McpResult<LoadExportResult> {
        let loaded = match (params.path, params.content) {
            (Some(_), Some(_)) => {
                return Err(McpError::Validation(
                    "pass either path or content, not both".into(),
                ));
            }
            (None, Some(content)) => self.state.load_bytes(content.into_bytes()).await?,
            (Some(path), None) => self.state.load_path(PathBuf::from(path)).await?,
            (None, None) => {
                let path = self.state.pipeline().config().export_path.clone().ok_or_else(|| {
                    McpError::Validation(
                        "no path or content given and LIFTLOG_EXPORT_PATH is not set".into(),
                    )
                })?;
                self.state.load_path(path).await?
            }
        };
        Ok(LoadExportResult {
            cache_hit: loaded.cache_hit,
            summary: loaded.export.summary.clone(),
            mapping_misses: loaded.export.mapping_misses.clone(),
        })
    }

    pub async fn analysis(&self, params: AnalysisParams) -> McpResult<Arc<AnalyticsReport>> {
        let request = params.into_request(self.state.pipeline().default_request())?;
        let (_, report) = self.state.report(request).await?;
        Ok(report)
    }

    pub async fn records(&self, params: PersonalRecordsParams) -> McpResult<PersonalRecordsResult> {
        let report = self.analysis(params.analysis).await?;
        Ok(match params.recent_days {
            Some(days) => {
                let reference = report.consistency.last_date;
                PersonalRecordsResult {
                    since: reference.checked_sub_days(chrono::Days::new(u64::from(days))),
                    records: report.records.recent(days, reference),
                }
            }
            None => PersonalRecordsResult {
                since: None,
                records: report.records.clone(),
            },
        })
    }

    pub async fn diagnostics(&self, limit: Option<usize>) -> McpResult<DiagnosticsResult> {
        let export = self.state.current().await?;
        let limit = limit.unwrap_or(DEFAULT_DIAGNOSTICS_LIMIT);
        Ok(DiagnosticsResult {
            content_hash: export.content_hash().to_string(),
            rows_read: export.summary.rows_read,
            valid_records: export.summary.valid_records,
            summary: export.summary.diagnostics.clone(),
            rows: export.diagnostics.iter().take(limit).cloned().collect(),
            truncated: export.diagnostics.len() > limit,
            mapping_misses: export.mapping_misses.clone(),
        })
    }

    pub fn classify(&self, name: &str) -> McpResult<ClassifyResult> {
        if name.trim().is_empty() {
            return Err(McpError::Validation("name must not be empty".into()));
        }
        let mapping = self.state.pipeline().mapping();
        Ok(ClassifyResult {
            exercise: name.to_string(),
            mapping_version: mapping.version().to_string(),
            classification: mapping.lookup(name),
        })
    }

    pub async fn pipeline_metrics(&self) -> MetricsResult {
        let status = self.state.cache_status().await;
        MetricsResult {
            content_hash: status.content_hash,
            cached_reports: status.cached_reports,
            prometheus: self.metrics.as_ref().map(PrometheusHandle::render),
        }
    }

    #[tool(
        name = "load_export",
        description = "Load an export (path or content); unchanged content is served from cache"
    )]
    async fn load_export(
        &self,
        params: Parameters<LoadExportParams>,
    ) -> Result<Json<LoadExportResult>, String> {
        Ok(Json(self.load(params.0).await?))
    }

    #[tool(
        name = "get_overview",
        description = "Headline totals: sessions, sets, volume, span, PR count, longest streak"
    )]
    async fn get_overview(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<Overview>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.overview.clone()))
    }

    #[tool(
        name = "get_consistency",
        description = "Training days, streaks, rest days, weekday and month histograms"
    )]
    async fn get_consistency(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<ConsistencyView>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.consistency.clone()))
    }

    #[tool(
        name = "get_balance",
        description = "Muscle-group volume, push/pull and upper/lower ratios, recommendations"
    )]
    async fn get_balance(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<BalanceView>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.balance.clone()))
    }

    #[tool(
        name = "get_progress",
        description = "Per-exercise progression, PR events, plateaus and most improved exercises"
    )]
    async fn get_progress(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<ProgressView>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.progress.clone()))
    }

    #[tool(
        name = "get_personal_records",
        description = "Weight, 1RM, rep and volume records per exercise, muscle group and overall"
    )]
    async fn get_personal_records(
        &self,
        params: Parameters<PersonalRecordsParams>,
    ) -> Result<Json<PersonalRecordsResult>, String> {
        Ok(Json(self.records(params.0).await?))
    }

    #[tool(
        name = "get_intensity",
        description = "Average RPE, load as a percentage of 1RM and volume per rep range"
    )]
    async fn get_intensity(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<IntensityView>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.intensity.clone()))
    }

    #[tool(
        name = "get_variety",
        description = "Distinct exercises per period, new exercises and the most used ones"
    )]
    async fn get_variety(
        &self,
        params: Parameters<AnalysisParams>,
    ) -> Result<Json<VarietyView>, String> {
        let report = self.analysis(params.0).await?;
        Ok(Json(report.variety.clone()))
    }

    #[tool(
        name = "get_workouts",
        description = "Per-session summaries with workout type classification"
    )]
    async fn get_workouts(
        &self,
        params: Parameters<WorkoutsParams>,
    ) -> Result<Json<WorkoutsResult>, String> {
        let p = params.0;
        let report = self.analysis(p.analysis).await?;
        let total = report.workouts.len();
        let skip = p.limit.map_or(0, |n| total.saturating_sub(n));
        Ok(Json(WorkoutsResult {
            total,
            workouts: report.workouts[skip..].to_vec(),
        }))
    }

    #[tool(
        name = "get_diagnostics",
        description = "Skipped rows with their reason, and exercises without a mapping"
    )]
    async fn get_diagnostics(
        &self,
        params: Parameters<DiagnosticsParams>,
    ) -> Result<Json<DiagnosticsResult>, String> {
        Ok(Json(self.diagnostics(params.0.limit).await?))
    }

    #[tool(
        name = "classify_exercise",
        description = "Show how an exercise name maps to a muscle group and movement category"
    )]
    async fn classify_exercise(
        &self,
        params: Parameters<ClassifyParams>,
    ) -> Result<Json<ClassifyResult>, String> {
        Ok(Json(self.classify(&params.0.name)?))
    }

    #[tool(
        name = "get_pipeline_metrics",
        description = "Cache state and pipeline counters in Prometheus text format"
    )]
    async fn get_pipeline_metrics(&self) -> Result<Json<MetricsResult>, String> {
        Ok(Json(self.pipeline_metrics().await))
    }

    // === MCP Prompts ===

    /// Periodic review of volume, consistency, progress and variety
    #[prompt(
        name = "training-review",
        description = "Review training volume, consistency, progress and variety"
    )]
    async fn training_review(&self, params: Parameters<TrainingReviewParams>) -> GetPromptResult {
        let bucket = params.0.bucket.unwrap_or_default();
        prompts::training_review_prompt(bucket.as_str(), params.0.focus.as_deref())
    }

    #[prompt(
        name = "balance-check",
        description = "Check muscle-group balance and get corrective suggestions"
    )]
    async fn balance_check(&self, params: Parameters<BalanceCheckParams>) -> GetPromptResult {
        let bucket = params.0.bucket.unwrap_or(TimeBucket::Month);
        prompts::balance_check_prompt(bucket.as_str())
    }
}

#[tool_handler]
#[prompt_handler(router = self.prompt_router)]
impl rmcp::ServerHandler for LiftlogMcpHandler {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo::new(
            rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
        )
        .with_instructions(
            "liftlog MCP server - analyzes strength-training log exports. \
             Call load_export first, then query overview, consistency, balance, \
             progress, personal records, variety and workouts.",
        )
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut res = RawResource::new(MAPPING_RESOURCE_URI, "Exercise Mapping").no_annotation();
        res.description = Some(format!(
            "Active exercise to muscle-group mapping table (version {})",
            self.state.pipeline().mapping().version()
        ));
        res.mime_type = Some("application/json".to_string());

        Ok(ListResourcesResult {
            resources: vec![res],
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        if request.uri != MAPPING_RESOURCE_URI {
            return Err(ErrorData::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ));
        }
        let text = serde_json::to_string_pretty(self.state.pipeline().mapping().table())
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(ReadResourceResult::new(vec![
            ResourceContents::TextResourceContents {
                uri: request.uri.clone(),
                mime_type: Some("application/json".to_string()),
                text,
                meta: None,
            },
        ]))
    }
}
