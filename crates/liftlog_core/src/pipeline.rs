//! One pass from export bytes to analytic views.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::analysis::{self, AnalysisRequest, AnalyticsReport};
use crate::config::PipelineConfig;
use crate::diagnostics::{DiagnosticsSummary, RowDiagnostic};
use crate::enrich::{self, EnrichedSetRecord, MappingMiss};
use crate::mapping::MuscleGroupMapping;
use crate::normalize::{self, OneRmFormula};
use crate::parser::{self, Delimiter, WeightUnit};
use crate::{Result, observability};

/// Hex-encoded SHA-256 of the raw export.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct LoadSummary {
    pub content_hash: String,
    pub rows_read: usize,
    pub records: usize,
    pub valid_records: usize,
    pub skipped_rows: usize,
    pub rest_timer_rows: usize,
    pub delimiter: Delimiter,
    pub weight_unit: WeightUnit,
    pub one_rm_formula: OneRmFormula,
    pub columns: Vec<String>,
    pub mapping_version: String,
    pub distinct_exercises_unmapped: usize,
    pub diagnostics: DiagnosticsSummary,
}

/// Everything derived from one export, independent of any analysis request.
#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct LoadedExport {
    pub summary: LoadSummary,
    /// Every parsed row; invalid ones are flagged and skipped by analysis.
    pub records: Vec<EnrichedSetRecord>,
    /// Parse-time and validation failures, ordered by row.
    pub diagnostics: Vec<RowDiagnostic>,
    pub mapping_misses: Vec<MappingMiss>,
}

impl LoadedExport {
    pub fn content_hash(&self) -> &str {
        &self.summary.content_hash
    }
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    mapping: Arc<MuscleGroupMapping>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, mapping: Arc<MuscleGroupMapping>) -> Self {
        Self { config, mapping }
    }

    /// Build from configuration, reading the mapping file when one is named
    /// and falling back to the built-in table otherwise.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let mapping = match &config.mapping_path {
            Some(path) => MuscleGroupMapping::from_path(path)?,
            None => MuscleGroupMapping::builtin()?,
        };
        Ok(Self::new(config, Arc::new(mapping)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn mapping(&self) -> &Arc<MuscleGroupMapping> {
        &self.mapping
    }

    /// Analysis defaults taken from configuration.
    pub fn default_request(&self) -> AnalysisRequest {
        AnalysisRequest::from_config(&self.config)
    }

    /// Parse, normalize and enrich an export.
    pub fn load(&self, bytes: &[u8]) -> Result<LoadedExport> {
        let started = Instant::now();
        let content_hash = content_hash(bytes);

        let parsed = parser::parse_export(bytes, self.config.delimiter)?;
        let rows_read = parsed.rows_read;
        let rest_timer_rows = parsed.rest_timer_rows;
        let delimiter = parsed.delimiter;
        let weight_unit = parsed.weight_unit;
        let columns = parsed.columns.clone();
        let mut diagnostics = parsed.diagnostics.clone();

        let normalized = normalize::normalize(parsed, self.config.one_rm_formula);
        diagnostics.extend(normalized.diagnostics.iter().cloned());
        diagnostics.sort_by_key(|d| d.row);
        let valid_records = normalized.records.len() - normalized.dropped;

        let enriched = enrich::enrich(normalized.records, &self.mapping);

        observability::record_rows(rows_read, diagnostics.len());
        observability::record_pipeline_duration("load", started.elapsed());
        tracing::info!(
            hash = %&content_hash[..12],
            rows = rows_read,
            valid = valid_records,
            skipped = diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export loaded"
        );

        Ok(LoadedExport {
            summary: LoadSummary {
                content_hash,
                rows_read,
                records: enriched.records.len(),
                valid_records,
                skipped_rows: diagnostics.len(),
                rest_timer_rows,
                delimiter,
                weight_unit,
                one_rm_formula: self.config.one_rm_formula,
                columns,
                mapping_version: enriched.mapping_version,
                distinct_exercises_unmapped: enriched.misses.len(),
                diagnostics: DiagnosticsSummary::from_diagnostics(&diagnostics),
            },
            records: enriched.records,
            diagnostics,
            mapping_misses: enriched.misses,
        })
    }

    pub fn load_path(&self, path: &Path) -> Result<LoadedExport> {
        let bytes = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read export file");
        self.load(&bytes)
    }

    pub fn analyze(
        &self,
        export: &LoadedExport,
        request: &AnalysisRequest,
    ) -> Result<AnalyticsReport> {
        let started = Instant::now();
        let report = analysis::aggregate(&export.records, request);
        observability::record_pipeline_duration("analyze", started.elapsed());
        report
    }

    /// Load and analyze in one call.
    pub fn run(
        &self,
        bytes: &[u8],
        request: &AnalysisRequest,
    ) -> Result<(LoadedExport, AnalyticsReport)> {
        let export = self.load(bytes)?;
        let report = self.analyze(&export, request)?;
        Ok((export, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LiftlogError;
    use crate::diagnostics::RowIssue;

    const EXPORT: &str = "Workout #;Date;Workout Name;Duration (sec);Exercise Name;Set Order;Weight (kg);Reps;RPE;Distance (meters);Seconds;Notes;Workout Notes
1;2024-01-01 08:00:00;Push;3600;Bench Press (Barbell);1;80;8;;;;;
1;2024-01-01 08:00:00;Push;3600;Bench Press (Barbell);2;-80;8;;;;;
1;2024-01-01 08:00:00;Push;3600;Zumba;1;;;;;;;
2;bad date;Pull;3600;Barbell Row;1;60;10;;;;;
3;2024-01-03 08:00:00;Legs;3600;Squat (Barbell);1;100;5;;;;;
";

    fn pipeline() -> Pipeline {
        Pipeline::from_config(PipelineConfig::default()).expect("pipeline")
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn load_merges_diagnostics_in_row_order() {
        let export = pipeline().load(EXPORT.as_bytes()).unwrap();
        let s = &export.summary;
        assert_eq!(s.rows_read, 5);
        assert_eq!(s.records, 4);
        assert_eq!(s.valid_records, 3);
        assert_eq!(s.skipped_rows, 2);
        assert_eq!(s.diagnostics.invalid_date, 1);
        assert_eq!(s.diagnostics.negative_value, 1);
        let rows: Vec<usize> = export.diagnostics.iter().map(|d| d.row).collect();
        assert_eq!(rows, vec![2, 4]);
        assert!(matches!(export.diagnostics[0].issue, RowIssue::NegativeValue { .. }));
        assert_eq!(export.mapping_misses.len(), 1);
        assert_eq!(export.mapping_misses[0].exercise, "Zumba");
    }

    #[test]
    fn run_is_deterministic() {
        let p = pipeline();
        let request = AnalysisRequest::default();
        let (_, a) = p.run(EXPORT.as_bytes(), &request).unwrap();
        let (_, b) = p.run(EXPORT.as_bytes(), &request).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_only_export_is_empty_result() {
        let header = EXPORT.lines().next().unwrap();
        let p = pipeline();
        let export = p.load(header.as_bytes()).unwrap();
        assert!(matches!(
            p.analyze(&export, &AnalysisRequest::default()),
            Err(LiftlogError::EmptyResult)
        ));
    }

    #[test]
    fn missing_mapping_file_is_io_error() {
        let cfg = PipelineConfig {
            mapping_path: Some("/nonexistent/liftlog/mapping.json".into()),
            ..Default::default()
        };
        assert!(matches!(Pipeline::from_config(cfg), Err(LiftlogError::Io(_))));
    }
}
