//! Workout-log analytics pipeline.
//!
//! Raw export bytes flow through four stages:
//! [`parser`] -> [`normalize`] -> [`enrich`] -> [`analysis`].
//! [`pipeline::Pipeline`] runs them in one pass and [`cache::ExportCache`]
//! memoizes the result by content hash.

use thiserror::Error;

pub mod analysis;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod enrich;
pub mod filter;
pub mod mapping;
pub mod normalize;
pub mod observability;
pub mod parser;
pub mod pipeline;
pub mod utils;

pub use analysis::{AnalysisRequest, AnalyticsReport};
pub use cache::ExportCache;
pub use config::PipelineConfig;
pub use diagnostics::{RowDiagnostic, RowIssue};
pub use enrich::{EnrichedSetRecord, MappingMiss};
pub use filter::{DateRange, RecordFilter, TimeBucket};
pub use mapping::{MatchKind, MovementCategory, MuscleGroup, MuscleGroupMapping};
pub use normalize::{NormalizedSetRecord, OneRmFormula};
pub use parser::{Delimiter, RawSetRecord, SetOrder};
pub use pipeline::{LoadedExport, Pipeline};

#[derive(Debug, Error)]
pub enum LiftlogError {
    #[error("schema error: missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mapping error: {0}")]
    Mapping(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no rows remain after validation and filtering")]
    EmptyResult,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LiftlogError>;
