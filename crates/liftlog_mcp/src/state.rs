//! Process-scoped session state: the pipeline and its content-hash cache.
//!
//! The cache lock is only held for lookups and swaps. Parsing and analysis
//! run on the blocking pool with the lock released.

use std::path::PathBuf;
use std::sync::Arc;

use liftlog_core::cache::CachedLoad;
use liftlog_core::pipeline::content_hash;
use liftlog_core::{AnalysisRequest, AnalyticsReport, ExportCache, LoadedExport, Pipeline};
use tokio::sync::Mutex;

use crate::error::{McpError, McpResult};

#[derive(Debug, Clone, Default)]
pub struct CacheStatus {
    pub content_hash: Option<String>,
    pub cached_reports: usize,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pipeline: Arc<Pipeline>,
    cache: Arc<Mutex<ExportCache>>,
}

impl SessionState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cache: Arc::new(Mutex::new(ExportCache::new())),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Load export bytes, reusing the cached result when the content hash
    /// matches.
    pub async fn load_bytes(&self, bytes: Vec<u8>) -> McpResult<CachedLoad> {
        let hash = content_hash(&bytes);
        if let Some(export) = self.cache.lock().await.get(&hash) {
            tracing::debug!(hash = %hash, "load served from cache");
            return Ok(CachedLoad {
                export,
                cache_hit: true,
            });
        }

        let pipeline = Arc::clone(&self.pipeline);
        let loaded = tokio::task::spawn_blocking(move || pipeline.load(&bytes)).await??;
        let export = self.cache.lock().await.insert(loaded);
        Ok(CachedLoad {
            export,
            cache_hit: false,
        })
    }

    pub async fn load_path(&self, path: PathBuf) -> McpResult<CachedLoad> {
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            McpError::Validation(format!("cannot read {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "loading export");
        self.load_bytes(bytes).await
    }

    pub async fn current(&self) -> McpResult<Arc<LoadedExport>> {
        self.cache.lock().await.current().ok_or(McpError::NotLoaded)
    }

    /// Analysis of the current export for `request`, computed at most once
    /// per export and request.
    pub async fn report(
        &self,
        request: AnalysisRequest,
    ) -> McpResult<(Arc<LoadedExport>, Arc<AnalyticsReport>)> {
        let export = self.current().await?;
        let hash = export.content_hash().to_string();
        if let Some(report) = self.cache.lock().await.cached_report(&hash, &request)? {
            return Ok((export, report));
        }

        let pipeline = Arc::clone(&self.pipeline);
        let snapshot = Arc::clone(&export);
        let req = request.clone();
        let report =
            tokio::task::spawn_blocking(move || pipeline.analyze(&snapshot, &req)).await??;
        let report = self
            .cache
            .lock()
            .await
            .insert_report(&hash, &request, report)?;
        Ok((export, report))
    }

    pub async fn cache_status(&self) -> CacheStatus {
        let cache = self.cache.lock().await;
        CacheStatus {
            content_hash: cache.content_hash().map(str::to_string),
            cached_reports: cache.report_count(),
        }
    }
}
