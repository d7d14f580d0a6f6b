//! Content-hash keyed memoization of loads and analysis results.
//!
//! Holds at most one export. Loading bytes with a different hash replaces
//! it and drops every report computed against the old one. Reports are keyed
//! by the serialized [`AnalysisRequest`], so two requests that differ in any
//! parameter never share a result.
//!
//! Lookup and insertion are separate calls so a caller holding the cache
//! behind a lock can compute outside it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::analysis::{AnalysisRequest, AnalyticsReport};
use crate::pipeline::{LoadedExport, Pipeline, content_hash};
use crate::{Result, observability};

#[derive(Debug)]
struct CacheEntry {
    export: Arc<LoadedExport>,
    reports: HashMap<String, Arc<AnalyticsReport>>,
}

#[derive(Debug, Default)]
pub struct ExportCache {
    entry: Option<CacheEntry>,
}

/// Outcome of [`ExportCache::load`].
#[derive(Clone, Debug)]
pub struct CachedLoad {
    pub export: Arc<LoadedExport>,
    pub cache_hit: bool,
}

fn request_key(request: &AnalysisRequest) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

impl ExportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loaded export if its hash matches.
    pub fn get(&self, hash: &str) -> Option<Arc<LoadedExport>> {
        let hit = self
            .entry
            .as_ref()
            .filter(|e| e.export.content_hash() == hash)
            .map(|e| Arc::clone(&e.export));
        observability::record_cache(hit.is_some(), "export");
        hit
    }

    /// Store a freshly loaded export. Same hash keeps existing reports.
    pub fn insert(&mut self, export: LoadedExport) -> Arc<LoadedExport> {
        if let Some(entry) = &self.entry
            && entry.export.content_hash() == export.content_hash()
        {
            return Arc::clone(&entry.export);
        }
        if let Some(old) = &self.entry {
            tracing::debug!(
                old = %old.export.content_hash(),
                new = %export.content_hash(),
                evicted_reports = old.reports.len(),
                "export replaced"
            );
        }
        let export = Arc::new(export);
        self.entry = Some(CacheEntry {
            export: Arc::clone(&export),
            reports: HashMap::new(),
        });
        export
    }

    /// Load through the cache: identical bytes skip parsing entirely.
    pub fn load(&mut self, pipeline: &Pipeline, bytes: &[u8]) -> Result<CachedLoad> {
        let hash = content_hash(bytes);
        if let Some(export) = self.get(&hash) {
            tracing::debug!(hash = %hash, "export served from cache");
            return Ok(CachedLoad {
                export,
                cache_hit: true,
            });
        }
        let export = self.insert(pipeline.load(bytes)?);
        Ok(CachedLoad {
            export,
            cache_hit: false,
        })
    }

    pub fn current(&self) -> Option<Arc<LoadedExport>> {
        self.entry.as_ref().map(|e| Arc::clone(&e.export))
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.export.content_hash())
    }

    pub fn cached_report(
        &self,
        hash: &str,
        request: &AnalysisRequest,
    ) -> Result<Option<Arc<AnalyticsReport>>> {
        let key = request_key(request)?;
        let hit = self
            .entry
            .as_ref()
            .filter(|e| e.export.content_hash() == hash)
            .and_then(|e| e.reports.get(&key))
            .map(Arc::clone);
        observability::record_cache(hit.is_some(), "report");
        Ok(hit)
    }

    /// Remember a report. Ignored when `hash` is no longer the current
    /// export, which happens when another load won the race.
    pub fn insert_report(
        &mut self,
        hash: &str,
        request: &AnalysisRequest,
        report: AnalyticsReport,
    ) -> Result<Arc<AnalyticsReport>> {
        let report = Arc::new(report);
        let key = request_key(request)?;
        match self.entry.as_mut() {
            Some(entry) if entry.export.content_hash() == hash => {
                entry.reports.insert(key, Arc::clone(&report));
            }
            _ => tracing::debug!(hash = %hash, "discarding report for a replaced export"),
        }
        Ok(report)
    }

    /// Analyze the current export, reusing a cached report when the request
    /// matches. `None` when nothing is loaded.
    pub fn report(
        &mut self,
        pipeline: &Pipeline,
        request: &AnalysisRequest,
    ) -> Result<Option<Arc<AnalyticsReport>>> {
        let Some(export) = self.current() else {
            return Ok(None);
        };
        let hash = export.content_hash();
        if let Some(report) = self.cached_report(hash, request)? {
            return Ok(Some(report));
        }
        let report = pipeline.analyze(&export, request)?;
        self.insert_report(hash, request, report).map(Some)
    }

    pub fn report_count(&self) -> usize {
        self.entry.as_ref().map_or(0, |e| e.reports.len())
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}
