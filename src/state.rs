//! # Application State Management
//!
//! Everything a request handler needs is collected in [`AppState`] and shared
//! across Actix workers through `web::Data`.
//!
//! ## What lives here:
//! - **Configuration**: loaded once at startup, read-only afterwards
//! - **Providers**: the audio store plus the transcription and summarization
//!   clients, injected as trait objects so tests can substitute fakes
//! - **Metrics**: request counters and pipeline outcomes, the only mutable data
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: every worker holds a reference to the same metrics
//! - **RwLock**: many readers (the /metrics endpoint) or one writer (middleware)
//!
//! Requests never share anything else: each has its own scratch file, provider job
//! and summary.

use crate::config::AppConfig;
use crate::storage::AudioStore;
use crate::summarization::Summarizer;
use crate::transcription::Transcriber;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (immutable after startup)
    pub config: Arc<AppConfig>,

    /// Scratch storage for uploads
    pub store: AudioStore,

    /// Speech-to-text provider
    pub transcriber: Arc<dyn Transcriber>,

    /// Language-model provider
    pub summarizer: Arc<dyn Summarizer>,

    /// Performance metrics (updated by middleware and the pipeline)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: load and reliability
/// - **active_pipelines**: uploads currently being transcribed or summarized
/// - **pipelines_completed / pipeline_failures**: outcome of each upload, with
///   failures keyed by kind (`transcription_timeout`, `summarization_malformed`, ...)
/// - **endpoint_metrics**: per-endpoint statistics
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub active_pipelines: u32,
    pub pipelines_completed: u64,
    pub pipeline_failures: HashMap<String, u64>,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// Keeps `active_pipelines` accurate: incremented on creation, decremented on drop,
/// whichever way the pipeline ends.
pub struct ActivePipeline {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for ActivePipeline {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.active_pipelines = metrics.active_pipelines.saturating_sub(1);
    }
}

impl AppState {
    /// Create the state from already-built providers.
    pub fn new(
        config: AppConfig,
        store: AudioStore,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            transcriber,
            summarizer,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    /// Increment the total error counter (4xx and 5xx responses).
    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    /// Record detailed metrics for one endpoint ("POST /transcrever", ...).
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark a pipeline as running until the returned guard is dropped.
    pub fn begin_pipeline(&self) -> ActivePipeline {
        self.write_metrics().active_pipelines += 1;
        ActivePipeline {
            metrics: self.metrics.clone(),
        }
    }

    /// Record how a pipeline ended. `None` means success.
    pub fn record_pipeline_outcome(&self, failure_kind: Option<&str>) {
        let mut metrics = self.write_metrics();
        match failure_kind {
            None => metrics.pipelines_completed += 1,
            Some(kind) => *metrics.pipeline_failures.entry(kind.to_string()).or_default() += 1,
        }
    }

    /// Get a consistent copy of the current metrics (used for /metrics and /health).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn write_metrics(&self) -> std::sync::RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AppMetrics {
    /// Share of requests that ended with a 4xx or 5xx (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn pipelines_failed(&self) -> u64 {
        self.pipeline_failures.values().sum()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{state_with, FakeSummarizer, FakeTranscriber};

    fn state() -> (tempfile::TempDir, AppState) {
        state_with(FakeTranscriber::two_speakers(), FakeSummarizer::five_insights())
    }

    #[test]
    fn test_endpoint_metrics() {
        let (_dir, state) = state();
        state.record_endpoint_request("POST /transcrever", 100, false);
        state.record_endpoint_request("POST /transcrever", 300, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["POST /transcrever"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 200.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_active_pipeline_guard() {
        let (_dir, state) = state();
        let first = state.begin_pipeline();
        let second = state.begin_pipeline();
        assert_eq!(state.get_metrics_snapshot().active_pipelines, 2);

        drop(first);
        assert_eq!(state.get_metrics_snapshot().active_pipelines, 1);
        drop(second);
        assert_eq!(state.get_metrics_snapshot().active_pipelines, 0);
    }

    #[test]
    fn test_pipeline_outcomes() {
        let (_dir, state) = state();
        state.record_pipeline_outcome(None);
        state.record_pipeline_outcome(Some("transcription_timeout"));
        state.record_pipeline_outcome(Some("transcription_timeout"));
        state.record_pipeline_outcome(Some("summarization_malformed"));

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.pipelines_completed, 1);
        assert_eq!(snapshot.pipelines_failed(), 3);
        assert_eq!(snapshot.pipeline_failures["transcription_timeout"], 2);
    }

    #[test]
    fn test_error_rate_without_requests() {
        assert_eq!(AppMetrics::default().error_rate(), 0.0);
    }
}
