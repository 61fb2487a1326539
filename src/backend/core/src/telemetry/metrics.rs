//! Prometheus exposition for the `metrics` facade.
//!
//! Counters recorded across the crate:
//!
//! - `cache_hits_total`, `cache_misses_total`, `cache_errors_total`,
//!   `cache_invalidations_total` (label `backend`)
//! - `pipeline_denials_total` (label `stage`)
//! - `auth_verifications_total` (label `outcome`)
//! - `teachtrack_errors_total` (labels `code`, `category`, `severity`)

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{Result, TrackError};

/// Renders the installed recorder. Disabled handles render nothing.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    handle: Option<PrometheusHandle>,
}

impl MetricsHandle {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    /// Prometheus text format.
    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

/// Install the global Prometheus recorder.
pub fn init_metrics(enabled: bool) -> Result<MetricsHandle> {
    if !enabled {
        return Ok(MetricsHandle::disabled());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TrackError::configuration(format!("failed to install metrics recorder: {}", e)))?;

    register_metric_descriptions();
    tracing::info!("Metrics initialized");

    Ok(MetricsHandle::from_handle(handle))
}

fn register_metric_descriptions() {
    describe_counter!("cache_hits_total", "Read-through cache hits");
    describe_counter!("cache_misses_total", "Read-through cache misses");
    describe_counter!("cache_errors_total", "Cache backend failures degraded to a miss");
    describe_counter!("cache_invalidations_total", "Keys removed by invalidation");
    describe_counter!("pipeline_denials_total", "Requests rejected by a pipeline stage");
    describe_counter!("auth_verifications_total", "Bearer token verifications");
    describe_counter!("teachtrack_errors_total", "Errors raised by code");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_renders_empty() {
        let handle = MetricsHandle::disabled();
        assert!(!handle.is_enabled());
        assert!(handle.render().is_empty());
    }

    #[test]
    fn test_local_recorder_renders_counters() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = MetricsHandle::from_handle(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("cache_hits_total", "backend" => "in_memory").increment(3);
        });

        let text = handle.render();
        assert!(text.contains("cache_hits_total"));
        assert!(text.contains("backend=\"in_memory\""));
    }
}
