//! Logging and metrics setup, done once by the server binary.
//!
//! ```rust,ignore
//! let metrics = telemetry::init_telemetry(&config.observability)?;
//! let body = metrics.render();
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsHandle};

use crate::config::ObservabilityConfig;
use crate::error::Result;

/// Install the logger, then the metrics recorder.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    init_logging(config)?;
    init_metrics(config.metrics_enabled)
}
