//! Observability for the bridge
//!
//! Structured console logging plus in-process counters.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_logging, init_logging_from_env, level_for_verbosity, LogFormat};
pub use metrics::{metrics, BridgeMetrics, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{lifecycle_span, mqtt_span, telemetry_span};
