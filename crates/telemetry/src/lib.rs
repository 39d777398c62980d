//! Internal telemetry for the post harvester.
//!
//! Metrics stay in-process and are flushed to ClickHouse by a scheduled
//! job; there is no external metrics backend.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
