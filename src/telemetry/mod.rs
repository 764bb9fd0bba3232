//! Telemetry for the fusion pipeline.
//!
//! Tracks how many samples were fused, dropped or rejected and how many
//! windows were classified, with optional persistence across runs.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTelemetryLog, TelemetryLog,
    TelemetryStats,
};
