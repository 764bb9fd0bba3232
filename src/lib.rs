//! Activity Fusion Agent - windowed activity recognition from motion sensors.
//!
//! This library fuses independently clocked sensor streams into fixed-length
//! windows and classifies each complete window into one of six activities.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ SensorSource │──▶│ Fusion       │──▶│ Inference    │──▶│ Observer │
//! │ (channel)    │   │ buffer       │   │ dispatcher   │   │          │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────┘
//!                           │                  │
//!                           ▼                  ▼
//!                    progress events      Classifier
//! ```
//!
//! - Each timestep holds exactly one reading from every active sensor; a
//!   sensor's extra readings within a timestep are dropped
//! - A complete window is classified exactly once, then the buffer restarts
//! - Without a loaded classifier every window reports `Unavailable`
//!
//! # Example
//!
//! ```no_run
//! use activity_fusion_agent::{
//!     classifier::{LinearLoader, BUNDLED_FULL_MODEL},
//!     core::{Session, SessionConfig, SensorSet},
//!     source::{SyntheticSource, synthetic::SyntheticConfig},
//! };
//! use std::time::Duration;
//!
//! let sensors = SensorSet::full();
//! let loader = LinearLoader::for_sensors(&sensors);
//! let source = SyntheticSource::new(SyntheticConfig::default());
//! let mut session = Session::new(SessionConfig::new(sensors, 128), source)
//!     .expect("valid configuration");
//!
//! session
//!     .init(&loader, BUNDLED_FULL_MODEL)
//!     .expect("session can be initialized");
//! session.start().expect("sensors can be subscribed");
//! loop {
//!     session.poll(Duration::from_millis(100)).ok();
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod source;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use crate::classifier::{Classifier, ClassifierLoader, InferenceError, LinearLoader, LoadError};
pub use crate::config::{Config, SensorSelection};
pub use crate::core::{
    ActivityLabel, ActivityObserver, ActivityReport, ReportBuilder, SensorFusionBuffer,
    SensorSet, Session, SessionConfig, SessionError, SessionState, ACTIVITY_LABELS,
};
pub use crate::source::{ManualSource, SensorId, SensorSample, SensorSource, SyntheticSource};
pub use crate::telemetry::{SharedTelemetryLog, TelemetryLog, TelemetryStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_labels() {
        assert_eq!(ACTIVITY_LABELS.len(), crate::core::NUM_CLASSES);
        assert_eq!(ACTIVITY_LABELS[0], "Walking");
        assert_eq!(ACTIVITY_LABELS[5], "Laying");
    }
}
