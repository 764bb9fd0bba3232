//! Core functionality for the activity fusion agent.
//!
//! This module contains:
//! - The fusion buffer that assembles sensor samples into windows
//! - Inference dispatch from complete windows to activity labels
//! - The session lifecycle that ties source, buffer and classifier together
//! - Activity reports for export

pub mod dispatch;
pub mod fusion;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use dispatch::{
    argmax, ActivityLabel, ClassScores, InferenceDispatcher, ACTIVITY_LABELS, NUM_CLASSES,
    UNAVAILABLE_CODE,
};
pub use fusion::{
    FeedError, FeedOutcome, PresenceSet, Progress, SensorFusionBuffer, SensorSet, Window,
    DEFAULT_NUM_TIMESTEPS,
};
pub use report::{ActivityReport, ReportBuilder, PRODUCER_NAME, REPORT_VERSION};
pub use session::{ActivityObserver, Session, SessionConfig, SessionError, SessionState};
