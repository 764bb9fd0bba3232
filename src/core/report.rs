//! Serializable activity reports.
//!
//! Each inferred activity becomes one `ActivityReport`, stamped with the
//! producing instance and device so reports from several runs can be merged.

use crate::core::dispatch::ActivityLabel;
use crate::core::fusion::SensorSet;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "activity-fusion-agent";

/// Producer metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
    /// Host the agent runs on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// One inferred activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    /// Report format version
    pub report_version: String,
    /// When the window was classified (RFC3339)
    pub computed_at_utc: String,
    /// Producer metadata
    pub producer: ReportProducer,
    /// Sequence number of the window within the run, starting at 1
    pub window_seq: u64,
    /// Timesteps per window
    pub num_timesteps: usize,
    /// Sensors fused into the window
    pub sensors: Vec<String>,
    /// Class index, or -1 if inference was unavailable
    pub label_code: i32,
    /// Activity name, if inference succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_name: Option<String>,
}

/// Builder for activity reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    device_id: Option<String>,
    sensors: Vec<String>,
    num_timesteps: usize,
    window_seq: u64,
}

impl ReportBuilder {
    /// Create a builder with a unique instance ID.
    pub fn new(sensors: &SensorSet, num_timesteps: usize) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            device_id: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok()),
            sensors: sensors.iter().map(|s| s.as_str().to_string()).collect(),
            num_timesteps,
            window_seq: 0,
        }
    }

    /// Override the device ID.
    pub fn with_device_id(mut self, device_id: String) -> Self {
        self.device_id = Some(device_id);
        self
    }

    /// Get the instance ID.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build the report for the next window.
    pub fn build(&mut self, label: ActivityLabel) -> ActivityReport {
        self.window_seq += 1;
        ActivityReport {
            report_version: REPORT_VERSION.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: crate::VERSION.to_string(),
                instance_id: self.instance_id.to_string(),
                device_id: self.device_id.clone(),
            },
            window_seq: self.window_seq,
            num_timesteps: self.num_timesteps,
            sensors: self.sensors.clone(),
            label_code: label.code(),
            label_name: label.name().map(str::to_string),
        }
    }
}
