//! Sensor identifiers and the raw samples delivered by a sensor source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of scalar axis values every sensor contributes per sample.
pub const NUM_AXES: usize = 3;

/// A motion sensor that can take part in fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorId {
    /// Raw acceleration including gravity (m/s^2)
    Accelerometer,
    /// Acceleration with gravity removed (m/s^2)
    LinearAcceleration,
    /// Device orientation as the vector part of a rotation quaternion
    RotationVector,
}

impl SensorId {
    /// Number of known sensors.
    pub const COUNT: usize = 3;

    /// Every known sensor, in declaration order.
    pub const ALL: [SensorId; Self::COUNT] = [
        SensorId::Accelerometer,
        SensorId::LinearAcceleration,
        SensorId::RotationVector,
    ];

    /// Dense index of this sensor, usable for per-sensor tables.
    pub fn index(self) -> usize {
        match self {
            SensorId::Accelerometer => 0,
            SensorId::LinearAcceleration => 1,
            SensorId::RotationVector => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorId::Accelerometer => "accelerometer",
            SensorId::LinearAcceleration => "linear_acceleration",
            SensorId::RotationVector => "rotation_vector",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accelerometer" | "acc" => Ok(SensorId::Accelerometer),
            "linear_acceleration" | "linear" => Ok(SensorId::LinearAcceleration),
            "rotation_vector" | "rotation" => Ok(SensorId::RotationVector),
            other => Err(format!("unknown sensor: {other}")),
        }
    }
}

/// One reading delivered by a sensor source.
///
/// The axis values are kept as a plain vector so that malformed readings
/// can reach the fusion boundary and be rejected there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Timestamp when the reading was delivered
    pub timestamp: DateTime<Utc>,
    /// Sensor that produced the reading
    pub sensor: SensorId,
    /// Axis values reported by the sensor
    pub values: Vec<f32>,
}

impl SensorSample {
    pub fn new(sensor: SensorId, values: impl Into<Vec<f32>>) -> Self {
        Self {
            timestamp: Utc::now(),
            sensor,
            values: values.into(),
        }
    }
}
