//! Sensor fusion into fixed-length windows.
//!
//! Samples from independently clocked sensors are written into a dense
//! `timesteps x (sensors * axes)` tensor. A timestep advances once every
//! active sensor has contributed exactly one reading to it; the first
//! reading from a sensor wins and later readings from the same sensor are
//! dropped until the timestep advances. Once the last timestep fills the
//! window is handed out and the buffer starts over.

use crate::source::types::{SensorId, NUM_AXES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of timesteps in a window.
pub const DEFAULT_NUM_TIMESTEPS: usize = 128;

/// Errors raised when a sample violates the feed contract.
///
/// A rejected sample never writes to the buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("sensor {0} is not part of the active sensor set")]
    UnknownSensor(SensorId),

    #[error("expected {expected} axis values, got {actual}")]
    WrongArity { expected: usize, actual: usize },

    #[error("axis {axis} is not a finite value")]
    NonFinite { axis: usize },
}

/// Ordered set of active sensors. A sensor's position is its slot in every
/// timestep row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSet {
    members: Vec<SensorId>,
}

impl SensorSet {
    /// Build a set from the given sensors, ignoring repeats and keeping first
    /// occurrence order. Returns `None` if no sensor is given.
    pub fn new(sensors: &[SensorId]) -> Option<Self> {
        let mut members = Vec::with_capacity(sensors.len());
        for &sensor in sensors {
            if !members.contains(&sensor) {
                members.push(sensor);
            }
        }
        if members.is_empty() {
            None
        } else {
            Some(Self { members })
        }
    }

    /// Accelerometer only.
    pub fn accelerometer_only() -> Self {
        Self {
            members: vec![SensorId::Accelerometer],
        }
    }

    /// Accelerometer, linear acceleration and rotation vector.
    pub fn full() -> Self {
        Self {
            members: SensorId::ALL.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, sensor: SensorId) -> bool {
        self.members.contains(&sensor)
    }

    /// Slot of `sensor` within a timestep row, if it is active.
    pub fn slot_of(&self, sensor: SensorId) -> Option<usize> {
        self.members.iter().position(|&s| s == sensor)
    }

    pub fn iter(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.members.iter().copied()
    }

    /// Number of scalars in one timestep row.
    pub fn row_width(&self) -> usize {
        self.members.len() * NUM_AXES
    }
}

/// Which sensors already contributed to the current timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    present: [bool; SensorId::COUNT],
    count: usize,
}

impl PresenceSet {
    pub fn contains(&self, sensor: SensorId) -> bool {
        self.present[sensor.index()]
    }

    /// Mark `sensor` present. Returns `false` if it already was.
    pub fn insert(&mut self, sensor: SensorId) -> bool {
        let slot = &mut self.present[sensor.index()];
        if *slot {
            return false;
        }
        *slot = true;
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = SensorId> + '_ {
        SensorId::ALL.into_iter().filter(|s| self.contains(*s))
    }
}

/// A complete window of fused timesteps, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    num_timesteps: usize,
    row_width: usize,
    data: Vec<f32>,
}

impl Window {
    fn zeroed(num_timesteps: usize, row_width: usize) -> Self {
        Self {
            num_timesteps,
            row_width,
            data: vec![0.0; num_timesteps * row_width],
        }
    }

    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    /// Number of scalars per timestep.
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Row of scalars for timestep `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_timesteps()`.
    pub fn timestep(&self, index: usize) -> &[f32] {
        let start = index * self.row_width;
        &self.data[start..start + self.row_width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.row_width)
    }

    /// All values of one tensor column, in timestep order.
    pub fn column(&self, column: usize) -> impl Iterator<Item = f32> + '_ {
        self.rows().map(move |row| row[column])
    }

    /// The tensor as one flat row-major slice.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    fn slot_mut(&mut self, timestep: usize, slot: usize) -> &mut [f32] {
        let start = timestep * self.row_width + slot * NUM_AXES;
        &mut self.data[start..start + NUM_AXES]
    }
}

/// Fill progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Number of completed timesteps
    pub filled: usize,
    /// Timesteps per window
    pub total: usize,
    /// Values of the sample that completed the last timestep, if any
    pub last_values: Option<[f32; NUM_AXES]>,
}

impl Progress {
    pub fn empty(total: usize) -> Self {
        Self {
            filled: 0,
            total,
            last_values: None,
        }
    }
}

/// What a single `feed` did to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    /// The sensor already contributed to this timestep; the sample was dropped
    Duplicate,
    /// The sample was written; the timestep still waits for other sensors
    Stored,
    /// The sample completed a timestep
    Advanced(Progress),
    /// The sample completed the window. The buffer has already been reset
    /// and `reset` is the notification describing that.
    WindowComplete { window: Window, reset: Progress },
}

/// Assembles per-sensor samples into complete windows.
#[derive(Debug)]
pub struct SensorFusionBuffer {
    sensors: SensorSet,
    num_timesteps: usize,
    window: Window,
    current_timestep: usize,
    presence: PresenceSet,
}

impl SensorFusionBuffer {
    /// Create an empty buffer. `num_timesteps` is clamped to at least one.
    pub fn new(sensors: SensorSet, num_timesteps: usize) -> Self {
        let num_timesteps = num_timesteps.max(1);
        let window = Window::zeroed(num_timesteps, sensors.row_width());
        Self {
            sensors,
            num_timesteps,
            window,
            current_timestep: 0,
            presence: PresenceSet::default(),
        }
    }

    pub fn sensors(&self) -> &SensorSet {
        &self.sensors
    }

    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    /// Index of the timestep currently being filled.
    pub fn current_timestep(&self) -> usize {
        self.current_timestep
    }

    /// Sensors that already contributed to the current timestep.
    pub fn presence(&self) -> &PresenceSet {
        &self.presence
    }

    /// Values written so far for `sensor` in timestep `index`.
    pub fn slot(&self, index: usize, sensor: SensorId) -> Option<&[f32]> {
        let slot = self.sensors.slot_of(sensor)?;
        if index >= self.num_timesteps {
            return None;
        }
        let start = slot * NUM_AXES;
        Some(&self.window.timestep(index)[start..start + NUM_AXES])
    }

    /// Write one reading from `sensor` into the current timestep.
    pub fn feed(&mut self, sensor: SensorId, values: &[f32]) -> Result<FeedOutcome, FeedError> {
        let slot = self
            .sensors
            .slot_of(sensor)
            .ok_or(FeedError::UnknownSensor(sensor))?;
        let values: [f32; NUM_AXES] = values.try_into().map_err(|_| FeedError::WrongArity {
            expected: NUM_AXES,
            actual: values.len(),
        })?;
        if let Some(axis) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeedError::NonFinite { axis });
        }

        if !self.presence.insert(sensor) {
            return Ok(FeedOutcome::Duplicate);
        }
        self.window
            .slot_mut(self.current_timestep, slot)
            .copy_from_slice(&values);

        if self.presence.len() < self.sensors.len() {
            return Ok(FeedOutcome::Stored);
        }

        self.presence.clear();
        self.current_timestep += 1;

        if self.current_timestep == self.num_timesteps {
            let window = std::mem::replace(
                &mut self.window,
                Window::zeroed(self.num_timesteps, self.sensors.row_width()),
            );
            let reset = self.reset();
            Ok(FeedOutcome::WindowComplete { window, reset })
        } else {
            Ok(FeedOutcome::Advanced(Progress {
                filled: self.current_timestep,
                total: self.num_timesteps,
                last_values: Some(values),
            }))
        }
    }

    /// Discard any partially filled window.
    ///
    /// Stale values left in the tensor are overwritten before the window
    /// can complete again, so only the fill state is cleared.
    pub fn reset(&mut self) -> Progress {
        self.current_timestep = 0;
        self.presence.clear();
        Progress::empty(self.num_timesteps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SensorId = SensorId::Accelerometer;
    const B: SensorId = SensorId::LinearAcceleration;
    const C: SensorId = SensorId::RotationVector;

    fn full_buffer(timesteps: usize) -> SensorFusionBuffer {
        SensorFusionBuffer::new(SensorSet::full(), timesteps)
    }

    #[test]
    fn test_sensor_set_dedups_and_orders() {
        let set = SensorSet::new(&[C, A, C]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.slot_of(C), Some(0));
        assert_eq!(set.slot_of(A), Some(1));
        assert_eq!(set.slot_of(B), None);
        assert_eq!(set.row_width(), 6);
        assert!(SensorSet::new(&[]).is_none());
    }

    #[test]
    fn test_presence_set() {
        let mut presence = PresenceSet::default();
        assert!(presence.insert(B));
        assert!(!presence.insert(B));
        assert!(presence.contains(B));
        assert_eq!(presence.len(), 1);
        assert_eq!(presence.iter().collect::<Vec<_>>(), vec![B]);
        presence.clear();
        assert!(presence.is_empty());
    }

    #[test]
    fn test_timestep_advances_in_any_order() {
        let orders = [[A, B, C], [A, C, B], [B, A, C], [B, C, A], [C, A, B], [C, B, A]];
        for order in orders {
            let mut buffer = full_buffer(4);
            for (i, sensor) in order.iter().enumerate() {
                let outcome = buffer.feed(*sensor, &[1.0, 2.0, 3.0]).unwrap();
                if i < 2 {
                    assert_eq!(outcome, FeedOutcome::Stored);
                    assert_eq!(buffer.current_timestep(), 0);
                } else {
                    assert!(matches!(outcome, FeedOutcome::Advanced(_)));
                }
            }
            assert_eq!(buffer.current_timestep(), 1);
            assert!(buffer.presence().is_empty());
        }
    }

    #[test]
    fn test_duplicate_sample_is_dropped() {
        let mut buffer = full_buffer(4);
        buffer.feed(A, &[1.0, 1.0, 1.0]).unwrap();
        let presence_before = buffer.presence().clone();

        let outcome = buffer.feed(A, &[9.0, 9.0, 9.0]).unwrap();

        assert_eq!(outcome, FeedOutcome::Duplicate);
        assert_eq!(buffer.presence(), &presence_before);
        assert_eq!(buffer.slot(0, A), Some(&[1.0, 1.0, 1.0][..]));
        assert_eq!(buffer.current_timestep(), 0);
    }

    #[test]
    fn test_advance_reports_triggering_values() {
        let mut buffer = full_buffer(4);
        buffer.feed(B, &[0.0, 0.0, 0.0]).unwrap();
        buffer.feed(A, &[0.0, 0.0, 0.0]).unwrap();
        let outcome = buffer.feed(C, &[0.5, 0.25, 0.125]).unwrap();

        assert_eq!(
            outcome,
            FeedOutcome::Advanced(Progress {
                filled: 1,
                total: 4,
                last_values: Some([0.5, 0.25, 0.125]),
            })
        );
    }

    #[test]
    fn test_window_completes_exactly_once() {
        let timesteps = 128;
        let mut buffer = full_buffer(timesteps);
        let mut completed = Vec::new();

        for t in 0..timesteps {
            for sensor in [C, A, B] {
                let v = t as f32;
                if let FeedOutcome::WindowComplete { window, reset } =
                    buffer.feed(sensor, &[v, v + 0.5, v + 0.25]).unwrap()
                {
                    assert_eq!(reset, Progress::empty(timesteps));
                    completed.push(window);
                }
            }
        }

        assert_eq!(completed.len(), 1);
        assert_eq!(buffer.current_timestep(), 0);
        assert!(buffer.presence().is_empty());

        let window = &completed[0];
        assert_eq!(window.num_timesteps(), timesteps);
        assert_eq!(window.row_width(), 9);
        // Slots follow the sensor set order, not arrival order
        assert_eq!(window.timestep(5), &[5.0, 5.5, 5.25, 5.0, 5.5, 5.25, 5.0, 5.5, 5.25]);
        assert_eq!(window.timestep(127)[0], 127.0);
    }

    #[test]
    fn test_window_layout_by_slot() {
        let mut buffer = full_buffer(1);
        buffer.feed(C, &[7.0, 8.0, 9.0]).unwrap();
        buffer.feed(A, &[1.0, 2.0, 3.0]).unwrap();
        let outcome = buffer.feed(B, &[4.0, 5.0, 6.0]).unwrap();

        match outcome {
            FeedOutcome::WindowComplete { window, .. } => {
                assert_eq!(
                    window.as_flat(),
                    &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
                );
                assert_eq!(window.column(6).collect::<Vec<_>>(), vec![7.0]);
            }
            other => panic!("expected a complete window, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sensor_is_rejected() {
        let mut buffer = SensorFusionBuffer::new(SensorSet::accelerometer_only(), 4);
        assert_eq!(
            buffer.feed(C, &[0.0, 0.0, 0.0]),
            Err(FeedError::UnknownSensor(C))
        );
        assert!(buffer.presence().is_empty());
    }

    #[test]
    fn test_wrong_arity_is_rejected_without_write() {
        let mut buffer = full_buffer(4);
        assert_eq!(
            buffer.feed(A, &[1.0, 2.0]),
            Err(FeedError::WrongArity {
                expected: 3,
                actual: 2
            })
        );
        assert!(buffer.presence().is_empty());
        assert_eq!(buffer.slot(0, A), Some(&[0.0, 0.0, 0.0][..]));
    }

    #[test]
    fn test_non_finite_value_is_rejected_without_write() {
        let mut buffer = full_buffer(4);
        assert_eq!(
            buffer.feed(B, &[1.0, f32::INFINITY, 0.0]),
            Err(FeedError::NonFinite { axis: 1 })
        );
        assert_eq!(
            buffer.feed(B, &[0.0, 0.0, f32::NAN]),
            Err(FeedError::NonFinite { axis: 2 })
        );
        assert!(buffer.presence().is_empty());
        assert_eq!(buffer.slot(0, B), Some(&[0.0, 0.0, 0.0][..]));

        // The sensor can still contribute a valid reading to this timestep
        assert_eq!(buffer.feed(B, &[1.0, 2.0, 3.0]).unwrap(), FeedOutcome::Stored);
    }

    #[test]
    fn test_single_sensor_advances_every_sample() {
        let mut buffer = SensorFusionBuffer::new(SensorSet::accelerometer_only(), 3);
        assert!(matches!(
            buffer.feed(A, &[0.0, 0.0, 1.0]).unwrap(),
            FeedOutcome::Advanced(Progress { filled: 1, .. })
        ));
        assert!(matches!(
            buffer.feed(A, &[0.0, 0.0, 1.0]).unwrap(),
            FeedOutcome::Advanced(Progress { filled: 2, .. })
        ));
        assert!(matches!(
            buffer.feed(A, &[0.0, 0.0, 1.0]).unwrap(),
            FeedOutcome::WindowComplete { .. }
        ));
    }

    #[test]
    fn test_reset_discards_partial_window() {
        let mut buffer = full_buffer(4);
        for sensor in [A, B, C, A] {
            buffer.feed(sensor, &[1.0, 1.0, 1.0]).unwrap();
        }
        assert_eq!(buffer.current_timestep(), 1);

        assert_eq!(buffer.reset(), Progress::empty(4));
        assert_eq!(buffer.current_timestep(), 0);
        assert!(buffer.presence().is_empty());
        assert_eq!(buffer.feed(A, &[2.0, 2.0, 2.0]).unwrap(), FeedOutcome::Stored);
    }
}
