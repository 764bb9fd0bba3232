//! Synthetic motion source.
//!
//! Each subscribed sensor gets its own producer thread emitting a
//! deterministic walking-like waveform at a fixed period, so streams arrive
//! independently clocked and interleaved on the shared channel, the same
//! way an OS sensor service delivers them.

use crate::source::types::{SensorId, SensorSample, NUM_AXES};
use crate::source::{
    SensorSource, SourceError, SubscriptionFlags, DEFAULT_CHANNEL_CAPACITY, GAME_RATE_INTERVAL,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const GRAVITY: f32 = 9.806_65;

/// Step frequency of the generated gait, in Hz.
const STEP_HZ: f32 = 1.8;

/// Configuration for the synthetic source.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Delivery period for every sensor
    pub interval: Duration,
    /// Optional faster period for the accelerometer
    pub accelerometer_interval: Option<Duration>,
    /// Capacity of the sample channel
    pub channel_capacity: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            interval: GAME_RATE_INTERVAL,
            accelerometer_interval: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SyntheticConfig {
    fn interval_for(&self, sensor: SensorId) -> Duration {
        match (sensor, self.accelerometer_interval) {
            (SensorId::Accelerometer, Some(interval)) => interval,
            _ => self.interval,
        }
    }
}

/// A source that generates motion readings on background threads.
pub struct SyntheticSource {
    config: SyntheticConfig,
    sender: Sender<SensorSample>,
    receiver: Receiver<SensorSample>,
    subscriptions: Arc<SubscriptionFlags>,
    producers: Vec<JoinHandle<()>>,
}

impl SyntheticSource {
    /// Create a new synthetic source.
    pub fn new(config: SyntheticConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            config,
            sender,
            receiver,
            subscriptions: Arc::new(SubscriptionFlags::default()),
            producers: Vec::new(),
        }
    }
}

impl SensorSource for SyntheticSource {
    fn subscribe(&mut self, sensor: SensorId) -> Result<(), SourceError> {
        if self.subscriptions.get(sensor) {
            return Err(SourceError::AlreadySubscribed(sensor));
        }
        self.subscriptions.set(sensor, true);

        let sender = self.sender.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let interval = self.config.interval_for(sensor);

        let handle = thread::Builder::new()
            .name(format!("synthetic-{sensor}"))
            .spawn(move || run_producer(sensor, interval, sender, subscriptions))
            .map_err(|e| {
                self.subscriptions.set(sensor, false);
                SourceError::Spawn {
                    sensor,
                    reason: e.to_string(),
                }
            })?;

        tracing::debug!(%sensor, ?interval, "synthetic producer started");
        self.producers.push(handle);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscriptions.clear();
        for handle in self.producers.drain(..) {
            // Producers exit on their next tick once their flag is cleared
            let _ = handle.join();
        }
    }

    fn is_subscribed(&self, sensor: SensorId) -> bool {
        self.subscriptions.get(sensor)
    }

    fn receiver(&self) -> &Receiver<SensorSample> {
        &self.receiver
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn run_producer(
    sensor: SensorId,
    interval: Duration,
    sender: Sender<SensorSample>,
    subscriptions: Arc<SubscriptionFlags>,
) {
    let mut tick: u64 = 0;
    while subscriptions.get(sensor) {
        let t = tick as f32 * interval.as_secs_f32();
        // Don't block if the channel is full - just drop the reading
        let _ = sender.try_send(SensorSample::new(sensor, waveform(sensor, t)));
        tick += 1;
        thread::sleep(interval);
    }
}

/// Generated reading for `sensor` at time `t` seconds.
pub fn waveform(sensor: SensorId, t: f32) -> [f32; NUM_AXES] {
    let phase = TAU * STEP_HZ * t;
    match sensor {
        SensorId::LinearAcceleration => [
            0.6 * phase.sin(),
            0.3 * phase.cos(),
            1.4 * (2.0 * phase).sin(),
        ],
        SensorId::Accelerometer => {
            let [x, y, z] = waveform(SensorId::LinearAcceleration, t);
            [x, y, z + GRAVITY]
        }
        SensorId::RotationVector => {
            let yaw = 0.05 * (TAU * 0.1 * t).sin();
            [0.02 * phase.sin(), 0.02 * phase.cos(), yaw]
        }
    }
}
