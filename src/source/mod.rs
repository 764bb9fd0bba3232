//! Sensor sources for the activity fusion agent.
//!
//! A source delivers `SensorSample`s for the sensors it has been subscribed
//! to over a bounded channel. The session is the single consumer of that
//! channel, so samples are fused strictly in arrival order no matter how
//! many producer threads feed it.

pub mod manual;
pub mod synthetic;
pub mod types;

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

pub use manual::{ManualSource, SampleInjector};
pub use synthetic::SyntheticSource;
pub use types::{SensorId, SensorSample, NUM_AXES};

/// Default capacity of the sample channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Nominal delivery period of a "game" rate sensor (about 50 Hz).
pub const GAME_RATE_INTERVAL: Duration = Duration::from_millis(20);

/// Errors that can occur while managing sensor subscriptions.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sensor {0} is already subscribed")]
    AlreadySubscribed(SensorId),

    #[error("sensor {0} is not available on this source")]
    Unavailable(SensorId),

    #[error("failed to spawn producer for {sensor}: {reason}")]
    Spawn { sensor: SensorId, reason: String },
}

/// Publish/subscribe capability delivering raw sensor readings.
pub trait SensorSource: Send {
    /// Start delivering samples for `sensor`.
    fn subscribe(&mut self, sensor: SensorId) -> Result<(), SourceError>;

    /// Stop delivering samples for every subscribed sensor.
    fn unsubscribe(&mut self);

    /// Check whether `sensor` is currently subscribed.
    fn is_subscribed(&self, sensor: SensorId) -> bool;

    /// Receiving end of the sample channel.
    fn receiver(&self) -> &Receiver<SensorSample>;
}

/// Per-sensor subscription flags shared between a source and its producers.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionFlags {
    flags: [AtomicBool; SensorId::COUNT],
}

impl SubscriptionFlags {
    pub(crate) fn set(&self, sensor: SensorId, subscribed: bool) {
        self.flags[sensor.index()].store(subscribed, Ordering::SeqCst);
    }

    pub(crate) fn get(&self, sensor: SensorId) -> bool {
        self.flags[sensor.index()].load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        for flag in &self.flags {
            flag.store(false, Ordering::SeqCst);
        }
    }
}
