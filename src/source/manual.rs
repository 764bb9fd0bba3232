//! Host-driven sensor source.
//!
//! The embedding application (or a test) pushes readings through a
//! `SampleInjector`. Like an OS sensor service, readings for sensors that
//! are not subscribed are never delivered.

use crate::source::types::{SensorId, SensorSample};
use crate::source::{SensorSource, SourceError, SubscriptionFlags};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::Arc;

/// A source whose samples are injected by the caller.
pub struct ManualSource {
    sender: Sender<SensorSample>,
    receiver: Receiver<SensorSample>,
    subscriptions: Arc<SubscriptionFlags>,
}

impl ManualSource {
    /// Create a new manual source with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            subscriptions: Arc::new(SubscriptionFlags::default()),
        }
    }

    /// Get a handle that can push samples into this source.
    pub fn injector(&self) -> SampleInjector {
        SampleInjector {
            sender: self.sender.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl SensorSource for ManualSource {
    fn subscribe(&mut self, sensor: SensorId) -> Result<(), SourceError> {
        if self.subscriptions.get(sensor) {
            return Err(SourceError::AlreadySubscribed(sensor));
        }
        self.subscriptions.set(sensor, true);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscriptions.clear();
    }

    fn is_subscribed(&self, sensor: SensorId) -> bool {
        self.subscriptions.get(sensor)
    }

    fn receiver(&self) -> &Receiver<SensorSample> {
        &self.receiver
    }
}

/// Cloneable handle for pushing samples into a `ManualSource`.
#[derive(Clone)]
pub struct SampleInjector {
    sender: Sender<SensorSample>,
    subscriptions: Arc<SubscriptionFlags>,
}

impl SampleInjector {
    /// Deliver a reading for `sensor`.
    ///
    /// Returns `false` if the sensor is not subscribed or the channel is full
    /// or disconnected; the reading is discarded in that case.
    pub fn push(&self, sensor: SensorId, values: &[f32]) -> bool {
        self.push_sample(SensorSample::new(sensor, values))
    }

    /// Deliver an already-built sample.
    pub fn push_sample(&self, sample: SensorSample) -> bool {
        if !self.subscriptions.get(sample.sensor) {
            return false;
        }
        match self.sender.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
