//! Session lifecycle and sample dispatch.
//!
//! A `Session` owns the fusion buffer, the inference dispatcher (and with it
//! the classifier), the sensor source and the observer. It is the single
//! consumer of the source channel, so every `feed` and every classifier call
//! happens on the thread that drives the session. Callers that want to feed
//! a session from several threads must wrap it in a mutex.
//!
//! ```text
//! Uninitialized --init--> Ready --start--> Listening --stop--> Paused
//!                                              ^                  |
//!                                              +------start-------+
//! any --close--> Closed
//! ```

use crate::classifier::{Classifier, ClassifierLoader, InferenceError, LoadError};
use crate::core::dispatch::{ActivityLabel, InferenceDispatcher};
use crate::core::fusion::{FeedError, FeedOutcome, Progress, SensorFusionBuffer, SensorSet};
use crate::source::{SensorId, SensorSource, SourceError, NUM_AXES};
use crate::telemetry::{create_shared_log, SharedTelemetryLog};
use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Listening,
    Paused,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Listening => "listening",
            SessionState::Paused => "paused",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {op} a session that is {state}")]
    InvalidTransition {
        op: &'static str,
        state: SessionState,
    },

    #[error("session is closed")]
    Closed,

    #[error("session is not listening (state: {0})")]
    NotListening(SessionState),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("rejected sample: {0}")]
    Feed(#[from] FeedError),

    #[error("sensor source error: {0}")]
    Source(#[from] SourceError),

    #[error("sensor source disconnected")]
    SourceDisconnected,
}

/// Receives progress and activity notifications from a session.
pub trait ActivityObserver: Send {
    /// Fill progress of the current window. `last_values` holds the reading
    /// that completed the last timestep, or `None` after a reset.
    fn on_progress(&mut self, filled: usize, total: usize, last_values: Option<[f32; NUM_AXES]>);

    /// An activity was inferred, or inference is unavailable.
    fn on_activity(&mut self, label: ActivityLabel);

    /// The classifier failed on a completed window.
    fn on_inference_error(&mut self, _error: &InferenceError) {}
}

/// Fixed parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub sensors: SensorSet,
    pub num_timesteps: usize,
}

impl SessionConfig {
    pub fn new(sensors: SensorSet, num_timesteps: usize) -> Self {
        Self {
            sensors,
            num_timesteps,
        }
    }
}

/// Activity recognition session over one sensor source.
pub struct Session<S: SensorSource> {
    state: SessionState,
    config: SessionConfig,
    buffer: Option<SensorFusionBuffer>,
    dispatcher: InferenceDispatcher,
    source: Option<S>,
    /// Notifications are skipped while no observer is attached
    observer: Option<Box<dyn ActivityObserver>>,
    telemetry: SharedTelemetryLog,
}

impl<S: SensorSource> Session<S> {
    /// Create an uninitialized session.
    pub fn new(config: SessionConfig, source: S) -> Result<Self, SessionError> {
        if config.num_timesteps == 0 {
            return Err(SessionError::InvalidConfig(
                "a window needs at least one timestep".to_string(),
            ));
        }
        Ok(Self {
            state: SessionState::Uninitialized,
            config,
            buffer: None,
            dispatcher: InferenceDispatcher::unavailable(),
            source: Some(source),
            observer: None,
            telemetry: create_shared_log(),
        })
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Box<dyn ActivityObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record counters into `telemetry` instead of a private log.
    pub fn with_telemetry(mut self, telemetry: SharedTelemetryLog) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &SharedTelemetryLog {
        &self.telemetry
    }

    /// Whether a classifier is loaded.
    pub fn is_classifier_available(&self) -> bool {
        self.dispatcher.is_available()
    }

    /// The fusion buffer, once the session is initialized.
    pub fn buffer(&self) -> Option<&SensorFusionBuffer> {
        self.buffer.as_ref()
    }

    /// Load the classifier and allocate the fusion buffer.
    ///
    /// A model that fails to load is not an error of this call: it is
    /// reported to the observer as `ActivityLabel::Unavailable` and every
    /// later window yields the same label. Calling `init` again retries.
    pub fn init(
        &mut self,
        loader: &dyn ClassifierLoader,
        model: &[u8],
    ) -> Result<(), SessionError> {
        self.check_init()?;
        let loaded = loader.load(model);
        self.finish_init(loaded);
        Ok(())
    }

    /// Like `init`, reading the model from `path`.
    pub fn init_from_path(
        &mut self,
        loader: &dyn ClassifierLoader,
        path: &Path,
    ) -> Result<(), SessionError> {
        self.check_init()?;
        tracing::debug!(path = %path.display(), "loading model");
        let loaded = std::fs::read(path)
            .map_err(LoadError::from)
            .and_then(|bytes| loader.load(&bytes));
        self.finish_init(loaded);
        Ok(())
    }

    fn check_init(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uninitialized | SessionState::Ready | SessionState::Paused => Ok(()),
            SessionState::Closed => Err(SessionError::Closed),
            state => Err(SessionError::InvalidTransition { op: "init", state }),
        }
    }

    fn finish_init(&mut self, loaded: Result<Box<dyn Classifier>, LoadError>) {
        self.dispatcher.release();
        match loaded {
            Ok(classifier) => {
                tracing::debug!("model loaded");
                self.dispatcher = InferenceDispatcher::new(classifier);
            }
            Err(e) => {
                tracing::error!("error loading model: {e}");
                self.dispatcher = InferenceDispatcher::unavailable();
                self.notify_activity(ActivityLabel::Unavailable);
            }
        }
        self.buffer = Some(SensorFusionBuffer::new(
            self.config.sensors.clone(),
            self.config.num_timesteps,
        ));
        self.state = SessionState::Ready;
    }

    /// Subscribe to every active sensor and start a fresh window.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Ready | SessionState::Paused => {}
            SessionState::Closed => return Err(SessionError::Closed),
            state => return Err(SessionError::InvalidTransition { op: "start", state }),
        }

        let source = self.source.as_mut().ok_or(SessionError::Closed)?;
        for sensor in self.config.sensors.iter() {
            tracing::debug!(%sensor, "registering sensor");
            if let Err(e) = source.subscribe(sensor) {
                source.unsubscribe();
                return Err(e.into());
            }
        }

        self.state = SessionState::Listening;
        if let Some(buffer) = self.buffer.as_mut() {
            let progress = buffer.reset();
            self.notify_progress(progress);
        }
        Ok(())
    }

    /// Unsubscribe from the source. The partial window is kept until the
    /// next `start` discards it.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Listening => {}
            SessionState::Closed => return Err(SessionError::Closed),
            state => return Err(SessionError::InvalidTransition { op: "stop", state }),
        }

        if let Some(source) = self.source.as_mut() {
            source.unsubscribe();
            // Drop readings that were queued before the unsubscribe
            while source.receiver().try_recv().is_ok() {}
        }
        self.state = SessionState::Paused;
        tracing::debug!("session paused");
        Ok(())
    }

    /// Release the classifier, the source and the observer. Terminal.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(mut source) = self.source.take() {
            if self.state == SessionState::Listening {
                source.unsubscribe();
            }
        }
        self.dispatcher.release();
        self.buffer = None;
        self.observer = None;
        self.state = SessionState::Closed;
        tracing::debug!("session closed");
    }

    /// Fuse one reading. Completing the window runs inference before this
    /// returns.
    pub fn feed(&mut self, sensor: SensorId, values: &[f32]) -> Result<(), SessionError> {
        if self.state != SessionState::Listening {
            return Err(match self.state {
                SessionState::Closed => SessionError::Closed,
                state => SessionError::NotListening(state),
            });
        }
        let buffer = self
            .buffer
            .as_mut()
            .ok_or(SessionError::NotListening(self.state))?;

        let outcome = match buffer.feed(sensor, values) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.telemetry.record_sample_rejected();
                tracing::warn!(%sensor, "rejected sample: {e}");
                return Err(e.into());
            }
        };

        match outcome {
            FeedOutcome::Duplicate => {
                self.telemetry.record_sample_dropped();
            }
            FeedOutcome::Stored => {
                self.telemetry.record_sample_received();
            }
            FeedOutcome::Advanced(progress) => {
                self.telemetry.record_sample_received();
                self.telemetry.record_timestep_completed();
                self.notify_progress(progress);
            }
            FeedOutcome::WindowComplete { window, reset } => {
                self.telemetry.record_sample_received();
                self.telemetry.record_timestep_completed();
                self.telemetry.record_window_completed();

                match self.dispatcher.infer(&window) {
                    Ok(ActivityLabel::Unavailable) => {
                        self.telemetry.record_unavailable_window();
                        self.notify_activity(ActivityLabel::Unavailable);
                    }
                    Ok(label) => {
                        self.telemetry.record_inference();
                        tracing::debug!(%label, "activity inferred");
                        self.notify_activity(label);
                    }
                    Err(e) => {
                        self.telemetry.record_inference_failure();
                        tracing::error!("inference failed: {e}");
                        if let Some(observer) = self.observer.as_mut() {
                            observer.on_inference_error(&e);
                        }
                    }
                }
                self.notify_progress(reset);
            }
        }
        Ok(())
    }

    /// Wait up to `timeout` for readings and fuse everything queued.
    ///
    /// Returns the number of readings consumed. A rejected reading stops the
    /// drain and is returned as an error; readings behind it stay queued.
    pub fn poll(&mut self, timeout: Duration) -> Result<usize, SessionError> {
        if self.state != SessionState::Listening {
            return Err(match self.state {
                SessionState::Closed => SessionError::Closed,
                state => SessionError::NotListening(state),
            });
        }
        let receiver = self
            .source
            .as_ref()
            .ok_or(SessionError::Closed)?
            .receiver()
            .clone();

        let first = match receiver.recv_timeout(timeout) {
            Ok(sample) => sample,
            Err(RecvTimeoutError::Timeout) => return Ok(0),
            Err(RecvTimeoutError::Disconnected) => return Err(SessionError::SourceDisconnected),
        };
        self.feed(first.sensor, &first.values)?;

        let mut consumed = 1;
        while self.state == SessionState::Listening {
            let Ok(sample) = receiver.try_recv() else {
                break;
            };
            self.feed(sample.sensor, &sample.values)?;
            consumed += 1;
        }
        Ok(consumed)
    }

    fn notify_progress(&mut self, progress: Progress) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_progress(progress.filled, progress.total, progress.last_values);
        }
    }

    fn notify_activity(&mut self, label: ActivityLabel) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_activity(label);
        }
    }
}

impl<S: SensorSource> Drop for Session<S> {
    fn drop(&mut self) {
        self.close();
    }
}
