//! Pipeline telemetry.
//!
//! Counts what the fusion pipeline does with incoming samples and completed
//! windows. Counters are atomic so producer-side code and the session can
//! share one log behind an `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for the current run.
#[derive(Debug)]
pub struct TelemetryLog {
    /// Samples accepted into the fusion buffer
    samples_received: AtomicU64,
    /// Samples dropped because their sensor already filled the timestep
    samples_dropped: AtomicU64,
    /// Samples rejected at the feed boundary
    samples_rejected: AtomicU64,
    /// Timesteps completed
    timesteps_completed: AtomicU64,
    /// Windows completed
    windows_completed: AtomicU64,
    /// Windows classified successfully
    inferences: AtomicU64,
    /// Windows whose classification failed
    inference_failures: AtomicU64,
    /// Windows completed while no classifier was loaded
    unavailable_windows: AtomicU64,
    /// Run start time
    run_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TelemetryLog {
    /// Create a new telemetry log.
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            samples_rejected: AtomicU64::new(0),
            timesteps_completed: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            inferences: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            unavailable_windows: AtomicU64::new(0),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a telemetry log that continues from counters saved at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous telemetry: {e}");
        }

        log
    }

    pub fn record_sample_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_rejected(&self) {
        self.samples_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timestep_completed(&self) {
        self.timesteps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference(&self) {
        self.inferences.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable_window(&self) {
        self.unavailable_windows.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            timesteps_completed: self.timesteps_completed.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            unavailable_windows: self.unavailable_windows.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Samples fused: {}\n\
             - Duplicate samples dropped: {}\n\
             - Malformed samples rejected: {}\n\
             - Timesteps completed: {}\n\
             - Windows completed: {}\n\
             - Windows classified: {}\n\
             - Inference failures: {}\n\
             - Windows without classifier: {}\n\
             - Run duration: {} seconds",
            stats.samples_received,
            stats.samples_dropped,
            stats.samples_rejected,
            stats.timesteps_completed,
            stats.windows_completed,
            stats.inferences,
            stats.inference_failures,
            stats.unavailable_windows,
            stats.run_duration_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                samples_dropped: stats.samples_dropped,
                samples_rejected: stats.samples_rejected,
                timesteps_completed: stats.timesteps_completed,
                windows_completed: stats.windows_completed,
                inferences: stats.inferences,
                inference_failures: stats.inference_failures,
                unavailable_windows: stats.unavailable_windows,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.samples_dropped
                    .store(persisted.samples_dropped, Ordering::Relaxed);
                self.samples_rejected
                    .store(persisted.samples_rejected, Ordering::Relaxed);
                self.timesteps_completed
                    .store(persisted.timesteps_completed, Ordering::Relaxed);
                self.windows_completed
                    .store(persisted.windows_completed, Ordering::Relaxed);
                self.inferences.store(persisted.inferences, Ordering::Relaxed);
                self.inference_failures
                    .store(persisted.inference_failures, Ordering::Relaxed);
                self.unavailable_windows
                    .store(persisted.unavailable_windows, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.samples_received,
            &self.samples_dropped,
            &self.samples_rejected,
            &self.timesteps_completed,
            &self.windows_completed,
            &self.inferences,
            &self.inference_failures,
            &self.unavailable_windows,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of telemetry counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub samples_received: u64,
    pub samples_dropped: u64,
    pub samples_rejected: u64,
    pub timesteps_completed: u64,
    pub windows_completed: u64,
    pub inferences: u64,
    pub inference_failures: u64,
    pub unavailable_windows: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    samples_dropped: u64,
    #[serde(default)]
    samples_rejected: u64,
    timesteps_completed: u64,
    windows_completed: u64,
    inferences: u64,
    inference_failures: u64,
    unavailable_windows: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared telemetry log.
pub type SharedTelemetryLog = Arc<TelemetryLog>;

/// Create a new shared telemetry log.
pub fn create_shared_log() -> SharedTelemetryLog {
    Arc::new(TelemetryLog::new())
}

/// Create a new shared telemetry log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTelemetryLog {
    Arc::new(TelemetryLog::with_persistence(path))
}
