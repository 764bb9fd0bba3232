//! Classifier capability.
//!
//! A classifier is loaded once from model bytes and then maps a complete
//! window to one score per activity class. The session only depends on the
//! `ClassifierLoader` / `Classifier` contract; `LinearClassifier` is the
//! bundled reference model.

pub mod linear;

use crate::core::fusion::Window;
use thiserror::Error;

pub use linear::{
    LinearClassifier, LinearLoader, LinearModel, BUNDLED_ACCELEROMETER_MODEL, BUNDLED_FULL_MODEL,
};

/// Errors that can occur while loading a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode model: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model does not fit the input: {0}")]
    Shape(String),
}

/// Errors raised by a loaded classifier during inference.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("window has {actual} values per timestep, model expects {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("classifier returned {actual} scores, expected {expected}")]
    ScoreCount { expected: usize, actual: usize },

    #[error("classifier returned no finite score")]
    NonFiniteScores,

    #[error("classifier failed: {0}")]
    Backend(String),
}

/// A loaded model.
pub trait Classifier: Send {
    /// Compute one score per class for a complete window.
    fn infer(&mut self, window: &Window) -> Result<Vec<f32>, InferenceError>;

    /// Release any resources held by the model. Called once before drop.
    fn release(&mut self) {}
}

/// Builds classifiers from serialized model bytes.
pub trait ClassifierLoader {
    fn load(&self, model: &[u8]) -> Result<Box<dyn Classifier>, LoadError>;
}

impl<F> ClassifierLoader for F
where
    F: Fn(&[u8]) -> Result<Box<dyn Classifier>, LoadError>,
{
    fn load(&self, model: &[u8]) -> Result<Box<dyn Classifier>, LoadError> {
        self(model)
    }
}
