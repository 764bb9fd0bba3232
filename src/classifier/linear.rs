//! Linear reference classifier.
//!
//! The model summarizes every tensor column of a window by its mean and
//! population standard deviation, applies one linear layer and returns the
//! softmax of the resulting logits. Models are stored as JSON:
//!
//! ```json
//! {
//!   "input_width": 3,
//!   "weights": [[...6 values...], ...one row per class...],
//!   "bias": [...one value per class...]
//! }
//! ```
//!
//! Each weight row holds the column means first, then the column standard
//! deviations.

use crate::classifier::{Classifier, ClassifierLoader, InferenceError, LoadError};
use crate::core::dispatch::NUM_CLASSES;
use crate::core::fusion::{SensorSet, Window};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Bundled model for the full sensor set.
pub const BUNDLED_FULL_MODEL: &[u8] = include_bytes!("../../models/activity_linear.json");

/// Bundled model for the accelerometer-only sensor set.
pub const BUNDLED_ACCELEROMETER_MODEL: &[u8] =
    include_bytes!("../../models/activity_linear.acc.json");

/// Serialized form of a linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Number of tensor columns per timestep the model was trained on
    pub input_width: usize,
    /// One row per class, `2 * input_width` values each
    pub weights: Vec<Vec<f32>>,
    /// One bias per class
    pub bias: Vec<f32>,
}

impl LinearModel {
    /// Check that the model fits windows of `input_width` columns and
    /// produces `num_classes` scores.
    pub fn validate(&self, input_width: usize, num_classes: usize) -> Result<(), LoadError> {
        if self.input_width != input_width {
            return Err(LoadError::Shape(format!(
                "model input width is {}, sensors provide {}",
                self.input_width, input_width
            )));
        }
        if self.weights.len() != num_classes || self.bias.len() != num_classes {
            return Err(LoadError::Shape(format!(
                "model has {} weight rows and {} biases, expected {} classes",
                self.weights.len(),
                self.bias.len(),
                num_classes
            )));
        }
        let features = 2 * input_width;
        if let Some(row) = self.weights.iter().position(|r| r.len() != features) {
            return Err(LoadError::Shape(format!(
                "weight row {row} has {} values, expected {features}",
                self.weights[row].len()
            )));
        }
        let all_finite = self
            .weights
            .iter()
            .flatten()
            .chain(self.bias.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(LoadError::Shape("model contains non-finite values".to_string()));
        }
        Ok(())
    }
}

/// Loads `LinearModel`s for a fixed tensor width.
#[derive(Debug, Clone)]
pub struct LinearLoader {
    input_width: usize,
    num_classes: usize,
}

impl LinearLoader {
    pub fn new(input_width: usize, num_classes: usize) -> Self {
        Self {
            input_width,
            num_classes,
        }
    }

    /// Loader for windows produced by the given sensor set.
    pub fn for_sensors(sensors: &SensorSet) -> Self {
        Self::new(sensors.row_width(), NUM_CLASSES)
    }
}

impl ClassifierLoader for LinearLoader {
    fn load(&self, model: &[u8]) -> Result<Box<dyn Classifier>, LoadError> {
        let model: LinearModel = serde_json::from_slice(model)?;
        model.validate(self.input_width, self.num_classes)?;
        Ok(Box::new(LinearClassifier::new(model)))
    }
}

/// A loaded linear model.
#[derive(Debug)]
pub struct LinearClassifier {
    model: LinearModel,
}

impl LinearClassifier {
    pub fn new(model: LinearModel) -> Self {
        Self { model }
    }

    /// Column means followed by column standard deviations.
    pub fn features(window: &Window) -> Vec<f64> {
        let width = window.row_width();
        let mut means = Vec::with_capacity(width);
        let mut deviations = Vec::with_capacity(width);
        for column in 0..width {
            let values: Vec<f64> = window.column(column).map(f64::from).collect();
            means.push(values.iter().mean());
            deviations.push(values.iter().population_std_dev());
        }
        means.extend(deviations);
        means
    }
}

impl Classifier for LinearClassifier {
    fn infer(&mut self, window: &Window) -> Result<Vec<f32>, InferenceError> {
        if window.row_width() != self.model.input_width {
            return Err(InferenceError::InputShape {
                expected: self.model.input_width,
                actual: window.row_width(),
            });
        }

        let features = Self::features(window);
        let logits: Vec<f64> = self
            .model
            .weights
            .iter()
            .zip(&self.model.bias)
            .map(|(row, &bias)| {
                row.iter()
                    .zip(&features)
                    .map(|(&w, &x)| f64::from(w) * x)
                    .sum::<f64>()
                    + f64::from(bias)
            })
            .collect();

        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f64]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| (e / sum) as f32).collect()
}
