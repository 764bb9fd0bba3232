//! Inference dispatch: completed window in, activity label out.

use crate::classifier::{Classifier, InferenceError};
use crate::core::fusion::Window;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of activity classes.
pub const NUM_CLASSES: usize = 6;

/// Human-readable activity names, indexed by class.
pub const ACTIVITY_LABELS: [&str; NUM_CLASSES] = [
    "Walking",
    "Walking Upstairs",
    "Walking Downstairs",
    "Sitting",
    "Standing",
    "Laying",
];

/// Per-class scores returned by a classifier, indexed by class.
pub type ClassScores = Vec<f32>;

/// Wire code reported to observers when no classifier is loaded.
pub const UNAVAILABLE_CODE: i32 = -1;

/// Result of classifying a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    /// Index of the winning class
    Activity(usize),
    /// The classifier failed to load; inference is unavailable
    Unavailable,
}

impl ActivityLabel {
    /// Integer code: the class index, or `UNAVAILABLE_CODE`.
    pub fn code(self) -> i32 {
        match self {
            ActivityLabel::Activity(index) => index as i32,
            ActivityLabel::Unavailable => UNAVAILABLE_CODE,
        }
    }

    /// Activity name, if the index is a known class.
    pub fn name(self) -> Option<&'static str> {
        match self {
            ActivityLabel::Activity(index) => ACTIVITY_LABELS.get(index).copied(),
            ActivityLabel::Unavailable => None,
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.name()) {
            (_, Some(name)) => f.write_str(name),
            (ActivityLabel::Activity(index), None) => write!(f, "class {index}"),
            (ActivityLabel::Unavailable, None) => f.write_str("unavailable"),
        }
    }
}

/// Index of the highest score.
///
/// Scans in ascending index order and only replaces the best score with a
/// strictly greater one, so the lowest index wins ties. NaN scores are
/// skipped. Returns `None` for an empty slice or one holding only NaN.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Runs the classifier on completed windows.
pub struct InferenceDispatcher {
    classifier: Option<Box<dyn Classifier>>,
    num_classes: usize,
}

impl InferenceDispatcher {
    /// Dispatcher without a classifier; every window yields `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            classifier: None,
            num_classes: NUM_CLASSES,
        }
    }

    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        Self {
            classifier: Some(classifier),
            num_classes: NUM_CLASSES,
        }
    }

    /// Override the number of classes the classifier must score.
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }

    /// Classify a complete window.
    ///
    /// Without a loaded classifier this returns `Unavailable` and never
    /// calls into a model.
    pub fn infer(&mut self, window: &Window) -> Result<ActivityLabel, InferenceError> {
        let Some(classifier) = self.classifier.as_mut() else {
            return Ok(ActivityLabel::Unavailable);
        };

        let scores: ClassScores = classifier.infer(window)?;
        if scores.len() != self.num_classes {
            return Err(InferenceError::ScoreCount {
                expected: self.num_classes,
                actual: scores.len(),
            });
        }

        if !scores.iter().any(|s| s.is_finite()) {
            return Err(InferenceError::NonFiniteScores);
        }

        argmax(&scores)
            .map(ActivityLabel::Activity)
            .ok_or(InferenceError::NonFiniteScores)
    }

    /// Release and drop the classifier. Later windows yield `Unavailable`.
    pub fn release(&mut self) {
        if let Some(mut classifier) = self.classifier.take() {
            classifier.release();
        }
    }
}

impl Drop for InferenceDispatcher {
    fn drop(&mut self) {
        self.release();
    }
}
