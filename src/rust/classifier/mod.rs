use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

mod linear;
mod onnx;

pub use linear::{LinearClassifier, LinearWeights};
pub use onnx::OnnxClassifier;

/// Tolerance for probabilities that drift slightly outside [0, 1] through float error
const PROBABILITY_TOLERANCE: f32 = 1e-4;

/// A pretrained probabilistic classifier over feature matrices.
///
/// Any model able to map a `[rows, features]` matrix to one probability
/// distribution per row satisfies this trait, which lets tests substitute
/// deterministic stubs for a real artifact.
///
/// Implementations are shared read-only across calls (and possibly threads),
/// so they must be `Send + Sync` and must not mutate state while predicting.
pub trait Classifier: Send + Sync {
    /// Returns a `[rows, classes]` matrix of class probabilities
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// Number of input features the model expects, when the artifact records it
    fn num_features(&self) -> Option<usize> {
        None
    }

    /// Input feature names in training order, when the artifact records them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Class-membership probabilities for one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities(Vec<f32>);

impl ClassProbabilities {
    /// Index of the "high quality" class
    pub const POSITIVE: usize = 1;

    /// Wraps a distribution; at least the negative and positive classes are required
    pub fn new(probabilities: Vec<f32>) -> Result<Self> {
        if probabilities.len() <= Self::POSITIVE {
            return Err(EditorError::Model(format!(
                "Expected at least 2 class probabilities, found {}",
                probabilities.len()
            )));
        }
        Ok(Self(probabilities))
    }

    /// Probability of the positive class
    pub fn positive(&self) -> f32 {
        self.0[Self::POSITIVE]
    }

    pub fn get(&self, class: usize) -> Option<f32> {
        self.0.get(class).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn num_classes(&self) -> usize {
        self.0.len()
    }
}

/// Checks a raw classifier output and splits it into per-row distributions.
///
/// The output must have one row per input and at least two classes; every value
/// must be finite and within [0, 1] up to a small tolerance, then gets clamped.
pub(crate) fn to_distributions(output: Array2<f32>, expected_rows: usize) -> Result<Vec<ClassProbabilities>> {
    if output.nrows() != expected_rows {
        return Err(EditorError::Model(format!(
            "Classifier returned {} rows for {} inputs",
            output.nrows(),
            expected_rows
        )));
    }
    if output.ncols() <= ClassProbabilities::POSITIVE {
        return Err(EditorError::Model(format!(
            "Classifier must return at least 2 class probabilities, found {}",
            output.ncols()
        )));
    }

    output
        .outer_iter()
        .enumerate()
        .map(|(row, probabilities)| {
            probabilities
                .iter()
                .map(|&p| {
                    if !p.is_finite() || p < -PROBABILITY_TOLERANCE || p > 1.0 + PROBABILITY_TOLERANCE {
                        Err(EditorError::Model(format!(
                            "Classifier returned probability {} for input {}",
                            p,
                            row + 1
                        )))
                    } else {
                        Ok(p.clamp(0.0, 1.0))
                    }
                })
                .collect::<Result<Vec<f32>>>()
                .map(ClassProbabilities)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_distributions_are_clamped() {
        let dists = to_distributions(array![[0.25, 0.75], [1.00001, -0.00001]], 2).unwrap();
        assert_eq!(dists[0].positive(), 0.75);
        assert_eq!(dists[1].as_slice(), &[1.0, 0.0]);
        assert_eq!(dists[1].num_classes(), 2);
    }

    #[test]
    fn test_malformed_outputs() {
        assert!(matches!(to_distributions(array![[0.5, 0.5]], 2), Err(EditorError::Model(_))));
        assert!(matches!(to_distributions(array![[1.0]], 1), Err(EditorError::Model(_))));
        assert!(matches!(to_distributions(array![[0.5, 1.5]], 1), Err(EditorError::Model(_))));
        assert!(matches!(to_distributions(array![[0.5, f32::NAN]], 1), Err(EditorError::Model(_))));
    }

    #[test]
    fn test_single_class_distribution_is_rejected() {
        assert!(matches!(ClassProbabilities::new(vec![0.9]), Err(EditorError::Model(_))));
        assert_eq!(ClassProbabilities::new(vec![0.1, 0.9]).unwrap().positive(), 0.9);
    }
}
