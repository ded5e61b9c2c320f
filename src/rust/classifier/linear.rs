use std::fs;
use std::path::Path;

use log::info;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::Classifier;
use crate::error::{EditorError, Result};

/// Serialized form of a logistic regression model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    pub intercept: f32,
    pub weights: Vec<f32>,
    pub feature_order: Vec<String>,
}

/// Binary logistic regression classifier.
///
/// Produces `[1 - p, p]` for each row, with `p = sigmoid(w · x + b)`. Holds no
/// interior mutability, so concurrent reads from several threads are safe.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: LinearWeights,
    coefficients: Array1<f32>,
}

impl LinearClassifier {
    pub fn new(weights: LinearWeights) -> Result<Self> {
        if weights.weights.is_empty() {
            return Err(EditorError::Model("Linear model has no weights".into()));
        }
        if weights.weights.len() != weights.feature_order.len() {
            return Err(EditorError::Model(format!(
                "Linear model has {} weights for {} features",
                weights.weights.len(),
                weights.feature_order.len()
            )));
        }
        if !weights.intercept.is_finite() || weights.weights.iter().any(|w| !w.is_finite()) {
            return Err(EditorError::Model("Linear model has non-finite weights".into()));
        }

        let coefficients = Array1::from(weights.weights.clone());
        Ok(Self { weights, coefficients })
    }

    /// Loads a model from its JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| EditorError::Model(format!("Failed to read linear model {:?}: {}", path, e)))?;
        let weights: LinearWeights = serde_json::from_str(&data)
            .map_err(|e| EditorError::Model(format!("Failed to parse linear model {:?}: {}", path, e)))?;
        let model = Self::new(weights)?;
        info!("Linear model loaded from {:?} ({} features)", path, model.coefficients.len());
        Ok(model)
    }

    pub fn weights(&self) -> &LinearWeights {
        &self.weights
    }
}

impl Classifier for LinearClassifier {
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if features.ncols() != self.coefficients.len() {
            return Err(EditorError::Model(format!(
                "Linear model expects {} features, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }

        let logits = features.dot(&self.coefficients) + self.weights.intercept;
        let mut output = Array2::zeros((features.nrows(), 2));
        for (mut row, &logit) in output.outer_iter_mut().zip(logits.iter()) {
            let p = sigmoid(logit);
            row[0] = 1.0 - p;
            row[1] = p;
        }
        Ok(output)
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.weights.feature_order)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn model() -> LinearClassifier {
        LinearClassifier::new(LinearWeights {
            intercept: 0.0,
            weights: vec![2.0, -1.0],
            feature_order: vec!["a".into(), "b".into()],
        })
        .unwrap()
    }

    #[test]
    fn test_probabilities() {
        let output = model().predict_proba(array![[0.0, 0.0], [1.0, 0.0], [0.0, 3.0]].view()).unwrap();
        assert!((output[[0, 1]] - 0.5).abs() < 1e-6);
        assert!(output[[1, 1]] > 0.85);
        assert!(output[[2, 1]] < 0.05);
        for row in output.outer_iter() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_width_mismatch() {
        assert!(matches!(
            model().predict_proba(array![[1.0]].view()),
            Err(EditorError::Model(_))
        ));
    }

    #[test]
    fn test_invalid_weights() {
        let result = LinearClassifier::new(LinearWeights {
            intercept: 0.0,
            weights: vec![1.0],
            feature_order: vec!["a".into(), "b".into()],
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, serde_json::to_string(model().weights()).unwrap()).unwrap();
        let loaded = LinearClassifier::load(&path).unwrap();
        assert_eq!(loaded.feature_names().unwrap(), &["a".to_string(), "b".to_string()]);
        assert!(LinearClassifier::load(dir.path().join("missing.json")).is_err());
    }
}
