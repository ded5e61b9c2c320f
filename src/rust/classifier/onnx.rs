use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use ndarray::{Array2, ArrayView2, Ix2};
use ort::session::Session;
use ort::value::Tensor;

use super::Classifier;
use crate::error::{EditorError, Result};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Output name used by scikit-learn exporters for the probability tensor
const PROBABILITY_OUTPUT: &str = "probabilities";

/// A classifier served by ONNX Runtime.
///
/// The model must take a single float input of shape `[batch, n_features]` and
/// expose a float probability output of shape `[batch, n_classes]`, either named
/// `probabilities` or as its last output. This is the layout of scikit-learn
/// classifiers exported with the zipmap disabled.
///
/// # Thread Safety
///
/// `Session::run` takes `&self`; concurrent inference relies on ONNX Runtime's
/// own guarantee that a session can be run from several threads.
#[derive(Debug)]
pub struct OnnxClassifier {
    model_path: String,
    session: Arc<Session>,
    input_name: String,
    output_index: usize,
    num_features: Option<usize>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxClassifier>();
    }
};

impl OnnxClassifier {
    /// Loads the model at `model_path` into a new session
    ///
    /// # Errors
    /// - `Model` if the file does not exist, cannot be loaded, or does not have
    ///   exactly one input and at least one output
    pub fn load(model_path: impl AsRef<Path>, config: &RuntimeConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(EditorError::Model(format!("Model file not found: {:?}", model_path)));
        }

        let session = create_session_builder(config)?
            .commit_from_file(model_path)
            .map_err(|e| {
                error!("Failed to load model {:?}: {}", model_path, e);
                EditorError::Model(format!("Failed to load model {:?}: {}", model_path, e))
            })?;

        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        let input_name = session.inputs[0].name.clone();
        let output_index = session
            .outputs
            .iter()
            .position(|output| output.name == PROBABILITY_OUTPUT)
            .unwrap_or(session.outputs.len() - 1);
        info!(
            "ONNX classifier loaded from {:?} (input '{}', output '{}')",
            model_path, input_name, session.outputs[output_index].name
        );

        Ok(Self {
            model_path: model_path.to_string_lossy().to_string(),
            session: Arc::new(session),
            input_name,
            output_index,
            num_features: None,
        })
    }

    /// Records the expected input width so it can be checked against the feature schema
    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = Some(num_features);
        self
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    fn validate_model(session: &Session) -> Result<()> {
        if session.inputs.len() != 1 {
            return Err(EditorError::Model(format!(
                "Model must have exactly 1 input (the feature matrix), found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(EditorError::Model(
                "Model must have at least 1 output for class probabilities".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if let Some(expected) = self.num_features {
            if features.ncols() != expected {
                return Err(EditorError::Model(format!(
                    "Model expects {} features, got {}",
                    expected,
                    features.ncols()
                )));
            }
        }

        let input_dyn = features.to_owned().into_dyn();
        let input = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input)
                .map_err(|e| EditorError::Model(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| EditorError::Model(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[self.output_index]
            .try_extract_tensor::<f32>()
            .map_err(|e| EditorError::Model(format!("Failed to extract output tensor: {}", e)))?;

        let probabilities = output_tensor
            .into_dimensionality::<Ix2>()
            .map_err(|e| EditorError::Model(format!("Probability output is not a matrix: {}", e)))?;
        Ok(probabilities.to_owned())
    }

    fn num_features(&self) -> Option<usize> {
        self.num_features
    }
}
