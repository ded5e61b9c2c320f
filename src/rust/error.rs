use ort::Error as OrtError;
use thiserror::Error;

use crate::model_manager::ModelError;

/// Represents the different types of errors that can occur while scoring and explaining text.
///
/// None of these are recovered locally: every failure ends the current request.
#[derive(Debug, Error)]
pub enum EditorError {
    /// Malformed or invalid caller input
    #[error("Input error: {0}")]
    Input(String),
    /// Feature computation did not produce the expected feature set
    #[error("Schema error: {0}")]
    Schema(String),
    /// Classifier unavailable, malformed, or produced unusable output
    #[error("Model error: {0}")]
    Model(String),
    /// Attribution step failed or returned unusable output
    #[error("Explain error: {0}")]
    Explain(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<OrtError> for EditorError {
    fn from(err: OrtError) -> Self {
        EditorError::Model(err.to_string())
    }
}

impl From<ModelError> for EditorError {
    fn from(err: ModelError) -> Self {
        EditorError::Model(err.to_string())
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
