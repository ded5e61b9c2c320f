use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{Classifier, LinearClassifier, OnnxClassifier};
use crate::error::Result;
use crate::explain::TrainingStatistics;
use crate::features::{FeatureSchema, FeatureSpec};
use crate::runtime::RuntimeConfig;

/// Name of the descriptor file inside every model directory
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid manifest {path}: {message}")]
    ManifestError { path: String, message: String },
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// ONNX graph run by ONNX Runtime
    Onnx,
    /// JSON logistic regression weights
    Linear,
}

/// Contents of a model directory's `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub format: ModelFormat,
    /// Classifier artifact, relative to the model directory
    pub model_file: String,
    /// Input features in training order. When empty, the linear model's own
    /// feature order or the text statistics catalogue is used.
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    /// Training statistics for the default explainer, relative to the model directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainer_file: Option<String>,
    /// Lowercase hex SHA-256 of the model file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainer_hash: Option<String>,
}

impl ModelManifest {
    pub fn new(name: impl Into<String>, format: ModelFormat, model_file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format,
            model_file: model_file.into(),
            features: Vec::new(),
            explainer_file: None,
            model_hash: None,
            explainer_hash: None,
        }
    }
}

/// Everything needed to score and explain with one stored model
pub struct LoadedModel {
    pub manifest: ModelManifest,
    pub schema: Arc<FeatureSchema>,
    pub classifier: Arc<dyn Classifier>,
    pub statistics: Option<TrainingStatistics>,
}

#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("PROOFREAD_MODELS") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("proofread").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("proofread").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("proofread").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_dir(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }

    pub fn get_manifest_path(&self, name: &str) -> PathBuf {
        self.get_model_dir(name).join(MANIFEST_FILE)
    }

    pub fn is_model_available(&self, name: &str) -> bool {
        let manifest_path = self.get_manifest_path(name);
        log::debug!("Checking model '{}' at {:?} (exists: {})", name, manifest_path, manifest_path.exists());
        manifest_path.exists()
    }

    /// Names of all model directories holding a manifest, sorted
    pub fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.models_dir)? {
            let entry = entry?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_manifest(&self, name: &str) -> Result<ModelManifest, ModelError> {
        if !self.is_model_available(name) {
            return Err(ModelError::NotFound(format!(
                "'{}' has no {} under {:?}",
                name, MANIFEST_FILE, self.models_dir
            )));
        }
        read_manifest(&self.get_model_dir(name))
    }

    /// Writes `manifest` into its model directory, creating the directory
    pub fn write_manifest(&self, manifest: &ModelManifest) -> Result<PathBuf, ModelError> {
        let model_dir = self.get_model_dir(&manifest.name);
        fs::create_dir_all(&model_dir)?;
        let path = model_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest).map_err(|e| ModelError::ManifestError {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&path, json)?;
        log::info!("Wrote manifest for '{}' to {:?}", manifest.name, path);
        Ok(path)
    }

    /// Checks every file the manifest records a hash for.
    ///
    /// Returns `false` when a file is missing or its hash differs.
    pub fn verify_model(&self, name: &str) -> Result<bool, ModelError> {
        let manifest = self.load_manifest(name)?;
        let model_dir = self.get_model_dir(name);

        for (file, hash) in hashed_files(&manifest) {
            let path = model_dir.join(file);
            if !path.exists() {
                log::info!("File {:?} does not exist", path);
                return Ok(false);
            }
            if !verify_file(&path, hash)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Loads the named model with its schema and explainer statistics
    pub fn load(&self, name: &str, config: &RuntimeConfig) -> Result<LoadedModel> {
        if !self.is_model_available(name) {
            return Err(ModelError::NotFound(format!(
                "'{}' has no {} under {:?}",
                name, MANIFEST_FILE, self.models_dir
            ))
            .into());
        }
        load_model_dir(&self.get_model_dir(name), config)
    }
}

/// Loads a model directory that is not managed by a [`ModelManager`]
pub fn load_model_dir(model_dir: &Path, config: &RuntimeConfig) -> Result<LoadedModel> {
    let manifest = read_manifest(model_dir)?;
    log::info!("Loading model '{}' ({:?}) from {:?}", manifest.name, manifest.format, model_dir);

    for (file, expected) in hashed_files(&manifest) {
        let path = model_dir.join(file);
        if !path.exists() {
            log::error!("Hashed file {:?} is missing", path);
            return Err(ModelError::VerificationFailed.into());
        }
        let actual = file_hash(&path)?;
        if actual != *expected {
            log::error!("{} hash mismatch: expected {}, got {}", file, expected, actual);
            return Err(ModelError::HashMismatch {
                file_type: file.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    let model_path = model_dir.join(&manifest.model_file);
    let (schema, classifier): (FeatureSchema, Arc<dyn Classifier>) = match manifest.format {
        ModelFormat::Linear => {
            let classifier = LinearClassifier::load(&model_path)?;
            let schema = if manifest.features.is_empty() {
                FeatureSchema::new(classifier.weights().feature_order.iter())?
            } else {
                FeatureSchema::from_specs(&manifest.features)?
            };
            (schema, Arc::new(classifier))
        }
        ModelFormat::Onnx => {
            let schema = if manifest.features.is_empty() {
                FeatureSchema::text_statistics()
            } else {
                FeatureSchema::from_specs(&manifest.features)?
            };
            let classifier = OnnxClassifier::load(&model_path, config)?.with_num_features(schema.len());
            (schema, Arc::new(classifier))
        }
    };

    let statistics = match &manifest.explainer_file {
        Some(file) => {
            let statistics = TrainingStatistics::load(model_dir.join(file))?;
            statistics.check_schema(&schema)?;
            Some(statistics)
        }
        None => None,
    };

    Ok(LoadedModel {
        manifest,
        schema: Arc::new(schema),
        classifier,
        statistics,
    })
}

fn read_manifest(model_dir: &Path) -> Result<ModelManifest, ModelError> {
    let path = model_dir.join(MANIFEST_FILE);
    let data = fs::read_to_string(&path)?;
    serde_json::from_str(&data).map_err(|e| ModelError::ManifestError {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })
}

fn hashed_files(manifest: &ModelManifest) -> Vec<(&str, &str)> {
    let mut files = Vec::new();
    if let Some(hash) = &manifest.model_hash {
        files.push((manifest.model_file.as_str(), hash.as_str()));
    }
    if let (Some(file), Some(hash)) = (&manifest.explainer_file, &manifest.explainer_hash) {
        files.push((file.as_str(), hash.as_str()));
    }
    files
}

/// Lowercase hex SHA-256 of a file's contents
pub fn file_hash(path: &Path) -> Result<String, ModelError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify_file(path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
    log::info!("Verifying file: {:?}", path);
    let hash = file_hash(path)?;
    log::debug!("Calculated hash: {}", hash);
    log::debug!("Expected hash:   {}", expected_hash);
    Ok(hash == expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        // Test with environment variable
        env::set_var("PROOFREAD_MODELS", "/tmp/test-proofread");
        let path = ModelManager::get_default_models_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-proofread"));
        env::remove_var("PROOFREAD_MODELS");

        // Test without environment variable
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("proofread"));
    }

    #[test]
    fn test_file_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "abc").unwrap();
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(file_hash(&path).unwrap(), expected);
        assert!(verify_file(&path, expected).unwrap());
        assert!(!verify_file(&path, "00").unwrap());
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        assert!(!manager.is_model_available("absent"));
        assert!(matches!(manager.load_manifest("absent"), Err(ModelError::NotFound(_))));
        assert!(manager.list_models().unwrap().is_empty());
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest: ModelManifest =
            serde_json::from_str(r#"{"name": "m", "format": "onnx", "model_file": "model.onnx"}"#).unwrap();
        assert_eq!(manifest.format, ModelFormat::Onnx);
        assert!(manifest.features.is_empty());
        assert!(manifest.explainer_file.is_none());
    }
}
