use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::classifier::Classifier;
use crate::editor::{Editor, EditorConfig};
use crate::error::{EditorError, Result};
use crate::explain::{Explainer, ExplainerConfig, LimeTabularExplainer, TrainingStatistics};
use crate::features::{FeatureComputer, FeatureExtractor, FeatureSchema, TextStatistics};
use crate::model_manager::{load_model_dir, LoadedModel, ModelManager};
use crate::runtime::RuntimeConfig;

/// A builder for constructing an [`Editor`] with a fluent interface.
///
/// Every collaborator can be injected. Unset ones default to the built-in text
/// statistics for features and, when training statistics are available, a
/// [`LimeTabularExplainer`] for explanations. A classifier is always required.
#[derive(Default)]
pub struct EditorBuilder {
    schema: Option<Arc<FeatureSchema>>,
    computer: Option<Arc<dyn FeatureComputer>>,
    classifier: Option<Arc<dyn Classifier>>,
    explainer: Option<Arc<dyn Explainer>>,
    statistics: Option<TrainingStatistics>,
    explainer_config: ExplainerConfig,
    runtime_config: RuntimeConfig,
    config: EditorConfig,
    model_name: Option<String>,
}

impl EditorBuilder {
    /// Creates a new empty EditorBuilder instance with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before [`with_model`](Self::with_model) to take effect on
    /// the loaded session.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets the ordered features the classifier was trained on
    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Replaces the built-in text statistics as the source of feature values
    pub fn with_feature_computer(mut self, computer: impl FeatureComputer + 'static) -> Self {
        self.computer = Some(Arc::new(computer));
        self
    }

    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Uses `explainer` instead of the default one built from training statistics
    pub fn with_explainer(mut self, explainer: impl Explainer + 'static) -> Self {
        self.explainer = Some(Arc::new(explainer));
        self
    }

    /// Training statistics from which the default explainer is built
    pub fn with_training_statistics(mut self, statistics: TrainingStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_explainer_config(mut self, config: ExplainerConfig) -> Self {
        self.explainer_config = config;
        self
    }

    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of recommendations rendered when no count is given
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    /// Loads a named model from the default models directory
    ///
    /// # Arguments
    /// * `name` - Name of a model directory holding a `manifest.json`
    ///
    /// # Returns
    /// * `Result<Self>` - The builder instance if successful, or an error if:
    ///   - A classifier is already set
    ///   - The model is not installed
    ///   - A file fails hash verification
    ///   - The model, schema or explainer statistics failed to load
    ///
    /// # Example
    /// ```no_run
    /// use proofread::Editor;
    ///
    /// let editor = Editor::builder()
    ///     .with_model("question-quality")?
    ///     .build()?;
    /// # Ok::<(), proofread::EditorError>(())
    /// ```
    pub fn with_model(self, name: &str) -> Result<Self> {
        let manager = ModelManager::new_default()
            .map_err(|e| EditorError::Model(format!("Failed to create model manager: {}", e)))?;
        self.with_model_from(&manager, name)
    }

    /// Loads a named model from the directory managed by `manager`
    pub fn with_model_from(self, manager: &ModelManager, name: &str) -> Result<Self> {
        self.ensure_no_classifier()?;
        let loaded = manager.load(name, &self.runtime_config)?;
        Ok(self.with_loaded(loaded))
    }

    /// Loads a model from an arbitrary directory holding a `manifest.json`
    pub fn with_custom_model(self, model_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        if !model_dir.is_dir() {
            return Err(EditorError::Model(format!("Model directory not found: {:?}", model_dir)));
        }
        self.ensure_no_classifier()?;
        let loaded = load_model_dir(model_dir, &self.runtime_config)?;
        Ok(self.with_loaded(loaded))
    }

    fn ensure_no_classifier(&self) -> Result<()> {
        if self.classifier.is_some() {
            return Err(EditorError::Model("A classifier is already set".to_string()));
        }
        Ok(())
    }

    fn with_loaded(mut self, loaded: LoadedModel) -> Self {
        info!("Using model '{}'", loaded.manifest.name);
        if self.schema.is_none() {
            self.schema = Some(loaded.schema);
        }
        if self.statistics.is_none() {
            self.statistics = loaded.statistics;
        }
        self.classifier = Some(loaded.classifier);
        self.model_name = Some(loaded.manifest.name);
        self
    }

    /// Builds and returns the final Editor instance
    ///
    /// # Returns
    /// * `Result<Editor>` - The constructed Editor if successful, or an error if:
    ///   - No classifier was set (`Model`)
    ///   - The classifier's recorded input width differs from the schema (`Model`)
    ///   - The classifier's recorded feature names differ from the schema (`Schema`)
    ///   - The default number of recommendations is zero (`Input`)
    ///   - The training statistics do not match the schema (`Explain`)
    pub fn build(self) -> Result<Editor> {
        let classifier = self.classifier.ok_or_else(|| {
            EditorError::Model("No model loaded; set a classifier or load a model first".to_string())
        })?;
        if self.config.top_n == 0 {
            return Err(EditorError::Input("Default number of recommendations must be at least 1".into()));
        }

        let schema = self
            .schema
            .unwrap_or_else(|| Arc::new(FeatureSchema::text_statistics()));

        if let Some(expected) = classifier.num_features() {
            if expected != schema.len() {
                return Err(EditorError::Model(format!(
                    "Model expects {} features but the schema has {}",
                    expected,
                    schema.len()
                )));
            }
        }
        if let Some(names) = classifier.feature_names() {
            if names != schema.names() {
                return Err(EditorError::Schema(format!(
                    "Model was trained on [{}] but the schema is [{}]",
                    names.join(", "),
                    schema.names().join(", ")
                )));
            }
        }

        let computer = self
            .computer
            .unwrap_or_else(|| Arc::new(TextStatistics::new()));
        let extractor = FeatureExtractor::new(Arc::clone(&schema), computer);

        let explainer: Option<Arc<dyn Explainer>> = match (self.explainer, self.statistics) {
            (Some(explainer), _) => Some(explainer),
            (None, Some(statistics)) => {
                statistics.check_schema(&schema)?;
                Some(Arc::new(LimeTabularExplainer::new(statistics, self.explainer_config)?))
            }
            (None, None) => {
                warn!("No explainer configured; only scoring is available");
                None
            }
        };

        Ok(Editor::from_parts(extractor, classifier, explainer, self.config, self.model_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LinearClassifier, LinearWeights};
    use ndarray::Array2;

    fn linear(features: &[&str]) -> LinearClassifier {
        LinearClassifier::new(LinearWeights {
            intercept: 0.0,
            weights: vec![0.1; features.len()],
            feature_order: features.iter().map(|f| f.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_build_requires_classifier() {
        let result = EditorBuilder::new().build();
        assert!(matches!(result, Err(EditorError::Model(_))));
    }

    #[test]
    fn test_default_schema_is_text_statistics() {
        let names: Vec<String> = FeatureSchema::text_statistics().names().to_vec();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let editor = EditorBuilder::new().with_classifier(linear(&refs)).build().unwrap();
        assert_eq!(editor.schema().len(), names.len());
        assert!(!editor.has_explainer());
    }

    #[test]
    fn test_width_and_name_mismatches() {
        let schema = FeatureSchema::new(["num_words", "num_commas"]).unwrap();
        let narrow = EditorBuilder::new()
            .with_schema(schema.clone())
            .with_classifier(linear(&["num_words"]))
            .build();
        assert!(matches!(narrow, Err(EditorError::Model(_))));

        let renamed = EditorBuilder::new()
            .with_schema(schema)
            .with_classifier(linear(&["num_commas", "num_words"]))
            .build();
        assert!(matches!(renamed, Err(EditorError::Schema(_))));
    }

    #[test]
    fn test_zero_top_n_is_rejected() {
        let result = EditorBuilder::new()
            .with_schema(FeatureSchema::new(["num_words"]).unwrap())
            .with_classifier(linear(&["num_words"]))
            .with_top_n(0)
            .build();
        assert!(matches!(result, Err(EditorError::Input(_))));
    }

    #[test]
    fn test_statistics_build_default_explainer() {
        let schema = FeatureSchema::new(["num_words"]).unwrap();
        let rows = Array2::from_shape_fn((20, 1), |(i, _)| i as f32);
        let statistics = TrainingStatistics::fit(&schema, rows.view()).unwrap();
        let editor = EditorBuilder::new()
            .with_schema(schema)
            .with_classifier(linear(&["num_words"]))
            .with_training_statistics(statistics)
            .build()
            .unwrap();
        assert!(editor.has_explainer());

        let foreign = TrainingStatistics::fit(&FeatureSchema::new(["other"]).unwrap(), rows.view()).unwrap();
        let mismatch = EditorBuilder::new()
            .with_schema(FeatureSchema::new(["num_words"]).unwrap())
            .with_classifier(linear(&["num_words"]))
            .with_training_statistics(foreign)
            .build();
        assert!(matches!(mismatch, Err(EditorError::Explain(_))));
    }

    #[test]
    fn test_second_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = EditorBuilder::new()
            .with_classifier(linear(&["num_words"]))
            .with_custom_model(dir.path());
        assert!(matches!(result, Err(EditorError::Model(_))));
    }
}
