use std::slice;
use std::sync::Arc;

use log::{debug, info};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::builder::EditorBuilder;
use crate::classifier::{to_distributions, ClassProbabilities, Classifier};
use crate::error::{EditorError, Result};
use crate::explain::{parse_explanations, Explainer, Recommendation};
use crate::features::{stack_rows, FeatureExtractor, FeatureSchema, FeatureVector};

/// Rendering defaults of an [`Editor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Number of recommendations when the caller does not ask for a count
    pub top_n: usize,
    /// Decimal places of the score in the recommendation text
    pub score_precision: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            score_precision: 2,
        }
    }
}

/// Scores texts with a pretrained quality classifier and explains the score.
///
/// Collaborators are loaded once by [`EditorBuilder`] and shared read-only, so an
/// `Editor` can be wrapped in an `Arc` and used from several threads.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use proofread::{Editor, FeatureSchema, LinearClassifier, LinearWeights};
///
/// let classifier = LinearClassifier::new(LinearWeights {
///     intercept: -1.0,
///     weights: vec![0.1, 2.0],
///     feature_order: vec!["num_words".into(), "has_question_mark".into()],
/// })?;
/// let editor = Editor::builder()
///     .with_schema(FeatureSchema::new(["num_words", "has_question_mark"])?)
///     .with_classifier(classifier)
///     .build()?;
///
/// let score = editor.score_text("How do I tune a violin?")?;
/// assert!((0.0..=1.0).contains(&score));
/// # Ok(())
/// # }
/// ```
pub struct Editor {
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
    explainer: Option<Arc<dyn Explainer>>,
    config: EditorConfig,
    model_name: Option<String>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Editor>();
    }
};

impl Editor {
    pub(crate) fn from_parts(
        extractor: FeatureExtractor,
        classifier: Arc<dyn Classifier>,
        explainer: Option<Arc<dyn Explainer>>,
        config: EditorConfig,
        model_name: Option<String>,
    ) -> Self {
        info!(
            "Editor ready: model {}, {} features, explainer {}",
            model_name.as_deref().unwrap_or("<custom>"),
            extractor.schema().len(),
            if explainer.is_some() { "configured" } else { "absent" }
        );
        Self {
            extractor,
            classifier,
            explainer,
            config,
            model_name,
        }
    }

    pub fn builder() -> EditorBuilder {
        EditorBuilder::new()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.extractor.schema()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn has_explainer(&self) -> bool {
        self.explainer.is_some()
    }

    /// Computes one feature vector per text, in input order
    ///
    /// # Errors
    /// - `Schema` if the computed features do not cover the model's schema
    pub fn extract_features<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<FeatureVector>> {
        self.extractor.extract(texts)
    }

    /// Returns one class distribution per vector, in input order.
    ///
    /// # Errors
    /// - `Schema` if a vector was built for another schema
    /// - `Model` if inference fails or returns malformed probabilities
    pub fn score_feature_vectors(&self, vectors: &[FeatureVector]) -> Result<Vec<ClassProbabilities>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }
        let rows = stack_rows(self.schema(), vectors)?;
        let output = self.classifier.predict_proba(rows.view())?;
        to_distributions(output, vectors.len())
    }

    /// Probability that `text` is a high-quality question, in [0, 1]
    pub fn score_text(&self, text: &str) -> Result<f32> {
        let vector = self.extractor.extract_one(text)?;
        self.score_vector(&vector)
    }

    /// Scores several texts at once, in input order
    pub fn score_texts<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<f32>> {
        let vectors = self.extract_features(texts)?;
        Ok(self
            .score_feature_vectors(&vectors)?
            .iter()
            .map(ClassProbabilities::positive)
            .collect())
    }

    /// Scores `text` and explains the score with its `top_n` most influential features
    ///
    /// # Errors
    /// - `Input` if `top_n` is zero
    /// - `Explain` if no explainer is configured or attribution fails
    /// - anything extraction or scoring reports
    pub fn recommend(&self, text: &str, top_n: usize) -> Result<Recommendation> {
        if top_n == 0 {
            return Err(EditorError::Input("Number of recommendations must be at least 1".into()));
        }
        let explainer = self
            .explainer
            .as_ref()
            .ok_or_else(|| EditorError::Explain("No explainer configured for this editor".into()))?;

        let vector = self.extractor.extract_one(text)?;
        let score = self.score_vector(&vector)?;

        debug!("Explaining score {:.3} with up to {} features", score, top_n);
        let predict = |rows: ArrayView2<'_, f32>| self.classifier.predict_proba(rows);
        let raw = explainer
            .explain_instance(&vector, &predict, top_n, ClassProbabilities::POSITIVE)
            .map_err(|e| match e {
                EditorError::Explain(_) => e,
                other => EditorError::Explain(other.to_string()),
            })?;

        let explanations = parse_explanations(&raw, self.schema(), top_n)?;
        Ok(Recommendation::new(score, explanations).with_score_precision(self.config.score_precision))
    }

    /// Renders the score and ranked recommendations for `text` as an HTML fragment
    pub fn explain_and_recommend(&self, text: &str, top_n: usize) -> Result<String> {
        Ok(self.recommend(text, top_n)?.to_string())
    }

    /// [`explain_and_recommend`](Self::explain_and_recommend) with the configured number of features
    pub fn explain_and_recommend_default(&self, text: &str) -> Result<String> {
        self.explain_and_recommend(text, self.config.top_n)
    }

    fn score_vector(&self, vector: &FeatureVector) -> Result<f32> {
        let distributions = self.score_feature_vectors(slice::from_ref(vector))?;
        distributions
            .first()
            .map(ClassProbabilities::positive)
            .ok_or_else(|| EditorError::Model("Classifier returned no prediction".into()))
    }
}
