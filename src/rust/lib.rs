//! Explainable quality scoring for written questions.
//!
//! An [`Editor`] computes textual features for a question, scores it with a
//! pretrained probabilistic classifier (ONNX or a JSON logistic model), and
//! explains the score by attributing it to the most influential features,
//! rendered as ranked writing recommendations.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use ndarray::Array2;
//! use proofread::{Editor, FeatureSchema, LinearClassifier, LinearWeights, TrainingStatistics};
//!
//! let schema = FeatureSchema::new(["num_words", "num_questions"])?;
//! let classifier = LinearClassifier::new(LinearWeights {
//!     intercept: -2.0,
//!     weights: vec![0.15, 1.0],
//!     feature_order: vec!["num_words".into(), "num_questions".into()],
//! })?;
//! // Statistics normally come from the training set of the classifier
//! let training = Array2::from_shape_fn((50, 2), |(i, j)| if j == 0 { i as f32 } else { (i % 3) as f32 * 0.01 });
//! let statistics = TrainingStatistics::fit(&schema, training.view())?;
//!
//! let editor = Editor::builder()
//!     .with_schema(schema)
//!     .with_classifier(classifier)
//!     .with_training_statistics(statistics)
//!     .build()?;
//!
//! let text = editor.explain_and_recommend("Why does my bread collapse in the oven?", 2)?;
//! assert!(text.starts_with("Current score (0 is worst, 1 is best):"));
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The editor is `Send + Sync` and can be shared across threads using `Arc`.

mod builder;
pub mod classifier;
mod editor;
mod error;
pub mod explain;
pub mod features;
pub mod model_manager;
mod runtime;

pub use builder::EditorBuilder;
pub use classifier::{ClassProbabilities, Classifier, LinearClassifier, LinearWeights, OnnxClassifier};
pub use editor::{Editor, EditorConfig};
pub use error::{EditorError, Result};
pub use explain::{
    parse_explanations, Action, Condition, Explainer, ExplainerConfig, FeatureDescriptor, FeatureExplanation,
    FeatureSelection, LimeTabularExplainer, ProbabilityFn, Recommendation, TrainingStatistics,
};
pub use features::{FeatureComputer, FeatureExtractor, FeatureSchema, FeatureSpec, FeatureTable, FeatureVector, TextStatistics};
pub use model_manager::{LoadedModel, ModelError, ModelFormat, ModelManager, ModelManifest};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
