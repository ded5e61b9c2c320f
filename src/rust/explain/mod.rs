//! Local attribution and its rendering into writing recommendations.

use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::features::FeatureVector;

mod descriptor;
mod lime;
mod recommend;
mod ridge;

pub use descriptor::{Condition, FeatureDescriptor};
pub use lime::{ExplainerConfig, FeatureSelection, FeatureStatistics, LimeTabularExplainer, TrainingStatistics};
pub use recommend::{parse_explanations, Action, FeatureExplanation, Recommendation};

/// Probability function handed to an explainer: `[rows, features]` in,
/// `[rows, classes]` out
pub type ProbabilityFn<'a> = dyn for<'v> Fn(ArrayView2<'v, f32>) -> Result<Array2<f32>> + 'a;

/// Attributes a classifier's output for one instance to its features.
///
/// Implementations return `(descriptor, weight)` pairs where the descriptor
/// names a feature, optionally with a condition on its value (see
/// [`FeatureDescriptor`]), and the weight is the feature's signed local
/// contribution to the probability of `label`.
pub trait Explainer: Send + Sync {
    fn explain_instance(
        &self,
        instance: &FeatureVector,
        predict_proba: &ProbabilityFn<'_>,
        num_features: usize,
        label: usize,
    ) -> Result<Vec<(String, f32)>>;
}
