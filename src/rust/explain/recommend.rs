use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use super::descriptor::{Condition, FeatureDescriptor};
use crate::error::{EditorError, Result};
use crate::features::FeatureSchema;

/// What the writer is advised to do about a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Increase,
    Decrease,
    NoNeedToIncrease,
    NoNeedToDecrease,
    Keep,
    Change,
}

impl Action {
    /// Picks the advice for a feature condition given the sign of its contribution.
    ///
    /// A feature above its threshold that raises the score needs no decrease, one
    /// below its threshold that lowers the score should be increased, and so on.
    /// A zero weight counts as lowering the score.
    pub fn for_condition(condition: &Condition, weight: f32) -> Self {
        let raises_score = weight > 0.0;
        match condition {
            Condition::Above { .. } if raises_score => Self::NoNeedToDecrease,
            Condition::Above { .. } => Self::Decrease,
            Condition::Below { .. } if raises_score => Self::NoNeedToIncrease,
            Condition::Below { .. } => Self::Increase,
            _ if raises_score => Self::Keep,
            _ => Self::Change,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Increase => "Increase",
            Self::Decrease => "Decrease",
            Self::NoNeedToIncrease => "No need to increase",
            Self::NoNeedToDecrease => "No need to decrease",
            Self::Keep => "Keep",
            Self::Change => "Change",
        }
    }

    /// True when the advice asks the writer to change something
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Increase | Self::Decrease | Self::Change)
    }
}

/// One ranked entry of an explanation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureExplanation {
    pub descriptor: FeatureDescriptor,
    pub display_name: String,
    pub weight: f32,
    pub action: Action,
}

impl FeatureExplanation {
    pub fn new(descriptor: FeatureDescriptor, display_name: impl Into<String>, weight: f32) -> Self {
        let action = Action::for_condition(&descriptor.condition, weight);
        Self {
            descriptor,
            display_name: display_name.into(),
            weight,
            action,
        }
    }

    pub fn effect(&self) -> &'static str {
        if self.weight > 0.0 {
            "increases"
        } else {
            "decreases"
        }
    }

    /// Renders the entry as a colored, numbered line. `rank` starts at 1.
    pub fn render(&self, rank: usize) -> String {
        let color = if self.action.is_actionable() { "red" } else { "green" };
        let subject = match self.descriptor.condition.phrase() {
            Some(phrase) => format!("{} {}", self.display_name, phrase),
            None => self.display_name.clone(),
        };
        format!(
            "<font color=\"{}\">{}) {} {}: {} {} the score ({:+.3})</font>",
            color,
            rank,
            self.action.label(),
            self.display_name,
            subject,
            self.effect(),
            self.weight
        )
    }
}

/// Turns raw `(descriptor, weight)` pairs into a ranked explanation.
///
/// Entries are ordered by descending absolute weight (ties keep their input
/// order) and truncated to `top_n`.
///
/// # Errors
/// - `Explain` if a descriptor cannot be parsed or a weight is not finite
pub fn parse_explanations(
    raw: &[(String, f32)],
    schema: &FeatureSchema,
    top_n: usize,
) -> Result<Vec<FeatureExplanation>> {
    let mut explanations = raw
        .iter()
        .map(|(identifier, weight)| {
            if !weight.is_finite() {
                return Err(EditorError::Explain(format!(
                    "Attribution weight for '{}' is not finite",
                    identifier
                )));
            }
            let descriptor: FeatureDescriptor = identifier.parse()?;
            let display_name = schema.display_name(&descriptor.feature);
            Ok(FeatureExplanation::new(descriptor, display_name, *weight))
        })
        .collect::<Result<Vec<_>>>()?;

    explanations.sort_by(|a, b| {
        b.weight
            .abs()
            .partial_cmp(&a.weight.abs())
            .unwrap_or(Ordering::Equal)
    });
    explanations.truncate(top_n);
    Ok(explanations)
}

/// A score together with its ranked explanation.
///
/// `Display` renders the HTML-fragment recommendation text; `Serialize` gives the
/// same content as structured data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub score: f32,
    pub explanations: Vec<FeatureExplanation>,
    #[serde(skip)]
    pub score_precision: usize,
}

impl Recommendation {
    pub fn new(score: f32, explanations: Vec<FeatureExplanation>) -> Self {
        Self {
            score,
            explanations,
            score_precision: 2,
        }
    }

    pub fn with_score_precision(mut self, precision: usize) -> Self {
        self.score_precision = precision;
        self
    }

    pub fn recommendations(&self) -> String {
        self.explanations
            .iter()
            .enumerate()
            .map(|(i, explanation)| explanation.render(i + 1))
            .collect::<Vec<_>>()
            .join("<br/>")
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current score (0 is worst, 1 is best):")?;
        writeln!(f, "<br/>")?;
        writeln!(f, "{:.*}", self.score_precision, self.score)?;
        writeln!(f, "<br/>")?;
        writeln!(f, "<br/>")?;
        writeln!(f, "Recommendations (ordered by importance):")?;
        writeln!(f, "<br/>")?;
        writeln!(f, "<br/>")?;
        writeln!(f, "{}", self.recommendations())
    }
}
