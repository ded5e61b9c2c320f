//! Parsing of attribution feature identifiers.
//!
//! Local attribution methods name each explained feature with a condition on
//! its value rather than a bare name, for example `num_words <= 12.00`,
//! `0.50 < avg_word_len <= 3.00` or `word_count>10`. This module decodes those
//! identifiers into a feature name and a [`Condition`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::EditorError;

/// The condition a descriptor places on its feature
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Bare feature name, no condition
    Any,
    Below { threshold: f32, inclusive: bool },
    Above { threshold: f32, inclusive: bool },
    Between { low: f32, high: f32 },
    Equals { value: String },
}

impl Condition {
    /// Readable phrase for the condition, `None` for a bare feature
    pub fn phrase(&self) -> Option<String> {
        match self {
            Self::Any => None,
            Self::Below { threshold, inclusive: true } => Some(format!("is at most {}", threshold)),
            Self::Below { threshold, inclusive: false } => Some(format!("is below {}", threshold)),
            Self::Above { threshold, inclusive: true } => Some(format!("is at least {}", threshold)),
            Self::Above { threshold, inclusive: false } => Some(format!("is above {}", threshold)),
            Self::Between { low, high } => Some(format!("is between {} and {}", low, high)),
            Self::Equals { value } => Some(format!("equals {}", value)),
        }
    }
}

/// A decoded attribution feature identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureDescriptor {
    pub feature: String,
    pub condition: Condition,
}

impl FeatureDescriptor {
    pub fn new(feature: impl Into<String>, condition: Condition) -> Self {
        Self {
            feature: feature.into(),
            condition,
        }
    }
}

impl fmt::Display for FeatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Condition::Any => write!(f, "{}", self.feature),
            Condition::Below { threshold, inclusive } => {
                write!(f, "{} {} {}", self.feature, if *inclusive { "<=" } else { "<" }, threshold)
            }
            Condition::Above { threshold, inclusive } => {
                write!(f, "{} {} {}", self.feature, if *inclusive { ">=" } else { ">" }, threshold)
            }
            Condition::Between { low, high } => write!(f, "{} < {} <= {}", low, self.feature, high),
            Condition::Equals { value } => write!(f, "{}={}", self.feature, value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
}

impl Operator {
    /// Operator with its operands swapped: `a < b` is `b > a`
    fn flipped(self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::LessEqual => Self::GreaterEqual,
            Self::Greater => Self::Less,
            Self::GreaterEqual => Self::LessEqual,
            Self::Equal => Self::Equal,
        }
    }

    fn is_less(self) -> bool {
        matches!(self, Self::Less | Self::LessEqual)
    }

    fn is_greater(self) -> bool {
        matches!(self, Self::Greater | Self::GreaterEqual)
    }
}

/// Splits `input` into operands around comparison operators
fn tokenize(input: &str) -> (Vec<&str>, Vec<Operator>) {
    let bytes = input.as_bytes();
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        let (operator, width) = match (bytes[i], next) {
            (b'<', Some(b'=')) => (Operator::LessEqual, 2),
            (b'>', Some(b'=')) => (Operator::GreaterEqual, 2),
            (b'=', Some(b'=')) => (Operator::Equal, 2),
            (b'<', _) => (Operator::Less, 1),
            (b'>', _) => (Operator::Greater, 1),
            (b'=', _) => (Operator::Equal, 1),
            _ => {
                i += 1;
                continue;
            }
        };
        operands.push(input[start..i].trim());
        operators.push(operator);
        i += width;
        start = i;
    }
    operands.push(input[start..].trim());

    (operands, operators)
}

fn invalid(input: &str, reason: &str) -> EditorError {
    EditorError::Explain(format!("Cannot parse feature descriptor '{}': {}", input, reason))
}

fn parse_number(input: &str, text: &str) -> Result<f32, EditorError> {
    text.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(input, &format!("'{}' is not a number", text)))
}

fn single_bound(feature: &str, operator: Operator, value: &str, input: &str) -> Result<FeatureDescriptor, EditorError> {
    let condition = match operator {
        Operator::Equal => Condition::Equals { value: value.to_string() },
        Operator::Less | Operator::LessEqual => Condition::Below {
            threshold: parse_number(input, value)?,
            inclusive: operator == Operator::LessEqual,
        },
        Operator::Greater | Operator::GreaterEqual => Condition::Above {
            threshold: parse_number(input, value)?,
            inclusive: operator == Operator::GreaterEqual,
        },
    };
    Ok(FeatureDescriptor::new(feature, condition))
}

impl FromStr for FeatureDescriptor {
    type Err = EditorError;

    /// Accepts `name`, `name op value`, `value op name` and
    /// `low op name op high`, with or without spaces around operators.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (operands, operators) = tokenize(input);
        if operands.iter().any(|operand| operand.is_empty()) {
            return Err(invalid(input, "empty operand"));
        }

        match operators.as_slice() {
            [] => Ok(FeatureDescriptor::new(operands[0], Condition::Any)),
            [operator] => {
                let (left, right) = (operands[0], operands[1]);
                let left_is_number = left.parse::<f32>().is_ok();
                let right_is_number = right.parse::<f32>().is_ok();
                if left_is_number && right_is_number {
                    Err(invalid(input, "no feature name"))
                } else if left_is_number {
                    single_bound(right, operator.flipped(), left, input)
                } else {
                    single_bound(left, *operator, right, input)
                }
            }
            [_, _] if operands[1].parse::<f32>().is_ok() => Err(invalid(input, "no feature name")),
            [first, second] if first.is_less() && second.is_less() => Ok(FeatureDescriptor::new(
                operands[1],
                Condition::Between {
                    low: parse_number(input, operands[0])?,
                    high: parse_number(input, operands[2])?,
                },
            )),
            [first, second] if first.is_greater() && second.is_greater() => Ok(FeatureDescriptor::new(
                operands[1],
                Condition::Between {
                    low: parse_number(input, operands[2])?,
                    high: parse_number(input, operands[0])?,
                },
            )),
            [_, _] => Err(invalid(input, "range bounds must point the same way")),
            _ => Err(invalid(input, "too many operators")),
        }
    }
}
