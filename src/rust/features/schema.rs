use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::catalogue::{self, TEXT_FEATURES};
use crate::error::{EditorError, Result};

/// One entry of a model's feature schema as stored in a model manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    /// Overrides the built-in display phrase used in recommendations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// The fixed, ordered list of feature names a classifier was trained on.
///
/// Every `FeatureVector` produced for a schema has exactly its arity and order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    display_names: Vec<Option<String>>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Creates a schema from feature names, rejecting empty, blank and duplicate names
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let specs: Vec<FeatureSpec> = names.into_iter().map(FeatureSpec::new).collect();
        Self::from_specs(&specs)
    }

    pub fn from_specs(specs: &[FeatureSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(EditorError::Schema("Schema must name at least one feature".into()));
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(EditorError::Schema(format!(
                    "Feature {} has an empty name",
                    position + 1
                )));
            }
            if index.insert(spec.name.clone(), position).is_some() {
                return Err(EditorError::Schema(format!(
                    "Feature '{}' appears more than once",
                    spec.name
                )));
            }
        }

        Ok(Self {
            names: specs.iter().map(|s| s.name.clone()).collect(),
            display_names: specs.iter().map(|s| s.display_name.clone()).collect(),
            index,
        })
    }

    /// Schema covering every feature of the built-in text statistics, in catalogue order
    pub fn text_statistics() -> Self {
        let names: Vec<&str> = TEXT_FEATURES.iter().map(|(name, _)| *name).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            display_names: vec![None; names.len()],
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Phrase used for `name` in recommendations: the schema override if any,
    /// else the catalogue phrase, else the name itself made readable.
    pub fn display_name(&self, name: &str) -> String {
        self.index_of(name)
            .and_then(|i| self.display_names[i].clone())
            .unwrap_or_else(|| catalogue::display_name(name))
    }

    pub fn specs(&self) -> Vec<FeatureSpec> {
        self.names
            .iter()
            .zip(&self.display_names)
            .map(|(name, display_name)| FeatureSpec {
                name: name.clone(),
                display_name: display_name.clone(),
            })
            .collect()
    }
}
