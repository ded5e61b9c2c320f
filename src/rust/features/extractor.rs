use std::sync::Arc;

use log::debug;
use ndarray::Array1;

use super::schema::FeatureSchema;
use super::vector::{FeatureTable, FeatureVector};
use crate::error::{EditorError, Result};

/// Computes named feature columns for a batch of texts.
///
/// The returned table must hold one row per text, in input order, and at least
/// every column named by `schema`. Extra columns are ignored by the extractor.
pub trait FeatureComputer: Send + Sync {
    fn compute(&self, texts: &[&str], schema: &FeatureSchema) -> Result<FeatureTable>;
}

/// Turns raw texts into schema-ordered feature vectors.
///
/// Nothing is cached: every call recomputes features from scratch.
#[derive(Clone)]
pub struct FeatureExtractor {
    schema: Arc<FeatureSchema>,
    computer: Arc<dyn FeatureComputer>,
}

impl FeatureExtractor {
    pub fn new(schema: Arc<FeatureSchema>, computer: Arc<dyn FeatureComputer>) -> Self {
        Self { schema, computer }
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Extracts one vector per text, preserving input order and cardinality.
    ///
    /// # Errors
    /// - `Schema` if the computed table misses a schema column, has the wrong
    ///   number of rows, or holds a non-finite value
    /// - anything the underlying `FeatureComputer` reports
    pub fn extract<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<FeatureVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = texts.iter().map(|t| t.as_ref()).collect();
        debug!("Computing {} features for {} texts", self.schema.len(), texts.len());
        let table = self.computer.compute(&texts, &self.schema)?;

        if table.nrows() != texts.len() {
            return Err(EditorError::Schema(format!(
                "Feature computation returned {} rows for {} texts",
                table.nrows(),
                texts.len()
            )));
        }

        let columns = self.resolve_columns(&table)?;
        let values = table.values();

        (0..texts.len())
            .map(|row| {
                let mut vector = Array1::zeros(columns.len());
                for (position, &col) in columns.iter().enumerate() {
                    let value = values[[row, col]];
                    if !value.is_finite() {
                        return Err(EditorError::Schema(format!(
                            "Feature '{}' is not a finite number for text {}",
                            self.schema.names()[position],
                            row + 1
                        )));
                    }
                    vector[position] = value;
                }
                FeatureVector::new(Arc::clone(&self.schema), vector)
            })
            .collect()
    }

    pub fn extract_one(&self, text: &str) -> Result<FeatureVector> {
        self.extract(&[text])?
            .pop()
            .ok_or_else(|| EditorError::Schema("Feature computation returned no rows".into()))
    }

    /// Maps each schema position to its column in `table`
    fn resolve_columns(&self, table: &FeatureTable) -> Result<Vec<usize>> {
        let mut columns = Vec::with_capacity(self.schema.len());
        let mut missing = Vec::new();
        for name in self.schema.names() {
            match table.column_index(name) {
                Some(col) => columns.push(col),
                None => missing.push(name.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(EditorError::Schema(format!(
                "Feature computation is missing required features: {}",
                missing.join(", ")
            )));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Returns the columns it was built with, filled with `row index + column index`
    struct FixedColumns(Vec<&'static str>);

    impl FeatureComputer for FixedColumns {
        fn compute(&self, texts: &[&str], _schema: &FeatureSchema) -> Result<FeatureTable> {
            let values = Array2::from_shape_fn((texts.len(), self.0.len()), |(r, c)| (r + c) as f32);
            FeatureTable::new(self.0.iter().map(|c| c.to_string()).collect(), values)
        }
    }

    struct NotFinite;

    impl FeatureComputer for NotFinite {
        fn compute(&self, texts: &[&str], schema: &FeatureSchema) -> Result<FeatureTable> {
            let values = Array2::from_elem((texts.len(), schema.len()), f32::NAN);
            FeatureTable::new(schema.names().to_vec(), values)
        }
    }

    fn extractor(columns: Vec<&'static str>) -> FeatureExtractor {
        let schema = Arc::new(FeatureSchema::new(["a", "b"]).unwrap());
        FeatureExtractor::new(schema, Arc::new(FixedColumns(columns)))
    }

    #[test]
    fn test_columns_are_reordered_to_schema() {
        let vectors = extractor(vec!["extra", "b", "a"]).extract(&["x", "y"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].get("a"), Some(2.0));
        assert_eq!(vectors[0].get("b"), Some(1.0));
        assert_eq!(vectors[1].get("a"), Some(3.0));
    }

    #[test]
    fn test_missing_column_is_a_schema_error() {
        let result = extractor(vec!["a"]).extract(&["x"]);
        assert!(matches!(result, Err(EditorError::Schema(msg)) if msg.contains("b")));
    }

    #[test]
    fn test_empty_batch() {
        let texts: Vec<String> = Vec::new();
        assert!(extractor(vec!["a", "b"]).extract(&texts).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let schema = Arc::new(FeatureSchema::new(["a"]).unwrap());
        let extractor = FeatureExtractor::new(schema, Arc::new(NotFinite));
        assert!(matches!(extractor.extract_one("x"), Err(EditorError::Schema(_))));
    }

    #[test]
    fn test_empty_text_with_text_statistics() {
        let schema = Arc::new(FeatureSchema::text_statistics());
        let extractor = FeatureExtractor::new(schema.clone(), Arc::new(crate::features::TextStatistics::new()));
        let vectors = extractor.extract(&["", "Why?", ""]).unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].len(), schema.len());
        assert!(vectors[0].values().iter().all(|&v| v == 0.0));
        assert_eq!(vectors[1].get("has_question_mark"), Some(1.0));
        assert_eq!(vectors[2], vectors[0]);
    }
}
