use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::schema::FeatureSchema;
use crate::error::{EditorError, Result};

/// Fixed-schema, ordered numeric representation of one text
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: Arc<FeatureSchema>,
    values: Array1<f32>,
}

impl FeatureVector {
    pub fn new(schema: Arc<FeatureSchema>, values: Array1<f32>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(EditorError::Schema(format!(
                "Feature vector has {} values but the schema has {} features",
                values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn values(&self) -> ArrayView1<'_, f32> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// Iterates `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Stacks vectors into a `[rows, features]` matrix, requiring all of them to follow `schema`
pub(crate) fn stack_rows(schema: &FeatureSchema, vectors: &[FeatureVector]) -> Result<Array2<f32>> {
    let mut matrix = Array2::zeros((vectors.len(), schema.len()));
    for (mut row, vector) in matrix.axis_iter_mut(Axis(0)).zip(vectors) {
        if vector.schema().as_ref() != schema {
            return Err(EditorError::Schema(
                "Feature vector was built for a different schema".into(),
            ));
        }
        row.assign(&vector.values);
    }
    Ok(matrix)
}

/// Result of a feature computation: named columns over one row per text
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    values: Array2<f32>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, values: Array2<f32>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(EditorError::Schema(format!(
                "Feature table has {} column names for {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f32>> {
        self.column_index(name).map(|i| self.values.column(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::new(["x", "y"]).unwrap())
    }

    #[test]
    fn test_vector_arity_is_enforced() {
        assert!(FeatureVector::new(schema(), array![1.0, 2.0]).is_ok());
        assert!(matches!(
            FeatureVector::new(schema(), array![1.0]),
            Err(EditorError::Schema(_))
        ));
    }

    #[test]
    fn test_named_access() {
        let vector = FeatureVector::new(schema(), array![1.5, -2.0]).unwrap();
        assert_eq!(vector.get("y"), Some(-2.0));
        assert_eq!(vector.get("z"), None);
        let pairs: Vec<_> = vector.iter().collect();
        assert_eq!(pairs, vec![("x", 1.5), ("y", -2.0)]);
    }

    #[test]
    fn test_stack_rows_rejects_foreign_schema() {
        let schema = schema();
        let other = Arc::new(FeatureSchema::new(["x", "z"]).unwrap());
        let ok = FeatureVector::new(schema.clone(), array![1.0, 2.0]).unwrap();
        let foreign = FeatureVector::new(other, array![1.0, 2.0]).unwrap();

        let matrix = stack_rows(&schema, &[ok.clone(), ok.clone()]).unwrap();
        assert_eq!(matrix.dim(), (2, 2));
        assert!(stack_rows(&schema, &[ok, foreign]).is_err());
    }

    #[test]
    fn test_table_columns() {
        let table = FeatureTable::new(vec!["a".into(), "b".into()], array![[1.0, 2.0]]).unwrap();
        assert_eq!(table.column("b").unwrap()[0], 2.0);
        assert!(table.column("c").is_none());
        assert!(FeatureTable::new(vec!["a".into()], array![[1.0, 2.0]]).is_err());
    }
}
