//! Dense feature matrix, the native batch of the tree-ensemble family

use crate::adapter::{AdapterError, Table};

/// Row-major `f32` matrix; `NaN` marks a missing value
#[derive(Debug, Clone, PartialEq)]
pub struct DMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
    feature_names: Option<Vec<String>>,
}

impl DMatrix {
    pub fn from_dense(data: Vec<f32>, rows: usize, cols: usize) -> Result<Self, AdapterError> {
        if rows * cols != data.len() {
            return Err(AdapterError::InvalidInput(format!(
                "{} values cannot form a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self {
            data,
            rows,
            cols,
            feature_names: None,
        })
    }

    /// # Errors
    /// - `AdapterError::InvalidInput` if rows have different lengths
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, AdapterError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AdapterError::InvalidInput(format!(
                    "row {i} has {} features, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_dense(data, rows.len(), cols)
    }

    /// Build from named columns, ordered as in the table.
    pub fn from_table(table: &Table) -> Result<Self, AdapterError> {
        let rows = table.num_rows()?;
        let cols = table.columns.len();
        let mut data = vec![0.0; rows * cols];
        for (c, (_, values)) in table.columns.iter().enumerate() {
            for (r, v) in values.iter().enumerate() {
                data[r * cols + c] = *v;
            }
        }
        let names = table.column_names().map(str::to_string).collect();
        Ok(Self::from_dense(data, rows, cols)?.with_feature_names(names))
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }
}
