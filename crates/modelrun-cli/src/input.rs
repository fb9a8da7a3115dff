//! Batch input files for `modelrun predict`
//!
//! Two JSON shapes are accepted:
//! - a matrix, `[[0.1, 2.0], [0.3, null]]`
//! - a table, `{"columns": ["age", "income"], "data": [[31, 52000.0]]}`
//!
//! `null` marks a missing value.

use crate::error::{CliError, CliResult};
use modelrun_runner::{Input, Table};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Matrix(Vec<Vec<Option<f32>>>),
    Table {
        columns: Vec<String>,
        data: Vec<Vec<Option<f32>>>,
    },
}

/// A parsed batch that can be split into chunks
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    Matrix(Vec<Vec<f32>>),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<f32>>,
    },
}

impl Batch {
    pub fn from_json(content: &str) -> CliResult<Self> {
        let file: BatchFile = serde_json::from_str(content).map_err(|e| {
            CliError::InvalidInput(format!("expected a matrix or a columns/data object: {e}"))
        })?;
        match file {
            BatchFile::Matrix(rows) => Ok(Self::Matrix(fill_missing(rows))),
            BatchFile::Table { columns, data } => {
                if let Some(i) = data.iter().position(|row| row.len() != columns.len()) {
                    return Err(CliError::InvalidInput(format!(
                        "row {i} has {} values for {} columns",
                        data[i].len(),
                        columns.len()
                    )));
                }
                Ok(Self::Table {
                    columns,
                    rows: fill_missing(data),
                })
            }
        }
    }

    /// Read from a file, or stdin for `-`
    pub fn read(path: &Path) -> CliResult<Self> {
        let content = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path)?
        };
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Matrix(rows) | Self::Table { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into runner inputs of at most `size` rows, in order
    pub fn into_chunks<B>(self, size: usize) -> Vec<Input<B>> {
        let size = size.max(1);
        match self {
            Self::Matrix(rows) => rows
                .chunks(size)
                .map(|chunk| Input::Matrix(chunk.to_vec()))
                .collect(),
            Self::Table { columns, rows } => rows
                .chunks(size)
                .map(|chunk| Input::Table(to_table(&columns, chunk)))
                .collect(),
        }
    }
}

fn fill_missing(rows: Vec<Vec<Option<f32>>>) -> Vec<Vec<f32>> {
    rows.into_iter()
        .map(|row| row.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
        .collect()
}

fn to_table(columns: &[String], rows: &[Vec<f32>]) -> Table {
    let columns = columns
        .iter()
        .enumerate()
        .map(|(c, name)| (name.clone(), rows.iter().map(|row| row[c]).collect()))
        .collect();
    Table::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_with_missing() {
        let batch = Batch::from_json("[[1, 2.5], [null, 3]]").unwrap();
        let Batch::Matrix(rows) = batch else {
            panic!("expected a matrix");
        };
        assert_eq!(rows[0], vec![1.0, 2.5]);
        assert!(rows[1][0].is_nan());
    }

    #[test]
    fn test_table_chunks_keep_columns() {
        let batch =
            Batch::from_json(r#"{"columns": ["a", "b"], "data": [[1, 2], [3, 4], [5, 6]]}"#)
                .unwrap();
        assert_eq!(batch.len(), 3);

        let chunks: Vec<Input<()>> = batch.into_chunks(2);
        assert_eq!(chunks.len(), 2);
        match &chunks[1] {
            Input::Table(table) => {
                assert_eq!(table.columns[0], ("a".to_string(), vec![5.0]));
                assert_eq!(table.columns[1], ("b".to_string(), vec![6.0]));
            }
            other => panic!("unexpected chunk {other:?}"),
        }
    }

    #[test]
    fn test_table_row_width_checked() {
        let err = Batch::from_json(r#"{"columns": ["a", "b"], "data": [[1]]}"#).unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!(Batch::from_json(r#"{"rows": 3}"#).is_err());
        assert!(Batch::from_json("[1, 2, 3]").is_err());
    }
}
