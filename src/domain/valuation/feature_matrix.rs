use crate::domain::errors::FeatureError;
use std::collections::HashMap;

/// Engineered numeric representation of a batch of records.
///
/// Row-major, row-aligned with the source records that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Result of aligning a matrix to a target column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Reindexed {
    pub matrix: FeatureMatrix,
    /// Target columns missing from the source, filled with 0.
    pub added: Vec<String>,
    /// Source columns not in the target, discarded.
    pub dropped: Vec<String>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, FeatureError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(FeatureError::RaggedRow {
                row: index,
                expected: columns.len(),
                actual: row.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Copies the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Aligns this matrix to `target` column order.
    ///
    /// Columns of `target` absent here are added as zeros, columns here that
    /// `target` does not name are dropped. The output has exactly `target`'s
    /// columns in `target`'s order.
    pub fn reindex(&self, target: &[String]) -> Reindexed {
        let source: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mapping: Vec<Option<usize>> = target
            .iter()
            .map(|c| source.get(c.as_str()).copied())
            .collect();

        let added = target
            .iter()
            .zip(&mapping)
            .filter(|(_, m)| m.is_none())
            .map(|(c, _)| c.clone())
            .collect();
        let dropped = self
            .columns
            .iter()
            .filter(|c| !target.contains(c))
            .cloned()
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                mapping
                    .iter()
                    .map(|m| m.map(|i| row[i]).unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Reindexed {
            matrix: Self {
                columns: target.to_vec(),
                rows,
            },
            added,
            dropped,
        }
    }
}
