// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dense row-major embedding matrix

use crate::errors::{Error, Result};

/// Row-major `rows x dim` matrix of f32 embeddings. Row `i` belongs to the
/// `i`-th document identifier of the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Wrap a flat row-major buffer.
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if rows.checked_mul(dim) != Some(data.len()) {
            return Err(Error::InvalidInput(format!(
                "matrix buffer holds {} values, expected {} x {}",
                data.len(),
                rows,
                dim
            )));
        }
        Ok(Self { rows, dim, data })
    }

    /// Empty matrix whose rows will have `dim` columns.
    pub fn with_dim(dim: usize) -> Self {
        Self {
            rows: 0,
            dim,
            data: Vec::new(),
        }
    }

    /// Build from individual rows; all rows must share one length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map_or(0, |row| row.as_ref().len());
        let mut matrix = Self::with_dim(dim);
        matrix.data.reserve(rows.len() * dim);
        for row in rows {
            matrix.push_row(row.as_ref())?;
        }
        Ok(matrix)
    }

    /// Append one row.
    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row `index`, or `None` if out of range.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Iterate rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on zero
        let dim = self.dim.max(1);
        self.data.chunks_exact(dim).take(self.rows)
    }

    /// Flat row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Dot product of `query` with every row.
    pub fn dot_all(&self, query: &[f32]) -> Result<Vec<f32>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if self.dim == 0 {
            return Ok(vec![0.0; self.rows]);
        }
        Ok(self
            .iter_rows()
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>())
            .collect())
    }
}
