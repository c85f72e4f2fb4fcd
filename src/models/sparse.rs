use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const CSR_FORMAT: &str = "csr";

/// Compressed sparse row matrix of track features
///
/// Row `i` holds the features of clean track `i`. Column indices within a
/// row are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    format: String,
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// All-zero matrix with the given shape
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            format: CSR_FORMAT.to_string(),
            rows,
            cols,
            indptr: vec![0; rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Builds a matrix from per-row `(column, value)` entries
    ///
    /// Entries are sorted by column; zeros are dropped and duplicate columns summed.
    pub fn from_rows(cols: usize, rows: Vec<Vec<(usize, f64)>>) -> AppResult<Self> {
        let mut matrix = Self::zeros(0, cols);
        matrix.indptr = vec![0];

        for mut entries in rows {
            entries.sort_by_key(|(col, _)| *col);
            let row_start = matrix.indices.len();
            for (col, value) in entries {
                if col >= cols {
                    return Err(AppError::Invariant(format!(
                        "Column {} out of bounds for {} columns",
                        col, cols
                    )));
                }
                if value == 0.0 {
                    continue;
                }
                if matrix.indices.len() > row_start && matrix.indices.last() == Some(&col) {
                    if let Some(last) = matrix.data.last_mut() {
                        *last += value;
                    }
                    continue;
                }
                matrix.indices.push(col);
                matrix.data.push(value);
            }
            matrix.indptr.push(matrix.indices.len());
            matrix.rows += 1;
        }

        Ok(matrix)
    }

    /// Single-column matrix from a dense vector
    pub fn column(values: &[f64]) -> Self {
        let mut matrix = Self::zeros(0, 1);
        matrix.indptr = vec![0];
        for &value in values {
            if value != 0.0 {
                matrix.indices.push(0);
                matrix.data.push(value);
            }
            matrix.indptr.push(matrix.indices.len());
            matrix.rows += 1;
        }
        matrix
    }

    /// Horizontal concatenation; every block must have the same row count
    pub fn hstack(blocks: &[&FeatureMatrix]) -> AppResult<Self> {
        let rows = blocks.first().map(|b| b.rows).unwrap_or(0);
        if let Some(bad) = blocks.iter().find(|b| b.rows != rows) {
            return Err(AppError::Invariant(format!(
                "Cannot stack blocks with {} and {} rows",
                rows, bad.rows
            )));
        }

        let cols = blocks.iter().map(|b| b.cols).sum();
        let mut stacked = Self::zeros(rows, cols);
        stacked.indptr = Vec::with_capacity(rows + 1);
        stacked.indptr.push(0);

        for row in 0..rows {
            let mut offset = 0;
            for block in blocks {
                for (col, value) in block.row(row) {
                    stacked.indices.push(col + offset);
                    stacked.data.push(value);
                }
                offset += block.cols;
            }
            stacked.indptr.push(stacked.indices.len());
        }

        Ok(stacked)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Non-zero `(column, value)` pairs of one row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (start, end) = if row < self.rows {
            (self.indptr[row], self.indptr[row + 1])
        } else {
            (0, 0)
        };
        self.indices[start..end]
            .iter()
            .copied()
            .zip(self.data[start..end].iter().copied())
    }

    /// Value at `(row, col)`, zero when not stored
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.row(row)
            .find(|(c, _)| *c == col)
            .map(|(_, v)| v)
            .unwrap_or(0.0)
    }

    /// Euclidean norm of every row
    pub fn row_norms(&self) -> Vec<f64> {
        (0..self.rows)
            .map(|row| self.row(row).map(|(_, v)| v * v).sum::<f64>().sqrt())
            .collect()
    }

    /// Dot product of two rows, merging their sorted column lists
    pub fn row_dot(&self, a: usize, b: usize) -> f64 {
        let mut left = self.row(a).peekable();
        let mut right = self.row(b).peekable();
        let mut sum = 0.0;

        while let (Some(&(lc, lv)), Some(&(rc, rv))) = (left.peek(), right.peek()) {
            match lc.cmp(&rc) {
                std::cmp::Ordering::Less => {
                    left.next();
                }
                std::cmp::Ordering::Greater => {
                    right.next();
                }
                std::cmp::Ordering::Equal => {
                    sum += lv * rv;
                    left.next();
                    right.next();
                }
            }
        }

        sum
    }

    /// Checks that a deserialized matrix is a well-formed numeric CSR matrix
    pub fn validate(&self) -> AppResult<()> {
        if self.format != CSR_FORMAT {
            return Err(AppError::InvalidInput(format!(
                "Feature matrix must be a CSR sparse matrix, got format '{}'",
                self.format
            )));
        }
        if self.indptr.len() != self.rows + 1 || self.indptr.first() != Some(&0) {
            return Err(AppError::InvalidInput(format!(
                "Row pointer length {} does not match {} rows",
                self.indptr.len(),
                self.rows
            )));
        }
        if self.indices.len() != self.data.len() || self.indptr.last() != Some(&self.data.len()) {
            return Err(AppError::InvalidInput(
                "Feature matrix index and data arrays are inconsistent".to_string(),
            ));
        }
        for row in 0..self.rows {
            let (start, end) = (self.indptr[row], self.indptr[row + 1]);
            if start > end {
                return Err(AppError::InvalidInput(format!(
                    "Row pointer decreases at row {}",
                    row
                )));
            }
            let cols = &self.indices[start..end];
            if cols.iter().any(|&c| c >= self.cols) || cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(AppError::InvalidInput(format!(
                    "Invalid column indices in row {}",
                    row
                )));
            }
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(AppError::InvalidInput(
                "Feature matrix contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}
