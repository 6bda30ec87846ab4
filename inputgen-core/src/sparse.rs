//! Compressed sparse row matrices for remapping weights.
//!
//! Both the 1D axis weights and the 2D grid operators are stored in CSR form:
//! rows are destination cells, columns are source cells, and applying the
//! operator is a single pass over the stored entries.

use crate::errors::{InputgenError, InputgenResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// A real-valued sparse matrix in compressed sparse row layout.
///
/// Column indices within a row are strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CsrParts")]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    /// `indptr[i]..indptr[i + 1]` is the span of row `i` in `indices`/`data`.
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// An all-zero matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            indptr: vec![0; nrows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Compresses a dense matrix, storing only non-zero entries.
    pub fn from_dense(dense: ArrayView2<f64>) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut indptr = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();

        indptr.push(0);
        for row in dense.rows() {
            for (col, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        }
    }

    /// Builds a matrix from coordinate triplets (0-based).
    ///
    /// Repeated `(row, col)` pairs are summed, as in a COO to CSR conversion.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        values: &[f64],
    ) -> InputgenResult<Self> {
        if rows.len() != values.len() || cols.len() != values.len() {
            return Err(InputgenError::DimensionMismatch(format!(
                "triplet arrays differ in length (rows={}, cols={}, values={})",
                rows.len(),
                cols.len(),
                values.len()
            )));
        }

        let mut entries = Vec::with_capacity(values.len());
        for ((&row, &col), &value) in rows.iter().zip(cols).zip(values) {
            if row >= nrows || col >= ncols {
                return Err(InputgenError::DimensionMismatch(format!(
                    "entry ({row}, {col}) outside matrix of shape ({nrows}, {ncols})"
                )));
            }
            entries.push((row, col, value));
        }
        entries.sort_unstable_by_key(|&(row, col, _)| (row, col));

        let mut counts = vec![0usize; nrows];
        let mut indices: Vec<usize> = Vec::with_capacity(entries.len());
        let mut data: Vec<f64> = Vec::with_capacity(entries.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in entries {
            if last == Some((row, col)) {
                if let Some(tail) = data.last_mut() {
                    *tail += value;
                }
                continue;
            }
            counts[row] += 1;
            indices.push(col);
            data.push(value);
            last = Some((row, col));
        }

        let mut indptr = Vec::with_capacity(nrows + 1);
        indptr.push(0);
        for count in counts {
            let next = indptr[indptr.len() - 1] + count;
            indptr.push(next);
        }

        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        })
    }

    /// Assembles a matrix from raw CSR arrays, checking the layout.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> InputgenResult<Self> {
        let invalid = |reason: String| {
            InputgenError::DimensionMismatch(format!(
                "invalid CSR layout for a ({nrows}, {ncols}) matrix: {reason}"
            ))
        };

        if Some(indptr.len()) != nrows.checked_add(1) {
            return Err(invalid(format!("indptr has {} entries", indptr.len())));
        }
        if indices.len() != data.len() {
            return Err(invalid(format!(
                "{} indices for {} values",
                indices.len(),
                data.len()
            )));
        }
        if indptr.first() != Some(&0) || indptr.last() != Some(&indices.len()) {
            return Err(invalid(format!(
                "indptr must run from 0 to {}",
                indices.len()
            )));
        }
        if indptr.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(invalid("indptr is not monotone".to_string()));
        }
        for (row, span) in indptr.windows(2).enumerate() {
            let cols = &indices[span[0]..span[1]];
            if cols.iter().any(|&col| col >= ncols) {
                return Err(invalid(format!("row {row} has a column out of range")));
            }
            if cols.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(invalid(format!("row {row} columns are not increasing")));
            }
        }

        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        })
    }

    /// Matrix dimensions as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Value at `(row, col)`, zero when not stored or out of range.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.nrows {
            return 0.0;
        }
        let span = self.indptr[row]..self.indptr[row + 1];
        match self.indices[span.clone()].binary_search(&col) {
            Ok(offset) => self.data[span.start + offset],
            Err(_) => 0.0,
        }
    }

    /// Stored `(col, value)` pairs of one row.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[row]..self.indptr[row + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.data[span].iter().copied())
    }

    pub fn row_sums(&self) -> Array1<f64> {
        Array1::from_iter((0..self.nrows).map(|i| self.row(i).map(|(_, v)| v).sum()))
    }

    /// Matrix-vector product `A x`.
    pub fn mul_vec(&self, x: ArrayView1<f64>) -> InputgenResult<Array1<f64>> {
        if x.len() != self.ncols {
            return Err(InputgenError::DimensionMismatch(format!(
                "vector of length {} cannot multiply a matrix with {} columns",
                x.len(),
                self.ncols
            )));
        }

        Ok(Array1::from_iter((0..self.nrows).map(|i| {
            self.row(i).map(|(col, weight)| weight * x[col]).sum::<f64>()
        })))
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.nrows, self.ncols));
        for i in 0..self.nrows {
            for (j, value) in self.row(i) {
                dense[[i, j]] = value;
            }
        }
        dense
    }
}

#[derive(Deserialize)]
struct CsrParts {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<CsrParts> for CsrMatrix {
    type Error = InputgenError;

    fn try_from(parts: CsrParts) -> InputgenResult<Self> {
        Self::from_parts(
            parts.nrows,
            parts.ncols,
            parts.indptr,
            parts.indices,
            parts.data,
        )
    }
}
