//! Conservative remapping weights between two 1D axes.
//!
//! Each axis is a sequence of cells given by their bounds. The weight of source
//! cell `j` in destination cell `i` is the length of their overlap, and each
//! destination row is normalized to sum to one. Applying the weights therefore
//! produces length-weighted averages, and a constant field stays constant on
//! every destination cell that overlaps the source axis.
//!
//! Bounds may be stored increasing or decreasing (ocean depth axes are often
//! increasing downwards, pressure axes decreasing), and the two axes may use
//! different units as long as they are dimensionally compatible.
//!
//! The weights are built from a dense `(dst_len, src_len)` overlap matrix, so
//! the cost is `O(src_len * dst_len)`. That is fine for vertical and
//! latitudinal axes of a few hundred cells; much longer axes would want a
//! sorted sweep instead.
//!
//! # Examples
//!
//! ```rust
//! use inputgen_core::axis_remap::gen_remap_weights_1d;
//! use ndarray::array;
//!
//! let src = array![[0.0, 1.0], [1.0, 2.0]];
//! let dst = array![[0.0, 2.0]];
//! let weights = gen_remap_weights_1d(src.view(), dst.view(), "m", "m").unwrap();
//! assert_eq!(weights.to_dense(), array![[0.5, 0.5]]);
//! ```

use crate::errors::{InputgenError, InputgenResult};
use crate::sparse::CsrMatrix;
use crate::units::Unit;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A cell's two bounds, in either order.
pub type Interval = [f64; 2];

/// Length of the overlap between two intervals; never negative.
///
/// ```rust
/// use inputgen_core::axis_remap::interval_overlap;
///
/// assert_eq!(interval_overlap([0.0, 10.0], [5.0, 15.0]), 5.0);
/// assert_eq!(interval_overlap([10.0, 0.0], [15.0, 5.0]), 5.0);
/// assert_eq!(interval_overlap([0.0, 1.0], [2.0, 3.0]), 0.0);
/// ```
pub fn interval_overlap(a: Interval, b: Interval) -> f64 {
    let (a_lo, a_hi) = (a[0].min(a[1]), a[0].max(a[1]));
    let (b_lo, b_hi) = (b[0].min(b[1]), b[0].max(b[1]));
    (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0)
}

/// Bounds of the cells of a 1D axis, with the unit they are expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    bounds: Array2<f64>,
    unit: String,
}

impl AxisBounds {
    /// Wraps an `(N, 2)` bounds array.
    pub fn new(bounds: Array2<f64>, unit: &str) -> InputgenResult<Self> {
        check_bounds_shape(&bounds.view(), "axis")?;
        Ok(Self {
            bounds,
            unit: unit.to_string(),
        })
    }

    /// Builds contiguous cells from `N + 1` edges.
    pub fn from_edges(edges: ArrayView1<f64>, unit: &str) -> Self {
        let ncells = edges.len().saturating_sub(1);
        let bounds = Array2::from_shape_fn((ncells, 2), |(i, side)| edges[i + side]);
        Self {
            bounds,
            unit: unit.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn bounds(&self) -> ArrayView2<f64> {
        self.bounds.view()
    }

    pub fn interval(&self, index: usize) -> Interval {
        [self.bounds[[index, 0]], self.bounds[[index, 1]]]
    }

    /// Weights remapping values on this axis onto `dst`.
    pub fn remap_weights_to(&self, dst: &AxisBounds) -> InputgenResult<CsrMatrix> {
        gen_remap_weights_1d(self.bounds(), dst.bounds(), &self.unit, &dst.unit)
    }
}

fn check_bounds_shape(bounds: &ArrayView2<f64>, which: &str) -> InputgenResult<()> {
    if bounds.nrows() > 0 && bounds.ncols() != 2 {
        return Err(InputgenError::DimensionMismatch(format!(
            "{which} bounds must have shape (N, 2), got {:?}",
            bounds.shape()
        )));
    }
    Ok(())
}

/// Generates weights remapping a field on the `src` axis to the `dst` axis.
///
/// `src` and `dst` are `(N, 2)` bounds arrays. The source bounds are converted
/// from `src_units` to `dst_units` before overlaps are measured. The result has
/// shape `(dst_len, src_len)`; rows with any overlap sum to one, rows without
/// overlap are empty.
///
/// # Errors
///
/// * [`InputgenError::UnitConversion`] if either unit cannot be resolved or the
///   units are not dimensionally compatible
/// * [`InputgenError::DimensionMismatch`] if a bounds array is not `(N, 2)`
pub fn gen_remap_weights_1d(
    src: ArrayView2<f64>,
    dst: ArrayView2<f64>,
    src_units: &str,
    dst_units: &str,
) -> InputgenResult<CsrMatrix> {
    let src_unit = Unit::parse(src_units)?;
    let dst_unit = Unit::parse(dst_units)?;
    let to_dst_units = src_unit.converter_to(&dst_unit)?;

    check_bounds_shape(&src, "source")?;
    check_bounds_shape(&dst, "destination")?;

    let src_len = src.nrows();
    let dst_len = dst.nrows();
    let mut weights = Array2::<f64>::zeros((dst_len, src_len));

    for src_ind in 0..src_len {
        let src_interval = [
            to_dst_units(src[[src_ind, 0]]),
            to_dst_units(src[[src_ind, 1]]),
        ];
        for dst_ind in 0..dst_len {
            weights[[dst_ind, src_ind]] =
                interval_overlap(src_interval, [dst[[dst_ind, 0]], dst[[dst_ind, 1]]]);
        }
    }

    let mut empty_rows = 0;
    for mut row in weights.rows_mut() {
        let row_sum = row.sum();
        if row_sum > 0.0 {
            row /= row_sum;
        } else {
            empty_rows += 1;
        }
    }
    if empty_rows > 0 {
        debug!(
            empty_rows,
            dst_len, "destination cells without any source overlap"
        );
    }

    Ok(CsrMatrix::from_dense(weights.view()))
}
