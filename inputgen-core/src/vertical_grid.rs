//! Ocean vertical grids built from layer thicknesses.
//!
//! POP vertical grid files list one layer per line with the thickness `dz` in
//! the first column. Edges start at the surface (0) and accumulate downwards.
//!
//! ```rust
//! use inputgen_core::vertical_grid::VerticalGrid;
//! use ndarray::array;
//!
//! let grid = VerticalGrid::from_thicknesses(array![10.0, 20.0].view(), "m").unwrap();
//! assert_eq!(grid.edges(), &array![0.0, 10.0, 30.0]);
//! assert_eq!(grid.centers(), &array![5.0, 20.0]);
//! ```

use crate::axis_remap::AxisBounds;
use crate::errors::{InputgenError, InputgenResult};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalGrid {
    dz: Array1<f64>,
    edges: Array1<f64>,
    centers: Array1<f64>,
    unit: String,
}

impl VerticalGrid {
    /// Builds the grid from layer thicknesses, top to bottom.
    ///
    /// Thicknesses must be finite and positive.
    pub fn from_thicknesses(dz: ArrayView1<f64>, unit: &str) -> InputgenResult<Self> {
        if let Some(bad) = dz.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(InputgenError::Load(format!(
                "layer thickness must be positive, got {bad}"
            )));
        }

        let mut edges = Array1::zeros(dz.len() + 1);
        let mut depth = 0.0;
        for (k, thickness) in dz.iter().enumerate() {
            depth += thickness;
            edges[k + 1] = depth;
        }
        let centers = Array1::from_shape_fn(dz.len(), |k| edges[k] + 0.5 * dz[k]);

        Ok(Self {
            dz: dz.to_owned(),
            edges,
            centers,
            unit: unit.to_string(),
        })
    }

    /// Parses a whitespace separated table whose first column is `dz`.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_table(text: &str, unit: &str) -> InputgenResult<Self> {
        let mut dz = Vec::new();
        for (line_number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let first = line.split_whitespace().next().unwrap_or_default();
            let value: f64 = first.parse().map_err(|_| {
                InputgenError::Load(format!(
                    "line {}: cannot read layer thickness from '{first}'",
                    line_number + 1
                ))
            })?;
            dz.push(value);
        }
        Self::from_thicknesses(Array1::from(dz).view(), unit)
    }

    pub fn from_path(path: impl AsRef<Path>, unit: &str) -> InputgenResult<Self> {
        Self::from_table(&std::fs::read_to_string(path)?, unit)
    }

    pub fn len(&self) -> usize {
        self.dz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dz.is_empty()
    }

    pub fn dz(&self) -> &Array1<f64> {
        &self.dz
    }

    pub fn edges(&self) -> &Array1<f64> {
        &self.edges
    }

    pub fn centers(&self) -> &Array1<f64> {
        &self.centers
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Layer bounds, ready for [`AxisBounds::remap_weights_to`].
    pub fn bounds(&self) -> AxisBounds {
        AxisBounds::from_edges(self.edges.view(), &self.unit)
    }
}
