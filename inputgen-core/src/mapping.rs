//! Sparse grid-to-grid operators read from ESMF mapping files.
//!
//! An ESMF offline mapping file stores the weights as 1-based coordinate
//! triplets (`S`, `row`, `col`), the grid shapes as `[nx, ny]` pairs in
//! `src_grid_dims`/`dst_grid_dims`, and the cell areas (in steradians) as
//! `area_a` (source) and `area_b` (destination).
//!
//! Loading goes through the [`MappingSource`] trait so the same validation is
//! applied whether the arrays come from a netCDF file (feature `netcdf`), a
//! JSON export, or memory.

use crate::errors::{InputgenError, InputgenResult};
use crate::sparse::CsrMatrix;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Shape of a logically rectangular grid, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells. Shapes held by a [`GridOperator`] never overflow.
    pub fn size(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of cells, or `None` if it does not fit in `usize`.
    pub fn checked_size(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Interprets an ESMF `*_grid_dims` pair, which is stored as `[cols, rows]`.
    fn from_esmf_dims(name: &str, dims: &[i64]) -> InputgenResult<Self> {
        let invalid = || {
            InputgenError::Load(format!(
                "{name} must hold two positive extents, got {dims:?}"
            ))
        };
        let [cols, rows] = dims else {
            return Err(invalid());
        };
        if *cols <= 0 || *rows <= 0 {
            return Err(invalid());
        }
        let shape = Self {
            rows: usize::try_from(*rows).map_err(|_| invalid())?,
            cols: usize::try_from(*cols).map_err(|_| invalid())?,
        };
        shape.checked_size().ok_or_else(|| {
            InputgenError::Load(format!("{name} {dims:?} describes too many cells"))
        })?;
        Ok(shape)
    }
}

/// Provider of the named arrays making up an ESMF mapping file.
pub trait MappingSource {
    fn int_array(&self, name: &str) -> InputgenResult<Vec<i64>>;
    fn float_array(&self, name: &str) -> InputgenResult<Vec<f64>>;
}

fn missing(name: &str) -> InputgenError {
    InputgenError::Load(format!("mapping source has no '{name}' array"))
}

/// The mapping arrays held in memory, e.g. exported to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingFields {
    #[serde(default)]
    pub src_grid_dims: Option<Vec<i64>>,
    #[serde(default)]
    pub dst_grid_dims: Option<Vec<i64>>,
    #[serde(default, rename = "S")]
    pub s: Option<Vec<f64>>,
    #[serde(default)]
    pub row: Option<Vec<i64>>,
    #[serde(default)]
    pub col: Option<Vec<i64>>,
    #[serde(default)]
    pub area_a: Option<Vec<f64>>,
    #[serde(default)]
    pub area_b: Option<Vec<f64>>,
}

impl MappingFields {
    pub fn from_json_str(json: &str) -> InputgenResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> InputgenResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl MappingSource for MappingFields {
    fn int_array(&self, name: &str) -> InputgenResult<Vec<i64>> {
        let array = match name {
            "src_grid_dims" => &self.src_grid_dims,
            "dst_grid_dims" => &self.dst_grid_dims,
            "row" => &self.row,
            "col" => &self.col,
            _ => &None,
        };
        array.clone().ok_or_else(|| missing(name))
    }

    fn float_array(&self, name: &str) -> InputgenResult<Vec<f64>> {
        let array = match name {
            "S" => &self.s,
            "area_a" => &self.area_a,
            "area_b" => &self.area_b,
            _ => &None,
        };
        array.clone().ok_or_else(|| missing(name))
    }
}

/// An ESMF mapping file opened with the netCDF library.
#[cfg(feature = "netcdf")]
pub struct NetcdfMappingFile {
    file: netcdf::File,
}

#[cfg(feature = "netcdf")]
impl NetcdfMappingFile {
    pub fn open(path: impl AsRef<Path>) -> InputgenResult<Self> {
        let file = netcdf::open(path.as_ref())?;
        Ok(Self { file })
    }
}

#[cfg(feature = "netcdf")]
impl MappingSource for NetcdfMappingFile {
    fn int_array(&self, name: &str) -> InputgenResult<Vec<i64>> {
        let var = self.file.variable(name).ok_or_else(|| missing(name))?;
        Ok(var.get_values::<i64, _>(..)?)
    }

    fn float_array(&self, name: &str) -> InputgenResult<Vec<f64>> {
        let var = self.file.variable(name).ok_or_else(|| missing(name))?;
        Ok(var.get_values::<f64, _>(..)?)
    }
}

/// A validated sparse operator from a source grid to a destination grid.
///
/// `weights` has shape `(dst_shape.size(), src_shape.size())`. Areas are in
/// steradians, one per cell, flattened row-major.
///
/// Deserializing goes through [`GridOperator::new`], so a stored operator is
/// checked the same way as one built in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridOperatorParts")]
pub struct GridOperator {
    weights: CsrMatrix,
    src_shape: GridShape,
    dst_shape: GridShape,
    src_area: Array1<f64>,
    dst_area: Array1<f64>,
}

impl GridOperator {
    /// Assembles an operator from parts, checking that they agree.
    pub fn new(
        weights: CsrMatrix,
        src_shape: GridShape,
        dst_shape: GridShape,
        src_area: Array1<f64>,
        dst_area: Array1<f64>,
    ) -> InputgenResult<Self> {
        let src_size = cell_count("source", src_shape)?;
        let dst_size = cell_count("destination", dst_shape)?;
        if weights.shape() != (dst_size, src_size) {
            return Err(InputgenError::Load(format!(
                "weight matrix has shape {:?} but the grids need ({dst_size}, {src_size})",
                weights.shape(),
            )));
        }
        check_area_len("area_a", "source", src_area.len(), src_size)?;
        check_area_len("area_b", "destination", dst_area.len(), dst_size)?;

        Ok(Self {
            weights,
            src_shape,
            dst_shape,
            src_area,
            dst_area,
        })
    }

    /// Reads and validates an operator from an ESMF-style source.
    pub fn load(source: &impl MappingSource) -> InputgenResult<Self> {
        let src_dims = source.int_array("src_grid_dims")?;
        let dst_dims = source.int_array("dst_grid_dims")?;
        let src_shape = GridShape::from_esmf_dims("src_grid_dims", &src_dims)?;
        let dst_shape = GridShape::from_esmf_dims("dst_grid_dims", &dst_dims)?;

        // Areas are checked first: the CSR row pointer is sized by the grid.
        let src_area = Array1::from(source.float_array("area_a")?);
        let dst_area = Array1::from(source.float_array("area_b")?);
        check_area_len("area_a", "source", src_area.len(), src_shape.size())?;
        check_area_len("area_b", "destination", dst_area.len(), dst_shape.size())?;

        let values = source.float_array("S")?;
        let rows = source.int_array("row")?;
        let cols = source.int_array("col")?;
        if rows.len() != values.len() || cols.len() != values.len() {
            return Err(InputgenError::Load(format!(
                "S, row and col differ in length ({}, {}, {})",
                values.len(),
                rows.len(),
                cols.len()
            )));
        }

        let rows = to_zero_based("row", &rows, dst_shape.size())?;
        let cols = to_zero_based("col", &cols, src_shape.size())?;
        let weights = CsrMatrix::from_triplets(
            dst_shape.size(),
            src_shape.size(),
            &rows,
            &cols,
            &values,
        )
        .map_err(|e| InputgenError::Load(e.to_string()))?;

        let operator = Self::new(weights, src_shape, dst_shape, src_area, dst_area)?;

        let empty_rows = operator
            .weights
            .row_sums()
            .iter()
            .filter(|&&sum| sum == 0.0)
            .count();
        if empty_rows == dst_shape.size() && dst_shape.size() > 0 {
            warn!("mapping weights are empty; every destination cell will be zero");
        }
        debug!(
            src_rows = src_shape.rows,
            src_cols = src_shape.cols,
            dst_rows = dst_shape.rows,
            dst_cols = dst_shape.cols,
            nnz = operator.weights.nnz(),
            "loaded mapping weights"
        );

        Ok(operator)
    }

    #[cfg(feature = "netcdf")]
    pub fn from_netcdf(path: impl AsRef<Path>) -> InputgenResult<Self> {
        Self::load(&NetcdfMappingFile::open(path)?)
    }

    pub fn weights(&self) -> &CsrMatrix {
        &self.weights
    }

    pub fn src_shape(&self) -> GridShape {
        self.src_shape
    }

    pub fn dst_shape(&self) -> GridShape {
        self.dst_shape
    }

    pub fn src_grid_size(&self) -> usize {
        self.src_shape.size()
    }

    pub fn dst_grid_size(&self) -> usize {
        self.dst_shape.size()
    }

    pub fn src_area(&self) -> &Array1<f64> {
        &self.src_area
    }

    pub fn dst_area(&self) -> &Array1<f64> {
        &self.dst_area
    }
}

#[derive(Deserialize)]
struct GridOperatorParts {
    weights: CsrMatrix,
    src_shape: GridShape,
    dst_shape: GridShape,
    src_area: Array1<f64>,
    dst_area: Array1<f64>,
}

impl TryFrom<GridOperatorParts> for GridOperator {
    type Error = InputgenError;

    fn try_from(parts: GridOperatorParts) -> InputgenResult<Self> {
        Self::new(
            parts.weights,
            parts.src_shape,
            parts.dst_shape,
            parts.src_area,
            parts.dst_area,
        )
    }
}

fn cell_count(grid: &str, shape: GridShape) -> InputgenResult<usize> {
    shape.checked_size().ok_or_else(|| {
        InputgenError::Load(format!(
            "{grid} grid of {} x {} cells is too large",
            shape.rows, shape.cols
        ))
    })
}

fn check_area_len(name: &str, grid: &str, len: usize, size: usize) -> InputgenResult<()> {
    if len == size {
        Ok(())
    } else {
        Err(InputgenError::Load(format!(
            "{name} has {len} entries for a {grid} grid of {size} cells"
        )))
    }
}

fn to_zero_based(name: &str, indices: &[i64], size: usize) -> InputgenResult<Vec<usize>> {
    indices
        .iter()
        .map(|&index| {
            if index >= 1 && (index as u64) <= size as u64 {
                Ok(index as usize - 1)
            } else {
                Err(InputgenError::Load(format!(
                    "{name} index {index} outside 1..={size}"
                )))
            }
        })
        .collect()
}
