//! Filling missing ocean values on the POP grid.
//!
//! The numerical fill (an iterative smoothing of missing points from their
//! neighbours) is supplied by a [`FillKernel`]. This module handles the
//! dispatch around it: working out which 2D layers a field has, pairing each
//! layer with the right mask layer, and converting values to and from the
//! single-precision, missing-value encoded form the kernel works on.

use crate::config::FillConfig;
use crate::errors::{InputgenError, InputgenResult};
use crate::field::{AttrValue, Field};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayViewMut2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// netCDF's default `_FillValue` for 32-bit floats.
pub const MISSING_VALUE_F32: f32 = 9.969_209_968_386_869e36;

/// A fill algorithm for a single `(nlat, nlon)` layer.
///
/// `values` holds `missing_value` wherever the input was missing. The kernel
/// must replace the points flagged in `fill_mask`; any point still equal to
/// `missing_value` afterwards is treated as missing.
pub trait FillKernel: Send + Sync {
    fn fill_layer(
        &self,
        values: &mut Array2<f32>,
        fill_mask: ArrayView2<bool>,
        missing_value: f32,
        tolerance: f64,
        tripole: bool,
    ) -> InputgenResult<()>;
}

/// Arrangement of the non-lateral dimensions of a POP field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillLayout {
    Single,
    Time,
    Depth,
    TimeDepth,
}

impl FillLayout {
    /// Classifies a field from its dimension names; the last two are lateral.
    pub fn detect(dims: &[String]) -> InputgenResult<Self> {
        if dims.len() < 2 {
            return Err(InputgenError::DimensionMismatch(format!(
                "fill needs at least two lateral dimensions, got {dims:?}"
            )));
        }
        let leading: Vec<&str> = dims[..dims.len() - 2].iter().map(String::as_str).collect();
        match leading.as_slice() {
            [] => Ok(Self::Single),
            ["time"] => Ok(Self::Time),
            ["z_t"] => Ok(Self::Depth),
            ["time", "z_t"] => Ok(Self::TimeDepth),
            other => Err(InputgenError::DimensionMismatch(format!(
                "unknown dims: {other:?}"
            ))),
        }
    }

    /// Dimension names the mask must have for this layout.
    pub fn mask_dims(&self) -> &'static [&'static str] {
        match self {
            Self::Single | Self::Time => &["nlat", "nlon"],
            Self::Depth | Self::TimeDepth => &["z_t", "nlat", "nlon"],
        }
    }
}

/// Ocean mask; `true` where a point should hold a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub dims: Vec<String>,
    pub data: ArrayD<bool>,
}

impl Mask {
    pub fn new(dims: &[&str], data: ArrayD<bool>) -> InputgenResult<Self> {
        if dims.len() != data.ndim() {
            return Err(InputgenError::DimensionMismatch(format!(
                "mask has {} dimension names for a {}-d array",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
        })
    }
}

/// Fills missing ocean points of `field` layer by layer.
///
/// Layers with no missing ocean point are left as they are. If any layer was
/// filled the result carries `note = "fill_ocean_POP applied"`.
pub fn fill_ocean(
    field: &Field,
    mask: &Mask,
    kernel: &dyn FillKernel,
    config: &FillConfig,
) -> InputgenResult<Field> {
    let layout = FillLayout::detect(&field.dims)?;
    if mask.dims.iter().map(String::as_str).ne(layout.mask_dims().iter().copied()) {
        return Err(InputgenError::DimensionMismatch(format!(
            "mask dims {:?} do not match data, expected {:?}",
            mask.dims,
            layout.mask_dims()
        )));
    }

    let shape = field.shape();
    let ndim = shape.len();
    let (nlat, nlon) = (shape[ndim - 2], shape[ndim - 1]);
    let expected_mask_shape: &[usize] = match layout {
        FillLayout::Single | FillLayout::Time => &shape[ndim - 2..],
        FillLayout::Depth => shape,
        FillLayout::TimeDepth => &shape[1..],
    };
    if mask.data.shape() != expected_mask_shape {
        return Err(InputgenError::DimensionMismatch(format!(
            "mask shape {:?} does not match data shape {:?}",
            mask.data.shape(),
            shape
        )));
    }

    let nlayers: usize = shape[..ndim - 2].iter().product();
    let nmask: usize = mask.data.shape()[..mask.data.ndim() - 2].iter().product();
    let mut values =
        Array3::from_shape_vec((nlayers, nlat, nlon), field.data.iter().copied().collect())
            .map_err(|e| InputgenError::DimensionMismatch(e.to_string()))?;
    let mask_layers =
        Array3::from_shape_vec((nmask, nlat, nlon), mask.data.iter().copied().collect())
            .map_err(|e| InputgenError::DimensionMismatch(e.to_string()))?;

    let mut filled = 0;
    for (layer_index, layer) in values.outer_iter_mut().enumerate() {
        let mask_index = match layout {
            FillLayout::Single | FillLayout::Time => 0,
            FillLayout::Depth => layer_index,
            FillLayout::TimeDepth => layer_index % nmask,
        };
        let mask_layer = mask_layers.index_axis(ndarray::Axis(0), mask_index);
        if fill_single_layer(layer, mask_layer, kernel, config)? {
            filled += 1;
        }
    }
    debug!(variable = %field.name, ?layout, nlayers, filled, "ocean fill");

    let mut output = field.clone();
    output.data = values
        .into_shape_with_order(field.data.raw_dim())
        .map_err(|e| InputgenError::DimensionMismatch(e.to_string()))?;
    if filled > 0 {
        output
            .attrs
            .insert("note".to_string(), AttrValue::from("fill_ocean_POP applied"));
    }
    Ok(output)
}

/// Returns whether the layer had anything to fill.
fn fill_single_layer(
    mut layer: ArrayViewMut2<f64>,
    mask: ArrayView2<bool>,
    kernel: &dyn FillKernel,
    config: &FillConfig,
) -> InputgenResult<bool> {
    let fill_mask = Zip::from(&layer)
        .and(&mask)
        .map_collect(|value, &ocean| value.is_nan() && ocean);
    if !fill_mask.iter().any(|&flag| flag) {
        return Ok(false);
    }

    let mut values = layer.mapv(|value| {
        if value.is_nan() {
            MISSING_VALUE_F32
        } else {
            value as f32
        }
    });
    kernel.fill_layer(
        &mut values,
        fill_mask.view(),
        MISSING_VALUE_F32,
        config.tolerance,
        config.tripole,
    )?;

    Zip::from(&mut layer).and(&values).for_each(|out, &value| {
        *out = if value == MISSING_VALUE_F32 {
            f64::NAN
        } else {
            f64::from(value)
        };
    });
    Ok(true)
}
