//! Cell areas of a Gaussian latitude-longitude grid.

use crate::errors::{InputgenError, InputgenResult};
use crate::field::Field;
use ndarray::{Array2, ArrayView1};

/// Earth radius used by the atmosphere model, in metres.
pub const EARTH_RADIUS_ATM: f64 = 6.37122e6;

/// Cell areas in m^2 from Gaussian weights `gw`, shape `(gw.len(), nlon)`.
///
/// The weights are broadcast along longitude and scaled so the areas sum to
/// the surface of the sphere, `4 pi Re^2`.
pub fn compute_grid_area(gw: ArrayView1<f64>, nlon: usize) -> InputgenResult<Array2<f64>> {
    let total = gw.sum() * nlon as f64;
    if !(total.is_finite() && total > 0.0) {
        return Err(InputgenError::DimensionMismatch(format!(
            "Gaussian weights over {} latitudes and {nlon} longitudes sum to {total}",
            gw.len()
        )));
    }

    let scale = 4.0 * std::f64::consts::PI * EARTH_RADIUS_ATM.powi(2) / total;
    Ok(Array2::from_shape_fn((gw.len(), nlon), |(j, _)| gw[j] * scale))
}

/// [`compute_grid_area`] as a `("lat", "lon")` field named `area`.
pub fn area_field(gw: ArrayView1<f64>, nlon: usize) -> InputgenResult<Field> {
    let area = compute_grid_area(gw, nlon)?;
    Ok(Field::new("area", &["lat", "lon"], area.into_dyn())?.with_attr("units", "m^2"))
}
