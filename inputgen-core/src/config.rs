//! Run configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) gives the
//! behaviour of the river-flux tooling: scale by `0.01` to go from
//! `nmol/cm^2/s` to `mmol/m^2/s` and report conservation for the first and
//! last time step without failing.
//!
//! ```toml
//! [regrid]
//! scale_factor = 0.01
//! diagnostic_times = { indices = [0, 5] }
//! max_relative_error = 1e-6
//!
//! [regrid.conversions]
//! alk_riv_flux = "skip"
//!
//! [fill]
//! tripole = true
//! ```

use crate::conservation::{ConversionTable, DiagnosticTimes, EARTH_RADIUS};
use crate::errors::{InputgenError, InputgenResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for [`crate::regrid::SparseRegridder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridConfig {
    /// Multiplier applied to source values before mapping.
    pub scale_factor: f64,
    /// `units` attribute written on mapped fields.
    pub destination_units: String,
    pub diagnostic_times: DiagnosticTimes,
    /// Fail when a reported relative error exceeds this; report only if unset.
    pub max_relative_error: Option<f64>,
    /// Metres.
    pub earth_radius: f64,
    /// Map time steps on the rayon thread pool.
    pub parallel: bool,
    /// Overrides and additions to the default reporting conversions.
    pub conversions: ConversionTable,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            scale_factor: 0.01,
            destination_units: "mmol/m^2/s".to_string(),
            diagnostic_times: DiagnosticTimes::default(),
            max_relative_error: None,
            earth_radius: EARTH_RADIUS,
            parallel: true,
            conversions: ConversionTable::empty(),
        }
    }
}

impl RegridConfig {
    /// The default conversion table with this config's entries applied on top.
    pub fn conversion_table(&self) -> ConversionTable {
        ConversionTable::default().merged(&self.conversions)
    }

    pub fn validate(&self) -> InputgenResult<()> {
        if !self.scale_factor.is_finite() {
            return Err(InputgenError::Config(format!(
                "scale_factor must be finite, got {}",
                self.scale_factor
            )));
        }
        if !(self.earth_radius.is_finite() && self.earth_radius > 0.0) {
            return Err(InputgenError::Config(format!(
                "earth_radius must be positive, got {}",
                self.earth_radius
            )));
        }
        if let Some(threshold) = self.max_relative_error {
            if threshold.is_nan() || threshold < 0.0 {
                return Err(InputgenError::Config(format!(
                    "max_relative_error must be non-negative, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

/// Settings for [`crate::fill::fill_ocean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Convergence tolerance handed to the fill kernel.
    pub tolerance: f64,
    /// Whether the ocean grid has a tripole north fold.
    pub tripole: bool,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            tripole: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputgenConfig {
    pub regrid: RegridConfig,
    pub fill: FillConfig,
}

impl InputgenConfig {
    pub fn from_toml_str(text: &str) -> InputgenResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.regrid.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> InputgenResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> InputgenResult<String> {
        toml::to_string(self).map_err(|e| InputgenError::Config(e.to_string()))
    }
}
