use crate::units::ConversionError;
use thiserror::Error;

/// Error type for regridding and input-preparation operations.
#[derive(Error, Debug)]
pub enum InputgenError {
    #[error("Failed to load input data: {0}")]
    Load(String),
    #[error("Variable '{variable}' not found in source dataset")]
    NotFound { variable: String },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("Unit conversion failed: {0}")]
    UnitConversion(#[from] ConversionError),
    #[error("Conservation check failed for {variable} at time index {time_index}: relative error {rel_err:e} exceeds {threshold:e}")]
    ConservationViolation {
        variable: String,
        time_index: usize,
        rel_err: f64,
        threshold: f64,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),
}

impl From<toml::de::Error> for InputgenError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<crate::units::ParseError> for InputgenError {
    fn from(e: crate::units::ParseError) -> Self {
        Self::UnitConversion(ConversionError::ParseError(e))
    }
}

/// Convenience type for `Result<T, InputgenError>`.
pub type InputgenResult<T> = Result<T, InputgenError>;
