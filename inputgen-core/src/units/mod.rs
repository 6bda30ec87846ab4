//! Unit parsing and conversion for axis bounds and fluxes.
//!
//! Axis bounds arrive in whatever unit the source dataset used (ocean depth in
//! `cm`, atmospheric levels in `m`, latitudes in `degrees_north`) and fluxes
//! come in mixed conventions (`nmol/cm^2/s` versus `mmol/m^2/s`). This module
//! resolves those strings against a registry and produces conversion factors,
//! or full affine conversions for offset units such as `degC`.
//!
//! ```
//! use inputgen_core::units::{conversion_factor, Unit};
//!
//! let factor = conversion_factor("nmol/cm^2/s", "mmol/m^2/s").unwrap();
//! assert!((factor - 0.01).abs() < 1e-12);
//!
//! let depth_cm = Unit::parse("cm").unwrap();
//! let depth_m = Unit::parse("m").unwrap();
//! assert!(depth_cm.is_compatible(&depth_m));
//! ```
//!
//! - [`dimension`]: base-quantity exponents
//! - [`registry`]: known symbols, prefixes and their SI mapping
//! - [`parser`]: unit string grammar
//! - [`conversion`]: the [`Unit`] type

pub mod conversion;
pub mod dimension;
pub mod parser;
pub mod registry;

pub use conversion::{conversion_factor, units_equal, ConversionError, Unit};
pub use dimension::Dimension;
pub use parser::{ParseError, ParsedUnit};
pub use registry::{UnitInfo, UnitRegistry, UNIT_REGISTRY};
