//! Core numerics for preparing Earth-system model input datasets.
//!
//! - [`axis_remap`]: conservative weights between 1D axes (depth, latitude)
//! - [`regrid`]: applying precomputed ESMF grid operators with a conservation check
//! - [`fill`], [`calendar`], [`grid_area`], [`vertical_grid`], [`metadata`]:
//!   the supporting steps around those

pub mod axis_remap;
pub mod calendar;
pub mod config;
pub mod conservation;
pub mod field;
pub mod fill;
pub mod grid_area;
pub mod mapping;
pub mod metadata;
pub mod regrid;
pub mod sparse;
pub mod units;
pub mod vertical_grid;

pub mod errors;

pub use errors::{InputgenError, InputgenResult};
