//! Tooling for preparing Earth-system model input datasets.
//!
//! The numerics live in [`inputgen_core`]; this crate re-exports them and
//! provides the `inputgen` command-line tool.

pub use inputgen_core::*;
