//! The [`Unit`] type and value conversion between units.
//!
//! ```
//! use inputgen_core::units::Unit;
//!
//! let km = Unit::parse("km").unwrap();
//! let m = Unit::parse("m").unwrap();
//! assert_eq!(km.convert_value(1.5, &m).unwrap(), 1500.0);
//! ```

use super::dimension::Dimension;
use super::parser::{ParseError, ParsedUnit};
use super::registry::UNIT_REGISTRY;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a value could not be converted between two units.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("'{from_unit}' ({from}) and '{to_unit}' ({to}) are not dimensionally compatible")]
    IncompatibleDimensions {
        from: Dimension,
        to: Dimension,
        from_unit: String,
        to_unit: String,
    },
    /// An offset unit such as `degC` was raised to a power or combined with
    /// other units, so values cannot be converted affinely.
    #[error("'{0}' combines an offset unit with other units")]
    OffsetInCompound(String),
    #[error(transparent)]
    ParseError(#[from] ParseError),
}

/// A parsed unit string.
///
/// Equality is on the normalized form, so `"mmol/m^2/s"` equals
/// `"mmol m-2 s-1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    original: String,
    parsed: ParsedUnit,
}

impl Unit {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Ok(Self {
            original: input.to_string(),
            parsed: ParsedUnit::parse(input)?,
        })
    }

    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[must_use]
    pub fn normalized(&self) -> String {
        self.parsed.normalized()
    }

    pub fn dimension(&self) -> Result<Dimension, ParseError> {
        self.parsed.dimension()
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self.dimension(), other.dimension()) {
            (Ok(a), Ok(b)) => a.is_compatible(&b),
            _ => false,
        }
    }

    /// Returns `(factor, offset)` such that `si = value * factor + offset`.
    pub fn to_si_affine(&self) -> Result<(f64, f64), ConversionError> {
        let factor = self.parsed.to_si_factor()?;
        let components = self.parsed.components();

        let mut offset = 0.0;
        for symbol in components.keys() {
            let info = UNIT_REGISTRY
                .lookup(symbol)
                .ok_or_else(|| ParseError::UnknownUnit(symbol.clone()))?;
            if info.to_si_offset != 0.0 {
                if components.len() != 1 || components[symbol] != 1 {
                    return Err(ConversionError::OffsetInCompound(self.original.clone()));
                }
                offset = info.to_si_offset;
            }
        }

        Ok((factor, offset))
    }

    fn check_compatible(&self, other: &Self) -> Result<(), ConversionError> {
        let from = self.dimension()?;
        let to = other.dimension()?;
        if !from.is_compatible(&to) {
            return Err(ConversionError::IncompatibleDimensions {
                from,
                to,
                from_unit: self.original.clone(),
                to_unit: other.original.clone(),
            });
        }
        Ok(())
    }

    /// Multiplier taking a *difference* or rate in `self` to `other`.
    ///
    /// Offsets are ignored, so this is the right tool for fluxes and interval
    /// widths but not for absolute temperatures.
    pub fn conversion_factor(&self, other: &Self) -> Result<f64, ConversionError> {
        self.check_compatible(other)?;
        Ok(self.parsed.to_si_factor()? / other.parsed.to_si_factor()?)
    }

    /// Converts an absolute value, applying offsets where the units have them.
    pub fn convert_value(&self, value: f64, other: &Self) -> Result<f64, ConversionError> {
        self.check_compatible(other)?;
        let (factor_from, offset_from) = self.to_si_affine()?;
        let (factor_to, offset_to) = other.to_si_affine()?;
        Ok((value * factor_from + offset_from - offset_to) / factor_to)
    }

    /// Builds a closure applying [`Unit::convert_value`] without re-resolving
    /// the units for every value.
    pub fn converter_to(&self, other: &Self) -> Result<impl Fn(f64) -> f64, ConversionError> {
        self.check_compatible(other)?;
        let (factor_from, offset_from) = self.to_si_affine()?;
        let (factor_to, offset_to) = other.to_si_affine()?;
        Ok(move |value: f64| (value * factor_from + offset_from - offset_to) / factor_to)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

pub fn units_equal(a: &str, b: &str) -> Result<bool, ParseError> {
    Ok(Unit::parse(a)? == Unit::parse(b)?)
}

pub fn conversion_factor(from: &str, to: &str) -> Result<f64, ConversionError> {
    Unit::parse(from)?.conversion_factor(&Unit::parse(to)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_km_to_m() {
        let factor = conversion_factor("km", "m").unwrap();
        assert!((factor - 1000.0).abs() < 1e-10);
    }

    #[test]
    fn test_cm_depth_to_m() {
        let cm = Unit::parse("cm").unwrap();
        let m = Unit::parse("m").unwrap();
        assert!((cm.convert_value(500.0, &m).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_river_flux_units() {
        // Source runoff fluxes arrive as nmol/cm^2/s and are written as mmol/m^2/s
        let factor = conversion_factor("nmol/cm^2/s", "mmol/m^2/s").unwrap();
        assert!((factor - 0.01).abs() < 1e-15, "factor was {factor}");
    }

    #[test]
    fn test_celsius_is_affine() {
        let deg_c = Unit::parse("degC").unwrap();
        let k = Unit::parse("K").unwrap();
        let converted = deg_c.convert_value(10.0, &k).unwrap();
        assert!((converted - 283.15).abs() < 1e-12);

        let back = k.convert_value(converted, &deg_c).unwrap();
        assert!((back - 10.0).abs() < 1e-12);

        // Differences ignore the offset
        assert_eq!(deg_c.conversion_factor(&k).unwrap(), 1.0);
    }

    #[test]
    fn test_offset_in_compound_rejected() {
        let rate = Unit::parse("degC/day").unwrap();
        let k_rate = Unit::parse("K/s").unwrap();
        assert!(matches!(
            rate.convert_value(1.0, &k_rate),
            Err(ConversionError::OffsetInCompound(_))
        ));
    }

    #[test]
    fn test_incompatible_dimensions() {
        let m = Unit::parse("m").unwrap();
        let s = Unit::parse("s").unwrap();
        assert!(!m.is_compatible(&s));
        assert!(matches!(
            m.conversion_factor(&s),
            Err(ConversionError::IncompatibleDimensions { .. })
        ));
    }

    #[test]
    fn test_unknown_unit_is_parse_error() {
        let m = Unit::parse("m").unwrap();
        let bogus = Unit::parse("parsec").unwrap();
        assert!(matches!(
            bogus.convert_value(1.0, &m),
            Err(ConversionError::ParseError(ParseError::UnknownUnit(_)))
        ));
    }

    #[test]
    fn test_converter_matches_convert_value() {
        let km = Unit::parse("km").unwrap();
        let m = Unit::parse("m").unwrap();
        let to_m = km.converter_to(&m).unwrap();
        assert_eq!(to_m(0.25), km.convert_value(0.25, &m).unwrap());
    }

    #[test]
    fn test_equality_is_normalized() {
        assert!(units_equal("mmol/m^2/s", "mmol m-2 s-1").unwrap());
        assert!(!units_equal("mmol/m^2/s", "mmol/m^2").unwrap());
    }
}
