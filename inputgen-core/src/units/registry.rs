//! Registry of unit symbols found in model input datasets.
//!
//! Every entry carries its dimension and the affine map to SI base units:
//! `si = value * to_si_factor + to_si_offset`. Only temperatures have a
//! non-zero offset.
//!
//! Years are 365-day years because the model runs on a no-leap calendar.

use super::dimension::Dimension;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::LazyLock;

/// Information about a known unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub name: String,
    pub dimension: Dimension,
    /// Multiplier to SI base units.
    pub to_si_factor: f64,
    /// Offset added after scaling (absolute temperatures only).
    pub to_si_offset: f64,
}

impl UnitInfo {
    fn linear(name: &str, dimension: Dimension, to_si_factor: f64) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            to_si_factor,
            to_si_offset: 0.0,
        }
    }

    fn affine(name: &str, dimension: Dimension, to_si_factor: f64, to_si_offset: f64) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            to_si_factor,
            to_si_offset,
        }
    }
}

/// Decimal prefixes, longest symbol first so `da` wins over `d`.
pub static SI_PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
];

pub const SECONDS_PER_MINUTE: f64 = 60.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;
/// Seconds in a no-leap (365 day) year.
pub const SECONDS_PER_NOLEAP_YEAR: f64 = 365.0 * SECONDS_PER_DAY;

pub const KELVIN_AT_ZERO_CELSIUS: f64 = 273.15;

/// The global unit registry.
pub static UNIT_REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::new);

#[derive(Debug)]
pub struct UnitRegistry {
    units: HashMap<&'static str, UnitInfo>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            units: HashMap::new(),
            aliases: HashMap::new(),
        };
        registry.register_base_units();
        registry.register_time_units();
        registry.register_angle_units();
        registry.register_temperature_units();
        registry
    }

    /// Looks up a symbol: exact name, then alias, then prefixed linear unit.
    pub fn lookup(&self, symbol: &str) -> Option<UnitInfo> {
        self.lookup_exact(symbol)
            .or_else(|| self.lookup_prefixed(symbol))
    }

    fn lookup_exact(&self, symbol: &str) -> Option<UnitInfo> {
        let canonical = self.aliases.get(symbol).copied().unwrap_or(symbol);
        self.units.get(canonical).cloned()
    }

    fn lookup_prefixed(&self, symbol: &str) -> Option<UnitInfo> {
        SI_PREFIXES.iter().find_map(|(prefix, factor)| {
            let base = self.lookup_exact(symbol.strip_prefix(prefix)?)?;
            // Prefixes on offset units (e.g. "kdegC") are meaningless.
            if base.to_si_offset != 0.0 {
                return None;
            }
            Some(UnitInfo::linear(
                symbol,
                base.dimension,
                base.to_si_factor * factor,
            ))
        })
    }

    fn insert(&mut self, symbol: &'static str, info: UnitInfo) {
        self.units.insert(symbol, info);
    }

    fn register_base_units(&mut self) {
        self.insert("g", UnitInfo::linear("g", Dimension::MASS, 1e-3));
        self.insert("t", UnitInfo::linear("t", Dimension::MASS, 1e3));
        self.insert("m", UnitInfo::linear("m", Dimension::LENGTH, 1.0));
        self.insert("s", UnitInfo::linear("s", Dimension::TIME, 1.0));
        self.insert("mol", UnitInfo::linear("mol", Dimension::AMOUNT, 1.0));
        self.insert("1", UnitInfo::linear("1", Dimension::DIMENSIONLESS, 1.0));
        self.insert(
            "percent",
            UnitInfo::linear("percent", Dimension::DIMENSIONLESS, 1e-2),
        );

        self.aliases.insert("meter", "m");
        self.aliases.insert("meters", "m");
        self.aliases.insert("metre", "m");
        self.aliases.insert("metres", "m");
        self.aliases.insert("dimensionless", "1");
    }

    fn register_time_units(&mut self) {
        self.insert(
            "min",
            UnitInfo::linear("min", Dimension::TIME, SECONDS_PER_MINUTE),
        );
        self.insert("h", UnitInfo::linear("h", Dimension::TIME, SECONDS_PER_HOUR));
        self.insert(
            "day",
            UnitInfo::linear("day", Dimension::TIME, SECONDS_PER_DAY),
        );
        self.insert(
            "yr",
            UnitInfo::linear("yr", Dimension::TIME, SECONDS_PER_NOLEAP_YEAR),
        );

        self.aliases.insert("sec", "s");
        self.aliases.insert("seconds", "s");
        self.aliases.insert("hour", "h");
        self.aliases.insert("hours", "h");
        self.aliases.insert("days", "day");
        self.aliases.insert("d", "day");
        self.aliases.insert("year", "yr");
        self.aliases.insert("years", "yr");
    }

    fn register_angle_units(&mut self) {
        let degree = PI / 180.0;
        self.insert("rad", UnitInfo::linear("rad", Dimension::DIMENSIONLESS, 1.0));
        self.insert("sr", UnitInfo::linear("sr", Dimension::DIMENSIONLESS, 1.0));
        self.insert(
            "degree",
            UnitInfo::linear("degree", Dimension::DIMENSIONLESS, degree),
        );

        self.aliases.insert("radian", "rad");
        self.aliases.insert("radians", "rad");
        self.aliases.insert("steradian", "sr");
        self.aliases.insert("degrees", "degree");
        self.aliases.insert("degrees_north", "degree");
        self.aliases.insert("degrees_east", "degree");
        self.aliases.insert("degree_north", "degree");
        self.aliases.insert("degree_east", "degree");
    }

    fn register_temperature_units(&mut self) {
        self.insert("K", UnitInfo::linear("K", Dimension::TEMPERATURE, 1.0));
        self.insert(
            "degC",
            UnitInfo::affine(
                "degC",
                Dimension::TEMPERATURE,
                1.0,
                KELVIN_AT_ZERO_CELSIUS,
            ),
        );

        self.aliases.insert("kelvin", "K");
        self.aliases.insert("deg_C", "degC");
        self.aliases.insert("celsius", "degC");
    }
}
