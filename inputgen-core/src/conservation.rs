//! Global-integral conservation diagnostic for regridded fluxes.
//!
//! For selected time steps the area-weighted global sum of a field is computed
//! on both the native and the mapped grid and compared. The sums are converted
//! from `mmol/s` into a reporting unit chosen per variable (TgN/yr, PgC/yr,
//! Tmol/yr, Gmol/yr) by a [`ConversionTable`].

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Earth radius used to turn steradian cell areas into square metres.
pub const EARTH_RADIUS: f64 = 6_371_220.0;

const SECONDS_PER_YEAR: f64 = 86400.0 * 365.0;

/// How a variable's global sums are scaled for reporting.
///
/// In configuration files a factor is written as a number and a skipped
/// variable as the string `"skip"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConversionRepr", into = "ConversionRepr")]
pub enum Conversion {
    Factor(f64),
    /// No diagnostic is produced for the variable.
    Skip,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ConversionRepr {
    Factor(f64),
    Keyword(String),
}

impl TryFrom<ConversionRepr> for Conversion {
    type Error = String;

    fn try_from(repr: ConversionRepr) -> Result<Self, Self::Error> {
        match repr {
            ConversionRepr::Factor(factor) => Ok(Self::Factor(factor)),
            ConversionRepr::Keyword(word) if word == "skip" => Ok(Self::Skip),
            ConversionRepr::Keyword(word) => {
                Err(format!("expected a number or \"skip\", got \"{word}\""))
            }
        }
    }
}

impl From<Conversion> for ConversionRepr {
    fn from(conversion: Conversion) -> Self {
        match conversion {
            Conversion::Factor(factor) => Self::Factor(factor),
            Conversion::Skip => Self::Keyword("skip".to_string()),
        }
    }
}

/// Variable name to reporting conversion.
///
/// Variables not in the table get a factor of zero, so their sums are
/// reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionTable {
    entries: BTreeMap<String, Conversion>,
}

impl Default for ConversionTable {
    fn default() -> Self {
        let mut table = Self::empty();
        // mmol -> mg N -> Tg, per year
        let nitrogen = 28.0 * 1e-15 * SECONDS_PER_YEAR;
        // mmol -> mg C -> Pg, per year
        let carbon = 12.0 * 1e-18 * SECONDS_PER_YEAR;
        // mmol -> Tmol, per year
        let tmol = 1e-15 * SECONDS_PER_YEAR;
        // mmol -> Gmol, per year
        let gmol = 1e-12 * SECONDS_PER_YEAR;

        for name in ["din_riv_flux", "don_riv_flux"] {
            table.insert(name, Conversion::Factor(nitrogen));
        }
        for name in ["dic_riv_flux", "doc_riv_flux"] {
            table.insert(name, Conversion::Factor(carbon));
        }
        for name in ["dip_riv_flux", "dop_riv_flux", "dsi_riv_flux"] {
            table.insert(name, Conversion::Factor(tmol));
        }
        table.insert("dfe_riv_flux", Conversion::Factor(gmol));
        table.insert("alk_riv_flux", Conversion::Skip);
        table
    }
}

impl ConversionTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, variable: &str, conversion: Conversion) {
        self.entries.insert(variable.to_string(), conversion);
    }

    /// Overlays `other` on this table; entries in `other` win.
    #[must_use]
    pub fn merged(mut self, other: &ConversionTable) -> Self {
        for (name, conversion) in &other.entries {
            self.entries.insert(name.clone(), *conversion);
        }
        self
    }

    pub fn lookup(&self, variable: &str) -> Conversion {
        self.entries
            .get(variable)
            .copied()
            .unwrap_or(Conversion::Factor(0.0))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which time indices get a conservation report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticTimes {
    #[default]
    FirstAndLast,
    All,
    None,
    Indices(BTreeSet<usize>),
}

impl DiagnosticTimes {
    /// The selected indices for a field with `ntime` time steps, ascending.
    ///
    /// Indices outside `0..ntime` are dropped.
    pub fn select(&self, ntime: usize) -> BTreeSet<usize> {
        match self {
            _ if ntime == 0 => BTreeSet::new(),
            Self::FirstAndLast => BTreeSet::from([0, ntime - 1]),
            Self::All => (0..ntime).collect(),
            Self::None => BTreeSet::new(),
            Self::Indices(indices) => indices.range(..ntime).copied().collect(),
        }
    }
}

/// Area-weighted global sum: `sum(values * area * R^2) * factor`.
///
/// `area` is in steradians.
pub fn global_integral(
    values: ArrayView1<f64>,
    area: ArrayView1<f64>,
    factor: f64,
    earth_radius: f64,
) -> f64 {
    let r2 = earth_radius * earth_radius;
    values
        .iter()
        .zip(area.iter())
        .map(|(v, a)| v * a * r2)
        .sum::<f64>()
        * factor
}

/// `|native - mapped| / |native|`, with `0/0` taken as exact agreement.
pub fn relative_error(native_sum: f64, mapped_sum: f64) -> f64 {
    if native_sum == 0.0 {
        if mapped_sum == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((native_sum - mapped_sum) / native_sum).abs()
    }
}

/// Native versus mapped global sums for one variable at one time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationReport {
    pub variable: String,
    pub time_index: usize,
    pub native_sum: f64,
    pub mapped_sum: f64,
    pub rel_err: f64,
}

impl ConservationReport {
    pub fn new(variable: &str, time_index: usize, native_sum: f64, mapped_sum: f64) -> Self {
        Self {
            variable: variable.to_string(),
            time_index,
            native_sum,
            mapped_sum,
            rel_err: relative_error(native_sum, mapped_sum),
        }
    }
}

impl fmt::Display for ConservationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stats: sums are {} (native) and {} (mapped); rel_err is {}",
            self.variable,
            sci(self.native_sum),
            sci(self.mapped_sum),
            sci(self.rel_err)
        )
    }
}

/// Formats like C's `%.3e`: three decimals and a signed two-digit exponent.
pub fn sci(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    let formatted = format!("{value:.3e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_sci_format() {
        assert_eq!(sci(123456.0), "1.235e+05");
        assert_eq!(sci(0.000123), "1.230e-04");
        assert_eq!(sci(0.0), "0.000e+00");
        assert_eq!(sci(-2.5e-300), "-2.500e-300");
        assert_eq!(sci(f64::INFINITY), "inf");
    }

    #[test]
    fn test_report_display() {
        let report = ConservationReport::new("din_riv_flux", 0, 1.5, 1.5);
        assert_eq!(
            report.to_string(),
            "din_riv_flux stats: sums are 1.500e+00 (native) and 1.500e+00 (mapped); rel_err is 0.000e+00"
        );
    }

    #[test]
    fn test_default_table() {
        let table = ConversionTable::default();
        assert_relative_eq!(
            match table.lookup("din_riv_flux") {
                Conversion::Factor(f) => f,
                Conversion::Skip => f64::NAN,
            },
            28e-15 * 86400.0 * 365.0,
            max_relative = 1e-12
        );
        assert_eq!(table.lookup("alk_riv_flux"), Conversion::Skip);
        assert_eq!(table.lookup("unknown"), Conversion::Factor(0.0));
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn test_merged_overrides() {
        let mut extra = ConversionTable::empty();
        extra.insert("alk_riv_flux", Conversion::Factor(1.0));
        extra.insert("my_flux", Conversion::Skip);
        let table = ConversionTable::default().merged(&extra);

        assert_eq!(table.lookup("alk_riv_flux"), Conversion::Factor(1.0));
        assert_eq!(table.lookup("my_flux"), Conversion::Skip);
    }

    #[test]
    fn test_relative_error_zero_native() {
        assert_eq!(relative_error(0.0, 0.0), 0.0);
        assert_eq!(relative_error(0.0, 1.0), f64::INFINITY);
        assert_relative_eq!(relative_error(2.0, 1.0), 0.5);
    }

    #[test]
    fn test_global_integral() {
        let values = array![1.0, 2.0];
        let area = array![0.5, 0.25];
        let sum = global_integral(values.view(), area.view(), 2.0, 10.0);
        assert_relative_eq!(sum, (0.5 + 0.5) * 100.0 * 2.0);
    }

    #[test]
    fn test_diagnostic_times() {
        assert_eq!(
            DiagnosticTimes::FirstAndLast.select(12),
            BTreeSet::from([0, 11])
        );
        assert_eq!(DiagnosticTimes::FirstAndLast.select(1), BTreeSet::from([0]));
        assert_eq!(DiagnosticTimes::All.select(3), BTreeSet::from([0, 1, 2]));
        assert!(DiagnosticTimes::None.select(3).is_empty());
        assert!(DiagnosticTimes::All.select(0).is_empty());

        let picked = DiagnosticTimes::Indices(BTreeSet::from([1, 7]));
        assert_eq!(picked.select(5), BTreeSet::from([1]));
        assert_eq!(picked.select(8), BTreeSet::from([1, 7]));
        assert_eq!(DiagnosticTimes::FirstAndLast.select(5), BTreeSet::from([0, 4]));
    }

    #[test]
    fn test_conversion_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            conversions: ConversionTable,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [conversions]
            my_flux = 1.0e-15
            alk_riv_flux = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.conversions.lookup("my_flux"),
            Conversion::Factor(1.0e-15)
        );
        assert_eq!(parsed.conversions.lookup("alk_riv_flux"), Conversion::Skip);
    }
}
