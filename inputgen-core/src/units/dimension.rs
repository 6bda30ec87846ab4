//! Physical dimensions used to decide whether two units are convertible.
//!
//! A dimension is a vector of integer exponents over the base quantities the
//! input datasets actually carry: mass, length, time, temperature and amount of
//! substance. Angles and solid angles are treated as dimensionless, matching
//! the way remapping files store cell areas in steradians.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

const BASE_SYMBOLS: [&str; 5] = ["M", "L", "T", "Θ", "N"];

/// Exponents of the base quantities, in the order of `BASE_SYMBOLS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    exponents: [i8; 5],
}

impl Dimension {
    pub const DIMENSIONLESS: Self = Self::new([0, 0, 0, 0, 0]);
    pub const MASS: Self = Self::new([1, 0, 0, 0, 0]);
    pub const LENGTH: Self = Self::new([0, 1, 0, 0, 0]);
    pub const TIME: Self = Self::new([0, 0, 1, 0, 0]);
    pub const TEMPERATURE: Self = Self::new([0, 0, 0, 1, 0]);
    pub const AMOUNT: Self = Self::new([0, 0, 0, 0, 1]);

    /// Area (L²).
    pub const AREA: Self = Self::new([0, 2, 0, 0, 0]);

    /// Areal amount flux (N·L⁻²·T⁻¹), e.g. `mmol/m^2/s`.
    pub const AMOUNT_FLUX: Self = Self::new([0, -2, -1, 0, 1]);

    /// Areal mass flux (M·L⁻²·T⁻¹), e.g. `kg/m^2/s`.
    pub const MASS_FLUX: Self = Self::new([1, -2, -1, 0, 0]);

    #[must_use]
    pub const fn new(exponents: [i8; 5]) -> Self {
        Self { exponents }
    }

    #[must_use]
    pub const fn exponents(&self) -> [i8; 5] {
        self.exponents
    }

    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.exponents.iter().all(|&e| e == 0)
    }

    /// Two dimensions are compatible for conversion when they are identical.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self == other
    }

    #[must_use]
    pub fn powi(&self, exp: i32) -> Self {
        let mut exponents = self.exponents;
        for e in &mut exponents {
            *e = (i32::from(*e) * exp) as i8;
        }
        Self { exponents }
    }
}

impl Mul for Dimension {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        let mut exponents = self.exponents;
        for (e, r) in exponents.iter_mut().zip(rhs.exponents) {
            *e += r;
        }
        Self { exponents }
    }
}

impl Div for Dimension {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self * rhs.powi(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }

        let parts: Vec<String> = BASE_SYMBOLS
            .iter()
            .zip(self.exponents)
            .filter(|(_, exp)| *exp != 0)
            .map(|(sym, exp)| {
                if exp == 1 {
                    (*sym).to_string()
                } else {
                    format!("{sym}^{exp}")
                }
            })
            .collect();

        write!(f, "{}", parts.join(" "))
    }
}
