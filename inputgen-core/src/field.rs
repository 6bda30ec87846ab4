//! Named gridded fields and datasets.
//!
//! A [`Field`] is an n-dimensional array with named dimensions, coordinate
//! values, CF-style attributes and an output encoding. Operations in this crate
//! never mutate their input field; they build a new one.

use crate::errors::{InputgenError, InputgenResult};
use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An attribute value as found in netCDF metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// How a writer should treat `_FillValue` for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillValue {
    /// Not specified; a writer may inject its library default.
    #[default]
    Default,
    /// Explicitly no fill value.
    Disabled,
    Value(f64),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Encoding {
    #[serde(default)]
    pub fill_value: FillValue,
}

/// A named array with dimension names, coordinates and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    #[serde(default)]
    pub coords: BTreeMap<String, Array1<f64>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub encoding: Encoding,
}

impl Field {
    /// Creates a field, checking that every array axis has a name.
    pub fn new(name: &str, dims: &[&str], data: ArrayD<f64>) -> InputgenResult<Self> {
        if dims.len() != data.ndim() {
            return Err(InputgenError::DimensionMismatch(format!(
                "field '{name}' has {} dimension names for a {}-d array",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
            coords: BTreeMap::new(),
            attrs: BTreeMap::new(),
            encoding: Encoding::default(),
        })
    }

    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Attaches coordinate values for one of the field's dimensions.
    pub fn with_coord(mut self, dim: &str, values: Array1<f64>) -> InputgenResult<Self> {
        let axis = self.dim_index(dim).ok_or_else(|| {
            InputgenError::DimensionMismatch(format!(
                "field '{}' has no dimension '{dim}'",
                self.name
            ))
        })?;
        if self.data.len_of(ndarray::Axis(axis)) != values.len() {
            return Err(InputgenError::DimensionMismatch(format!(
                "coordinate '{dim}' has {} values but the dimension has length {}",
                values.len(),
                self.data.len_of(ndarray::Axis(axis))
            )));
        }
        self.coords.insert(dim.to_string(), values);
        Ok(self)
    }

    pub fn dim_index(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn units(&self) -> Option<&str> {
        self.attrs.get("units").and_then(AttrValue::as_str)
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// A collection of fields sharing coordinates, keyed by variable name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub variables: BTreeMap<String, Field>,
    #[serde(default)]
    pub coords: BTreeMap<String, Array1<f64>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field under its own name, replacing any previous one.
    pub fn insert(&mut self, field: Field) {
        self.variables.insert(field.name.clone(), field);
    }

    #[must_use]
    pub fn with_coord(mut self, name: &str, values: Array1<f64>) -> Self {
        self.coords.insert(name.to_string(), values);
        self
    }

    pub fn get(&self, variable: &str) -> InputgenResult<&Field> {
        self.variables
            .get(variable)
            .ok_or_else(|| InputgenError::NotFound {
                variable: variable.to_string(),
            })
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.variables.contains_key(variable)
    }

    /// Coordinate values for `dim`, preferring the field's own coordinate.
    pub fn coord_for(&self, field: &Field, dim: &str) -> Option<Array1<f64>> {
        field
            .coords
            .get(dim)
            .or_else(|| self.coords.get(dim))
            .cloned()
    }

    pub fn from_json_str(json: &str) -> InputgenResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> InputgenResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}
