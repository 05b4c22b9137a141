//! Typed parameters for the figure-level features
//!
//! Drawing is delegated to the plotting backend; these types are what a
//! feature hands over after resolution.

use serde::Deserialize;
use serde_json::Value;

use crate::constants::units::{CM_PER_INCH, MM_PER_INCH, PT_PER_INCH};

/// Length unit for figure sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Mm,
    Cm,
    In,
    Pt,
}

impl Unit {
    pub const NAMES: &'static [&'static str] = &["mm", "cm", "in", "pt"];

    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            Unit::Mm => value / MM_PER_INCH,
            Unit::Cm => value / CM_PER_INCH,
            Unit::In => value,
            Unit::Pt => value / PT_PER_INCH,
        }
    }
}

/// Resolved `axes` options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxesParams {
    pub store: bool,
    pub size: [f64; 2],
    pub unit: Unit,
    /// "AB;CC" string or label grid, passed to the backend as-is
    pub mosaic: Value,
    pub clear: bool,
    pub ion: bool,
}

impl AxesParams {
    /// Figure (width, height) in inches
    pub fn figure_size_inches(&self) -> (f64, f64) {
        (self.unit.to_inches(self.size[0]), self.unit.to_inches(self.size[1]))
    }
}

/// Resolved `show` options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShowParams {
    pub fname: String,
    pub ft_list: Vec<String>,
    pub dpi: f64,
    pub show: bool,
}

impl ShowParams {
    /// One output file name per requested format
    pub fn output_files(&self) -> Vec<String> {
        self.ft_list
            .iter()
            .map(|ft| format!("{}.{}", self.fname, ft))
            .collect()
    }
}
