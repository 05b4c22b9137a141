//! Per-feature option schemas
//!
//! Every feature declares its options up front: name, kind and default,
//! plus optional short aliases. Resolution validates against the schema,
//! so unknown call-site options fail instead of being passed through.

use serde_json::{Value, json};
use std::fmt;

use crate::error::ConfigError;
use crate::features::Unit;

/// Declared kind of an option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Anything, including null
    Any,
    Bool,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    /// Number strictly greater than zero
    Positive,
    Text,
    /// One of a fixed set of strings
    Choice(&'static [&'static str]),
    TextList,
    /// Exactly two numbers, e.g. a figure size
    NumberPair,
    /// Subplot layout: "AB;CC" style string or a grid of labels
    Mosaic,
    /// Named/hex color string, or RGB(A) with components in [0, 1]
    Color,
    /// null, or a value of the inner kind
    Nullable(Box<OptionKind>),
}

impl OptionKind {
    pub fn number() -> Self {
        OptionKind::Number { min: None, max: None }
    }

    pub fn non_negative() -> Self {
        OptionKind::Number { min: Some(0.0), max: None }
    }

    pub fn unit_interval() -> Self {
        OptionKind::Number { min: Some(0.0), max: Some(1.0) }
    }

    pub fn nullable(inner: OptionKind) -> Self {
        OptionKind::Nullable(Box::new(inner))
    }

    /// Check a value against this kind, returning a short reason on mismatch
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            OptionKind::Any => Ok(()),
            OptionKind::Bool => match value {
                Value::Bool(_) => Ok(()),
                _ => Err("expected a boolean".to_string()),
            },
            OptionKind::Integer { min, max } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| "expected an integer".to_string())?;
                if let Some(min) = min.filter(|m| n < *m) {
                    return Err(format!("must be at least {min}"));
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    return Err(format!("must be at most {max}"));
                }
                Ok(())
            }
            OptionKind::Number { min, max } => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| "expected a number".to_string())?;
                if let Some(min) = min.filter(|m| n < *m) {
                    return Err(format!("must be at least {min}"));
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    return Err(format!("must be at most {max}"));
                }
                Ok(())
            }
            OptionKind::Positive => match value.as_f64() {
                Some(n) if n > 0.0 => Ok(()),
                Some(_) => Err("must be greater than 0".to_string()),
                None => Err("expected a number".to_string()),
            },
            OptionKind::Text => match value {
                Value::String(_) => Ok(()),
                _ => Err("expected a string".to_string()),
            },
            OptionKind::Choice(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => Ok(()),
                _ => Err(format!("expected one of {}", allowed.join(", "))),
            },
            OptionKind::TextList => match value.as_array() {
                Some(items) if items.iter().all(Value::is_string) => Ok(()),
                _ => Err("expected a list of strings".to_string()),
            },
            OptionKind::NumberPair => match value.as_array() {
                Some(items) if items.len() == 2 && items.iter().all(Value::is_number) => Ok(()),
                _ => Err("expected exactly two numbers".to_string()),
            },
            OptionKind::Mosaic => check_mosaic(value),
            OptionKind::Color => check_color(value),
            OptionKind::Nullable(inner) => match value {
                Value::Null => Ok(()),
                other => inner.check(other),
            },
        }
    }
}

fn check_mosaic(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(()),
        Value::Array(rows)
            if !rows.is_empty()
                && rows.iter().all(|row| {
                    row.as_array()
                        .is_some_and(|cells| !cells.is_empty() && cells.iter().all(Value::is_string))
                }) =>
        {
            Ok(())
        }
        _ => Err("mosaic must be a non-empty string or a grid of labels".to_string()),
    }
}

fn check_color(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(()),
        Value::Array(components)
            if matches!(components.len(), 3 | 4)
                && components
                    .iter()
                    .all(|c| c.as_f64().is_some_and(|f| (0.0..=1.0).contains(&f))) =>
        {
            Ok(())
        }
        _ => Err("expected a color name or RGB(A) components in [0, 1]".to_string()),
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Any => write!(f, "any"),
            OptionKind::Bool => write!(f, "bool"),
            OptionKind::Integer { .. } => write!(f, "integer"),
            OptionKind::Number { .. } => write!(f, "number"),
            OptionKind::Positive => write!(f, "number > 0"),
            OptionKind::Text => write!(f, "string"),
            OptionKind::Choice(allowed) => write!(f, "{}", allowed.join("|")),
            OptionKind::TextList => write!(f, "[string]"),
            OptionKind::NumberPair => write!(f, "[number, number]"),
            OptionKind::Mosaic => write!(f, "mosaic"),
            OptionKind::Color => write!(f, "color"),
            OptionKind::Nullable(inner) => write!(f, "{inner}?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
    pub default: Value,
}

/// Declared options of one feature
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    name: String,
    options: Vec<OptionSpec>,
    /// (alias, canonical option)
    aliases: Vec<(String, String)>,
}

impl FeatureSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn option(mut self, name: impl Into<String>, kind: OptionKind, default: Value) -> Self {
        self.options.push(OptionSpec {
            name: name.into(),
            kind,
            default,
        });
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, option: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), option.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    pub fn get(&self, option: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == option)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(alias, option)| (alias.as_str(), option.as_str()))
    }

    /// Check that every default fits its declared kind
    pub fn validate_defaults(&self) -> Result<(), ConfigError> {
        for spec in &self.options {
            spec.kind
                .check(&spec.default)
                .map_err(|reason| ConfigError::invalid_option(&self.name, &spec.name, &spec.default, reason))?;
        }
        Ok(())
    }
}

/// Names of the features with a built-in schema
pub const BUILTIN_FEATURES: &[&str] = &["axes", "show", "line", "scatter", "label", "legend"];

pub fn builtin(feature: &str) -> Option<FeatureSchema> {
    match feature {
        "axes" => Some(axes_schema()),
        "show" => Some(show_schema()),
        "line" => Some(line_schema()),
        "scatter" => Some(scatter_schema()),
        "label" => Some(label_schema()),
        "legend" => Some(legend_schema()),
        _ => None,
    }
}

pub fn builtin_schemas() -> Vec<FeatureSchema> {
    BUILTIN_FEATURES.iter().filter_map(|name| builtin(name)).collect()
}

fn axes_schema() -> FeatureSchema {
    FeatureSchema::new("axes")
        .option("store", OptionKind::Bool, json!(false))
        .option("size", OptionKind::NumberPair, json!([5, 5]))
        .option("unit", OptionKind::Choice(Unit::NAMES), json!("in"))
        .option("mosaic", OptionKind::Mosaic, json!("A"))
        .option("clear", OptionKind::Bool, json!(true))
        .option("ion", OptionKind::Bool, json!(false))
}

fn show_schema() -> FeatureSchema {
    FeatureSchema::new("show")
        .option("fname", OptionKind::Text, json!("gsplot"))
        .option("ft_list", OptionKind::TextList, json!(["png", "pdf"]))
        .option("dpi", OptionKind::Positive, json!(600))
        .option("show", OptionKind::Bool, json!(true))
}

fn line_schema() -> FeatureSchema {
    FeatureSchema::new("line")
        .option("color", OptionKind::nullable(OptionKind::Color), Value::Null)
        .option("marker", OptionKind::Text, json!("o"))
        .option("markersize", OptionKind::non_negative(), json!(7))
        .option("markeredgewidth", OptionKind::non_negative(), json!(1.5))
        .option("markeredgecolor", OptionKind::nullable(OptionKind::Color), Value::Null)
        .option("markerfacecolor", OptionKind::nullable(OptionKind::Color), Value::Null)
        .option("linestyle", OptionKind::Text, json!("--"))
        .option("linewidth", OptionKind::non_negative(), json!(1))
        .option("alpha", OptionKind::unit_interval(), json!(0.2))
        .option("alpha_all", OptionKind::unit_interval(), json!(1))
        .option("label", OptionKind::nullable(OptionKind::Text), Value::Null)
        .alias("ms", "markersize")
        .alias("mew", "markeredgewidth")
        .alias("ls", "linestyle")
        .alias("lw", "linewidth")
        .alias("c", "color")
        .alias("mec", "markeredgecolor")
        .alias("mfc", "markerfacecolor")
}

fn scatter_schema() -> FeatureSchema {
    FeatureSchema::new("scatter")
        .option("color", OptionKind::nullable(OptionKind::Color), Value::Null)
        .option("size", OptionKind::non_negative(), json!(1))
        .option("alpha", OptionKind::unit_interval(), json!(1))
        .alias("s", "size")
        .alias("c", "color")
}

fn label_schema() -> FeatureSchema {
    FeatureSchema::new("label")
        .option("x_pad", OptionKind::Integer { min: Some(0), max: None }, json!(2))
        .option("y_pad", OptionKind::Integer { min: Some(0), max: None }, json!(2))
        .option("minor_ticks_all", OptionKind::Bool, json!(true))
        .option("tight_layout", OptionKind::Bool, json!(true))
        .option("add_index", OptionKind::Bool, json!(false))
}

fn legend_schema() -> FeatureSchema {
    FeatureSchema::new("legend")
        .option("loc", OptionKind::Text, json!("best"))
        .option("reverse", OptionKind::Bool, json!(false))
        .option("handles", OptionKind::Any, Value::Null)
        .option("labels", OptionKind::nullable(OptionKind::TextList), Value::Null)
}
