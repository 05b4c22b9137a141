//! Three-way option resolution
//!
//! Priority: call-site argument > config file > schema default.
//! Resolution is all-or-nothing per feature: the first bad option aborts the call.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::schema::{self, FeatureSchema};
use crate::config::store::ConfigStore;
use crate::error::ConfigError;

/// A call-site argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Value(Value),
    /// Explicitly asks for the schema default, ignoring the config file.
    /// Distinct from not passing the option at all.
    UseDefault,
}

/// Options supplied at the call site, keyed by option name or alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, ArgValue::Value(value.into()));
        self
    }

    pub fn use_default(mut self, name: impl Into<String>) -> Self {
        self.insert(name, ArgValue::UseDefault);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.args.insert(name.into(), value);
    }
}

/// Which layer decided an option's final value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    CallSite,
    ConfigFile,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOption {
    pub value: Value,
    pub source: Source,
}

/// Final option values for one feature invocation.
/// Serializes as a plain `{option: value}` object.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameters {
    feature: String,
    options: BTreeMap<String, ResolvedOption>,
}

impl ResolvedParameters {
    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn get(&self, option: &str) -> Option<&Value> {
        self.options.get(option).map(|resolved| &resolved.value)
    }

    pub fn source(&self, option: &str) -> Option<Source> {
        self.options.get(option).map(|resolved| resolved.source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedOption)> {
        self.options.iter().map(|(name, resolved)| (name.as_str(), resolved))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Values only, as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.options
                .iter()
                .map(|(name, resolved)| (name.clone(), resolved.value.clone()))
                .collect::<Map<String, Value>>(),
        )
    }

    /// Decode into a typed parameter struct for the feature
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

impl Serialize for ResolvedParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.options.iter().map(|(name, resolved)| (name, &resolved.value)))
    }
}

/// Rewrite aliases to their canonical option names.
/// Both spellings in the same source is an error.
fn canonicalize<V>(
    schema: &FeatureSchema,
    mut entries: BTreeMap<String, V>,
) -> Result<BTreeMap<String, V>, ConfigError> {
    for (alias, option) in schema.aliases() {
        if let Some(value) = entries.remove(alias) {
            if entries.contains_key(option) {
                return Err(ConfigError::AliasConflict {
                    feature: schema.name().to_string(),
                    alias: alias.to_string(),
                    option: option.to_string(),
                });
            }
            entries.insert(option.to_string(), value);
        }
    }
    Ok(entries)
}

/// Resolves feature options against a borrowed config store
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    store: &'a ConfigStore,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(store: &'a ConfigStore) -> Self {
        Self { store }
    }

    /// Resolve using the built-in schema registered for `feature`
    pub fn resolve_builtin(
        &self,
        feature: &str,
        call_site_args: &CallArgs,
    ) -> Result<ResolvedParameters, ConfigError> {
        let schema =
            schema::builtin(feature).ok_or_else(|| ConfigError::UnknownFeature(feature.to_string()))?;
        self.resolve(&schema, call_site_args)
    }

    pub fn resolve(
        &self,
        schema: &FeatureSchema,
        call_site_args: &CallArgs,
    ) -> Result<ResolvedParameters, ConfigError> {
        let feature = schema.name();
        let call_site = canonicalize(schema, call_site_args.args.clone())?;

        if let Some((name, arg)) = call_site.iter().find(|(name, _)| schema.get(name).is_none()) {
            let value = match arg {
                ArgValue::Value(value) => value.clone(),
                ArgValue::UseDefault => Value::Null,
            };
            return Err(ConfigError::invalid_option(feature, name, &value, "unknown option"));
        }

        let file_options: BTreeMap<String, Value> = self
            .store
            .document()
            .feature_options(feature)
            .map(|options| options.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let file_options = canonicalize(schema, file_options)?;

        for name in file_options.keys().filter(|name| schema.get(name).is_none()) {
            debug!(feature = %feature, option = %name, "Ignoring config file option not in schema");
        }

        let mut options = BTreeMap::new();
        for spec in schema.options() {
            let (value, source) = match call_site.get(&spec.name) {
                Some(ArgValue::Value(value)) => (value.clone(), Source::CallSite),
                Some(ArgValue::UseDefault) => (spec.default.clone(), Source::Default),
                None => match file_options.get(&spec.name) {
                    Some(value) => (value.clone(), Source::ConfigFile),
                    None => (spec.default.clone(), Source::Default),
                },
            };

            spec.kind
                .check(&value)
                .map_err(|reason| ConfigError::invalid_option(feature, &spec.name, &value, reason))?;

            options.insert(spec.name.clone(), ResolvedOption { value, source });
        }

        debug!(feature = %feature, options = options.len(), "Resolved feature parameters");
        Ok(ResolvedParameters {
            feature: feature.to_string(),
            options,
        })
    }
}
