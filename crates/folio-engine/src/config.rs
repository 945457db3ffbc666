//! Configuration values, their declared schema, and command-line overrides.
//!
//! Values come from three places, weakest first: the declared default, the
//! `folio.toml` file in the configuration directory, and overrides passed on
//! the command line. A value only becomes visible once it is declared with
//! [`Config::declare`]; extensions declare their values during setup, so
//! file values and overrides are held back until then.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Toml};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Name of the configuration file looked up in the configuration directory.
pub const CONFIG_FILENAME: &str = "folio.toml";

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ConfigValue>),
    Table(IndexMap<String, ConfigValue>),
}

/// The kind of a [`ConfigValue`], used to declare accepted types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    List,
    Table,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::List => "list",
            ValueKind::Table => "table",
        };
        f.write_str(name)
    }
}

/// What has to be redone when a value changes between builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    /// The environment is invalidated and every document is read again.
    Env,
    /// Only output pages are written again.
    Html,
    /// Nothing depends on the value.
    Nothing,
}

impl ConfigValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::Str(_) => ValueKind::Str,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Table(_) => ValueKind::Table,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The list as strings, or `None` if this is not a list of strings.
    pub fn as_str_list(&self) -> Option<Vec<String>> {
        self.as_list()?
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect()
    }

    /// Build a list value from strings.
    pub fn str_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigValue::List(
            items
                .into_iter()
                .map(|s| ConfigValue::Str(s.into()))
                .collect(),
        )
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

/// Declared schema entry for one configuration value.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub default: ConfigValue,
    pub rebuild: Rebuild,
    pub kinds: BTreeSet<ValueKind>,
}

/// Loaded configuration plus its declared schema.
#[derive(Debug, Default)]
pub struct Config {
    path: Option<PathBuf>,
    raw: IndexMap<String, ConfigValue>,
    overrides: IndexMap<String, ConfigValue>,
    entries: IndexMap<String, ConfigEntry>,
    values: IndexMap<String, ConfigValue>,
}

impl Config {
    /// Load `folio.toml` from `conf_dir`, or start empty when `conf_dir`
    /// is `None`.
    pub fn read(
        conf_dir: Option<&Path>,
        overrides: IndexMap<String, ConfigValue>,
    ) -> Result<Self> {
        let Some(dir) = conf_dir else {
            debug!("no configuration directory, using overrides only");
            return Ok(Self::from_values(IndexMap::new(), overrides));
        };

        let path = dir.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Err(EngineError::Config(format!(
                "config directory doesn't contain a {CONFIG_FILENAME} file ({})",
                dir.display()
            )));
        }

        let raw: IndexMap<String, ConfigValue> = Figment::new()
            .merge(Toml::file(&path))
            .extract()
            .map_err(|e| EngineError::ConfigFile {
                path: path.clone(),
                source: Box::new(e),
            })?;
        debug!(path = %path.display(), values = raw.len(), "loaded configuration file");

        let mut config = Self::from_values(raw, overrides);
        config.path = Some(path);
        Ok(config)
    }

    /// Build a configuration from in-memory values.
    pub fn from_values(
        raw: IndexMap<String, ConfigValue>,
        overrides: IndexMap<String, ConfigValue>,
    ) -> Self {
        Self {
            raw,
            overrides,
            ..Self::default()
        }
    }

    /// Path of the loaded configuration file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Declare a value and resolve it against the file and the overrides.
    ///
    /// An empty `kinds` slice accepts only the kind of `default`. Returns
    /// the warnings produced while resolving; the declaration itself only
    /// fails when the name is already declared.
    pub fn declare(
        &mut self,
        name: &str,
        default: ConfigValue,
        rebuild: Rebuild,
        kinds: &[ValueKind],
    ) -> Result<Vec<String>> {
        if self.entries.contains_key(name) {
            return Err(EngineError::Config(format!(
                "Config value {name:?} already present"
            )));
        }

        let mut kinds: BTreeSet<ValueKind> = kinds.iter().copied().collect();
        if kinds.is_empty() {
            kinds.insert(default.kind());
        }

        let mut warnings = Vec::new();
        let mut value = match self.raw.get(name) {
            Some(found) if kinds.contains(&found.kind()) => found.clone(),
            Some(found) => {
                warnings.push(format!(
                    "The config value `{name}' has type `{}'; expected {}.",
                    found.kind(),
                    describe_kinds(&kinds)
                ));
                default.clone()
            }
            None => default.clone(),
        };

        if let Some(raw) = self.overrides.get(name) {
            match convert_override(name, raw, &default) {
                Ok(converted) => value = converted,
                Err(message) => warnings.push(message),
            }
        }

        if let ConfigValue::Table(table) = &mut value {
            let prefix = format!("{name}.");
            for (key, item) in &self.overrides {
                if let Some(sub_key) = key.strip_prefix(&prefix) {
                    table.insert(sub_key.to_string(), item.clone());
                }
            }
        }

        self.entries.insert(
            name.to_string(),
            ConfigEntry {
                default,
                rebuild,
                kinds,
            },
        );
        self.values.insert(name.to_string(), value);
        Ok(warnings)
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).and_then(ConfigValue::as_bool).unwrap_or(false)
    }

    pub fn get_str_list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .and_then(ConfigValue::as_str_list)
            .unwrap_or_default()
    }

    pub fn entry(&self, name: &str) -> Option<&ConfigEntry> {
        self.entries.get(name)
    }

    /// Raw file value for a name, whether or not it has been declared.
    pub fn raw(&self, name: &str) -> Option<&ConfigValue> {
        self.raw.get(name)
    }

    /// Stable fingerprint of every value declared with [`Rebuild::Env`].
    ///
    /// A change in the fingerprint invalidates a saved environment.
    pub fn env_fingerprint(&self) -> String {
        let mut values: Vec<(&String, &ConfigValue)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.rebuild == Rebuild::Env)
            .filter_map(|(name, _)| self.values.get(name).map(|value| (name, value)))
            .collect();
        values.sort_by(|a, b| a.0.cmp(b.0));
        serde_json::to_string(&values).unwrap_or_default()
    }

    /// Overrides that never matched a declared value.
    pub fn unknown_overrides(&self) -> Vec<String> {
        self.overrides
            .keys()
            .filter(|key| {
                let base = key.split_once('.').map_or(key.as_str(), |(base, _)| base);
                !self.entries.contains_key(base)
            })
            .cloned()
            .collect()
    }
}

fn describe_kinds(kinds: &BTreeSet<ValueKind>) -> String {
    let names: Vec<String> = kinds.iter().map(|k| format!("`{k}'")).collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} or {second}"),
        [rest @ .., last] => format!("{}, or {last}", rest.join(", ")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Coerce a command-line override to the kind of the declared default.
///
/// Only raw strings are coerced; typed overrides pass through unchanged.
fn convert_override(
    name: &str,
    value: &ConfigValue,
    default: &ConfigValue,
) -> std::result::Result<ConfigValue, String> {
    let ConfigValue::Str(raw) = value else {
        return Ok(value.clone());
    };

    match default {
        ConfigValue::Table(_) => Err(format!(
            "cannot override dictionary config setting {name:?}, ignoring value {raw:?}"
        )),
        ConfigValue::List(_) => Ok(ConfigValue::str_list(raw.split(','))),
        ConfigValue::Int(_) => raw
            .trim()
            .parse()
            .map(ConfigValue::Int)
            .map_err(|_| format!("invalid number {raw:?} for config value {name:?}, ignoring")),
        ConfigValue::Float(_) => raw
            .trim()
            .parse()
            .map(ConfigValue::Float)
            .map_err(|_| format!("invalid number {raw:?} for config value {name:?}, ignoring")),
        ConfigValue::Bool(_) => parse_bool(raw)
            .map(ConfigValue::Bool)
            .ok_or_else(|| format!("invalid boolean {raw:?} for config value {name:?}, ignoring")),
        ConfigValue::Str(_) => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn overrides(pairs: &[(&str, ConfigValue)]) -> IndexMap<String, ConfigValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_read_without_conf_dir_uses_overrides_only() {
        let mut config =
            Config::read(None, overrides(&[("project", "Foo".into())])).unwrap();
        assert!(config.path().is_none());

        let warnings = config
            .declare("project", "".into(), Rebuild::Env, &[])
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.get("project"), Some(&ConfigValue::from("Foo")));
    }

    #[test]
    fn test_read_missing_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = Config::read(Some(temp.path()), IndexMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.to_string().contains(CONFIG_FILENAME));
    }

    #[test]
    fn test_read_toml_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILENAME),
            r#"
project = "Demo"
extensions = ["folio.ext.apidoc"]
apidoc_max_depth = 2

[[apidoc_modules]]
path = "../src"
destination = "api"
"#,
        )
        .unwrap();

        let mut config = Config::read(Some(temp.path()), IndexMap::new()).unwrap();
        assert!(config.path().is_some());
        config
            .declare("apidoc_max_depth", 4.into(), Rebuild::Env, &[ValueKind::Int])
            .unwrap();
        assert_eq!(config.get("apidoc_max_depth"), Some(&ConfigValue::Int(2)));

        let modules = config.raw("apidoc_modules").and_then(ConfigValue::as_list);
        let first = modules.and_then(|m| m.first()).and_then(ConfigValue::as_table);
        assert_eq!(
            first.and_then(|t| t.get("destination")),
            Some(&ConfigValue::from("api"))
        );
    }

    #[test]
    fn test_wrong_kind_warns_and_keeps_default() {
        let raw = overrides(&[("apidoc_follow_links", ConfigValue::Int(3))]);
        let mut config = Config::from_values(raw, IndexMap::new());
        let warnings = config
            .declare(
                "apidoc_follow_links",
                false.into(),
                Rebuild::Env,
                &[ValueKind::Bool],
            )
            .unwrap();

        assert_eq!(
            warnings,
            vec!["The config value `apidoc_follow_links' has type `int'; expected `bool'."]
        );
        assert_eq!(config.get("apidoc_follow_links"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn test_overrides_are_coerced_to_default_kind() {
        let mut config = Config::from_values(
            IndexMap::new(),
            overrides(&[
                ("depth", "7".into()),
                ("flag", "yes".into()),
                ("patterns", "a,b".into()),
            ]),
        );
        config.declare("depth", 4.into(), Rebuild::Env, &[]).unwrap();
        config.declare("flag", false.into(), Rebuild::Env, &[]).unwrap();
        config
            .declare("patterns", ConfigValue::List(vec![]), Rebuild::Env, &[])
            .unwrap();

        assert_eq!(config.get("depth"), Some(&ConfigValue::Int(7)));
        assert!(config.get_bool("flag"));
        assert_eq!(config.get_str_list("patterns"), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_number_override_is_ignored() {
        let mut config =
            Config::from_values(IndexMap::new(), overrides(&[("depth", "deep".into())]));
        let warnings = config.declare("depth", 4.into(), Rebuild::Env, &[]).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("invalid number"));
        assert_eq!(config.get("depth"), Some(&ConfigValue::Int(4)));
    }

    #[test]
    fn test_dotted_overrides_fill_tables() {
        let mut config = Config::from_values(
            IndexMap::new(),
            overrides(&[
                ("html_context.x", ConfigValue::Int(42)),
                ("html_context", "flat".into()),
            ]),
        );
        let warnings = config
            .declare(
                "html_context",
                ConfigValue::Table(IndexMap::new()),
                Rebuild::Html,
                &[],
            )
            .unwrap();

        assert!(warnings[0].contains("cannot override dictionary config setting"));
        let table = config.get("html_context").and_then(ConfigValue::as_table).unwrap();
        assert_eq!(table.get("x"), Some(&ConfigValue::Int(42)));
    }

    #[test]
    fn test_duplicate_declaration_fails() {
        let mut config = Config::default();
        config.declare("a", 1.into(), Rebuild::Nothing, &[]).unwrap();
        assert!(config.declare("a", 2.into(), Rebuild::Nothing, &[]).is_err());
    }

    #[test]
    fn test_unknown_overrides() {
        let mut config = Config::from_values(
            IndexMap::new(),
            overrides(&[
                ("known", "1".into()),
                ("unknown", "1".into()),
                ("html_context.k", "v".into()),
            ]),
        );
        config.declare("known", 0.into(), Rebuild::Nothing, &[]).unwrap();
        assert_eq!(config.unknown_overrides(), vec!["unknown", "html_context.k"]);
    }

    #[test]
    fn test_env_fingerprint_tracks_env_values_only() {
        let mut first = Config::default();
        first.declare("a", 1.into(), Rebuild::Env, &[]).unwrap();
        first.declare("b", 1.into(), Rebuild::Html, &[]).unwrap();

        let mut second = Config::from_values(
            IndexMap::new(),
            overrides(&[("b", "2".into())]),
        );
        second.declare("a", 1.into(), Rebuild::Env, &[]).unwrap();
        second.declare("b", 1.into(), Rebuild::Html, &[]).unwrap();

        assert_eq!(first.env_fingerprint(), second.env_fingerprint());
    }

    #[test]
    fn test_describe_kinds() {
        let kinds: BTreeSet<_> = [ValueKind::List, ValueKind::Str].into_iter().collect();
        assert_eq!(describe_kinds(&kinds), "`str' or `list'");
    }
}
