//! Validation of `apidoc_modules` entries.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use folio_engine::{Config, ConfigValue};
use indexmap::IndexMap;

const KNOWN_KEYS: &[&str] = &[
    "path",
    "destination",
    "exclude_patterns",
    "automodule_options",
    "max_depth",
    "follow_links",
    "separate_modules",
    "include_private",
    "no_headings",
    "module_first",
    "implicit_namespaces",
];

/// Global `apidoc_*` settings, used for keys an entry leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApidocDefaults {
    pub exclude_patterns: Vec<String>,
    pub automodule_options: BTreeSet<String>,
    pub max_depth: i64,
    pub follow_links: bool,
    pub separate_modules: bool,
    pub include_private: bool,
    pub no_headings: bool,
    pub module_first: bool,
    pub implicit_namespaces: bool,
}

impl ApidocDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exclude_patterns: config.get_str_list("apidoc_exclude_patterns"),
            automodule_options: config
                .get_str_list("apidoc_automodule_options")
                .into_iter()
                .collect(),
            max_depth: config
                .get("apidoc_max_depth")
                .and_then(ConfigValue::as_int)
                .unwrap_or(4),
            follow_links: config.get_bool("apidoc_follow_links"),
            separate_modules: config.get_bool("apidoc_separate_modules"),
            include_private: config.get_bool("apidoc_include_private"),
            no_headings: config.get_bool("apidoc_no_headings"),
            module_first: config.get_bool("apidoc_module_first"),
            implicit_namespaces: config.get_bool("apidoc_implicit_namespaces"),
        }
    }
}

/// Fully resolved options for one module scan, as handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApidocOptions {
    pub dest_dir: PathBuf,
    pub module_path: PathBuf,
    /// Absolute glob patterns.
    pub exclude_patterns: Vec<String>,
    pub automodule_options: BTreeSet<String>,
    pub max_depth: i64,
    pub quiet: bool,
    pub follow_links: bool,
    pub separate_modules: bool,
    pub include_private: bool,
    pub no_headings: bool,
    pub module_first: bool,
    pub implicit_namespaces: bool,
}

/// Reads typed keys of one entry, recording a warning whenever a key has
/// the wrong kind and the default is used instead.
struct Item<'a> {
    index: usize,
    table: &'a IndexMap<String, ConfigValue>,
    warnings: &'a mut Vec<String>,
}

impl Item<'_> {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn path(&mut self, key: &str) -> Option<PathBuf> {
        let (index, table) = (self.index, self.table);
        match table.get(key) {
            None => {
                self.warn(format!("apidoc_modules item {index} must have a {key:?} key"));
                None
            }
            Some(ConfigValue::Str(value)) => Some(PathBuf::from(value)),
            Some(_) => {
                self.warn(format!("apidoc_modules item {index} {key:?} must be a string"));
                None
            }
        }
    }

    fn strings(&mut self, key: &str, default: Vec<String>) -> Vec<String> {
        let (index, table) = (self.index, self.table);
        let Some(value) = table.get(key) else {
            return default;
        };
        let Some(items) = value.as_list() else {
            self.warn(format!("apidoc_modules item {index} {key:?} must be a sequence"));
            return default;
        };
        match value.as_str_list() {
            Some(strings) => strings,
            None if items.is_empty() => Vec::new(),
            None => {
                self.warn(format!("apidoc_modules item {index} {key:?} must contain strings"));
                default
            }
        }
    }

    fn int(&mut self, key: &str, default: i64) -> i64 {
        let (index, table) = (self.index, self.table);
        match table.get(key) {
            None => default,
            Some(ConfigValue::Int(value)) => *value,
            Some(_) => {
                self.warn(format!("apidoc_modules item {index} {key:?} must be an int"));
                default
            }
        }
    }

    fn flag(&mut self, key: &str, default: bool) -> bool {
        let (index, table) = (self.index, self.table);
        match table.get(key) {
            None => default,
            Some(ConfigValue::Bool(value)) => *value,
            Some(_) => {
                self.warn(format!("apidoc_modules item {index} {key:?} must be a boolean"));
                default
            }
        }
    }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    std::path::absolute(&joined).unwrap_or(joined)
}

/// Validate entry `index` of `apidoc_modules`.
///
/// Problems are appended to `warnings`. Returns `None` when the entry has
/// to be skipped; bad optional keys fall back to `defaults` instead.
/// The destination directory is created when missing.
pub fn parse_module_options(
    index: usize,
    entry: &ConfigValue,
    defaults: &ApidocDefaults,
    confdir: &Path,
    srcdir: &Path,
    warnings: &mut Vec<String>,
) -> Option<ApidocOptions> {
    let Some(table) = entry.as_table() else {
        warnings.push(format!("apidoc_modules item {index} must be a table"));
        return None;
    };
    let mut item = Item {
        index,
        table,
        warnings,
    };

    let module_path = absolute(confdir, &item.path("path")?);
    if !module_path.is_dir() {
        item.warn(format!(
            "apidoc_modules item {index} \"path\" is not an existing folder: {}",
            module_path.display()
        ));
        return None;
    }

    let destination = item.path("destination")?;
    if destination.is_absolute() {
        item.warn(format!(
            "apidoc_modules item {index} \"destination\" should be a relative path"
        ));
        return None;
    }
    let dest_dir = absolute(srcdir, &destination);
    if let Err(err) = std::fs::create_dir_all(&dest_dir) {
        item.warn(format!(
            "apidoc_modules item {index} cannot create destination directory: {err}"
        ));
        return None;
    }

    let exclude_patterns = item
        .strings("exclude_patterns", defaults.exclude_patterns.clone())
        .into_iter()
        .map(|pattern| absolute(confdir, Path::new(&pattern)).to_string_lossy().into_owned())
        .collect();
    let automodule_options = item
        .strings(
            "automodule_options",
            defaults.automodule_options.iter().cloned().collect(),
        )
        .into_iter()
        .collect();

    let options = ApidocOptions {
        dest_dir,
        module_path,
        exclude_patterns,
        automodule_options,
        max_depth: item.int("max_depth", defaults.max_depth),
        quiet: true,
        follow_links: item.flag("follow_links", defaults.follow_links),
        separate_modules: item.flag("separate_modules", defaults.separate_modules),
        include_private: item.flag("include_private", defaults.include_private),
        no_headings: item.flag("no_headings", defaults.no_headings),
        module_first: item.flag("module_first", defaults.module_first),
        implicit_namespaces: item.flag("implicit_namespaces", defaults.implicit_namespaces),
    };

    let unexpected: Vec<&str> = table
        .keys()
        .map(String::as_str)
        .filter(|key| !KNOWN_KEYS.contains(key))
        .collect();
    if !unexpected.is_empty() {
        item.warn(format!(
            "apidoc_modules item {index} has unexpected keys: {}",
            unexpected.join(", ")
        ));
    }

    Some(options)
}
