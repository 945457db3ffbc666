use folio_engine::ConfigValue;
use indexmap::IndexMap;

use crate::error::{CliError, Result};

/// Prefix marking template-context overrides.
pub const HTML_CONTEXT_PREFIX: &str = "html_context.";

/// Build the configuration override map from `-D`, `-A` and `-n`.
///
/// `-D` values stay raw strings; the engine coerces them to the declared
/// kind. `-A` values become integers when they parse as one. Later
/// occurrences of a key replace earlier ones.
pub fn resolve_overrides(
    define: &[String],
    html_define: &[String],
    nitpicky: bool,
) -> Result<IndexMap<String, ConfigValue>> {
    let mut overrides = IndexMap::new();

    for token in define {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| CliError::Define(token.clone()))?;
        overrides.insert(key.to_string(), ConfigValue::Str(value.to_string()));
    }

    for token in html_define {
        let mut parts = token.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CliError::HtmlDefine(token.clone()));
        };
        let value = match value.trim().parse::<i64>() {
            Ok(number) => ConfigValue::Int(number),
            Err(_) => ConfigValue::Str(value.to_string()),
        };
        overrides.insert(format!("{HTML_CONTEXT_PREFIX}{key}"), value);
    }

    if nitpicky {
        overrides.insert("nitpicky".to_string(), ConfigValue::Bool(true));
    }

    Ok(overrides)
}
