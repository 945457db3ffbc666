//! API stub generation hook for folio.
//!
//! Loading the extension declares the `apidoc_*` configuration values and
//! connects [`run_apidoc`] to `builder-inited`, so stub pages exist before
//! the first document is read. Generating the stubs is delegated to a
//! [`StubGenerator`].

pub mod options;

use std::sync::Arc;

use folio_engine::{
    Application, ConfigValue, Event, ExtensionMetadata, ExtensionSetup, Rebuild, Result,
    ValueKind,
};
use tracing::debug;

pub use options::{ApidocDefaults, ApidocOptions, parse_module_options};

/// Name used in the `extensions` setting.
pub const EXTENSION_NAME: &str = "folio.ext.apidoc";

/// Extension version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options every automodule directive gets unless configured otherwise.
pub const DEFAULT_AUTOMODULE_OPTIONS: [&str; 3] = ["members", "undoc-members", "show-inheritance"];

/// Writes stub pages for one validated `apidoc_modules` entry.
pub trait StubGenerator: Send + Sync {
    fn generate(&self, app: &mut Application, options: &ApidocOptions) -> Result<()>;
}

/// The extension, optionally carrying a generator.
#[derive(Clone, Default)]
pub struct ApidocExtension {
    generator: Option<Arc<dyn StubGenerator>>,
}

impl ApidocExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(generator: Arc<dyn StubGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Declare the configuration schema and connect the build hook.
    pub fn setup(&self, app: &mut Application) -> Result<ExtensionMetadata> {
        let list = &[ValueKind::List];
        let flag = &[ValueKind::Bool];

        app.add_config_value("apidoc_exclude_patterns", ConfigValue::List(Vec::new()), Rebuild::Env, list)?;
        app.add_config_value("apidoc_max_depth", 4.into(), Rebuild::Env, &[ValueKind::Int])?;
        for name in [
            "apidoc_follow_links",
            "apidoc_separate_modules",
            "apidoc_include_private",
            "apidoc_no_headings",
            "apidoc_module_first",
            "apidoc_implicit_namespaces",
        ] {
            app.add_config_value(name, false.into(), Rebuild::Env, flag)?;
        }
        app.add_config_value(
            "apidoc_automodule_options",
            ConfigValue::str_list(DEFAULT_AUTOMODULE_OPTIONS),
            Rebuild::Env,
            list,
        )?;
        app.add_config_value("apidoc_modules", ConfigValue::List(Vec::new()), Rebuild::Env, list)?;

        let generator = self.generator.clone();
        app.connect(
            Event::BuilderInited,
            Arc::new(move |app: &mut Application| run_apidoc(app, generator.as_deref())),
        );

        Ok(ExtensionMetadata {
            version: VERSION.to_string(),
            parallel_read_safe: true,
            parallel_write_safe: true,
        })
    }

    /// The setup as a registrable entry point.
    pub fn into_setup(self) -> ExtensionSetup {
        Arc::new(move |app: &mut Application| self.setup(app))
    }
}

impl std::fmt::Debug for ApidocExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApidocExtension")
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// Validate `apidoc_modules` and hand each valid entry to `generator`.
///
/// Rejected entries are reported as warnings and skipped. Without a
/// generator the resolved entries are only reported.
pub fn run_apidoc(app: &mut Application, generator: Option<&dyn StubGenerator>) -> Result<()> {
    let modules = app
        .config
        .get("apidoc_modules")
        .and_then(ConfigValue::as_list)
        .map(<[ConfigValue]>::to_vec)
        .unwrap_or_default();
    if modules.is_empty() {
        debug!("no apidoc_modules configured");
        return Ok(());
    }

    let defaults = ApidocDefaults::from_config(&app.config);
    let confdir = app.confdir.clone().unwrap_or_else(|| app.srcdir.clone());
    let srcdir = app.srcdir.clone();

    for (index, entry) in modules.iter().enumerate() {
        let mut warnings = Vec::new();
        let parsed = parse_module_options(index, entry, &defaults, &confdir, &srcdir, &mut warnings);
        for warning in warnings {
            app.warn(&format!("{warning} [apidoc]"))?;
        }
        let Some(options) = parsed else {
            continue;
        };

        match generator {
            Some(generator) => generator.generate(app, &options)?,
            None => app.info(&format!(
                "apidoc: {} -> {}",
                options.module_path.display(),
                options.dest_dir.display()
            )),
        }
    }
    Ok(())
}
