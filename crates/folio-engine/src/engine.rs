//! Reference engine: builder selection, configuration and the read loop.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info_span};

use crate::VERSION;
use crate::app::{Application, Extension, ExtensionRegistry, ExtensionSetup};
use crate::builder::{BuildParams, Builder, BuilderFactory, StatusCode};
use crate::config::{ConfigValue, Rebuild, ValueKind};
use crate::environment::{BuildEnvironment, Source, collect_sources};
use crate::error::{EngineError, Result};
use crate::events::Event;
use crate::scope;

/// Builders this engine knows about.
pub const BUILDERS: &[&str] = &["dummy", "html"];

/// What a builder does with each document it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    /// Read only.
    Nothing,
    /// One page per document under the output directory.
    Pages,
}

impl Output {
    fn for_builder(name: &str) -> Option<Self> {
        match name {
            "dummy" => Some(Output::Nothing),
            "html" => Some(Output::Pages),
            _ => None,
        }
    }
}

/// Builder factory backed by an extension registry.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    registry: ExtensionRegistry,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an extension available to the `extensions` setting.
    pub fn with_extension(mut self, name: &str, setup: ExtensionSetup) -> Self {
        self.registry.register(name, setup);
        self
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }
}

impl BuilderFactory for Engine {
    fn construct(&self, params: BuildParams) -> Result<Box<dyn Builder>> {
        Ok(Box::new(AppBuilder::new(params, self.registry.clone())?))
    }
}

/// Declare the settings every build understands.
fn declare_builtins(app: &mut Application) -> Result<()> {
    app.add_config_value("project", "Project name not set".into(), Rebuild::Env, &[])?;
    app.add_config_value(
        "extensions",
        ConfigValue::List(Vec::new()),
        Rebuild::Nothing,
        &[],
    )?;
    app.add_config_value(
        "source_suffix",
        ConfigValue::str_list([".rst", ".md"]),
        Rebuild::Env,
        &[ValueKind::List],
    )?;
    app.add_config_value(
        "exclude_patterns",
        ConfigValue::List(Vec::new()),
        Rebuild::Env,
        &[],
    )?;
    app.add_config_value("nitpicky", false.into(), Rebuild::Nothing, &[])?;
    app.add_config_value(
        "html_context",
        ConfigValue::Table(IndexMap::new()),
        Rebuild::Html,
        &[],
    )?;

    for directive in ["toctree", "include", "code-block"] {
        scope::register_directive(directive);
    }
    for role in ["doc", "ref"] {
        scope::register_role(role);
    }
    Ok(())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// The application wrapped as a [`Builder`].
#[derive(Debug)]
pub struct AppBuilder {
    app: Application,
    output: Output,
}

impl AppBuilder {
    pub fn new(params: BuildParams, registry: ExtensionRegistry) -> Result<Self> {
        let _span = info_span!("construct", builder = %params.builder_name).entered();

        if !params.source_dir.is_dir() {
            return Err(EngineError::SourceDirNotFound(params.source_dir));
        }
        if same_dir(&params.source_dir, &params.output_dir) {
            return Err(EngineError::OutputIsSource);
        }
        if params.keep_going {
            debug!("keep-going requested; builds always stop at the first error");
        }

        let config = crate::config::Config::read(params.conf_dir.as_deref(), params.overrides.clone())?;
        let mut app = Application::new(&params, config, registry);
        app.info(&format!("Running folio v{VERSION}"));
        if let Some(settings) = scope::settings_file() {
            app.verbose(1, &format!("reader settings: {}", settings.display()));
        }

        declare_builtins(&mut app)?;
        for name in app.config.get_str_list("extensions") {
            app.setup_extension(&name)?;
        }
        for name in app.config.unknown_overrides() {
            app.warn(&format!("unknown config value '{name}' in override, ignoring"))?;
        }
        app.emit(Event::ConfigInited)?;

        let Some(output) = Output::for_builder(&app.builder_name) else {
            return Err(EngineError::BuilderNotFound {
                name: app.builder_name.clone(),
                available: BUILDERS.join(", "),
            });
        };

        if !app.outdir.is_dir() {
            fs::create_dir_all(&app.outdir).map_err(|e| {
                EngineError::io(format!("failed to create {}", app.outdir.display()), e)
            })?;
            app.info("making output directory... done");
        }

        app.emit(Event::BuilderInited)?;
        Ok(Self { app, output })
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    /// Map command-line file names to source documents, warning about
    /// the ones that cannot be used.
    fn named_sources(&mut self, filenames: &[PathBuf], sources: &[Source]) -> Result<Vec<Source>> {
        let srcdir = std::path::absolute(&self.app.srcdir)
            .map_err(|e| EngineError::io("failed to resolve source directory", e))?;
        let mut selected: Vec<Source> = Vec::new();

        for filename in filenames {
            let path = std::path::absolute(filename)
                .map_err(|e| EngineError::io(format!("failed to resolve {}", filename.display()), e))?;
            let shown = filename.display();
            if !path.starts_with(&srcdir) {
                self.app.warn(&format!(
                    "file '{shown}' given on command line is not under the source directory, ignoring"
                ))?;
                continue;
            }
            if !path.exists() {
                self.app.warn(&format!(
                    "file '{shown}' given on command line does not exist, ignoring"
                ))?;
                continue;
            }
            let found = sources.iter().find(|s| {
                std::path::absolute(&s.path).is_ok_and(|p| p == path)
            });
            match found {
                Some(source) if !selected.contains(source) => selected.push(source.clone()),
                Some(_) => {}
                None => self.app.warn(&format!(
                    "file '{shown}' given on command line is not a valid document, ignoring"
                ))?,
            }
        }
        Ok(selected)
    }

    fn run(&mut self, force_all: bool, filenames: &[PathBuf]) -> Result<StatusCode> {
        let suffixes = self.app.config.get_str_list("source_suffix");
        let excludes = self.app.config.get_str_list("exclude_patterns");
        let skip = [self.app.outdir.as_path(), self.app.doctreedir.as_path()];
        let sources = collect_sources(&self.app.srcdir, &suffixes, &excludes, &skip)?;

        let fingerprint = self.app.config.env_fingerprint();
        let previous = if self.app.fresh_env {
            None
        } else {
            BuildEnvironment::load(&self.app.doctreedir)?
        };
        let (mut env, reset) = match previous {
            Some(env) if env.config == fingerprint => (env, None),
            Some(_) => (BuildEnvironment::new(fingerprint), Some("[config changed] ")),
            None => (BuildEnvironment::new(fingerprint), Some("[new config] ")),
        };
        for docname in env.removed(&sources) {
            env.forget(&docname);
        }

        let (to_read, summary) = if force_all || reset.is_some() {
            (sources.clone(), "all source files".to_string())
        } else if !filenames.is_empty() {
            let named = self.named_sources(filenames, &sources)?;
            let summary = format!("{} source files given on command line", named.len());
            (named, summary)
        } else {
            let outdated: Vec<Source> = env.outdated(&sources).into_iter().cloned().collect();
            let summary = format!(
                "targets for {} source files that are out of date",
                outdated.len()
            );
            (outdated, summary)
        };

        self.app.info(&format!(
            "{}building [{}]: {summary}",
            reset.unwrap_or_default(),
            self.app.builder_name
        ));
        self.app.emit(Event::EnvBeforeRead)?;

        let total = to_read.len();
        for (index, source) in to_read.iter().enumerate() {
            self.app.interrupt().check()?;
            let percent = (index + 1) * 100 / total;
            self.app.info(&format!("reading sources... [{percent:>3}%] {}", source.docname));
            let content = fs::read_to_string(&source.path).map_err(|e| {
                EngineError::io(format!("failed to read {}", source.path.display()), e)
            })?;
            self.app.emit(Event::SourceRead)?;
            if self.output == Output::Pages {
                self.write_page(&source.docname, &content)?;
            }
            env.record(source);
        }

        env.save(&self.app.doctreedir)?;
        self.app.emit(Event::BuildFinished)?;
        Ok(self.finish())
    }

    fn write_page(&self, docname: &str, content: &str) -> Result<()> {
        let target = self.app.outdir.join(format!("{docname}.html"));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::io(format!("failed to create {}", parent.display()), e))?;
        }
        let project = self
            .app
            .config
            .get("project")
            .and_then(ConfigValue::as_str)
            .unwrap_or_default();
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{} - {}</title></head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(docname),
            escape_html(project),
            escape_html(content),
        );
        fs::write(&target, page)
            .map_err(|e| EngineError::io(format!("failed to write {}", target.display()), e))
    }

    fn finish(&mut self) -> StatusCode {
        let count = self.app.warning_count();
        let plural = if count == 1 { "" } else { "s" };
        let escalated = self.app.warning_is_error && count > 0;
        let message = match (count, escalated) {
            (0, _) => "build succeeded.".to_string(),
            (_, true) => format!(
                "build finished with problems, {count} warning{plural} (with warnings treated as errors)."
            ),
            (_, false) => format!("build succeeded, {count} warning{plural}."),
        };
        self.app.info(&message);
        StatusCode::from(escalated)
    }
}

impl Builder for AppBuilder {
    fn build(&mut self, force_all: bool, filenames: &[PathBuf]) -> Result<StatusCode> {
        let _span = info_span!("build", builder = %self.app.builder_name).entered();
        self.run(force_all, filenames)
    }

    fn message_log(&self) -> Vec<String> {
        self.app.message_log()
    }

    fn extensions(&self) -> Vec<Extension> {
        self.app.extensions()
    }
}
