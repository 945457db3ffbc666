//! The application object shared by the engine and its extensions.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::builder::{BuildParams, Interrupt};
use crate::config::{Config, ConfigValue, Rebuild, ValueKind};
use crate::error::{EngineError, Result};
use crate::events::{Event, EventManager, Listener, ListenerId};
use crate::stream::SharedStream;

/// Number of status and warning lines kept for crash reports.
pub const MESSAGE_LOG_CAPACITY: usize = 10;

/// Priority used by [`Application::connect`].
pub const DEFAULT_PRIORITY: i32 = 500;

/// What an extension reports about itself after setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub version: String,
    pub parallel_read_safe: bool,
    pub parallel_write_safe: bool,
}

impl Default for ExtensionMetadata {
    fn default() -> Self {
        Self {
            version: "unknown version".to_string(),
            parallel_read_safe: false,
            parallel_write_safe: true,
        }
    }
}

/// A loaded extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub metadata: ExtensionMetadata,
}

/// Setup entry point of an extension.
pub type ExtensionSetup = Arc<dyn Fn(&mut Application) -> Result<ExtensionMetadata> + Send + Sync>;

/// Extensions that can be named in the `extensions` setting.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    setups: IndexMap<String, ExtensionSetup>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a setup function. A later registration under the same
    /// name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, setup: ExtensionSetup) {
        self.setups.insert(name.into(), setup);
    }

    pub fn get(&self, name: &str) -> Option<ExtensionSetup> {
        self.setups.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.setups.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.setups.keys()).finish()
    }
}

/// State of one build: directories, configuration, events and extensions.
pub struct Application {
    pub srcdir: PathBuf,
    pub confdir: Option<PathBuf>,
    pub outdir: PathBuf,
    pub doctreedir: PathBuf,
    pub builder_name: String,
    pub config: Config,
    pub tags: Vec<String>,
    pub verbosity: u8,
    pub fresh_env: bool,
    pub warning_is_error: bool,
    pub exception_on_warning: bool,
    pub parallel: NonZeroUsize,
    events: EventManager,
    extensions: IndexMap<String, Extension>,
    registry: ExtensionRegistry,
    status: Option<SharedStream>,
    warning: Option<SharedStream>,
    message_log: VecDeque<String>,
    warning_count: usize,
    interrupt: Interrupt,
}

impl Application {
    pub fn new(params: &BuildParams, config: Config, registry: ExtensionRegistry) -> Self {
        Self {
            srcdir: params.source_dir.clone(),
            confdir: params.conf_dir.clone(),
            outdir: params.output_dir.clone(),
            doctreedir: params.doctree_dir.clone(),
            builder_name: params.builder_name.clone(),
            config,
            tags: params.tags.clone(),
            verbosity: params.verbosity,
            fresh_env: params.fresh_env,
            warning_is_error: params.warning_is_error,
            exception_on_warning: params.exception_on_warning,
            parallel: params.parallel,
            events: EventManager::new(),
            extensions: IndexMap::new(),
            registry,
            status: params.status.clone(),
            warning: params.warning.clone(),
            message_log: VecDeque::with_capacity(MESSAGE_LOG_CAPACITY),
            warning_count: 0,
            interrupt: params.interrupt.clone(),
        }
    }

    /// Write a status line.
    pub fn info(&mut self, message: &str) {
        self.remember(message);
        if let Some(stream) = &self.status {
            if let Err(err) = stream.write_line(message) {
                warn!(error = %err, "failed to write status line");
            }
        }
    }

    /// Write a status line only at verbosity `level` or above.
    pub fn verbose(&mut self, level: u8, message: &str) {
        if self.verbosity >= level {
            self.info(message);
        }
    }

    /// Report a warning.
    ///
    /// Fails with [`EngineError::WarningAsError`] when warnings are raised
    /// as errors.
    pub fn warn(&mut self, message: &str) -> Result<()> {
        let line = format!("WARNING: {message}");
        self.remember(&line);
        self.warning_count += 1;
        if let Some(stream) = &self.warning {
            let styled = console::style(&line).red().to_string();
            if let Err(err) = stream.write_line(&styled) {
                warn!(error = %err, "failed to write warning line");
            }
        }
        if self.exception_on_warning {
            return Err(EngineError::WarningAsError(message.to_string()));
        }
        Ok(())
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// The last [`MESSAGE_LOG_CAPACITY`] lines, oldest first.
    pub fn message_log(&self) -> Vec<String> {
        self.message_log.iter().cloned().collect()
    }

    fn remember(&mut self, line: &str) {
        if self.message_log.len() == MESSAGE_LOG_CAPACITY {
            self.message_log.pop_front();
        }
        self.message_log.push_back(line.to_string());
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Load a registered extension. Loading the same name twice is a no-op.
    pub fn setup_extension(&mut self, name: &str) -> Result<()> {
        if self.extensions.contains_key(name) {
            return Ok(());
        }
        let setup = self.registry.get(name).ok_or_else(|| EngineError::Extension {
            name: name.to_string(),
            message: format!("no extension named '{name}' is registered"),
        })?;

        debug!(extension = name, "setting up extension");
        let metadata = setup(self).map_err(|err| match err {
            EngineError::Extension { .. } | EngineError::WarningAsError(_) | EngineError::Interrupted => err,
            other => EngineError::Extension {
                name: name.to_string(),
                message: other.to_string(),
            },
        })?;
        self.extensions.insert(
            name.to_string(),
            Extension {
                name: name.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    /// Loaded extensions in load order.
    pub fn extensions(&self) -> Vec<Extension> {
        self.extensions.values().cloned().collect()
    }

    /// Declare a configuration value, reporting resolution problems as
    /// warnings.
    pub fn add_config_value(
        &mut self,
        name: &str,
        default: ConfigValue,
        rebuild: Rebuild,
        kinds: &[ValueKind],
    ) -> Result<()> {
        for message in self.config.declare(name, default, rebuild, kinds)? {
            self.warn(&message)?;
        }
        Ok(())
    }

    pub fn connect(&mut self, event: Event, listener: Listener) -> ListenerId {
        self.events.connect(event, DEFAULT_PRIORITY, listener)
    }

    pub fn connect_with_priority(&mut self, event: Event, priority: i32, listener: Listener) -> ListenerId {
        self.events.connect(event, priority, listener)
    }

    pub fn disconnect(&mut self, id: ListenerId) {
        self.events.disconnect(id);
    }

    /// Call every listener of `event`.
    ///
    /// Engine errors from listeners pass through unchanged; I/O failures
    /// are wrapped in [`EngineError::Handler`].
    pub fn emit(&mut self, event: Event) -> Result<()> {
        for listener in self.events.listeners(event) {
            self.interrupt.check()?;
            listener(self).map_err(|err| match err {
                EngineError::Io { .. } => EngineError::Handler {
                    event: event.name(),
                    source: Box::new(err),
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("srcdir", &self.srcdir)
            .field("outdir", &self.outdir)
            .field("builder_name", &self.builder_name)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("warning_count", &self.warning_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    fn app_with(params: BuildParams) -> Application {
        Application::new(&params, Config::default(), ExtensionRegistry::new())
    }

    fn params() -> BuildParams {
        BuildParams::new("src", "out", "out/.doctrees", "dummy")
    }

    #[test]
    fn test_warn_writes_and_counts() {
        let warnings = MemoryStream::new();
        let mut params = params();
        params.warning = Some(warnings.clone());
        let mut app = app_with(params);

        app.warn("something odd").unwrap();

        assert_eq!(app.warning_count(), 1);
        let lines = warnings.lines();
        assert_eq!(lines.len(), 1);
        assert!(console::strip_ansi_codes(&lines[0]).contains("WARNING: something odd"));
    }

    #[test]
    fn test_warn_raises_when_escalated() {
        let mut params = params();
        params.exception_on_warning = true;
        let mut app = app_with(params);

        let err = app.warn("boom").unwrap_err();
        assert!(matches!(err, EngineError::WarningAsError(ref m) if m == "boom"));
    }

    #[test]
    fn test_message_log_keeps_last_lines() {
        let mut app = app_with(params());
        for i in 0..15 {
            app.info(&format!("line {i}"));
        }
        let log = app.message_log();
        assert_eq!(log.len(), MESSAGE_LOG_CAPACITY);
        assert_eq!(log.first().map(String::as_str), Some("line 5"));
        assert_eq!(log.last().map(String::as_str), Some("line 14"));
    }

    #[test]
    fn test_silenced_status_still_logs() {
        let mut app = app_with(params());
        app.info("quiet");
        assert_eq!(app.message_log(), vec!["quiet"]);
    }

    #[test]
    fn test_unknown_extension() {
        let mut app = app_with(params());
        let err = app.setup_extension("nope").unwrap_err();
        assert!(matches!(err, EngineError::Extension { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_extension_setup_runs_once() {
        let mut registry = ExtensionRegistry::new();
        registry.register(
            "demo",
            Arc::new(|app: &mut Application| {
                app.add_config_value("demo_flag", false.into(), Rebuild::Env, &[])?;
                Ok(ExtensionMetadata {
                    version: "1.0".to_string(),
                    ..ExtensionMetadata::default()
                })
            }),
        );
        let mut app = Application::new(&params(), Config::default(), registry);

        app.setup_extension("demo").unwrap();
        app.setup_extension("demo").unwrap();

        let loaded = app.extensions();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].metadata.version, "1.0");
        assert_eq!(app.config.get("demo_flag"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn test_emit_wraps_io_errors() {
        let mut app = app_with(params());
        app.connect(
            Event::BuilderInited,
            Arc::new(|_: &mut Application| {
                Err(EngineError::io(
                    "cannot write",
                    std::io::Error::other("disk full"),
                ))
            }),
        );

        let err = app.emit(Event::BuilderInited).unwrap_err();
        assert!(matches!(err, EngineError::Handler { event: "builder-inited", .. }));
    }

    #[test]
    fn test_emit_stops_when_interrupted() {
        let params = params();
        params.interrupt.trigger();
        let mut app = app_with(params);
        app.connect(Event::BuildFinished, Arc::new(|_: &mut Application| Ok(())));

        assert!(matches!(
            app.emit(Event::BuildFinished),
            Err(EngineError::Interrupted)
        ));
    }
}
