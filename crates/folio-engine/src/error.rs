use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors raised while constructing or running a builder.
///
/// The command line classifies these when reporting a failed build:
/// [`EngineError::Interrupted`] and [`EngineError::WarningAsError`] get
/// their own treatment, variants with a [`category`](EngineError::category)
/// are "expected" engine errors, everything else is reported as an
/// unexpected exception.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// Invalid configuration value or configuration directory.
    #[error("{0}")]
    #[diagnostic(code(folio::config))]
    Config(String),

    /// The configuration file exists but could not be parsed.
    #[error("There is a syntax error in your configuration file: {}", .path.display())]
    #[diagnostic(
        code(folio::config::syntax),
        help("Check folio.toml syntax and value types")
    )]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },

    /// An extension could not be set up.
    #[error("Could not import extension {name} ({message})")]
    #[diagnostic(code(folio::extension))]
    Extension { name: String, message: String },

    /// An event listener failed.
    #[error("Handler for event '{event}' threw an exception")]
    #[diagnostic(code(folio::extension::handler))]
    Handler {
        event: &'static str,
        #[source]
        source: Box<EngineError>,
    },

    /// The requested builder is not known to the engine.
    #[error("Builder name {name} not registered (available builders: {available})")]
    #[diagnostic(code(folio::builder), help("Pick one of the registered builders with -b"))]
    BuilderNotFound { name: String, available: String },

    /// The source directory does not exist.
    #[error("Cannot find source directory ({})", .0.display())]
    #[diagnostic(code(folio::application))]
    SourceDirNotFound(PathBuf),

    /// Source and output directory point to the same place.
    #[error("Source directory and destination directory cannot be identical")]
    #[diagnostic(code(folio::application))]
    OutputIsSource,

    /// A warning was raised while warnings are escalated to errors.
    #[error("{0}")]
    #[diagnostic(code(folio::warning))]
    WarningAsError(String),

    /// The user interrupted the build.
    #[error("interrupted by user")]
    Interrupted,

    /// I/O failure with context.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Shorthand for an I/O error with a context message.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Human-readable category for errors the engine raises on purpose.
    ///
    /// `None` means the error is unexpected and deserves a full report.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) | Self::ConfigFile { .. } => Some("Configuration error"),
            Self::Extension { .. } | Self::Handler { .. } => Some("Extension error"),
            Self::BuilderNotFound { .. } | Self::SourceDirNotFound(_) | Self::OutputIsSource => {
                Some("Application error")
            }
            Self::WarningAsError(_) | Self::Interrupted | Self::Io { .. } => None,
        }
    }
}
