//! Error types for the folio-build command line.
//!
//! Two families of failure exist:
//!
//! - [`CliError`]: problems with the invocation itself (malformed `-D`,
//!   contradictory flags, an unopenable warning file). These are reported
//!   through clap's usage error path before any build is attempted.
//! - [`Failure`]: anything that goes wrong while a builder is constructed
//!   or running. These are rendered by the [`ExceptionReporter`] and always
//!   end the process with exit code 2.

mod report;

use std::path::PathBuf;

use folio_engine::EngineError;
use thiserror::Error;

pub use report::{ExceptionReporter, FailureReport, ISSUE_TRACKER};

/// Invocation errors detected before any build resources exist.
#[derive(Debug, Error)]
pub enum CliError {
    /// `-D` token without `=`
    #[error("-D option argument must be in the form name=value")]
    Define(String),

    /// `-A` token without exactly one `=`
    #[error("-A option argument must be in the form name=value")]
    HtmlDefine(String),

    /// `-a` given together with explicit file names
    #[error("cannot combine -a option and filenames")]
    WriteAllWithFilenames,

    /// `--jobs` is neither `auto` nor a positive integer
    #[error("job number should be a positive number")]
    Jobs(String),

    /// The warning file could not be created
    #[error("cannot open warning file '{}': {source}", .path.display())]
    WarningFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Why a build attempt ended early.
#[derive(Debug)]
pub enum Failure {
    /// The engine returned an error.
    Error(EngineError),
    /// The builder panicked.
    Panic {
        message: String,
        location: Option<String>,
        backtrace: Option<String>,
    },
    /// The user pressed Ctrl-C.
    Interrupted,
}

impl Failure {
    /// Classify an engine error. Interrupts get their own variant.
    pub fn from_engine(err: EngineError) -> Self {
        match err {
            EngineError::Interrupted => Failure::Interrupted,
            other => Failure::Error(other),
        }
    }

    /// One-line description used in condensed reports.
    pub fn summary(&self) -> String {
        match self {
            Failure::Error(err) => {
                let mut line = err.to_string();
                let mut source = std::error::Error::source(err);
                while let Some(cause) = source {
                    line.push_str(": ");
                    line.push_str(&cause.to_string());
                    source = cause.source();
                }
                line
            }
            Failure::Panic {
                message,
                location: Some(location),
                ..
            } => format!("panicked at {location}: {message}"),
            Failure::Panic { message, .. } => format!("panicked: {message}"),
            Failure::Interrupted => "interrupted by user".to_string(),
        }
    }
}
