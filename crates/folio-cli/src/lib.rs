//! folio-build - build documentation from a source directory.
//!
//! This crate turns one command-line invocation into one build attempt and
//! the attempt's outcome into an exit code. The build itself is done by a
//! [`BuilderFactory`] from `folio-engine`.
//!
//! # Architecture
//!
//! - [`dispatch`] - picks plain build, make mode or bug report
//! - [`cli`] - clap definition of the plain build arguments
//! - [`config`] - resolution of arguments into a [`BuildRequest`](config::BuildRequest)
//! - [`streams`] - status, warning and error channels, warning-file tee
//! - [`invoker`] - runs the builder and classifies the outcome
//! - [`error`] - usage errors, build failures and the failure report
//! - [`logger`] / [`ui`] - tracing setup and terminal colours
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_engine::Interrupt;
//!
//! let argv = vec!["docs".to_string(), "_build".to_string()];
//! let code = folio_cli::main(&argv, &Interrupt::new());
//! std::process::exit(i32::from(code));
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod invoker;
pub mod logger;
pub mod streams;
pub mod ui;

use folio_apidoc::ApidocExtension;
use folio_engine::{BuilderFactory, Engine, Interrupt};

// Re-export commonly used types
pub use error::{CliError, Failure, Result};
pub use invoker::ExitOutcome;

/// The engine with every bundled extension registered.
pub fn default_engine() -> Engine {
    Engine::new().with_extension(folio_apidoc::EXTENSION_NAME, ApidocExtension::new().into_setup())
}

/// Run one invocation against [`default_engine`].
pub fn main(argv: &[String], interrupt: &Interrupt) -> u8 {
    run_with(argv, &default_engine(), interrupt)
}

/// Run one invocation against `factory`.
pub fn run_with(argv: &[String], factory: &dyn BuilderFactory, interrupt: &Interrupt) -> u8 {
    invoker::install_panic_hook();
    dispatch::run(argv, factory, interrupt)
}
