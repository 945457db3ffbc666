//! Build engine for folio.
//!
//! The command line only depends on [`BuilderFactory`] and [`Builder`];
//! [`Engine`] is the in-tree implementation with its `dummy` and `html` builders,
//! configuration schema, event bus and extension registry.

pub mod app;
pub mod builder;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod events;
pub mod scope;
pub mod stream;

// Re-export main types
pub use app::{Application, Extension, ExtensionMetadata, ExtensionRegistry, ExtensionSetup};
pub use builder::{BuildParams, Builder, BuilderFactory, Interrupt, StatusCode};
pub use config::{Config, ConfigValue, Rebuild, ValueKind};
pub use engine::{AppBuilder, BUILDERS, Engine};
pub use error::{EngineError, Result};
pub use events::{Event, Listener};
pub use stream::{MemoryStream, MessageStream, SharedStream};

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
