//! The builder capability consumed by the command line.
//!
//! A [`BuilderFactory`] turns [`BuildParams`] into a [`Builder`]; the
//! builder then runs exactly one build. Both steps may fail with an
//! [`EngineError`](crate::EngineError).

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use crate::app::Extension;
use crate::config::ConfigValue;
use crate::error::{EngineError, Result};
use crate::stream::SharedStream;

/// Status reported by a successful build.
///
/// `0` means no problems, `1` means the engine reported problems that were
/// not fatal (for example warnings while warnings are treated as errors).
pub type StatusCode = u8;

/// Cooperative cancellation flag shared between the signal watcher and
/// the running builder.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Builders notice it at their next check.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`EngineError::Interrupted`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(EngineError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Everything a builder needs to know about one build request.
#[derive(Clone)]
pub struct BuildParams {
    pub source_dir: PathBuf,
    /// `None` runs without a configuration file (overrides only).
    pub conf_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub doctree_dir: PathBuf,
    pub builder_name: String,
    pub overrides: IndexMap<String, ConfigValue>,
    /// `None` silences status output.
    pub status: Option<SharedStream>,
    /// `None` silences warnings.
    pub warning: Option<SharedStream>,
    pub fresh_env: bool,
    pub warning_is_error: bool,
    pub tags: Vec<String>,
    pub verbosity: u8,
    pub parallel: NonZeroUsize,
    pub keep_going: bool,
    pub pdb: bool,
    pub exception_on_warning: bool,
    pub interrupt: Interrupt,
}

impl BuildParams {
    /// Parameters with every option at its default.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        doctree_dir: impl Into<PathBuf>,
        builder_name: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            conf_dir: None,
            output_dir: output_dir.into(),
            doctree_dir: doctree_dir.into(),
            builder_name: builder_name.into(),
            overrides: IndexMap::new(),
            status: None,
            warning: None,
            fresh_env: false,
            warning_is_error: false,
            tags: Vec::new(),
            verbosity: 0,
            parallel: NonZeroUsize::MIN,
            keep_going: false,
            pdb: false,
            exception_on_warning: false,
            interrupt: Interrupt::new(),
        }
    }
}

impl std::fmt::Debug for BuildParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildParams")
            .field("source_dir", &self.source_dir)
            .field("conf_dir", &self.conf_dir)
            .field("output_dir", &self.output_dir)
            .field("doctree_dir", &self.doctree_dir)
            .field("builder_name", &self.builder_name)
            .field("overrides", &self.overrides)
            .field("status", &self.status.is_some())
            .field("warning", &self.warning.is_some())
            .field("fresh_env", &self.fresh_env)
            .field("warning_is_error", &self.warning_is_error)
            .field("tags", &self.tags)
            .field("verbosity", &self.verbosity)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

/// A constructed builder, ready to run.
pub trait Builder {
    /// Run the build. `filenames` is ignored when `force_all` is set.
    fn build(&mut self, force_all: bool, filenames: &[PathBuf]) -> Result<StatusCode>;

    /// The most recent status and warning lines, oldest first.
    fn message_log(&self) -> Vec<String>;

    /// Extensions loaded by this builder, in load order.
    fn extensions(&self) -> Vec<Extension>;
}

/// Creates builders. Construction may fail before any builder exists.
pub trait BuilderFactory {
    fn construct(&self, params: BuildParams) -> Result<Box<dyn Builder>>;
}
