//! Resolution of parsed arguments into an immutable [`BuildRequest`].

mod overrides;
mod tests;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use folio_engine::{BuildParams, ConfigValue, Interrupt};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::cli::{BuildArgs, host_cpu_count, resolve_jobs};
use crate::error::{CliError, Result};
use crate::streams::StreamSet;
use crate::ui::ColorMode;

pub use overrides::{HTML_CONTEXT_PREFIX, resolve_overrides};

/// Name of the doctree directory created inside the output directory.
pub const DOCTREE_DIRNAME: &str = ".doctrees";

/// Console and warning-file options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    pub quiet: bool,
    pub really_quiet: bool,
    pub warning_file: Option<PathBuf>,
    pub color: ColorMode,
}

/// Everything one build attempt needs, fixed before the build starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub doctree_dir: PathBuf,
    /// `None` runs without a configuration file.
    pub conf_dir: Option<PathBuf>,
    pub builder_name: String,
    pub filenames: Vec<PathBuf>,
    pub force_all: bool,
    pub fresh_env: bool,
    pub jobs: NonZeroUsize,
    pub tags: IndexSet<String>,
    pub overrides: IndexMap<String, ConfigValue>,
    pub warning_is_error: bool,
    /// Always `false`; see [`BuildRequest::resolve`].
    pub keep_going: bool,
    pub exception_on_warning: bool,
    pub verbosity: u8,
    pub pdb: bool,
    pub show_traceback: bool,
    pub output: OutputOptions,
}

impl BuildRequest {
    /// Resolve parsed arguments using the host's CPU count for `-j auto`.
    pub fn resolve(args: BuildArgs) -> Result<Self> {
        Self::resolve_with(args, host_cpu_count)
    }

    /// Resolve parsed arguments with an explicit CPU count source.
    ///
    /// `--keep-going` is accepted but not forwarded: builds always stop at
    /// the first error.
    pub fn resolve_with(args: BuildArgs, cpu_count: impl FnOnce() -> usize) -> Result<Self> {
        let conf_dir = if args.isolated {
            None
        } else {
            Some(args.conf_dir.unwrap_or_else(|| args.source_dir.clone()))
        };
        let doctree_dir = args
            .doctree_dir
            .unwrap_or_else(|| args.output_dir.join(DOCTREE_DIRNAME));

        if args.write_all && !args.filenames.is_empty() {
            return Err(CliError::WriteAllWithFilenames);
        }

        let jobs = resolve_jobs(&args.jobs, cpu_count)?;
        let overrides = resolve_overrides(&args.define, &args.html_define, args.nitpicky)?;

        if args.keep_going {
            debug!("--keep-going has no effect");
        }

        Ok(Self {
            source_dir: args.source_dir,
            output_dir: args.output_dir,
            doctree_dir,
            conf_dir,
            builder_name: args.builder,
            filenames: args.filenames,
            force_all: args.write_all,
            fresh_env: args.fresh_env,
            jobs,
            tags: args.tags.into_iter().collect(),
            overrides,
            warning_is_error: args.fail_on_warning,
            keep_going: false,
            exception_on_warning: args.exception_on_warning,
            verbosity: args.verbose,
            pdb: args.pdb,
            show_traceback: args.show_traceback,
            output: OutputOptions {
                quiet: args.quiet,
                really_quiet: args.silent,
                warning_file: args.warning_file,
                color: ColorMode::from_flags(args.color, args.no_color),
            },
        })
    }

    /// Parameters handed to the builder factory.
    pub fn params(&self, streams: &StreamSet, interrupt: &Interrupt) -> BuildParams {
        let mut params = BuildParams::new(
            &self.source_dir,
            &self.output_dir,
            &self.doctree_dir,
            &self.builder_name,
        );
        params.conf_dir = self.conf_dir.clone();
        params.overrides = self.overrides.clone();
        params.status = streams.status_stream();
        params.warning = streams.warning_stream();
        params.fresh_env = self.fresh_env;
        params.warning_is_error = self.warning_is_error;
        params.tags = self.tags.iter().cloned().collect();
        params.verbosity = self.verbosity;
        params.parallel = self.jobs;
        params.keep_going = self.keep_going;
        params.pdb = self.pdb;
        params.exception_on_warning = self.exception_on_warning;
        params.interrupt = interrupt.clone();
        params
    }
}
