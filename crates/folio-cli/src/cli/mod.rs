//! Command-line interface definition for folio-build.
//!
//! The plain build path parses [`BuildArgs`] with clap's derive API. The
//! other modes (`-M`, `--bug-report`) are selected by the
//! [dispatcher](crate::dispatch) before clap sees the arguments.

mod validation;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};

pub use validation::{host_cpu_count, resolve_jobs};

const ABOUT: &str = "Generate documentation from source files.";

const LONG_ABOUT: &str = "\
Generate documentation from source files.

folio-build generates documentation from the files in SOURCE_DIR and places it
in OUTPUT_DIR. It looks for 'folio.toml' in SOURCE_DIR for the configuration
settings.

folio-build can create documentation in different formats. A format is
selected by specifying the builder name on the command line. Builders can also
perform other tasks related to documentation processing.

By default, everything that is outdated is built. Output only for selected
files can be built by specifying individual filenames.";

/// folio-build - build documentation from a source directory
#[derive(Parser, Debug, Clone)]
#[command(
    name = "folio-build",
    version,
    about = ABOUT,
    long_about = LONG_ABOUT,
    args_override_self = true,
    override_usage = "folio-build [OPTIONS] SOURCE_DIR OUTPUT_DIR [FILENAMES...]"
)]
pub struct BuildArgs {
    /// Path to documentation source files
    #[arg(value_name = "SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Path to output directory
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// (optional) a list of specific files to rebuild. Ignored if --write-all is specified
    #[arg(value_name = "FILENAMES")]
    pub filenames: Vec<PathBuf>,

    /// Builder to use
    #[arg(short, long, value_name = "BUILDER", default_value = "html", help_heading = "General options")]
    pub builder: String,

    /// Run in parallel with N processes, when possible. 'auto' uses the number of CPU cores
    #[arg(
        short,
        long,
        value_name = "N",
        default_value = "1",
        allow_hyphen_values = true,
        help_heading = "General options"
    )]
    pub jobs: String,

    /// Write all files (default: only write new and changed files)
    #[arg(short = 'a', long, help_heading = "General options")]
    pub write_all: bool,

    /// Don't use a saved environment, always read all files
    #[arg(short = 'E', long, help_heading = "General options")]
    pub fresh_env: bool,

    /// Directory for doctree and environment files (default: OUTPUT_DIR/.doctrees)
    #[arg(short, long, value_name = "PATH", help_heading = "Path options")]
    pub doctree_dir: Option<PathBuf>,

    /// Directory for the configuration file (folio.toml) (default: SOURCE_DIR)
    #[arg(short, long, value_name = "PATH", help_heading = "Path options")]
    pub conf_dir: Option<PathBuf>,

    /// Use no configuration file, only use settings from -D options
    #[arg(short = 'C', long, help_heading = "Build configuration options")]
    pub isolated: bool,

    /// Override a setting in configuration file
    #[arg(
        short = 'D',
        long,
        value_name = "setting=value",
        action = ArgAction::Append,
        help_heading = "Build configuration options"
    )]
    pub define: Vec<String>,

    /// Pass a value into HTML templates
    #[arg(
        short = 'A',
        long,
        value_name = "name=value",
        action = ArgAction::Append,
        help_heading = "Build configuration options"
    )]
    pub html_define: Vec<String>,

    /// Define tag: include "only" blocks with TAG
    #[arg(short, long = "tag", value_name = "TAG", action = ArgAction::Append, help_heading = "Build configuration options")]
    pub tags: Vec<String>,

    /// Nitpicky mode: warn about all missing references
    #[arg(short, long, help_heading = "Build configuration options")]
    pub nitpicky: bool,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = ArgAction::Count, help_heading = "Console output options")]
    pub verbose: u8,

    /// No output on stdout, just warnings on stderr
    #[arg(short, long, help_heading = "Console output options")]
    pub quiet: bool,

    /// No output at all, not even warnings
    #[arg(short = 'Q', long, help_heading = "Console output options")]
    pub silent: bool,

    /// Do emit colored output (default: auto-detect)
    #[arg(long, overrides_with = "no_color", help_heading = "Console output options")]
    pub color: bool,

    /// Do not emit colored output (default: auto-detect)
    #[arg(short = 'N', long, overrides_with = "color", help_heading = "Console output options")]
    pub no_color: bool,

    /// Write warnings (and errors) to given file
    #[arg(short, long, value_name = "FILE", help_heading = "Warning control options")]
    pub warning_file: Option<PathBuf>,

    /// Turn warnings into errors
    #[arg(short = 'W', long, help_heading = "Warning control options")]
    pub fail_on_warning: bool,

    /// Accepted for compatibility; builds always stop at the first error
    #[arg(long, hide = true)]
    pub keep_going: bool,

    /// Show full traceback on exception
    #[arg(short = 'T', long, help_heading = "Warning control options")]
    pub show_traceback: bool,

    /// Print a post-mortem report on exception
    #[arg(short = 'P', long, help_heading = "Warning control options")]
    pub pdb: bool,

    /// Raise an exception on warnings
    #[arg(long, help_heading = "Warning control options")]
    pub exception_on_warning: bool,
}

/// Parse the plain build arguments (program name excluded).
pub fn parse_args<I, S>(argv: I) -> Result<BuildArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    BuildArgs::try_parse_from(
        std::iter::once(OsString::from("folio-build"))
            .chain(argv.into_iter().map(Into::into)),
    )
}

/// Convert raw process arguments, rejecting any that are not UTF-8.
pub fn utf8_args<I>(args: I) -> Result<Vec<String>, clap::Error>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            arg.into_string().map_err(|arg| {
                BuildArgs::command().error(
                    ErrorKind::InvalidUtf8,
                    format!("argument '{}' is not valid UTF-8", arg.to_string_lossy()),
                )
            })
        })
        .collect()
}

/// A usage error rendered the way clap renders its own.
pub fn usage_error(message: impl std::fmt::Display) -> clap::Error {
    BuildArgs::command().error(ErrorKind::ValueValidation, message)
}

/// Print a clap error (or help/version output) and return its exit code.
pub fn exit_with(err: &clap::Error) -> u8 {
    if let Err(io_err) = err.print() {
        tracing::warn!(error = %io_err, "failed to print usage error");
    }
    u8::try_from(err.exit_code()).unwrap_or(2)
}
