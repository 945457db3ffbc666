//! Mode selection on the first argument, before any parsing.

use folio_engine::{BuilderFactory, Interrupt};
use tracing::debug;

use crate::commands;

/// What one invocation does. Chosen once; there is no fallback between
/// modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<'a> {
    /// `--bug-report`
    BugReport,
    /// `-M ...`, carrying the arguments after `-M`
    MakeMode(&'a [String]),
    /// Anything else, carrying the plain build arguments
    Build(&'a [String]),
}

/// Pick the mode for `argv` (program name excluded). A leading `build`
/// token is dropped first.
pub fn select(argv: &[String]) -> Mode<'_> {
    let argv = match argv {
        [first, rest @ ..] if first == "build" => rest,
        _ => argv,
    };
    match argv {
        [first, ..] if first == "--bug-report" => Mode::BugReport,
        [first, rest @ ..] if first == "-M" => Mode::MakeMode(rest),
        _ => Mode::Build(argv),
    }
}

/// Run the selected mode and return the process exit code.
pub fn run(argv: &[String], factory: &dyn BuilderFactory, interrupt: &Interrupt) -> u8 {
    let mode = select(argv);
    debug!(?mode, "selected mode");
    match mode {
        Mode::BugReport => commands::bug_report_execute(),
        Mode::MakeMode(args) => commands::make_mode_execute(args, factory, interrupt),
        Mode::Build(args) => commands::build_execute(args, factory, interrupt),
    }
}
