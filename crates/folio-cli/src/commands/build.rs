//! The plain build path.
//!
//! Arguments are parsed and resolved into a [`BuildRequest`] before any
//! stream or builder exists; problems at that stage are usage errors and
//! end the process through clap. Only then are colours, logging and the
//! [`StreamSet`] set up and the build attempted.

use folio_engine::{BuilderFactory, Interrupt};
use tracing::debug;

use crate::cli::{exit_with, parse_args, usage_error};
use crate::config::BuildRequest;
use crate::invoker::invoke;
use crate::logger;
use crate::streams::StreamSet;
use crate::ui::{self, ColorMode};

/// Run one build from plain build arguments (program name excluded).
pub fn execute(argv: &[String], factory: &dyn BuilderFactory, interrupt: &Interrupt) -> u8 {
    let args = match parse_args(argv) {
        Ok(args) => args,
        Err(err) => return exit_with(&err),
    };

    ui::init_colors(ColorMode::from_flags(args.color, args.no_color));
    logger::init_logger(args.verbose, args.quiet || args.silent, args.no_color);

    let request = match BuildRequest::resolve(args) {
        Ok(request) => request,
        Err(err) => return exit_with(&usage_error(err)),
    };
    debug!(?request, "resolved build request");

    let streams = match StreamSet::open(&request.output) {
        Ok(streams) => streams,
        Err(err) => return exit_with(&usage_error(err)),
    };

    invoke(&request, &streams, factory, interrupt).exit_code()
}
