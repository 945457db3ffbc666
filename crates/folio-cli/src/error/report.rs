//! Rendering of failed build attempts on the error channel.

use std::fmt::Write as _;
use std::io::Write as _;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use folio_engine::{EngineError, Extension};
use miette::{GraphicalReportHandler, GraphicalTheme};
use tracing::debug;

use super::Failure;
use crate::streams::Sink;
use crate::ui::red;

/// Where users are asked to report unexpected failures.
pub const ISSUE_TRACKER: &str = concat!(env!("CARGO_PKG_REPOSITORY"), "/issues");

const FALLBACK: &str = "folio-build: the build failed and the error report could not be rendered";

/// A failure together with the context gathered at the invoker boundary.
///
/// `message_log` and `extensions` are empty when the builder never finished
/// constructing.
#[derive(Debug)]
pub struct FailureReport {
    pub failure: Failure,
    pub message_log: Vec<String>,
    pub extensions: Vec<Extension>,
}

impl FailureReport {
    pub fn new(failure: Failure) -> Self {
        Self {
            failure,
            message_log: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

/// Renders a [`FailureReport`] to the error sink.
#[derive(Debug, Clone)]
pub struct ExceptionReporter {
    sink: Sink,
    pdb: bool,
    full: bool,
}

impl ExceptionReporter {
    /// `show_traceback` or any verbosity selects the full report; `pdb`
    /// selects the post-mortem report.
    pub fn new(sink: Sink, pdb: bool, show_traceback: bool, verbosity: u8) -> Self {
        Self {
            sink,
            pdb,
            full: pdb || show_traceback || verbosity > 0,
        }
    }

    /// Write the report. Never panics; if rendering or writing fails a
    /// fixed message goes to stderr instead. Returns whether the report
    /// itself reached the sink.
    pub fn report(&self, report: &FailureReport) -> bool {
        let rendered = std::panic::catch_unwind(AssertUnwindSafe(|| self.render(report)));
        self.deliver(rendered.ok())
    }

    fn deliver(&self, rendered: Option<String>) -> bool {
        let written = rendered.is_some_and(|text| self.sink.write_line(&text).is_ok());
        if !written {
            let _ = writeln!(std::io::stderr(), "{FALLBACK}");
        }
        written
    }

    pub(crate) fn render(&self, report: &FailureReport) -> String {
        let mut out = String::new();
        // Separate the report from whatever the build printed last.
        out.push('\n');

        let failure = &report.failure;
        if !self.pdb && matches!(failure, Failure::Interrupted) {
            out.push_str(&red("Interrupted!"));
            return out;
        }

        if self.pdb {
            push_line(&mut out, &red("Exception occurred, starting post-mortem report:"));
            out.push_str(&full_text(failure, console::colors_enabled_stderr()));
        } else {
            match failure {
                Failure::Error(EngineError::WarningAsError(message)) => {
                    push_line(&mut out, &red("Warning, treated as error:"));
                    out.push_str(message);
                }
                Failure::Error(err) if err.category().is_some() => {
                    let category = err.category().unwrap_or("Error");
                    push_line(&mut out, &red(&format!("{category}:")));
                    out.push_str(&self.body(failure));
                }
                _ => {
                    push_line(&mut out, &red("Exception occurred:"));
                    push_line(&mut out, &self.body(failure));
                    match save_crash_report(report) {
                        Ok(path) => {
                            push_line(&mut out, "The full traceback has been saved in:");
                            push_line(&mut out, &path.display().to_string());
                        }
                        Err(err) => {
                            debug!(error = %err, "failed to save crash report");
                            push_line(&mut out, &format!("The full traceback could not be saved: {err}"));
                        }
                    }
                    out.push_str(&format!(
                        "To report this error to the developers, please open an issue at <{ISSUE_TRACKER}>. Thanks!"
                    ));
                }
            }
            if !self.full {
                out.push_str("\n(Re-run with -v or -T to see the full report.)");
            }
        }

        push_context(&mut out, report);
        out
    }

    fn body(&self, failure: &Failure) -> String {
        if self.full {
            full_text(failure, console::colors_enabled_stderr())
        } else {
            failure.summary()
        }
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn push_context(out: &mut String, report: &FailureReport) {
    if !report.message_log.is_empty() {
        out.push_str("\n\nLast messages:");
        for line in &report.message_log {
            let _ = write!(out, "\n    {}", console::strip_ansi_codes(line));
        }
    }
    if !report.extensions.is_empty() {
        out.push_str("\n\nLoaded extensions:");
        for ext in &report.extensions {
            let _ = write!(out, "\n    {} ({})", ext.name, ext.metadata.version);
        }
    }
}

/// The complete description of a failure: the diagnostic with its cause
/// chain for errors, location and backtrace for panics.
fn full_text(failure: &Failure, color: bool) -> String {
    match failure {
        Failure::Error(err) => {
            let theme = if color {
                GraphicalTheme::unicode()
            } else {
                GraphicalTheme::unicode_nocolor()
            };
            let mut text = String::new();
            match GraphicalReportHandler::new_themed(theme).render_report(&mut text, err) {
                Ok(()) => text.trim_end().to_string(),
                Err(_) => failure.summary(),
            }
        }
        Failure::Panic {
            backtrace: Some(backtrace),
            ..
        } => format!("{}\n\nstack backtrace:\n{}", failure.summary(), backtrace.trim_end()),
        other => other.summary(),
    }
}

fn save_crash_report(report: &FailureReport) -> std::io::Result<PathBuf> {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "# Platform:         {}; {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    let _ = writeln!(text, "# folio version:    {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(text, "# engine version:   {}", folio_engine::VERSION);
    let _ = writeln!(text, "# Last messages:");
    for line in &report.message_log {
        let _ = writeln!(text, "#   {}", console::strip_ansi_codes(line));
    }
    let _ = writeln!(text, "# Loaded extensions:");
    for ext in &report.extensions {
        let _ = writeln!(text, "#   {} ({})", ext.name, ext.metadata.version);
    }
    let _ = writeln!(text, "# Traceback:");
    text.push_str(&full_text(&report.failure, false));
    text.push('\n');

    let mut file = tempfile::Builder::new()
        .prefix("folio-err-")
        .suffix(".log")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    let (_, path) = file.keep().map_err(|err| err.error)?;
    Ok(path)
}
