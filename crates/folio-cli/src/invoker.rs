//! One build attempt: construct the builder, run it, classify the outcome.
//!
//! Construction and execution happen inside the engine's two scoped
//! contexts ([`patch_docutils`] then [`docutils_namespace`]), which are
//! released in reverse order on every path. Errors, panics and interrupts
//! are caught here, handed to the [`ExceptionReporter`] and mapped to exit
//! code 2. The warning file owned by the [`StreamSet`] is closed before
//! [`invoke`] returns, whatever happened.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use folio_engine::scope::{docutils_namespace, patch_docutils};
use folio_engine::{Builder, BuilderFactory, Interrupt, StatusCode};
use tracing::debug;

use crate::config::BuildRequest;
use crate::error::{ExceptionReporter, Failure, FailureReport};
use crate::streams::StreamSet;

/// How a build attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The builder returned normally with this status.
    Success(StatusCode),
    /// The builder failed or panicked; the failure has been reported.
    HandledFailure,
    /// The user interrupted the build; the interrupt has been reported.
    Interrupted,
}

impl ExitOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            ExitOutcome::Success(status) => status,
            ExitOutcome::HandledFailure | ExitOutcome::Interrupted => 2,
        }
    }
}

/// Record one Ctrl-C. The first asks the running build to stop; a repeat
/// means it did not, and the caller should exit with the returned outcome.
pub fn on_ctrl_c(interrupt: &Interrupt) -> Option<ExitOutcome> {
    if interrupt.is_triggered() {
        return Some(ExitOutcome::Interrupted);
    }
    interrupt.trigger();
    debug!("interrupt requested");
    None
}

struct PanicDetails {
    location: Option<String>,
    backtrace: String,
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicDetails>> = const { RefCell::new(None) };
}

/// Install a panic hook that records location and backtrace of panics
/// raised inside a build attempt. Panics elsewhere go to the previous hook.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let details = PanicDetails {
                    location: info.location().map(ToString::to_string),
                    backtrace: Backtrace::force_capture().to_string(),
                };
                LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(details));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f`, turning a panic into [`Failure::Panic`].
fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Failure> {
    CAPTURING.with(|flag| flag.set(true));
    let result = std::panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|flag| flag.set(false));

    result.map_err(|payload| {
        let details = LAST_PANIC.with(|slot| slot.borrow_mut().take());
        let (location, backtrace) = match details {
            Some(details) => (details.location, Some(details.backtrace)),
            None => (None, None),
        };
        Failure::Panic {
            message: panic_message(payload.as_ref()),
            location,
            backtrace,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Closes the warning file when dropped.
struct CloseWarningFile<'a>(&'a StreamSet);

impl Drop for CloseWarningFile<'_> {
    fn drop(&mut self) {
        if self.0.close() {
            debug!("closed warning file");
        }
    }
}

/// Execute one build attempt for `request`.
pub fn invoke(
    request: &BuildRequest,
    streams: &StreamSet,
    factory: &dyn BuilderFactory,
    interrupt: &Interrupt,
) -> ExitOutcome {
    let _close = CloseWarningFile(streams);

    let result = {
        let settings_dir = request.conf_dir.as_deref().unwrap_or(&request.source_dir);
        let _patch = patch_docutils(Some(settings_dir));
        let _namespace = docutils_namespace();
        run_builder(request, streams, factory, interrupt)
    };

    match result {
        Ok(status) => {
            debug!(status, "build finished");
            ExitOutcome::Success(status)
        }
        Err(report) => {
            let interrupted = matches!(report.failure, Failure::Interrupted);
            ExceptionReporter::new(
                streams.error.clone(),
                request.pdb,
                request.show_traceback,
                request.verbosity,
            )
            .report(&report);

            if interrupted {
                ExitOutcome::Interrupted
            } else {
                ExitOutcome::HandledFailure
            }
        }
    }
}

/// Construct and run the builder. The builder is dropped before this
/// returns, so always inside the caller's scoped contexts.
fn run_builder(
    request: &BuildRequest,
    streams: &StreamSet,
    factory: &dyn BuilderFactory,
    interrupt: &Interrupt,
) -> Result<StatusCode, FailureReport> {
    let params = request.params(streams, interrupt);
    debug!(builder = %request.builder_name, jobs = request.jobs.get(), "constructing builder");

    let mut builder: Option<Box<dyn Builder>> = None;
    let result = catch(|| -> folio_engine::Result<StatusCode> {
        let built = builder.insert(factory.construct(params)?);
        built.build(request.force_all, &request.filenames)
    });

    let failure = match result {
        Ok(Ok(status)) => return Ok(status),
        Ok(Err(err)) => Failure::from_engine(err),
        Err(panic) => panic,
    };

    // Context is best effort: a builder that panics here reports nothing.
    let (message_log, extensions) = builder
        .as_deref()
        .map(|built| catch(|| (built.message_log(), built.extensions())).unwrap_or_default())
        .unwrap_or_default();
    drop(builder);

    Err(FailureReport {
        failure,
        message_log,
        extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::parse_args;
    use folio_engine::scope::{is_directive_registered, register_directive, settings_file};
    use folio_engine::{BuildParams, EngineError, Extension, ExtensionMetadata, Result};
    use parking_lot::Mutex;
    use serial_test::serial;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Clone, Copy)]
    enum Behavior {
        Status(StatusCode),
        Fail,
        Panic,
        Interrupt,
        ConstructFail,
    }

    #[derive(Default)]
    struct Seen {
        jobs: Option<usize>,
        force_all: Option<bool>,
        settings_file: Option<PathBuf>,
    }

    struct StubFactory {
        behavior: Behavior,
        seen: Arc<Mutex<Seen>>,
    }

    impl StubFactory {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                seen: Arc::default(),
            }
        }
    }

    struct StubBuilder {
        behavior: Behavior,
        params: BuildParams,
        seen: Arc<Mutex<Seen>>,
    }

    impl BuilderFactory for StubFactory {
        fn construct(&self, params: BuildParams) -> Result<Box<dyn Builder>> {
            if let Behavior::ConstructFail = self.behavior {
                return Err(EngineError::Config("config directory is broken".to_string()));
            }
            self.seen.lock().jobs = Some(params.parallel.get());
            Ok(Box::new(StubBuilder {
                behavior: self.behavior,
                params,
                seen: Arc::clone(&self.seen),
            }))
        }
    }

    impl Builder for StubBuilder {
        fn build(&mut self, force_all: bool, _filenames: &[PathBuf]) -> Result<StatusCode> {
            {
                let mut seen = self.seen.lock();
                seen.force_all = Some(force_all);
                seen.settings_file = settings_file();
            }
            register_directive("stub-directive");
            if let Some(warning) = &self.params.warning {
                warning
                    .write_line("\u{1b}[31mWARNING: careful\u{1b}[0m")
                    .map_err(|err| EngineError::io("write", err))?;
            }
            match self.behavior {
                Behavior::Status(status) => Ok(status),
                Behavior::Fail => Err(EngineError::Config("bad value".to_string())),
                Behavior::Panic => panic!("builder exploded"),
                Behavior::Interrupt => Err(EngineError::Interrupted),
                Behavior::ConstructFail => unreachable!(),
            }
        }

        fn message_log(&self) -> Vec<String> {
            vec!["reading sources... [100%] index".to_string()]
        }

        fn extensions(&self) -> Vec<Extension> {
            vec![Extension {
                name: "stub.ext".to_string(),
                metadata: ExtensionMetadata::default(),
            }]
        }
    }

    fn request(argv: &[&str]) -> BuildRequest {
        BuildRequest::resolve_with(parse_args(argv).unwrap(), || 8).unwrap()
    }

    fn run(request: &BuildRequest, factory: &StubFactory) -> (ExitOutcome, StreamSet) {
        install_panic_hook();
        let streams = StreamSet::open(&request.output).unwrap();
        let outcome = invoke(request, &streams, factory, &Interrupt::new());
        (outcome, streams)
    }

    fn with_warning_file(temp: &Path, extra: &[&str]) -> (BuildRequest, PathBuf) {
        let warn = temp.join("logs").join("warn.log");
        let warn_arg = warn.to_string_lossy().into_owned();
        let mut argv = vec!["-N", "-q", "-w", warn_arg.as_str()];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["docs", "out"]);
        (request(&argv), warn)
    }

    #[test]
    #[serial]
    fn test_jobs_auto_write_all_success() {
        let request = request(&["-q", "--jobs", "auto", "--write-all", "./docs", "./out"]);
        let factory = StubFactory::new(Behavior::Status(0));
        let (outcome, _streams) = run(&request, &factory);

        assert_eq!(outcome, ExitOutcome::Success(0));
        assert_eq!(outcome.exit_code(), 0);
        let seen = factory.seen.lock();
        assert_eq!(seen.jobs, Some(8));
        assert_eq!(seen.force_all, Some(true));
    }

    #[test]
    #[serial]
    fn test_status_is_forwarded() {
        let request = request(&["-Q", "docs", "out"]);
        let (outcome, _streams) = run(&request, &StubFactory::new(Behavior::Status(1)));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    #[serial]
    fn test_failure_closes_warning_file_once() {
        let temp = TempDir::new().unwrap();
        let (request, warn) = with_warning_file(temp.path(), &[]);
        let (outcome, streams) = run(&request, &StubFactory::new(Behavior::Fail));

        assert_eq!(outcome, ExitOutcome::HandledFailure);
        assert_eq!(outcome.exit_code(), 2);
        assert!(streams.warning_file().unwrap().is_closed());
        assert!(!streams.close());

        let content = std::fs::read_to_string(warn).unwrap();
        assert!(content.contains("WARNING: careful"));
        assert!(!content.contains('\u{1b}'));
        assert!(content.contains("Configuration error:\nbad value"));
        assert!(content.contains("Last messages:\n    reading sources... [100%] index"));
        assert!(content.contains("Loaded extensions:\n    stub.ext (unknown version)"));
    }

    #[test]
    #[serial]
    fn test_construction_failure_has_no_context() {
        let temp = TempDir::new().unwrap();
        let (request, warn) = with_warning_file(temp.path(), &[]);
        let (outcome, _streams) = run(&request, &StubFactory::new(Behavior::ConstructFail));

        assert_eq!(outcome, ExitOutcome::HandledFailure);
        let content = std::fs::read_to_string(warn).unwrap();
        assert!(content.contains("Configuration error:\nconfig directory is broken"));
        assert!(!content.contains("Last messages:"));
    }

    #[test]
    #[serial]
    fn test_panic_is_a_handled_failure() {
        let temp = TempDir::new().unwrap();
        let (request, warn) = with_warning_file(temp.path(), &["-T"]);
        let (outcome, streams) = run(&request, &StubFactory::new(Behavior::Panic));

        assert_eq!(outcome, ExitOutcome::HandledFailure);
        assert!(streams.warning_file().unwrap().is_closed());

        let content = std::fs::read_to_string(warn).unwrap();
        assert!(content.contains("Exception occurred:"));
        assert!(content.contains("builder exploded"));
        assert!(content.contains("src/invoker.rs"));

        let mut lines = content.lines();
        lines.by_ref().find(|line| *line == "The full traceback has been saved in:");
        std::fs::remove_file(lines.next().unwrap()).unwrap();
    }

    #[test]
    #[serial]
    fn test_interrupt() {
        let temp = TempDir::new().unwrap();
        let (request, warn) = with_warning_file(temp.path(), &[]);
        let (outcome, streams) = run(&request, &StubFactory::new(Behavior::Interrupt));

        assert_eq!(outcome, ExitOutcome::Interrupted);
        assert_eq!(outcome.exit_code(), 2);
        assert!(streams.warning_file().unwrap().is_closed());
        assert!(std::fs::read_to_string(warn).unwrap().contains("Interrupted!"));
    }

    #[test]
    fn test_second_ctrl_c_exits() {
        let interrupt = Interrupt::new();
        assert_eq!(on_ctrl_c(&interrupt), None);
        assert!(interrupt.is_triggered());

        let outcome = on_ctrl_c(&interrupt).unwrap();
        assert_eq!(outcome, ExitOutcome::Interrupted);
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    #[serial]
    fn test_scopes_are_restored() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("docutils.conf"), "").unwrap();

        let docs_arg = docs.to_string_lossy().into_owned();
        let request = request(&["-Q", docs_arg.as_str(), "out"]);
        let factory = StubFactory::new(Behavior::Fail);
        run(&request, &factory);

        assert_eq!(
            factory.seen.lock().settings_file,
            Some(docs.join("docutils.conf"))
        );
        assert_eq!(settings_file(), None);
        assert!(!is_directive_registered("stub-directive"));
    }
}
