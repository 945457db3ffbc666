//! The status, warning and error channels of one build attempt.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_engine::{MessageStream, SharedStream};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::OutputOptions;
use crate::error::{CliError, Result};

/// Where a channel writes.
#[derive(Debug, Clone)]
pub enum Sink {
    Stdout,
    Stderr,
    /// Terminal output mirrored into the warning file.
    Tee(Arc<TeeSink>),
}

impl Sink {
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            Sink::Stdout => writeln!(io::stdout().lock(), "{line}"),
            Sink::Stderr => writeln!(io::stderr().lock(), "{line}"),
            Sink::Tee(tee) => tee.write_line(line),
        }
    }
}

impl MessageStream for Sink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        Sink::write_line(self, line)
    }
}

/// Writes every line to the terminal as is and to the warning file with
/// ANSI escape sequences removed.
#[derive(Debug)]
pub struct TeeSink {
    primary: Sink,
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl TeeSink {
    pub(crate) fn new(primary: Sink, path: PathBuf, file: File) -> Self {
        Self {
            primary,
            path,
            file: Mutex::new(Some(file)),
        }
    }

    pub fn write_line(&self, line: &str) -> io::Result<()> {
        self.primary.write_line(line)?;
        if let Some(file) = self.file.lock().as_mut() {
            writeln!(file, "{}", console::strip_ansi_codes(line))?;
        }
        Ok(())
    }

    /// Flush and close the file. Returns `true` only for the call that
    /// actually closed it; later writes reach the terminal only.
    pub fn close(&self) -> bool {
        match self.file.lock().take() {
            Some(mut file) => {
                if let Err(err) = file.flush() {
                    debug!(error = %err, path = %self.path.display(), "failed to flush warning file");
                }
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }
}

/// The three channels. `status` and `warning` may be silenced; `error`
/// always exists.
#[derive(Debug)]
pub struct StreamSet {
    pub status: Option<Sink>,
    pub warning: Option<Sink>,
    pub error: Sink,
    warning_file: Option<Arc<TeeSink>>,
}

impl StreamSet {
    /// Open the channels for the given console options.
    ///
    /// With an active warning channel and a warning file, the file is
    /// created (parents included) and both the warning and error channels
    /// are pointed at a tee.
    pub fn open(options: &OutputOptions) -> Result<Self> {
        let mut status = Some(Sink::Stdout);
        let mut warning = Some(Sink::Stderr);
        let mut error = Sink::Stderr;

        if options.quiet {
            status = None;
        }
        if options.really_quiet {
            status = None;
            warning = None;
        }

        let mut warning_file = None;
        if let (Some(primary), Some(requested)) = (warning.as_ref(), options.warning_file.as_deref()) {
            let path = std::path::absolute(requested).unwrap_or_else(|_| requested.to_path_buf());
            let file = create_warning_file(&path)
                .map_err(|source| CliError::WarningFile { path: path.clone(), source })?;
            debug!(path = %path.display(), "writing warnings to file");

            let tee = Arc::new(TeeSink::new(primary.clone(), path, file));
            warning = Some(Sink::Tee(Arc::clone(&tee)));
            error = Sink::Tee(Arc::clone(&tee));
            warning_file = Some(tee);
        }

        Ok(Self {
            status,
            warning,
            error,
            warning_file,
        })
    }

    pub fn status_stream(&self) -> Option<SharedStream> {
        self.status.clone().map(|sink| Arc::new(sink) as SharedStream)
    }

    pub fn warning_stream(&self) -> Option<SharedStream> {
        self.warning.clone().map(|sink| Arc::new(sink) as SharedStream)
    }

    pub fn warning_file(&self) -> Option<&Arc<TeeSink>> {
        self.warning_file.as_ref()
    }

    /// Close the owned warning file, if any. Returns `true` when this call
    /// closed it.
    pub fn close(&self) -> bool {
        self.warning_file.as_ref().is_some_and(|tee| tee.close())
    }
}

fn create_warning_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path)
}
