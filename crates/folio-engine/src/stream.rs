//! Output channels handed to the engine by its caller.

use std::io;
use std::sync::Arc;

/// A destination for status or warning lines.
///
/// Implementations append the line terminator themselves. They must be
/// shareable because the caller may point several channels at the same
/// destination.
pub trait MessageStream: Send + Sync {
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Shared handle to a [`MessageStream`].
pub type SharedStream = Arc<dyn MessageStream>;

/// In-memory stream that keeps every line written to it.
#[derive(Debug, Default)]
pub struct MemoryStream {
    lines: parking_lot::Mutex<Vec<String>>,
}

impl MemoryStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl MessageStream for MemoryStream {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
