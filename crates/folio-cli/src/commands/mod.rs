//! Command implementations for folio-build.
//!
//! - [`build`] - one build attempt from plain build arguments
//! - [`make_mode`] - `-M TARGET SOURCE_DIR OUTPUT_DIR`, Makefile style
//! - [`bug_report`] - platform and version information for issue reports
//!
//! Every command returns the process exit code.

pub mod bug_report;
pub mod build;
pub mod make_mode;

pub use bug_report::execute as bug_report_execute;
pub use build::execute as build_execute;
pub use make_mode::execute as make_mode_execute;
