//! `--bug-report`: what to paste into an issue.

use std::io::{self, Write};

/// Print the report to stdout.
pub fn execute() -> u8 {
    match write_report(&mut io::stdout().lock()) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "failed to print bug report");
            1
        }
    }
}

/// Write the platform and version block.
pub fn write_report(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Please paste all output below into the bug report template\n\n")?;
    writeln!(out, "```text")?;
    writeln!(
        out,
        "Platform:              {}; ({} {})",
        std::env::consts::OS,
        std::env::consts::FAMILY,
        std::env::consts::ARCH
    )?;
    writeln!(out, "folio version:         {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "Engine version:        {}", folio_engine::VERSION)?;
    writeln!(out, "Apidoc version:        {}", folio_apidoc::VERSION)?;
    writeln!(out, "Minimum Rust version:  {}", env!("CARGO_PKG_RUST_VERSION"))?;
    writeln!(out, "```")?;
    Ok(())
}
