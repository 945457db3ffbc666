//! folio-build - build documentation from a source directory.
//!
//! The build runs on a blocking thread while the runtime watches for
//! Ctrl-C. The first one is forwarded to the build as an interrupt; a
//! second one ends the process.

use std::process::ExitCode;

use folio_cli::cli;
use folio_cli::invoker::on_ctrl_c;
use folio_engine::Interrupt;

#[tokio::main]
async fn main() -> ExitCode {
    let argv = match cli::utf8_args(std::env::args_os().skip(1)) {
        Ok(argv) => argv,
        Err(err) => return ExitCode::from(cli::exit_with(&err)),
    };

    let interrupt = Interrupt::new();
    let watcher = interrupt.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if let Some(outcome) = on_ctrl_c(&watcher) {
                eprintln!("\nInterrupted!");
                std::process::exit(i32::from(outcome.exit_code()));
            }
        }
    });

    let build = tokio::task::spawn_blocking(move || folio_cli::main(&argv, &interrupt));
    match build.await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("folio-build: build task failed: {err}");
            ExitCode::from(2)
        }
    }
}
