use std::num::NonZeroUsize;

use crate::error::CliError;

/// Number of CPUs the host makes available, at least one.
pub fn host_cpu_count() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Parse the `--jobs` value.
///
/// `auto` asks `cpu_count` for the number of CPUs; anything else must be a
/// positive integer.
///
/// # Examples
///
/// ```
/// use folio_cli::cli::resolve_jobs;
///
/// assert_eq!(resolve_jobs("4", || 8).unwrap().get(), 4);
/// assert_eq!(resolve_jobs("auto", || 8).unwrap().get(), 8);
/// assert!(resolve_jobs("0", || 8).is_err());
/// ```
pub fn resolve_jobs(value: &str, cpu_count: impl FnOnce() -> usize) -> Result<NonZeroUsize, CliError> {
    if value == "auto" {
        return Ok(NonZeroUsize::new(cpu_count()).unwrap_or(NonZeroUsize::MIN));
    }
    value
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| CliError::Jobs(value.to_string()))
}
