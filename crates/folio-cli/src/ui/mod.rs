//! Terminal colour handling and styled message helpers.
//!
//! Colour is decided once at process entry with [`init_colors`] and applied
//! to both `console` (used by the engine for warning lines) and
//! `owo-colors` (used here).

mod messages;

pub use messages::{bold, red};

/// The `--color` / `--no-color` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn from_flags(color: bool, no_color: bool) -> Self {
        match (color, no_color) {
            (true, _) => ColorMode::Always,
            (_, true) => ColorMode::Never,
            _ => ColorMode::Auto,
        }
    }
}

/// Check if colour output should be enabled when nothing was requested.
///
/// Respects NO_COLOR and FORCE_COLOR, falls back to terminal detection on
/// stdout.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stdout().features().colors_supported()
}

/// Apply the colour decision process-wide. Returns whether colour is on.
pub fn init_colors(mode: ColorMode) -> bool {
    let enabled = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => should_use_color(),
    };
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
    owo_colors::set_override(enabled);
    enabled
}
