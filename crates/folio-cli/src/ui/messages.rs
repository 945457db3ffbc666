//! Styled text for diagnostic output.

use owo_colors::{OwoColorize, Stream};

/// `text` in red, if colour is enabled.
pub fn red(text: &str) -> String {
    text.if_supports_color(Stream::Stderr, |t| t.red()).to_string()
}

/// `text` in bold, if colour is enabled.
pub fn bold(text: &str) -> String {
    text.if_supports_color(Stream::Stdout, |t| t.bold()).to_string()
}
