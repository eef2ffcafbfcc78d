//! Terminal output for the operator console.
//!
//! Status lines go to stderr. Colors follow `NO_COLOR`/`FORCE_COLOR`, the
//! `--no-color` flag and terminal detection.
//!
//! # Examples
//!
//! ```no_run
//! use spry_cli::ui;
//!
//! ui::init_colors(false);
//! ui::success("Server ready");
//! ui::warning("Port 8080 is busy, retrying");
//! ```

mod format;
mod messages;
mod spinner;

pub use format::{format_duration, print_banner};
pub use messages::{Status, error, info, success, warning};
pub use spinner::Spinner;

/// Whether the environment asks for colored output.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Apply the color decision to `owo-colors` and `console`.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && should_use_color();
    owo_colors::set_override(enabled);
    console::set_colors_enabled(enabled);
    console::set_colors_enabled_stderr(enabled);
}
