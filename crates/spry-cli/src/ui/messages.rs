//! One-line status output on stderr.

use owo_colors::OwoColorize;

/// Severity of a status line; picks the glyph and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Info,
    Warning,
    Error,
}

impl Status {
    fn glyph(self) -> String {
        match self {
            Status::Success => "✓".green().bold().to_string(),
            Status::Info => "ℹ".blue().bold().to_string(),
            Status::Warning => "⚠".yellow().bold().to_string(),
            Status::Error => "✗".red().bold().to_string(),
        }
    }

    /// Render `message` as it is printed.
    ///
    /// Only the first line is tinted, so code frames in the tail of an error
    /// keep their own layout.
    pub fn render(self, message: &str) -> String {
        let (head, tail) = match message.split_once('\n') {
            Some((head, tail)) => (head, Some(tail)),
            None => (message, None),
        };
        let head = match self {
            Status::Warning => head.yellow().to_string(),
            Status::Error => head.red().to_string(),
            Status::Success | Status::Info => head.to_string(),
        };
        match tail {
            Some(tail) => format!("{} {head}\n{tail}", self.glyph()),
            None => format!("{} {head}", self.glyph()),
        }
    }

    pub fn print(self, message: &str) {
        eprintln!("{}", self.render(message));
    }
}

/// ```no_run
/// spry_cli::ui::success("Server restarted");
/// ```
pub fn success(message: &str) {
    Status::Success.print(message);
}

pub fn info(message: &str) {
    Status::Info.print(message);
}

pub fn warning(message: &str) {
    Status::Warning.print(message);
}

pub fn error(message: &str) {
    Status::Error.print(message);
}
