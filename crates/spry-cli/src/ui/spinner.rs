use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::messages::Status;

const TICK: Duration = Duration::from_millis(100);
const FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

/// Animated status for a wait of unknown length, such as a restart.
///
/// Draws nothing when stderr is not a terminal; the final line is still
/// printed so logs show the outcome.
///
/// ```no_run
/// use spry_cli::ui::Spinner;
///
/// let spinner = Spinner::new("Restarting server...");
/// spinner.finish("Server restarted");
/// ```
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_strings(FRAMES));
        }
        bar.set_message(message.to_owned());
        bar.enable_steady_tick(TICK);
        Self { bar }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_owned());
    }

    pub fn finish(&self, message: &str) {
        self.settle(Status::Success, message);
    }

    pub fn fail(&self, message: &str) {
        self.settle(Status::Error, message);
    }

    fn settle(&self, status: Status, message: &str) {
        self.bar.finish_and_clear();
        status.print(message);
    }
}
