use std::sync::Arc;

use parking_lot::Mutex;
use spry_core::{BuildError, LiveMessage, LiveUpdateBus};

use crate::ui;

/// Sends build errors to connected clients and the operator console.
///
/// The console copy is deduplicated: an error identical to the last one
/// printed is not printed again until [`Reporter::reset`].
#[derive(Debug, Clone)]
pub struct Reporter {
    bus: LiveUpdateBus,
    last: Arc<Mutex<Option<String>>>,
}

impl Reporter {
    pub fn new(bus: LiveUpdateBus) -> Self {
        Self {
            bus,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Report `err`. Returns whether it was printed to the console.
    pub fn report(&self, err: &BuildError) -> bool {
        if self.bus.client_count() > 0 {
            self.bus.publish(LiveMessage::from(err));
        }

        let text = console_text(err);
        {
            let mut last = self.last.lock();
            if last.as_deref() == Some(text.as_str()) {
                tracing::debug!(id = %err.id, "repeated error suppressed");
                return false;
            }
            *last = Some(text.clone());
        }
        ui::error(&text);
        true
    }

    /// Forget the last printed error, e.g. after a file changed.
    pub fn reset(&self) {
        self.last.lock().take();
    }
}

fn console_text(err: &BuildError) -> String {
    let mut text = err.summary();
    if let Some(frame) = &err.code_frame {
        text.push('\n');
        text.push_str(frame);
    }
    if let Some(hint) = &err.hint {
        text.push_str("\n\nHint: ");
        text.push_str(hint);
    }
    text
}
