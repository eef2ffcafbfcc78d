//! Formatting for durations and the startup banner.

use std::net::SocketAddr;
use std::time::Duration;

use owo_colors::OwoColorize;

/// Format a duration for status lines.
///
/// ```
/// use spry_cli::ui::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print the addresses a server is reachable at.
pub fn print_banner(addresses: &[SocketAddr], root: &std::path::Path, ready_in: Duration) {
    eprintln!();
    eprintln!(
        "  {} {}",
        "spry".cyan().bold(),
        format!("ready in {}", format_duration(ready_in)).dimmed()
    );
    eprintln!();
    for addr in addresses {
        let label = if addr.ip().is_loopback() { "Local:  " } else { "Network:" };
        eprintln!("  {} {}", label.bold(), format!("http://{addr}/").cyan());
    }
    eprintln!("  {} {}", "Root:   ".bold(), root.display().dimmed());
    eprintln!();
}
