//! Miette diagnostic conversion for CLI errors.

use miette::Report;

use crate::error::CliError;

/// Convert a CLI error into a report for the terminal.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Bind { .. } if err.is_addr_in_use() => miette::miette!(
            code = "spry::bind",
            help = "Another process is using this port. Pass --port <PORT> or set PORT.",
            "{}",
            err
        ),
        CliError::Bind { .. } => miette::miette!(code = "spry::bind", "{}", err),
        CliError::Config(_) | CliError::ReloadPolicy(_) => miette::miette!(
            code = "spry::config",
            help = "Check spry.toml (or the \"spry\" field of package.json) and SPRY_* variables.",
            "{}",
            err
        ),
        CliError::Watch(_) => miette::miette!(code = "spry::watch", "{}", err),
        _ => miette::miette!("{}", err),
    }
}
