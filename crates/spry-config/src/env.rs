//! `.env` file loading.
//!
//! Values are collected into a map owned by the snapshot. The process
//! environment is never modified.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::options::Mode;

/// Env files considered for a mode, lowest precedence first.
///
/// All candidates are returned whether or not they exist, so a watcher can
/// pick up a file that gets created later.
pub fn env_file_candidates(cwd: &Path, mode: Mode) -> Vec<PathBuf> {
    let mode = mode.as_str();
    vec![
        cwd.join(".env"),
        cwd.join(".env.local"),
        cwd.join(format!(".env.{mode}")),
        cwd.join(format!(".env.{mode}.local")),
    ]
}

/// Load every existing env file for `mode`. Later files win.
pub fn load_env_files(cwd: &Path, mode: Mode) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();

    for path in env_file_candidates(cwd, mode) {
        if !path.is_file() {
            continue;
        }

        let iter = dotenvy::from_path_iter(&path).map_err(|e| ConfigError::EnvFile {
            path: path.clone(),
            message: e.to_string(),
        })?;

        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::EnvFile {
                path: path.clone(),
                message: e.to_string(),
            })?;
            env.insert(key, value);
        }

        tracing::debug!(path = %path.display(), "loaded env file");
    }

    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "API=base\nNAME=app\n").unwrap();
        fs::write(dir.path().join(".env.development"), "API=dev\n").unwrap();

        let env = load_env_files(dir.path(), Mode::Start).unwrap();
        assert_eq!(env.get("API").map(String::as_str), Some("dev"));
        assert_eq!(env.get("NAME").map(String::as_str), Some("app"));
    }

    #[test]
    fn production_files_are_not_read_in_start_mode() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env.production"), "API=prod\n").unwrap();

        let env = load_env_files(dir.path(), Mode::Start).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn candidates_include_missing_files() {
        let dir = TempDir::new().unwrap();
        let candidates = env_file_candidates(dir.path(), Mode::Build);
        assert_eq!(candidates.len(), 4);
        assert!(candidates[3].ends_with(".env.production.local"));
    }
}
