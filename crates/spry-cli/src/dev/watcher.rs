//! Filesystem watching with per-path debouncing.
//!
//! Two scopes are supported: a recursive tree under the served root for
//! source changes, and a fixed set of files (config and env files) whose
//! change triggers a restart. Each [`FileWatcher`] owns its notify watcher;
//! dropping it stops the events.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{CliError, Result};

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    /// Fold a later event for the same path into this one.
    fn merge(self, later: FileChange) -> FileChange {
        match (self, later) {
            (FileChange::Created(p), FileChange::Modified(_)) => FileChange::Created(p),
            (_, later) => later,
        }
    }

    fn from_event(kind: &EventKind, path: &Path) -> Option<FileChange> {
        let path = path.to_path_buf();
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.exists() {
                    Some(FileChange::Created(path))
                } else {
                    Some(FileChange::Removed(path))
                }
            }
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Which paths a watcher reports.
#[derive(Debug, Clone)]
enum Scope {
    Tree {
        root: PathBuf,
        /// Canonical form of `root`, when it differs (symlinked temp dirs)
        canonical: Option<PathBuf>,
        ignore: Vec<String>,
    },
    Files(FxHashSet<PathBuf>),
}

impl Scope {
    /// The reported form of `path`, or `None` if it is out of scope.
    fn accept(&self, path: &Path) -> Option<PathBuf> {
        match self {
            Scope::Tree {
                root,
                canonical,
                ignore,
            } => {
                let path = match canonical {
                    Some(canonical) if !path.starts_with(root) => {
                        root.join(path.strip_prefix(canonical).ok()?)
                    }
                    _ => path.to_path_buf(),
                };
                (!should_ignore(&path, root, ignore)).then_some(path)
            }
            Scope::Files(files) => {
                if files.contains(path) {
                    return Some(path.to_path_buf());
                }
                let parent = path.parent()?.canonicalize().ok()?;
                let name = path.file_name()?;
                files
                    .iter()
                    .find(|file| {
                        file.file_name() == Some(name)
                            && file
                                .parent()
                                .and_then(|p| p.canonicalize().ok())
                                .is_some_and(|p| p == parent)
                    })
                    .cloned()
            }
        }
    }
}

/// Whether a path under `root` is filtered out.
///
/// Patterns are either `*.ext` suffixes or names matched against any path
/// component. Hidden files and directories are always ignored.
fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };

    let path_str = rel_path.to_string_lossy();
    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else if rel_path
            .components()
            .any(|component| component.as_os_str() == pattern.as_str())
        {
            return true;
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

/// Trailing-edge coalescing per path.
///
/// Every event pushes its path's deadline out by one window; a path is
/// released once it has been quiet for the whole window.
#[derive(Debug)]
struct Debouncer {
    window: Duration,
    pending: FxHashMap<PathBuf, (FileChange, Instant)>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashMap::default(),
        }
    }

    fn push(&mut self, change: FileChange, now: Instant) {
        let deadline = now + self.window;
        let path = change.path().to_path_buf();
        let merged = match self.pending.remove(&path) {
            Some((earlier, _)) => earlier.merge(change),
            None => change,
        };
        self.pending.insert(path, (merged, deadline));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    /// Changes whose window has passed, in path order.
    fn due(&mut self, now: Instant) -> Vec<FileChange> {
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();
        ready
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|(change, _)| change))
            .collect()
    }

    fn drain(&mut self) -> Vec<FileChange> {
        let mut all: Vec<FileChange> = self.pending.drain().map(|(_, (change, _))| change).collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }
}

async fn debounce(
    mut raw: mpsc::UnboundedReceiver<FileChange>,
    tx: mpsc::Sender<FileChange>,
    window: Duration,
) {
    let mut debouncer = Debouncer::new(window);
    loop {
        let next = debouncer.next_deadline();
        tokio::select! {
            change = raw.recv() => match change {
                Some(change) => debouncer.push(change, Instant::now()),
                None => break,
            },
            // The sleep is built even when the branch is disabled.
            _ = tokio::time::sleep_until(next.unwrap_or_else(|| Instant::now() + window)), if next.is_some() => {
                for change in debouncer.due(Instant::now()) {
                    if tx.send(change).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
    for change in debouncer.drain() {
        if tx.send(change).await.is_err() {
            return;
        }
    }
}

/// Debounced filesystem watcher.
///
/// Must be created inside a tokio runtime; the debounce stage runs as a
/// task that ends when the watcher is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    scope: Arc<Scope>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("scope", &self.scope).finish()
    }
}

impl FileWatcher {
    /// Watch `root` recursively, skipping ignored paths.
    pub fn tree(
        root: PathBuf,
        ignore: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root));
        }
        let canonical = root.canonicalize().ok().filter(|canonical| *canonical != root);
        let scope = Scope::Tree {
            root: root.clone(),
            canonical,
            ignore,
        };
        Self::start(scope, &[root], RecursiveMode::Recursive, debounce_ms)
    }

    /// Watch a fixed set of files, which need not exist yet.
    ///
    /// The parent directories are watched non-recursively so that creating a
    /// missing file is reported too.
    pub fn files(
        files: impl IntoIterator<Item = PathBuf>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let files: FxHashSet<PathBuf> = files.into_iter().collect();
        let mut dirs: Vec<PathBuf> = files
            .iter()
            .filter_map(|file| file.parent().map(Path::to_path_buf))
            .filter(|dir| dir.is_dir())
            .collect();
        dirs.sort();
        dirs.dedup();
        Self::start(Scope::Files(files), &dirs, RecursiveMode::NonRecursive, debounce_ms)
    }

    fn start(
        scope: Scope,
        dirs: &[PathBuf],
        mode: RecursiveMode,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let scope = Arc::new(scope);
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(100);

        let filter = Arc::clone(&scope);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::debug!(error = %err, "watch error");
                    return;
                }
            };
            for path in &event.paths {
                let Some(path) = filter.accept(path) else {
                    continue;
                };
                if let Some(change) = FileChange::from_event(&event.kind, &path) {
                    let _ = raw_tx.send(change);
                }
            }
        })?;

        for dir in dirs {
            watcher.watch(dir, mode)?;
            tracing::debug!(dir = %dir.display(), "watching");
        }

        tokio::spawn(debounce(raw_rx, tx, Duration::from_millis(debounce_ms)));

        Ok((
            Self {
                _watcher: watcher,
                scope,
            },
            rx,
        ))
    }
}
