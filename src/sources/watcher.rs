//! Single-file watcher shared by the branch and config sources.
//!
//! Watches the file's parent directory (so creation and deletion are seen)
//! and calls back for every create/modify/remove touching the file name.
//! Uses the platform's native backend, falling back to polling when that
//! cannot be initialised (containers, network filesystems).

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::constants::watcher;

/// Keeps the underlying watcher alive; dropping it stops notifications
pub struct FileWatcher {
    _watcher: Box<dyn Watcher + Send>,
    path: PathBuf,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Whether a notify event concerns `filename`
pub fn is_relevant(event: &Event, filename: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name().is_some_and(|f| f == filename))
}

fn make_event_handler<F>(
    filename: OsString,
    on_change: F,
) -> impl Fn(std::result::Result<Event, notify::Error>) + Send + 'static
where
    F: Fn() + Send + Sync + 'static,
{
    move |result: std::result::Result<Event, notify::Error>| match result {
        Ok(event) if is_relevant(&event, &filename) => {
            trace!(kind = ?event.kind, "Watched file changed");
            on_change();
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "File watcher error"),
    }
}

impl FileWatcher {
    /// Watch `path`, which does not need to exist yet (its directory must)
    pub fn new<F>(path: &Path, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + Clone + 'static,
    {
        let filename = path
            .file_name()
            .context("Watched path has no filename")?
            .to_os_string();
        let parent_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let mut watcher = Self::create_watcher(filename, on_change)?;
        watcher
            .watch(&parent_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", parent_dir.display()))?;

        debug!(path = %path.display(), "Watching file");
        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    fn create_watcher<F>(filename: OsString, on_change: F) -> Result<Box<dyn Watcher + Send>>
    where
        F: Fn() + Send + Sync + Clone + 'static,
    {
        let handler = make_event_handler(filename.clone(), on_change.clone());
        match notify::recommended_watcher(handler) {
            Ok(w) => Ok(Box::new(w)),
            Err(e) => {
                warn!(error = %e, "Native file watcher unavailable, falling back to polling");
                let poll_watcher = PollWatcher::new(
                    make_event_handler(filename, on_change),
                    NotifyConfig::default()
                        .with_poll_interval(Duration::from_millis(watcher::POLL_INTERVAL_MS)),
                )
                .context("Failed to create fallback PollWatcher")?;
                Ok(Box::new(poll_watcher))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
