//! Branch detection from the repository's `HEAD` file

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::watcher::FileWatcher;
use super::BranchSource;
use crate::constants::git;
use crate::controller::EventSender;

/// Locate the git directory for `start`, walking up through its ancestors.
///
/// Handles both a `.git` directory and the `.git` file (`gitdir: <path>`)
/// used by worktrees and submodules.
pub fn find_git_dir(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let dot_git = dir.join(git::DOT_GIT);
        if dot_git.is_dir() {
            return Some(dot_git);
        }
        if dot_git.is_file() {
            return match resolve_gitdir_file(&dot_git) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(path = %dot_git.display(), error = ?e, "Unreadable .git file");
                    None
                }
            };
        }
    }
    None
}

fn resolve_gitdir_file(dot_git: &Path) -> Result<PathBuf> {
    let contents = fs::read_to_string(dot_git)
        .with_context(|| format!("Failed to read {}", dot_git.display()))?;
    let target = contents
        .lines()
        .find_map(|line| line.strip_prefix(git::GITDIR_PREFIX))
        .map(str::trim)
        .with_context(|| format!("No gitdir line in {}", dot_git.display()))?;
    let target = Path::new(target);
    Ok(if target.is_absolute() {
        target.to_path_buf()
    } else {
        dot_git.parent().unwrap_or_else(|| Path::new(".")).join(target)
    })
}

/// Branch named by a `HEAD` file's contents, `None` for a detached HEAD
pub fn parse_head(contents: &str) -> Option<String> {
    contents
        .trim()
        .strip_prefix(git::BRANCH_REF_PREFIX)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn read_branch(git_dir: &Path) -> Option<String> {
    let head = git_dir.join(git::HEAD_FILE);
    match fs::read_to_string(&head) {
        Ok(contents) => parse_head(&contents),
        Err(e) => {
            debug!(path = %head.display(), error = %e, "Cannot read HEAD");
            None
        }
    }
}

/// Branch source for the repository containing the project directory
pub struct GitBranchSource {
    git_dir: Option<PathBuf>,
    watcher: Option<FileWatcher>,
}

impl GitBranchSource {
    pub fn new(project_dir: &Path) -> Self {
        let git_dir = find_git_dir(project_dir);
        match &git_dir {
            Some(dir) => info!(git_dir = %dir.display(), "Found git repository"),
            None => warn!(project = %project_dir.display(), "No git repository found, branch is unknown"),
        }
        Self { git_dir, watcher: None }
    }

    pub fn git_dir(&self) -> Option<&Path> {
        self.git_dir.as_deref()
    }
}

impl BranchSource for GitBranchSource {
    fn current_branch(&self) -> Option<String> {
        self.git_dir.as_deref().and_then(read_branch)
    }

    fn subscribe(&mut self, events: EventSender) -> Result<()> {
        self.unsubscribe();

        let Some(git_dir) = self.git_dir().map(Path::to_path_buf) else {
            events.branch_changed(None);
            return Ok(());
        };

        // Reads and sends happen under this lock so the initial value and
        // watcher callbacks reach the controller in the order they were read.
        // Only actual branch switches are reported, not every HEAD rewrite.
        let last: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let watcher = {
            let git_dir = git_dir.clone();
            let last = last.clone();
            let events = events.clone();
            FileWatcher::new(&git_dir.join(git::HEAD_FILE), move || {
                let Ok(mut last) = last.lock() else { return };
                let branch = read_branch(&git_dir);
                if *last != branch {
                    info!(from = ?*last, to = ?branch, "Branch changed");
                    *last = branch.clone();
                    events.branch_changed(branch);
                }
            })
            .context("Failed to watch git HEAD")?
        };

        // Watch first, then snapshot, so a switch in between is not lost
        match last.lock() {
            Ok(mut last) => {
                let branch = read_branch(&git_dir);
                *last = branch.clone();
                events.branch_changed(branch);
            }
            Err(_) => events.branch_changed(read_branch(&git_dir)),
        }
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            debug!(path = %watcher.path().display(), "Stopped watching HEAD");
        }
    }
}
