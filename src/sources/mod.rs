//! Input collaborators: where the branch name and the rule set come from.
//!
//! Sources do their own (possibly blocking) I/O on watcher threads and only
//! talk to the controller through an `EventSender`.

pub mod config;
pub mod git;
pub mod watcher;

use anyhow::Result;

use crate::config::RuleSet;
use crate::controller::EventSender;

pub use config::{ProjectFileSource, SettingsSource};
pub use git::GitBranchSource;

/// Reports the checked-out branch of one repository
pub trait BranchSource: Send {
    /// Snapshot of the current branch, `None` without a repository or on a detached HEAD
    fn current_branch(&self) -> Option<String>;

    /// Start reporting changes. Sends the current value once immediately.
    fn subscribe(&mut self, events: EventSender) -> Result<()>;

    /// Stop reporting changes. Idempotent.
    fn unsubscribe(&mut self);
}

/// Supplies the active rule set
pub trait ConfigSource: Send {
    /// Snapshot of the configuration, `None` when there is none (or it is disabled)
    fn current_config(&self) -> Option<RuleSet>;

    /// Start reporting changes. Sends the current value once immediately.
    /// Loads that fail are logged and not reported, so the last good rule
    /// set stays active.
    fn subscribe(&mut self, events: EventSender) -> Result<()>;

    /// Stop reporting changes. Idempotent.
    fn unsubscribe(&mut self);
}
