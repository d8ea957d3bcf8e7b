//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Config file locations
pub mod config {
    /// Directory under the user's config dir holding the settings store
    pub const APP_DIR: &str = "branch-border";

    /// Settings store filename
    pub const SETTINGS_FILENAME: &str = "settings.json";

    /// Project-level rule file, looked up in the project root
    pub const PROJECT_FILENAME: &str = ".branch-colors.json";
}

/// Value ranges enforced when a rule set is built
pub mod validation {
    pub const MIN_BORDER_WIDTH: u16 = 1;
    pub const MAX_BORDER_WIDTH: u16 = 20;

    pub const MIN_BLINK_INTERVAL_MS: u32 = 100;
    pub const MAX_BLINK_INTERVAL_MS: u32 = 5000;
}

/// Built-in defaults
pub mod defaults {
    pub const BORDER_WIDTH: u16 = 4;

    pub const BLINK_INTERVAL_MS: u32 = 500;

    /// Default color of a fresh settings store (orange)
    pub const SETTINGS_DEFAULT_COLOR: &str = "#FF6600";
}

/// Git repository layout
pub mod git {
    pub const DOT_GIT: &str = ".git";

    pub const HEAD_FILE: &str = "HEAD";

    /// Prefix of a symbolic HEAD pointing at a local branch
    pub const BRANCH_REF_PREFIX: &str = "ref: refs/heads/";

    /// Prefix of a `.git` file in a worktree or submodule
    pub const GITDIR_PREFIX: &str = "gitdir:";
}

/// Dashed border pattern (pixels)
pub mod dash {
    pub const SEGMENT: u16 = 10;
    pub const GAP: u16 = 5;
}

/// File watcher tuning
pub mod watcher {
    /// Poll interval used when the native backend is unavailable
    pub const POLL_INTERVAL_MS: u64 = 500;
}

/// X11 protocol constants
pub mod x11 {
    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// WM_CLASS for the border strips (instance\0class\0)
    pub const WM_CLASS: &[u8] = b"branch-border\0BranchBorder\0";
}
