//! Configuration for branch-border
//!
//! This module provides the rule model plus its two on-disk sources:
//! - **file**: the project-level `.branch-colors.json`
//! - **settings**: the per-user settings store

pub mod file;
pub mod rules;
pub mod settings;

// Re-export commonly used types
pub use rules::{BorderStyle, BranchRule, MatchKind, RuleSet};
pub use settings::{RuleEntry, Settings};
