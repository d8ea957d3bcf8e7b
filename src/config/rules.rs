//! Rule set domain model
//!
//! A `RuleSet` is an immutable value: loaders build a fresh one on every
//! (re)load and the controller swaps it in as a whole.

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::color::Rgb;
use crate::constants::{defaults, validation};

/// How a rule's pattern is tested against a branch name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    #[default]
    Exact,
    Prefix,
    Regex,
}

impl FromStr for MatchKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "prefix" => Ok(Self::Prefix),
            "regex" => Ok(Self::Regex),
            other => bail!("Unknown match kind '{other}' (expected exact, prefix or regex)"),
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
            Self::Regex => "regex",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
}

impl FromStr for BorderStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solid" => Ok(Self::Solid),
            "dashed" => Ok(Self::Dashed),
            other => bail!("Unknown border style '{other}' (expected solid or dashed)"),
        }
    }
}

impl fmt::Display for BorderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Solid => "solid",
            Self::Dashed => "dashed",
        })
    }
}

/// One branch rule. Optional fields inherit the rule set defaults.
#[derive(Debug, Clone)]
pub struct BranchRule {
    pattern: String,
    match_kind: MatchKind,
    /// Anchored at both ends; `None` for non-regex rules and invalid patterns
    regex: Option<Regex>,
    /// `None` when the configured color string did not parse
    pub color: Option<Rgb>,
    pub border_style: Option<BorderStyle>,
    pub blinking: Option<bool>,
    blink_interval_ms: Option<u32>,
}

impl BranchRule {
    pub fn new(pattern: impl Into<String>, match_kind: MatchKind, color: Option<Rgb>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            bail!("Rule pattern cannot be empty");
        }
        let regex = match match_kind {
            MatchKind::Regex => full_match_regex(&pattern),
            MatchKind::Exact | MatchKind::Prefix => None,
        };
        Ok(Self {
            pattern,
            match_kind,
            regex,
            color,
            border_style: None,
            blinking: None,
            blink_interval_ms: None,
        })
    }

    pub fn with_style(mut self, style: Option<BorderStyle>) -> Self {
        self.border_style = style;
        self
    }

    pub fn with_blinking(mut self, blinking: Option<bool>) -> Self {
        self.blinking = blinking;
        self
    }

    pub fn with_blink_interval(mut self, interval_ms: Option<u32>) -> Self {
        self.blink_interval_ms = interval_ms.map(clamp_blink_interval);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn match_kind(&self) -> MatchKind {
        self.match_kind
    }

    /// Compiled pattern of a regex rule, `None` if it failed to compile
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn blink_interval_ms(&self) -> Option<u32> {
        self.blink_interval_ms
    }
}

// The compiled regex is derived from `pattern` and `match_kind`
impl PartialEq for BranchRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.match_kind == other.match_kind
            && self.color == other.color
            && self.border_style == other.border_style
            && self.blinking == other.blinking
            && self.blink_interval_ms == other.blink_interval_ms
    }
}

impl Eq for BranchRule {}

/// Compile `pattern` anchored at both ends. Invalid patterns never match.
fn full_match_regex(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .inspect_err(|e| warn!(pattern = %pattern, error = %e, "Invalid regex pattern, rule never matches"))
        .ok()
}

/// Ordered rules plus the global defaults they fall back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    border_width_px: u16,
    blink_interval_ms: u32,
    pub default_color: Option<Rgb>,
    pub default_style: BorderStyle,
    pub default_blinking: bool,
    pub no_border_if_unmatched: bool,
    pub rules: Vec<BranchRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            border_width_px: defaults::BORDER_WIDTH,
            blink_interval_ms: defaults::BLINK_INTERVAL_MS,
            default_color: None,
            default_style: BorderStyle::Solid,
            default_blinking: false,
            no_border_if_unmatched: false,
            rules: Vec::new(),
        }
    }
}

impl RuleSet {
    pub fn with_border_width(mut self, width_px: i64) -> Self {
        self.border_width_px = clamp_border_width(width_px);
        self
    }

    pub fn with_blink_interval(mut self, interval_ms: i64) -> Self {
        self.blink_interval_ms = clamp_blink_interval_wide(interval_ms);
        self
    }

    pub fn with_rules(mut self, rules: Vec<BranchRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn border_width_px(&self) -> u16 {
        self.border_width_px
    }

    pub fn blink_interval_ms(&self) -> u32 {
        self.blink_interval_ms
    }
}

fn clamp_border_width(width_px: i64) -> u16 {
    let min = validation::MIN_BORDER_WIDTH as i64;
    let max = validation::MAX_BORDER_WIDTH as i64;
    if width_px < min || width_px > max {
        let clamped = width_px.clamp(min, max);
        warn!(border_width = width_px, using = clamped, "borderWidth out of range, clamping");
        return clamped as u16;
    }
    width_px as u16
}

fn clamp_blink_interval(interval_ms: u32) -> u32 {
    clamp_blink_interval_wide(interval_ms as i64)
}

fn clamp_blink_interval_wide(interval_ms: i64) -> u32 {
    let min = validation::MIN_BLINK_INTERVAL_MS as i64;
    let max = validation::MAX_BLINK_INTERVAL_MS as i64;
    if interval_ms < min || interval_ms > max {
        let clamped = interval_ms.clamp(min, max);
        warn!(blink_interval = interval_ms, using = clamped, "blink interval out of range, clamping");
        return clamped as u32;
    }
    interval_ms as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_width_clamped() {
        assert_eq!(RuleSet::default().with_border_width(0).border_width_px(), 1);
        assert_eq!(RuleSet::default().with_border_width(-5).border_width_px(), 1);
        assert_eq!(RuleSet::default().with_border_width(99).border_width_px(), 20);
        assert_eq!(RuleSet::default().with_border_width(7).border_width_px(), 7);
    }

    #[test]
    fn test_blink_interval_clamped() {
        assert_eq!(RuleSet::default().with_blink_interval(10).blink_interval_ms(), 100);
        assert_eq!(RuleSet::default().with_blink_interval(60_000).blink_interval_ms(), 5000);
        assert_eq!(RuleSet::default().with_blink_interval(300).blink_interval_ms(), 300);
    }

    #[test]
    fn test_rule_interval_override_clamped() {
        let rule = BranchRule::new("main", MatchKind::Exact, None)
            .unwrap()
            .with_blink_interval(Some(50));
        assert_eq!(rule.blink_interval_ms(), Some(100));
    }

    #[test]
    fn test_regex_compiled_once_at_construction() {
        let rule = BranchRule::new("feature/.*", MatchKind::Regex, None).unwrap();
        let regex = rule.regex().unwrap();
        assert!(regex.is_match("feature/x"));
        assert!(!regex.is_match("my-feature/x"));

        assert!(BranchRule::new("feature/(", MatchKind::Regex, None).unwrap().regex().is_none());
        assert!(BranchRule::new("main", MatchKind::Exact, None).unwrap().regex().is_none());
    }

    #[test]
    fn test_rule_equality_ignores_compiled_regex() {
        let a = BranchRule::new("fix|hotfix", MatchKind::Regex, None).unwrap();
        assert_eq!(a.clone(), a);
        assert_ne!(a, BranchRule::new("fix|hotfix", MatchKind::Prefix, None).unwrap());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(BranchRule::new("", MatchKind::Prefix, None).is_err());
    }

    #[test]
    fn test_kind_and_style_from_str() {
        assert_eq!("Regex".parse::<MatchKind>().unwrap(), MatchKind::Regex);
        assert!("glob".parse::<MatchKind>().is_err());
        assert_eq!("DASHED".parse::<BorderStyle>().unwrap(), BorderStyle::Dashed);
        assert!("dotted".parse::<BorderStyle>().is_err());
    }
}
