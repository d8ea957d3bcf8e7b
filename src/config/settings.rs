//! Per-user settings store
//!
//! Structured alternative to the project rule file. Stored as JSON under the
//! user's config directory and edited through the `rules`/`settings`
//! subcommands. Loading always produces a complete value; missing keys fall
//! back to defaults.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::color::{parse_logged, Rgb};
use crate::config::file::BranchColorsFile;
use crate::config::rules::{BorderStyle, BranchRule, MatchKind, RuleSet};
use crate::constants::{self, defaults};

/// One rule as stored in the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchKind,
    #[serde(default = "default_rule_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blink_interval: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_border_width")]
    pub border_width: i64,
    #[serde(default = "default_blink_interval")]
    pub blink_interval: i64,
    #[serde(default = "default_color")]
    pub default_color: String,
    #[serde(default)]
    pub default_border_style: BorderStyle,
    #[serde(default)]
    pub default_blinking: bool,
    #[serde(default)]
    pub no_border_if_unmatched: bool,
    #[serde(default)]
    pub branch_rules: Vec<RuleEntry>,
}

fn default_enabled() -> bool {
    true
}

fn default_border_width() -> i64 {
    defaults::BORDER_WIDTH as i64
}

fn default_blink_interval() -> i64 {
    defaults::BLINK_INTERVAL_MS as i64
}

fn default_color() -> String {
    defaults::SETTINGS_DEFAULT_COLOR.to_string()
}

fn default_rule_color() -> String {
    "#FF0000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            border_width: default_border_width(),
            blink_interval: default_blink_interval(),
            default_color: default_color(),
            default_border_style: BorderStyle::Solid,
            default_blinking: false,
            no_border_if_unmatched: false,
            branch_rules: Vec::new(),
        }
    }
}

impl Settings {
    /// `~/.config/branch-border/settings.json` (or `./` when there is no config dir)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::SETTINGS_FILENAME);
        path
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read settings file {}", path.display())),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings to JSON")?;
        // Write-then-rename so watchers never observe a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .context(format!("Failed to write settings file to {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .context(format!("Failed to move settings file into place at {}", path.display()))?;
        info!(path = %path.display(), rules = self.branch_rules.len(), "Saved settings");
        Ok(())
    }

    /// Active rule set, or `None` when the border is switched off
    pub fn to_rule_set(&self) -> Option<RuleSet> {
        if !self.enabled {
            return None;
        }

        let mut rule_set = RuleSet::default()
            .with_border_width(self.border_width)
            .with_blink_interval(self.blink_interval);
        rule_set.default_color = parse_logged("defaultColor", &self.default_color);
        rule_set.default_style = self.default_border_style;
        rule_set.default_blinking = self.default_blinking;
        rule_set.no_border_if_unmatched = self.no_border_if_unmatched;

        let rules = self
            .branch_rules
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry
                    .to_rule()
                    .inspect_err(|e| warn!(index = index, error = %e, "Skipping settings rule"))
                    .ok()
            })
            .collect();
        Some(rule_set.with_rules(rules))
    }

    /// Validate and append a rule
    pub fn add_rule(&mut self, entry: RuleEntry) -> Result<()> {
        entry.validate()?;
        self.branch_rules.push(entry);
        Ok(())
    }

    /// Replace the rule at `index`
    pub fn update_rule(&mut self, index: usize, entry: RuleEntry) -> Result<()> {
        entry.validate()?;
        let len = self.branch_rules.len();
        let slot = self
            .branch_rules
            .get_mut(index)
            .with_context(|| format!("No rule at index {index} ({len} rules)"))?;
        *slot = entry;
        Ok(())
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<RuleEntry> {
        if index >= self.branch_rules.len() {
            bail!("No rule at index {index} ({} rules)", self.branch_rules.len());
        }
        Ok(self.branch_rules.remove(index))
    }

    /// Replace the defaults and rules with those of a project rule file.
    /// Rules with an unknown match kind are dropped; `enabled` is untouched.
    pub fn import_file(&mut self, file: &BranchColorsFile) -> usize {
        self.border_width = file.border_width;
        if let Some(color) = &file.default_color {
            self.default_color = color.clone();
        }
        self.default_border_style = file.border_style.unwrap_or_default();
        self.no_border_if_unmatched = file.no_border_if_unmatched;
        if let Some(blinking) = &file.blinking {
            self.default_blinking = blinking.enabled;
            if let Some(interval) = blinking.interval {
                self.blink_interval = interval;
            }
        }

        self.branch_rules = file
            .branches
            .iter()
            .filter_map(|rule| {
                let match_type = rule
                    .match_kind
                    .parse()
                    .inspect_err(|e| warn!(pattern = %rule.pattern, error = %e, "Not importing rule"))
                    .ok()?;
                Some(RuleEntry {
                    pattern: rule.pattern.clone(),
                    match_type,
                    color: rule.color.clone(),
                    border_style: rule.border_style,
                    blinking: rule.blinking.as_ref().map(|b| b.enabled),
                    blink_interval: rule
                        .blinking
                        .as_ref()
                        .and_then(|b| b.interval)
                        .map(|ms| ms.clamp(0, u32::MAX as i64) as u32),
                })
            })
            .collect();
        info!(rules = self.branch_rules.len(), "Imported branch colors config");
        self.branch_rules.len()
    }

    /// Move a rule to a new position; later rules shift to make room
    pub fn move_rule(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.branch_rules.len();
        if from >= len || to >= len {
            bail!("Rule index out of range (from {from}, to {to}, {len} rules)");
        }
        let entry = self.branch_rules.remove(from);
        self.branch_rules.insert(to, entry);
        Ok(())
    }
}

impl RuleEntry {
    /// Checks the rule editor enforced: non-empty pattern, compilable regex,
    /// parseable color
    pub fn validate(&self) -> Result<()> {
        if self.pattern.trim().is_empty() {
            bail!("Pattern cannot be empty");
        }
        if self.match_type == MatchKind::Regex {
            regex::Regex::new(&self.pattern)
                .with_context(|| format!("Invalid regex pattern '{}'", self.pattern))?;
        }
        if Rgb::parse(&self.color).is_none() {
            bail!("Invalid color '{}', expected #RRGGBB", self.color);
        }
        Ok(())
    }

    fn to_rule(&self) -> Result<BranchRule> {
        let color = parse_logged("color", &self.color);
        Ok(BranchRule::new(self.pattern.clone(), self.match_type, color)?
            .with_style(self.border_style)
            .with_blinking(self.blinking)
            .with_blink_interval(self.blink_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pattern: &str, match_type: MatchKind, color: &str) -> RuleEntry {
        RuleEntry {
            pattern: pattern.to_string(),
            match_type,
            color: color.to_string(),
            border_style: None,
            blinking: None,
            blink_interval: None,
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());

        let rule_set = settings.to_rule_set().unwrap();
        assert_eq!(rule_set.default_color, Some(Rgb::from_rgb24(0xFF6600)));
        assert_eq!(rule_set.border_width_px(), 4);
        assert_eq!(rule_set.blink_interval_ms(), 500);
    }

    #[test]
    fn test_save_load_roundtrip_preserves_rule_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.add_rule(entry("main", MatchKind::Exact, "#FF0000")).unwrap();
        settings.add_rule(entry("release/", MatchKind::Prefix, "#FFA500")).unwrap();
        settings.add_rule(entry("feature/.*", MatchKind::Regex, "#00AA00")).unwrap();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        let patterns: Vec<&str> = loaded.branch_rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["main", "release/", "feature/.*"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_disabled_settings_produce_no_rule_set() {
        let settings = Settings { enabled: false, ..Settings::default() };
        assert!(settings.to_rule_set().is_none());
    }

    #[test]
    fn test_add_rule_validation() {
        let mut settings = Settings::default();
        assert!(settings.add_rule(entry("  ", MatchKind::Exact, "#FF0000")).is_err());
        assert!(settings.add_rule(entry("feature/(", MatchKind::Regex, "#FF0000")).is_err());
        assert!(settings.add_rule(entry("main", MatchKind::Exact, "red")).is_err());
        assert!(settings.branch_rules.is_empty());
    }

    #[test]
    fn test_move_update_and_remove() {
        let mut settings = Settings::default();
        for p in ["a", "b", "c"] {
            settings.add_rule(entry(p, MatchKind::Exact, "#000000")).unwrap();
        }

        settings.move_rule(2, 0).unwrap();
        let order: Vec<&str> = settings.branch_rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        settings.update_rule(1, entry("z", MatchKind::Prefix, "#111111")).unwrap();
        assert_eq!(settings.branch_rules[1].pattern, "z");

        let removed = settings.remove_rule(0).unwrap();
        assert_eq!(removed.pattern, "c");
        assert_eq!(settings.branch_rules.len(), 2);

        assert!(settings.remove_rule(5).is_err());
        assert!(settings.move_rule(0, 9).is_err());
        assert!(settings.update_rule(7, entry("q", MatchKind::Exact, "#000000")).is_err());
    }

    #[test]
    fn test_partial_json_and_clamping() {
        let json = r##"{ "borderWidth": 0, "blinkInterval": 9000, "defaultBorderStyle": "dashed",
            "branchRules": [ { "pattern": "main", "matchType": "exact", "color": "#FF0000", "blinking": true } ] }"##;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert!(settings.enabled);

        let rule_set = settings.to_rule_set().unwrap();
        assert_eq!(rule_set.border_width_px(), 1);
        assert_eq!(rule_set.blink_interval_ms(), 5000);
        assert_eq!(rule_set.default_style, BorderStyle::Dashed);
        assert_eq!(rule_set.rules[0].blinking, Some(true));
    }

    #[test]
    fn test_import_project_file() {
        let file = BranchColorsFile::parse(
            r##"{ "borderWidth": 6, "defaultColor": "#123456",
                  "blinking": { "enabled": true, "interval": 700 },
                  "branches": [
                    { "pattern": "main", "color": "#FF0000", "blinking": { "enabled": true, "interval": 300 } },
                    { "pattern": "x", "match": "glob", "color": "#000000" },
                    { "pattern": "release/", "match": "prefix", "color": "#FFA500", "borderStyle": "dashed" }
                  ] }"##,
        )
        .unwrap();

        let mut settings = Settings { enabled: false, ..Settings::default() };
        settings.add_rule(entry("old", MatchKind::Exact, "#000000")).unwrap();
        assert_eq!(settings.import_file(&file), 2);

        assert!(!settings.enabled);
        assert_eq!(settings.border_width, 6);
        assert_eq!(settings.default_color, "#123456");
        assert!(settings.default_blinking);
        assert_eq!(settings.blink_interval, 700);
        assert_eq!(settings.branch_rules[0].blink_interval, Some(300));
        assert_eq!(settings.branch_rules[1].match_type, MatchKind::Prefix);
        assert_eq!(settings.branch_rules[1].border_style, Some(BorderStyle::Dashed));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"enabled\": ").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
