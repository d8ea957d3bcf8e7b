//! Project rule file (`.branch-colors.json`)
//!
//! Lives in the project root next to the repository it colors. Unknown keys
//! are ignored; a rule without `pattern` or `color` fails the whole load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::color::parse_logged;
use crate::config::rules::{BorderStyle, BranchRule, RuleSet};
use crate::constants::defaults;

/// Blink block, used both globally and per rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRule {
    pub pattern: String,
    #[serde(rename = "match", default = "default_match")]
    pub match_kind: String,
    pub color: String,
    #[serde(rename = "borderStyle", default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinking: Option<BlinkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchColorsFile {
    #[serde(default = "default_border_width")]
    pub border_width: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(default)]
    pub no_border_if_unmatched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinking: Option<BlinkingConfig>,
    #[serde(default)]
    pub branches: Vec<FileRule>,
}

fn default_match() -> String {
    "exact".to_string()
}

fn default_border_width() -> i64 {
    defaults::BORDER_WIDTH as i64
}

impl BranchColorsFile {
    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse branch colors JSON")
    }

    /// Build the immutable rule set. Rules with an unknown match kind or an
    /// empty pattern are skipped; everything else keeps its file order.
    pub fn into_rule_set(self) -> RuleSet {
        let default_interval = self
            .blinking
            .as_ref()
            .and_then(|b| b.interval)
            .unwrap_or(defaults::BLINK_INTERVAL_MS as i64);

        let mut rule_set = RuleSet::default()
            .with_border_width(self.border_width)
            .with_blink_interval(default_interval);
        rule_set.default_color = self.default_color.as_deref().and_then(|c| parse_logged("defaultColor", c));
        rule_set.default_style = self.border_style.unwrap_or_default();
        rule_set.default_blinking = self.blinking.as_ref().is_some_and(|b| b.enabled);
        rule_set.no_border_if_unmatched = self.no_border_if_unmatched;

        let mut rules = Vec::with_capacity(self.branches.len());
        for (index, file_rule) in self.branches.into_iter().enumerate() {
            match file_rule.into_rule() {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(index = index, error = %e, "Skipping branch rule"),
            }
        }
        rule_set.with_rules(rules)
    }
}

impl FileRule {
    fn into_rule(self) -> Result<BranchRule> {
        let match_kind = self.match_kind.parse()?;
        let color = parse_logged("color", &self.color);
        let interval = self
            .blinking
            .as_ref()
            .and_then(|b| b.interval)
            .map(|ms| ms.clamp(0, u32::MAX as i64) as u32);
        Ok(BranchRule::new(self.pattern, match_kind, color)
            .context("Invalid branch rule")?
            .with_style(self.border_style)
            .with_blinking(self.blinking.map(|b| b.enabled))
            .with_blink_interval(interval))
    }
}

/// Read and convert a rule file
pub fn load(path: &Path) -> Result<RuleSet> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file = BranchColorsFile::parse(&contents)
        .with_context(|| format!("Invalid rule file {}", path.display()))?;
    let rule_set = file.into_rule_set();
    info!(
        path = %path.display(),
        rules = rule_set.rules.len(),
        border_width = rule_set.border_width_px(),
        "Loaded branch colors config"
    );
    Ok(rule_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::config::rules::MatchKind;

    const SAMPLE: &str = r##"{
      "borderWidth": 4,
      "defaultColor": "#FF6600",
      "blinking": { "enabled": false, "interval": 500 },
      "branches": [
        { "pattern": "main", "match": "exact", "color": "#FF0000", "blinking": { "enabled": true, "interval": 300 } },
        { "pattern": "release/", "match": "prefix", "color": "#FFA500" },
        { "pattern": "feature/.*", "match": "regex", "color": "#00AA00" }
      ]
    }"##;

    #[test]
    fn test_sample_file() {
        let rule_set = BranchColorsFile::parse(SAMPLE).unwrap().into_rule_set();
        assert_eq!(rule_set.border_width_px(), 4);
        assert_eq!(rule_set.blink_interval_ms(), 500);
        assert_eq!(rule_set.default_color, Some(Rgb::from_rgb24(0xFF6600)));
        assert!(!rule_set.default_blinking);

        let patterns: Vec<&str> = rule_set.rules.iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns, vec!["main", "release/", "feature/.*"]);

        let main = &rule_set.rules[0];
        assert_eq!(main.match_kind(), MatchKind::Exact);
        assert_eq!(main.blinking, Some(true));
        assert_eq!(main.blink_interval_ms(), Some(300));
        assert_eq!(rule_set.rules[1].blinking, None);
        assert_eq!(rule_set.rules[2].match_kind(), MatchKind::Regex);
    }

    #[test]
    fn test_missing_match_defaults_to_exact_and_unknown_fields_ignored() {
        let json = r##"{ "comment": "hi", "branches": [ { "pattern": "dev", "color": "#00FF00", "extra": 1 } ] }"##;
        let rule_set = BranchColorsFile::parse(json).unwrap().into_rule_set();
        assert_eq!(rule_set.rules.len(), 1);
        assert_eq!(rule_set.rules[0].match_kind(), MatchKind::Exact);
        assert_eq!(rule_set.border_width_px(), 4);
        assert_eq!(rule_set.default_color, None);
    }

    #[test]
    fn test_unknown_match_kind_skipped_order_kept() {
        let json = r##"{ "branches": [
            { "pattern": "a", "color": "#000001" },
            { "pattern": "b", "match": "glob", "color": "#000002" },
            { "pattern": "c", "match": "prefix", "color": "#000003" }
        ] }"##;
        let rule_set = BranchColorsFile::parse(json).unwrap().into_rule_set();
        let patterns: Vec<&str> = rule_set.rules.iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns, vec!["a", "c"]);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let json = r##"{ "borderWidth": 50, "blinking": { "enabled": true, "interval": 5 } }"##;
        let rule_set = BranchColorsFile::parse(json).unwrap().into_rule_set();
        assert_eq!(rule_set.border_width_px(), 20);
        assert_eq!(rule_set.blink_interval_ms(), 100);
        assert!(rule_set.default_blinking);
    }

    #[test]
    fn test_bad_color_kept_as_absent() {
        let json = r##"{ "defaultColor": "orange", "branches": [ { "pattern": "main", "color": "red" } ] }"##;
        let rule_set = BranchColorsFile::parse(json).unwrap().into_rule_set();
        assert_eq!(rule_set.default_color, None);
        assert_eq!(rule_set.rules.len(), 1);
        assert_eq!(rule_set.rules[0].color, None);
    }

    #[test]
    fn test_malformed_json_and_missing_required_fields_fail() {
        assert!(BranchColorsFile::parse("{ not json").is_err());
        assert!(BranchColorsFile::parse(r#"{ "branches": [ { "pattern": "main" } ] }"#).is_err());
        assert!(BranchColorsFile::parse(r##"{ "branches": [ { "color": "#FF0000" } ] }"##).is_err());
    }

    #[test]
    fn test_style_fields() {
        let json = r##"{ "borderStyle": "dashed", "branches": [ { "pattern": "x", "color": "#010203", "borderStyle": "solid" } ] }"##;
        let rule_set = BranchColorsFile::parse(json).unwrap().into_rule_set();
        assert_eq!(rule_set.default_style, BorderStyle::Dashed);
        assert_eq!(rule_set.rules[0].border_style, Some(BorderStyle::Solid));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".branch-colors.json");
        fs::write(&path, SAMPLE).unwrap();
        let rule_set = load(&path).unwrap();
        assert_eq!(rule_set.rules.len(), 3);

        assert!(load(&dir.path().join("missing.json")).is_err());
    }
}
