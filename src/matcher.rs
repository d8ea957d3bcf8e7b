//! Branch to border resolution
//!
//! `resolve` is a pure function of the branch name and the rule set: the
//! first rule whose pattern accepts the branch decides the border, otherwise
//! the rule set defaults apply.

use serde::Serialize;

use crate::color::Rgb;
use crate::config::{BorderStyle, BranchRule, MatchKind, RuleSet};
use crate::constants::defaults;

/// Resolved rendering instruction for one (branch, rule set) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSpec {
    /// `None` means no border is drawn
    pub color: Option<Rgb>,
    pub width_px: u16,
    pub style: BorderStyle,
    pub blinking: bool,
    pub blink_interval_ms: u32,
}

impl VisualSpec {
    /// Spec used while no rule set is active
    pub const fn disabled() -> Self {
        Self {
            color: None,
            width_px: defaults::BORDER_WIDTH,
            style: BorderStyle::Solid,
            blinking: false,
            blink_interval_ms: defaults::BLINK_INTERVAL_MS,
        }
    }

    /// Whether the blink timer should run for this border
    pub fn blinks(&self) -> bool {
        self.blinking && self.color.is_some()
    }
}

pub fn resolve(branch: Option<&str>, rule_set: &RuleSet) -> VisualSpec {
    match branch.and_then(|name| matching_rule(name, rule_set)) {
        Some((_, rule)) => VisualSpec {
            color: rule.color,
            width_px: rule_set.border_width_px(),
            style: rule.border_style.unwrap_or(rule_set.default_style),
            blinking: rule.blinking.unwrap_or(rule_set.default_blinking),
            blink_interval_ms: rule
                .blink_interval_ms()
                .unwrap_or(rule_set.blink_interval_ms()),
        },
        None => default_spec(rule_set),
    }
}

/// First rule accepting `branch`, with its position in the list
pub fn matching_rule<'a>(branch: &str, rule_set: &'a RuleSet) -> Option<(usize, &'a BranchRule)> {
    rule_set
        .rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule_accepts(rule, branch))
}

pub fn rule_accepts(rule: &BranchRule, branch: &str) -> bool {
    match rule.match_kind() {
        MatchKind::Exact => branch == rule.pattern(),
        MatchKind::Prefix => branch.starts_with(rule.pattern()),
        MatchKind::Regex => rule.regex().is_some_and(|re| re.is_match(branch)),
    }
}

fn default_spec(rule_set: &RuleSet) -> VisualSpec {
    VisualSpec {
        color: if rule_set.no_border_if_unmatched {
            None
        } else {
            rule_set.default_color
        },
        width_px: rule_set.border_width_px(),
        style: rule_set.default_style,
        blinking: rule_set.default_blinking,
        blink_interval_ms: rule_set.blink_interval_ms(),
    }
}
