//! Command line interface
//!
//! `run` starts the border daemon; the other subcommands are one-shot tools
//! for checking and editing configuration.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{file, BorderStyle, MatchKind, RuleEntry, Settings};
use crate::constants;
use crate::matcher::{self, VisualSpec};
use crate::sources::{BranchSource, ConfigSource, GitBranchSource, ProjectFileSource, SettingsSource};

/// branch-border - Colors a window border by the checked-out git branch
#[derive(Parser)]
#[command(name = "branch-border")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project directory whose branch is shown (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Which configuration drives the border
    #[arg(long, global = true, value_enum, default_value_t = SourceKind::File)]
    pub source: SourceKind,

    /// Settings store location (default: ~/.config/branch-border/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// `.branch-colors.json` in the project root
    File,
    /// Per-user settings store
    Settings,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Draw the border and keep it in sync (default)
    Run {
        /// Log draw instructions instead of drawing
        #[arg(long)]
        headless: bool,

        /// Frame this X11 window instead of the whole screen (hex or decimal id)
        #[arg(long, value_name = "ID", value_parser = parse_window_id)]
        window: Option<u32>,
    },
    /// Print the border a branch would get
    Resolve {
        /// Branch name (default: the project's current branch)
        branch: Option<String>,
    },
    /// Check the active configuration and list its rules
    Validate,
    /// Edit the rules in the settings store
    Rules {
        #[command(subcommand)]
        action: RuleAction,
    },
    /// Show or change the settings store defaults
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
pub enum RuleAction {
    /// List rules in match order
    List,
    /// Append a rule
    Add(RuleArgs),
    /// Replace the rule at INDEX
    Update {
        index: usize,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Delete the rule at INDEX
    Remove { index: usize },
    /// Move a rule to another position
    Move { from: usize, to: usize },
}

#[derive(Args)]
pub struct RuleArgs {
    /// Branch name, prefix or regex
    pub pattern: String,

    /// How the pattern is matched (exact, prefix, regex)
    #[arg(long = "match", default_value = "exact")]
    pub match_type: MatchKind,

    /// Border color as #RRGGBB
    #[arg(long, default_value = "#FF0000")]
    pub color: String,

    /// Border style (solid, dashed); inherits the default when omitted
    #[arg(long)]
    pub style: Option<BorderStyle>,

    /// Blink the border; inherits the default when omitted
    #[arg(long)]
    pub blinking: Option<bool>,

    /// Blink interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub interval: Option<u32>,
}

impl RuleArgs {
    fn into_entry(self) -> RuleEntry {
        RuleEntry {
            pattern: self.pattern,
            match_type: self.match_type,
            color: self.color,
            border_style: self.style,
            blinking: self.blinking,
            blink_interval: self.interval,
        }
    }
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the settings store as JSON
    Show,
    /// Change one or more defaults
    Set(SettingsArgs),
    /// Replace defaults and rules with those of a `.branch-colors.json`
    Import {
        /// Rule file (default: the project's `.branch-colors.json`)
        path: Option<PathBuf>,
    },
    /// Restore the built-in defaults and drop all rules
    Reset,
}

#[derive(Args)]
pub struct SettingsArgs {
    #[arg(long)]
    pub enabled: Option<bool>,

    #[arg(long, value_name = "PX")]
    pub border_width: Option<i64>,

    #[arg(long, value_name = "MS")]
    pub blink_interval: Option<i64>,

    /// Color for branches without a matching rule (#RRGGBB)
    #[arg(long)]
    pub default_color: Option<String>,

    #[arg(long)]
    pub default_style: Option<BorderStyle>,

    #[arg(long)]
    pub default_blinking: Option<bool>,

    /// Draw nothing for branches without a matching rule
    #[arg(long)]
    pub no_border_if_unmatched: Option<bool>,
}

/// Everything `run` needs to start the daemon
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_dir: PathBuf,
    pub source: SourceKind,
    pub settings_path: PathBuf,
    pub headless: bool,
    pub window: Option<u32>,
}

impl RunOptions {
    pub fn branch_source(&self) -> Box<dyn BranchSource> {
        Box::new(GitBranchSource::new(&self.project_dir))
    }

    pub fn config_source(&self) -> Box<dyn ConfigSource> {
        match self.source {
            SourceKind::File => {
                let source = ProjectFileSource::new(&self.project_dir);
                debug!(path = %source.path().display(), "Using project rule file");
                Box::new(source)
            }
            SourceKind::Settings => {
                let source = SettingsSource::new(self.settings_path.clone());
                debug!(path = %source.path().display(), "Using settings store");
                Box::new(source)
            }
        }
    }

    fn project_file(&self) -> PathBuf {
        self.project_dir.join(constants::config::PROJECT_FILENAME)
    }
}

/// Result of CLI processing
pub enum CliResult {
    /// Start the daemon
    Run(RunOptions),
    /// A one-shot subcommand completed
    Done,
}

/// Parse arguments and run any one-shot subcommand
pub fn process_cli() -> Result<CliResult> {
    let cli = Cli::parse();

    let project_dir = match cli.project {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let mut options = RunOptions {
        project_dir,
        source: cli.source,
        settings_path: cli.settings.unwrap_or_else(Settings::default_path),
        headless: false,
        window: None,
    };

    match cli.command.unwrap_or(Commands::Run { headless: false, window: None }) {
        Commands::Run { headless, window } => {
            options.headless = headless;
            options.window = window;
            return Ok(CliResult::Run(options));
        }
        Commands::Resolve { branch } => resolve(&options, branch)?,
        Commands::Validate => validate(&options)?,
        Commands::Rules { action } => edit_rules(&options.settings_path, action)?,
        Commands::Settings { action } => edit_settings(&options, action)?,
    }
    Ok(CliResult::Done)
}

/// Accepts `0x1a00003` or `27262979`
pub fn parse_window_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid window id '{value}': {e}"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveReport {
    branch: Option<String>,
    configured: bool,
    matched_rule: Option<usize>,
    pattern: Option<String>,
    spec: VisualSpec,
}

fn resolve(options: &RunOptions, branch: Option<String>) -> Result<()> {
    let branch = branch.or_else(|| options.branch_source().current_branch());
    let rule_set = options.config_source().current_config();

    let matched = match (&branch, &rule_set) {
        (Some(name), Some(rule_set)) => matcher::matching_rule(name, rule_set),
        _ => None,
    };
    let report = ResolveReport {
        branch: branch.clone(),
        configured: rule_set.is_some(),
        matched_rule: matched.map(|(index, _)| index),
        pattern: matched.map(|(_, rule)| rule.pattern().to_string()),
        spec: match &rule_set {
            Some(rule_set) => matcher::resolve(branch.as_deref(), rule_set),
            None => VisualSpec::disabled(),
        },
    };
    println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
    Ok(())
}

fn validate(options: &RunOptions) -> Result<()> {
    let rule_set = match options.source {
        SourceKind::File => {
            let path = options.project_file();
            if !path.exists() {
                bail!("No rule file at {}", path.display());
            }
            file::load(&path)?
        }
        SourceKind::Settings => {
            let settings = Settings::load_from(&options.settings_path)?;
            let mut invalid = 0;
            for (index, entry) in settings.branch_rules.iter().enumerate() {
                if let Err(e) = entry.validate() {
                    println!("rule {index} ({}): {e:#}", entry.pattern);
                    invalid += 1;
                }
            }
            if invalid > 0 {
                bail!("{invalid} invalid rule(s) in {}", options.settings_path.display());
            }
            match settings.to_rule_set() {
                Some(rule_set) => rule_set,
                None => {
                    println!("Border disabled in {}", options.settings_path.display());
                    return Ok(());
                }
            }
        }
    };

    println!(
        "OK: {} rule(s), border {}px, blink interval {}ms",
        rule_set.rules.len(),
        rule_set.border_width_px(),
        rule_set.blink_interval_ms()
    );
    for (index, rule) in rule_set.rules.iter().enumerate() {
        let color = rule.color.map_or_else(|| "(invalid color)".to_string(), |c| c.to_string());
        println!("  {index}: {} {} {color}", rule.match_kind(), rule.pattern());
    }
    Ok(())
}

fn edit_rules(path: &Path, action: RuleAction) -> Result<()> {
    let mut settings = Settings::load_from(path)?;
    match action {
        RuleAction::List => {
            if settings.branch_rules.is_empty() {
                println!("No rules");
            }
            for (index, entry) in settings.branch_rules.iter().enumerate() {
                println!("{index}: {}", describe_rule(entry));
            }
            return Ok(());
        }
        RuleAction::Add(rule) => settings.add_rule(rule.into_entry())?,
        RuleAction::Update { index, rule } => settings.update_rule(index, rule.into_entry())?,
        RuleAction::Remove { index } => {
            let removed = settings.remove_rule(index)?;
            println!("Removed {}", describe_rule(&removed));
        }
        RuleAction::Move { from, to } => settings.move_rule(from, to)?,
    }
    settings.save_to(path)
}

fn describe_rule(entry: &RuleEntry) -> String {
    let mut text = format!("{} '{}' {}", entry.match_type, entry.pattern, entry.color);
    if let Some(style) = entry.border_style {
        text.push_str(&format!(" style={style}"));
    }
    if let Some(blinking) = entry.blinking {
        text.push_str(&format!(" blinking={blinking}"));
    }
    if let Some(interval) = entry.blink_interval {
        text.push_str(&format!(" interval={interval}ms"));
    }
    text
}

fn edit_settings(options: &RunOptions, action: SettingsAction) -> Result<()> {
    let path = &options.settings_path;
    let mut settings = Settings::load_from(path)?;
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?);
            return Ok(());
        }
        SettingsAction::Set(args) => apply_settings_args(&mut settings, args)?,
        SettingsAction::Import { path: source } => {
            let source = source.unwrap_or_else(|| options.project_file());
            let contents = std::fs::read_to_string(&source)
                .with_context(|| format!("Failed to read {}", source.display()))?;
            let rule_file = file::BranchColorsFile::parse(&contents)
                .with_context(|| format!("Invalid rule file {}", source.display()))?;
            let imported = settings.import_file(&rule_file);
            println!("Imported {imported} rule(s) from {}", source.display());
        }
        SettingsAction::Reset => settings = Settings::default(),
    }
    settings.save_to(path)
}

fn apply_settings_args(settings: &mut Settings, args: SettingsArgs) -> Result<()> {
    if let Some(color) = args.default_color {
        if crate::color::Rgb::parse(&color).is_none() {
            bail!("Invalid color '{color}', expected #RRGGBB");
        }
        settings.default_color = color;
    }
    if let Some(enabled) = args.enabled {
        settings.enabled = enabled;
    }
    if let Some(width) = args.border_width {
        settings.border_width = width;
    }
    if let Some(interval) = args.blink_interval {
        settings.blink_interval = interval;
    }
    if let Some(style) = args.default_style {
        settings.default_border_style = style;
    }
    if let Some(blinking) = args.default_blinking {
        settings.default_blinking = blinking;
    }
    if let Some(no_border) = args.no_border_if_unmatched {
        settings.no_border_if_unmatched = no_border;
    }
    Ok(())
}
