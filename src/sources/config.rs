//! Config sources: the project rule file and the per-user settings store.
//!
//! Only one of them is authoritative for a run; the CLI picks which.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use super::watcher::FileWatcher;
use super::ConfigSource;
use crate::config::{file, RuleSet, Settings};
use crate::constants;
use crate::controller::EventSender;

/// Result of reading a source's backing file
#[derive(Debug)]
enum Snapshot {
    /// Loaded (or intentionally empty: file deleted, border disabled)
    Config(Option<RuleSet>),
    /// File exists but could not be loaded; keep what we have
    Invalid,
}

fn read_project_file(path: &Path) -> Snapshot {
    if !path.exists() {
        return Snapshot::Config(None);
    }
    match file::load(path) {
        Ok(rule_set) => Snapshot::Config(Some(rule_set)),
        Err(e) => {
            error!(path = %path.display(), error = ?e, "Failed to load branch colors config, keeping previous");
            Snapshot::Invalid
        }
    }
}

fn read_settings(path: &Path) -> Snapshot {
    match Settings::load_from(path) {
        Ok(settings) => {
            if !settings.enabled {
                info!(path = %path.display(), "Branch border disabled in settings");
            }
            Snapshot::Config(settings.to_rule_set())
        }
        Err(e) => {
            error!(path = %path.display(), error = ?e, "Failed to load settings, keeping previous");
            Snapshot::Invalid
        }
    }
}

/// Shared watch plumbing for both file-backed sources
struct WatchedFile {
    path: PathBuf,
    read: fn(&Path) -> Snapshot,
    watcher: Option<FileWatcher>,
}

impl WatchedFile {
    fn current(&self) -> Option<RuleSet> {
        match (self.read)(&self.path) {
            Snapshot::Config(config) => config,
            Snapshot::Invalid => None,
        }
    }

    fn subscribe(&mut self, events: EventSender) -> Result<()> {
        self.unsubscribe();

        // Reads and sends are serialized so a reload racing the initial
        // snapshot cannot be overtaken by the older value
        let order = Arc::new(Mutex::new(()));
        let watcher = {
            let path = self.path.clone();
            let read = self.read;
            let order = order.clone();
            let events = events.clone();
            FileWatcher::new(&self.path, move || {
                let _guard = order.lock();
                if let Snapshot::Config(config) = read(&path) {
                    debug!(path = %path.display(), present = config.is_some(), "Config reloaded");
                    events.config_changed(config);
                }
            })
            .with_context(|| format!("Failed to watch {}", self.path.display()))?
        };

        // Watch first, then snapshot, so a save in between is not lost
        {
            let _guard = order.lock();
            if let Snapshot::Config(config) = (self.read)(&self.path) {
                events.config_changed(config);
            }
        }
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if self.watcher.take().is_some() {
            debug!(path = %self.path.display(), "Stopped watching config");
        }
    }
}

/// `.branch-colors.json` in the project root
pub struct ProjectFileSource {
    inner: WatchedFile,
}

impl ProjectFileSource {
    pub fn new(project_dir: &Path) -> Self {
        Self::at(project_dir.join(constants::config::PROJECT_FILENAME))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            inner: WatchedFile { path, read: read_project_file, watcher: None },
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl ConfigSource for ProjectFileSource {
    fn current_config(&self) -> Option<RuleSet> {
        self.inner.current()
    }

    fn subscribe(&mut self, events: EventSender) -> Result<()> {
        self.inner.subscribe(events)
    }

    fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

/// Per-user settings store
pub struct SettingsSource {
    inner: WatchedFile,
}

impl SettingsSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            inner: WatchedFile { path, read: read_settings, watcher: None },
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

impl ConfigSource for SettingsSource {
    fn current_config(&self) -> Option<RuleSet> {
        self.inner.current()
    }

    fn subscribe(&mut self, events: EventSender) -> Result<()> {
        // The settings directory may not exist before the first save
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        self.inner.subscribe(events)
    }

    fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControlEvent;
    use std::fs;
    use std::time::{Duration, Instant};
    use tokio::sync::mpsc;

    /// Wait for the first config event accepted by `wanted`, skipping others
    fn wait_for_config(
        rx: &mut mpsc::UnboundedReceiver<ControlEvent>,
        wanted: impl Fn(&Option<RuleSet>) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(ControlEvent::ConfigChanged(config)) if wanted(&config) => return true,
                Ok(_) => {}
                Err(_) => std::thread::sleep(Duration::from_millis(20)),
            }
        }
        false
    }

    const RULES: &str = r##"{ "defaultColor": "#FF6600", "branches": [ { "pattern": "main", "color": "#FF0000" } ] }"##;

    #[test]
    fn test_project_file_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProjectFileSource::new(dir.path());
        assert!(source.path().ends_with(".branch-colors.json"));
        assert!(source.current_config().is_none());
    }

    #[test]
    fn test_project_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".branch-colors.json"), RULES).unwrap();
        let rule_set = ProjectFileSource::new(dir.path()).current_config().unwrap();
        assert_eq!(rule_set.rules.len(), 1);
    }

    #[test]
    fn test_invalid_project_file_not_reported_on_subscribe() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".branch-colors.json"), "{ broken").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut source = ProjectFileSource::new(dir.path());
        assert!(source.current_config().is_none());
        source.subscribe(EventSender::new(tx)).unwrap();
        assert!(rx.try_recv().is_err());
        source.unsubscribe();
    }

    #[test]
    fn test_subscribe_reports_current_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".branch-colors.json"), RULES).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut source = ProjectFileSource::new(dir.path());
        source.subscribe(EventSender::new(tx)).unwrap();
        match rx.try_recv() {
            Ok(ControlEvent::ConfigChanged(Some(rule_set))) => assert_eq!(rule_set.rules.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_settings_source_defaults_and_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("branch-border").join("settings.json");

        let source = SettingsSource::new(path.clone());
        assert!(source.current_config().is_some());

        let settings = Settings { enabled: false, ..Settings::default() };
        settings.save_to(&path).unwrap();
        assert!(source.current_config().is_none());
    }

    #[test]
    fn test_settings_subscribe_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("settings.json");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut source = SettingsSource::new(path.clone());
        source.subscribe(EventSender::new(tx)).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(matches!(rx.try_recv(), Ok(ControlEvent::ConfigChanged(Some(_)))));
        assert_eq!(source.path(), path.as_path());
    }

    #[test]
    fn test_deleting_project_file_reports_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".branch-colors.json");
        fs::write(&path, RULES).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut source = ProjectFileSource::new(dir.path());
        source.subscribe(EventSender::new(tx)).unwrap();
        assert!(matches!(rx.try_recv(), Ok(ControlEvent::ConfigChanged(Some(_)))));

        fs::remove_file(&path).unwrap();
        assert!(wait_for_config(&mut rx, |config| config.is_none()));
    }

    #[test]
    fn test_rewritten_project_file_reports_new_rules() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut source = ProjectFileSource::new(dir.path());
        source.subscribe(EventSender::new(tx)).unwrap();
        assert!(matches!(rx.try_recv(), Ok(ControlEvent::ConfigChanged(None))));

        let two_rules = r##"{ "branches": [
            { "pattern": "main", "color": "#FF0000" },
            { "pattern": "release/", "match": "prefix", "color": "#FFA500" }
        ] }"##;
        fs::write(dir.path().join(".branch-colors.json"), two_rules).unwrap();
        assert!(wait_for_config(&mut rx, |config| {
            config.as_ref().is_some_and(|rule_set| rule_set.rules.len() == 2)
        }));
    }
}
