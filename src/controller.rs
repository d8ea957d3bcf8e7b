//! Border controller
//!
//! Owns the active rule set, the current branch and the blink scheduler, and
//! is the only place border state changes. Sources feed it through an
//! unbounded channel; `run` drains that channel on a single task so every
//! recompute sees a consistent (branch, rule set) pair.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::blink::{BlinkChange, BlinkScheduler};
use crate::config::RuleSet;
use crate::matcher::{self, VisualSpec};
use crate::render::{DrawInstruction, DrawSource, RenderTarget};
use crate::sources::{BranchSource, ConfigSource};

/// Inputs delivered to the controller task
#[derive(Debug)]
pub enum ControlEvent {
    BranchChanged(Option<String>),
    ConfigChanged(Option<RuleSet>),
    Shutdown,
}

/// Cloneable handle collaborators use to reach the controller.
/// Sends never block; after the controller is gone they are dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self { tx }
    }

    pub fn branch_changed(&self, branch: Option<String>) {
        self.send(ControlEvent::BranchChanged(branch));
    }

    pub fn config_changed(&self, config: Option<RuleSet>) {
        self.send(ControlEvent::ConfigChanged(config));
    }

    pub fn shutdown(&self) {
        self.send(ControlEvent::Shutdown);
    }

    fn send(&self, event: ControlEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!(event = ?e.0, "Controller gone, dropping event");
        }
    }
}

/// What is currently on screen and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSession {
    pub current_branch: Option<String>,
    pub current_spec: VisualSpec,
    pub blink_visible: bool,
    pub last_applied_interval_ms: Option<u32>,
}

impl Default for RenderSession {
    fn default() -> Self {
        Self {
            current_branch: None,
            current_spec: VisualSpec::disabled(),
            blink_visible: true,
            last_applied_interval_ms: None,
        }
    }
}

pub struct BorderController {
    target: Option<Box<dyn RenderTarget>>,
    attached: bool,
    rules: Option<RuleSet>,
    session: RenderSession,
    blink: BlinkScheduler,
    draw_tx: watch::Sender<DrawInstruction>,
    branch_source: Option<Box<dyn BranchSource>>,
    config_source: Option<Box<dyn ConfigSource>>,
    torn_down: bool,
}

impl BorderController {
    pub fn new(target: Box<dyn RenderTarget>) -> Self {
        let (draw_tx, _) = watch::channel(DrawInstruction::default());
        Self {
            target: Some(target),
            attached: false,
            rules: None,
            session: RenderSession::default(),
            blink: BlinkScheduler::new(),
            draw_tx,
            branch_source: None,
            config_source: None,
            torn_down: false,
        }
    }

    /// Attach the target, paint from a snapshot of both sources, then
    /// subscribe to their changes.
    ///
    /// Must be called inside a tokio runtime with time enabled.
    pub fn initialize(
        &mut self,
        mut branch_source: Box<dyn BranchSource>,
        mut config_source: Box<dyn ConfigSource>,
        events: EventSender,
    ) {
        self.attach();

        self.session.current_branch = branch_source.current_branch();
        self.rules = config_source.current_config();
        info!(
            branch = ?self.session.current_branch,
            configured = self.rules.is_some(),
            "Initial state"
        );
        self.recompute();
        // The first instruction may equal the channel's initial value
        self.repaint();

        if let Err(e) = branch_source.subscribe(events.clone()) {
            error!(error = ?e, "Failed to subscribe to branch changes");
        }
        if let Err(e) = config_source.subscribe(events) {
            error!(error = ?e, "Failed to subscribe to config changes");
        }
        self.branch_source = Some(branch_source);
        self.config_source = Some(config_source);
    }

    fn attach(&mut self) {
        let source = self.draw_source();
        let Some(target) = self.target.as_mut() else { return };
        match target.attach(source) {
            Ok(()) => self.attached = true,
            Err(e) => {
                warn!(error = ?e, "Render target unavailable, border will not be drawn");
                self.attached = false;
            }
        }
    }

    pub fn on_branch_changed(&mut self, branch: Option<String>) {
        self.apply_inputs(Some(branch), None);
    }

    pub fn on_config_changed(&mut self, config: Option<RuleSet>) {
        self.apply_inputs(None, Some(config));
    }

    pub fn on_blink_tick(&mut self) {
        if self.torn_down || !self.blink.is_blinking() {
            return;
        }
        self.session.blink_visible = self.blink.on_tick();
        self.publish();
    }

    /// Apply any changed inputs and recompute once
    fn apply_inputs(&mut self, branch: Option<Option<String>>, config: Option<Option<RuleSet>>) {
        if self.torn_down {
            return;
        }
        let mut changed = false;

        if let Some(branch) = branch
            && branch != self.session.current_branch
        {
            info!(from = ?self.session.current_branch, to = ?branch, "Branch changed");
            self.session.current_branch = branch;
            changed = true;
        }
        if let Some(config) = config
            && config != self.rules
        {
            match &config {
                Some(rule_set) => info!(rules = rule_set.rules.len(), "Rule set updated"),
                None => info!("Rule set removed, border disabled"),
            }
            self.rules = config;
            changed = true;
        }

        if changed {
            self.recompute();
        } else {
            debug!("Inputs unchanged, skipping recompute");
        }
    }

    fn recompute(&mut self) {
        let spec = match &self.rules {
            Some(rule_set) => matcher::resolve(self.session.current_branch.as_deref(), rule_set),
            None => VisualSpec::disabled(),
        };

        match self.blink.apply(&spec) {
            BlinkChange::Unchanged => {}
            change => debug!(?change, interval_ms = spec.blink_interval_ms, "Blink state changed"),
        }

        self.session.current_spec = spec;
        self.session.blink_visible = self.blink.is_visible();
        self.session.last_applied_interval_ms = self.blink.interval().map(|i| i.as_millis() as u32);
        self.publish();
    }

    /// Store the instruction for the current session; repaint only if it differs
    fn publish(&mut self) -> bool {
        let instruction = DrawInstruction::new(&self.session.current_spec, self.session.blink_visible);
        let changed = self.draw_tx.send_if_modified(|current| {
            if *current == instruction {
                false
            } else {
                *current = instruction;
                true
            }
        });
        if changed {
            self.repaint();
        }
        changed
    }

    fn repaint(&mut self) {
        if !self.attached {
            return;
        }
        if let Some(target) = self.target.as_mut() {
            target.request_repaint();
        }
    }

    pub fn draw_instruction(&self) -> DrawInstruction {
        *self.draw_tx.borrow()
    }

    pub fn draw_source(&self) -> DrawSource {
        DrawSource::new(self.draw_tx.subscribe())
    }

    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    pub fn rule_set(&self) -> Option<&RuleSet> {
        self.rules.as_ref()
    }

    pub fn is_blinking(&self) -> bool {
        self.blink.is_blinking()
    }

    /// Stop blinking, unsubscribe the sources and release the render target.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.blink.stop();
        if let Some(mut source) = self.branch_source.take() {
            source.unsubscribe();
        }
        if let Some(mut source) = self.config_source.take() {
            source.unsubscribe();
        }
        if let Some(mut target) = self.target.take() {
            target.detach();
        }
        self.attached = false;
        self.draw_tx.send_replace(DrawInstruction::default());
        info!("Border controller torn down");
    }

    /// Process events until shutdown or until every sender is gone
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<ControlEvent>) {
        info!(
            branch = ?self.session().current_branch,
            configured = self.rule_set().is_some(),
            color = ?self.draw_instruction().color,
            blinking = self.is_blinking(),
            "Border controller running"
        );
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("All event senders closed");
                        break;
                    };
                    if !self.handle_batch(event, &mut events) {
                        info!("Shutdown requested");
                        break;
                    }
                }
                _ = self.blink.next_tick() => self.on_blink_tick(),
            }
        }
        self.teardown();
    }

    /// Coalesce `first` and everything already queued into one recompute.
    /// Returns false once a shutdown was seen.
    fn handle_batch(
        &mut self,
        first: ControlEvent,
        events: &mut mpsc::UnboundedReceiver<ControlEvent>,
    ) -> bool {
        let mut branch = None;
        let mut config = None;
        let mut keep_running = true;

        let mut next = Some(first);
        while let Some(event) = next {
            match event {
                ControlEvent::BranchChanged(b) => branch = Some(b),
                ControlEvent::ConfigChanged(c) => config = Some(c),
                ControlEvent::Shutdown => keep_running = false,
            }
            next = events.try_recv().ok();
        }

        match (branch, config) {
            (Some(branch), None) => self.on_branch_changed(branch),
            (None, Some(config)) => self.on_config_changed(config),
            (branch, config) => self.apply_inputs(branch, config),
        }
        keep_running
    }
}

impl Drop for BorderController {
    fn drop(&mut self) {
        self.teardown();
    }
}
