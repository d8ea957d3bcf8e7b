//! Render targets
//!
//! The controller publishes the latest `DrawInstruction` into a watch channel
//! and calls `request_repaint`; targets pull the instruction through their
//! `DrawSource` when they paint. Only the newest instruction is ever kept.

pub mod x11;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::color::Rgb;
use crate::config::BorderStyle;
use crate::matcher::VisualSpec;

/// What the host should draw right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawInstruction {
    pub color: Option<Rgb>,
    pub width_px: u16,
    pub style: BorderStyle,
    pub visible: bool,
}

impl DrawInstruction {
    pub fn new(spec: &VisualSpec, blink_visible: bool) -> Self {
        Self {
            color: spec.color,
            width_px: spec.width_px,
            style: spec.style,
            visible: spec.color.is_some() && blink_visible,
        }
    }

    /// Color to paint with, `None` when nothing should be drawn
    pub fn paint_color(&self) -> Option<Rgb> {
        self.color.filter(|_| self.visible)
    }
}

impl Default for DrawInstruction {
    fn default() -> Self {
        Self::new(&VisualSpec::disabled(), true)
    }
}

/// Pull side of the draw instruction channel
#[derive(Debug, Clone)]
pub struct DrawSource {
    rx: watch::Receiver<DrawInstruction>,
}

impl DrawSource {
    pub fn new(rx: watch::Receiver<DrawInstruction>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> DrawInstruction {
        *self.rx.borrow()
    }
}

/// Host surface the border is drawn on
pub trait RenderTarget: Send {
    /// Install on the host. Failure leaves the target inert.
    fn attach(&mut self, source: DrawSource) -> Result<()>;

    /// The draw instruction changed; repaint from `DrawSource::current`
    fn request_repaint(&mut self);

    /// Remove everything drawn and drop host resources. Idempotent.
    fn detach(&mut self);
}

/// Target without a display, logs every instruction it is asked to paint
#[derive(Debug, Default)]
pub struct HeadlessTarget {
    source: Option<DrawSource>,
    last: Option<DrawInstruction>,
}

impl HeadlessTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderTarget for HeadlessTarget {
    fn attach(&mut self, source: DrawSource) -> Result<()> {
        info!("Headless render target attached");
        self.source = Some(source);
        Ok(())
    }

    fn request_repaint(&mut self) {
        let Some(source) = &self.source else { return };
        let instruction = source.current();
        if self.last == Some(instruction) {
            return;
        }
        self.last = Some(instruction);
        match instruction.paint_color() {
            Some(color) => info!(
                color = %color,
                width = instruction.width_px,
                style = %instruction.style,
                "Border shown"
            ),
            None => info!(configured = instruction.color.is_some(), "Border hidden"),
        }
    }

    fn detach(&mut self) {
        if self.source.take().is_some() {
            info!("Headless render target detached");
        }
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_visibility() {
        let spec = VisualSpec {
            color: Some(Rgb::from_rgb24(0xFF0000)),
            ..VisualSpec::disabled()
        };
        assert!(DrawInstruction::new(&spec, true).visible);
        assert_eq!(DrawInstruction::new(&spec, false).paint_color(), None);

        let hidden = DrawInstruction::new(&VisualSpec::disabled(), true);
        assert!(!hidden.visible);
        assert_eq!(hidden.paint_color(), None);
    }

    #[test]
    fn test_draw_source_sees_latest_value_only() {
        let (tx, rx) = watch::channel(DrawInstruction::default());
        let source = DrawSource::new(rx);
        let first = DrawInstruction { width_px: 2, ..DrawInstruction::default() };
        let second = DrawInstruction { width_px: 9, ..DrawInstruction::default() };
        tx.send_replace(first);
        tx.send_replace(second);
        assert_eq!(source.current(), second);
    }

    #[test]
    fn test_headless_detach_is_idempotent() {
        let (_tx, rx) = watch::channel(DrawInstruction::default());
        let mut target = HeadlessTarget::new();
        target.attach(DrawSource::new(rx)).unwrap();
        target.request_repaint();
        target.detach();
        target.detach();
        // Repaint after detach is a no-op
        target.request_repaint();
    }
}
