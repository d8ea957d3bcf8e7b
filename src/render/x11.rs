//! X11 overlay target
//!
//! The border is four override-redirect windows laid along the edges of the
//! target window (the root window unless one is given). Each strip's
//! background pixel is the border color; the dashed style cuts the strips
//! into segments with the SHAPE extension. Hidden borders are unmapped.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::shape::{self, ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use super::{DrawInstruction, DrawSource, RenderTarget};
use crate::config::BorderStyle;
use crate::constants::{dash, x11};

/// Screen-space rectangle of the window being framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

/// Top, bottom, left, right strips. The side strips sit between the
/// horizontal ones so no pixel is covered twice.
pub fn edge_rects(frame: Frame, thickness: u16) -> [Rectangle; 4] {
    let t = thickness
        .min(frame.width / 2)
        .min(frame.height / 2)
        .max(1);
    let side_height = frame.height.saturating_sub(2 * t).max(1);
    let far_x = frame.x.saturating_add(frame.width.saturating_sub(t) as i16);
    let far_y = frame.y.saturating_add(frame.height.saturating_sub(t) as i16);
    let inner_y = frame.y.saturating_add(t as i16);

    [
        Rectangle { x: frame.x, y: frame.y, width: frame.width.max(1), height: t },
        Rectangle { x: frame.x, y: far_y, width: frame.width.max(1), height: t },
        Rectangle { x: frame.x, y: inner_y, width: t, height: side_height },
        Rectangle { x: far_x, y: inner_y, width: t, height: side_height },
    ]
}

/// Dash segments in strip-local coordinates, running along the strip's long axis
pub fn dash_rects(strip: &Rectangle) -> Vec<Rectangle> {
    let horizontal = strip.width >= strip.height;
    let length = if horizontal { strip.width } else { strip.height };
    let step = (dash::SEGMENT + dash::GAP) as usize;

    (0..length)
        .step_by(step)
        .map(|offset| {
            let segment = dash::SEGMENT.min(length - offset);
            if horizontal {
                Rectangle { x: offset as i16, y: 0, width: segment, height: strip.height }
            } else {
                Rectangle { x: 0, y: offset as i16, width: strip.width, height: segment }
            }
        })
        .collect()
}

/// Live X11 resources; strips are destroyed on drop
struct OverlaySession {
    conn: RustConnection,
    root: Window,
    target: Window,
    strips: Vec<Window>,
    has_shape: bool,
}

impl OverlaySession {
    fn open(target: Option<Window>) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 server. Is DISPLAY set correctly?")?;
        let root = conn.setup().roots[screen_num].root;
        let target = target.unwrap_or(root);

        let has_shape = conn
            .extension_information(shape::X11_EXTENSION_NAME)
            .context("Failed to query SHAPE extension")?
            .is_some();
        if !has_shape {
            warn!("SHAPE extension unavailable, dashed borders will be drawn solid");
        }

        let mut session = Self {
            conn,
            root,
            target,
            strips: Vec::with_capacity(4),
            has_shape,
        };
        for _ in 0..4 {
            let strip = session.create_strip()?;
            session.strips.push(strip);
        }
        session.conn.flush().context("Failed to flush X11 connection after creating border")?;
        info!(screen = screen_num, target = target, "Created border overlay windows");
        Ok(session)
    }

    fn create_strip(&self) -> Result<Window> {
        let window = self.conn.generate_id()
            .context("Failed to generate X11 window ID")?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            self.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .background_pixel(0),
        )
        .context("Failed to create border strip window")?;

        let wm_class = self.conn.intern_atom(false, b"WM_CLASS")
            .context("Failed to intern WM_CLASS atom")?
            .reply()
            .context("Failed to get reply for WM_CLASS atom")?
            .atom;
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            wm_class,
            AtomEnum::STRING,
            x11::WM_CLASS,
        )
        .context("Failed to set WM_CLASS on border strip")?;

        let net_wm_state = self.conn.intern_atom(false, b"_NET_WM_STATE")
            .context("Failed to intern _NET_WM_STATE atom")?
            .reply()
            .context("Failed to get reply for _NET_WM_STATE atom")?
            .atom;
        let above_atom = self.conn.intern_atom(false, b"_NET_WM_STATE_ABOVE")
            .context("Failed to intern _NET_WM_STATE_ABOVE atom")?
            .reply()
            .context("Failed to get reply for _NET_WM_STATE_ABOVE atom")?
            .atom;
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            net_wm_state,
            AtomEnum::ATOM,
            &[above_atom],
        )
        .context("Failed to set border strip always-on-top")?;

        Ok(window)
    }

    fn frame(&self) -> Result<Frame> {
        let geom = self.conn.get_geometry(self.target)
            .context("Failed to send geometry query for target window")?
            .reply()
            .context(format!("Failed to get geometry for target window {}", self.target))?;
        if self.target == self.root {
            return Ok(Frame { x: 0, y: 0, width: geom.width, height: geom.height });
        }
        let origin = self.conn.translate_coordinates(self.target, self.root, 0, 0)
            .context("Failed to send coordinate translation")?
            .reply()
            .context(format!("Failed to translate coordinates of window {}", self.target))?;
        Ok(Frame { x: origin.dst_x, y: origin.dst_y, width: geom.width, height: geom.height })
    }

    fn paint(&self, instruction: &DrawInstruction) -> Result<()> {
        let Some(color) = instruction.paint_color() else {
            for &strip in &self.strips {
                self.conn.unmap_window(strip)
                    .context(format!("Failed to unmap border strip {}", strip))?;
            }
            self.conn.flush().context("Failed to flush X11 connection")?;
            return Ok(());
        };

        let frame = self.frame()?;
        let rects = edge_rects(frame, instruction.width_px);
        for (&strip, rect) in self.strips.iter().zip(rects.iter()) {
            self.conn.configure_window(
                strip,
                &ConfigureWindowAux::new()
                    .x(rect.x as i32)
                    .y(rect.y as i32)
                    .width(rect.width as u32)
                    .height(rect.height as u32)
                    .stack_mode(StackMode::ABOVE),
            )
            .context(format!("Failed to position border strip {}", strip))?;
            self.conn.change_window_attributes(
                strip,
                &ChangeWindowAttributesAux::new().background_pixel(color.to_x11_pixel()),
            )
            .context(format!("Failed to set color of border strip {}", strip))?;

            if self.has_shape {
                self.apply_shape(strip, rect, instruction.style)?;
            }

            self.conn.map_window(strip)
                .context(format!("Failed to map border strip {}", strip))?;
            self.conn.clear_area(false, strip, 0, 0, 0, 0)
                .context(format!("Failed to clear border strip {}", strip))?;
        }
        self.conn.flush().context("Failed to flush X11 connection after painting border")?;
        debug!(color = %color, width = instruction.width_px, style = %instruction.style, "Painted border");
        Ok(())
    }

    fn apply_shape(&self, strip: Window, rect: &Rectangle, style: BorderStyle) -> Result<()> {
        match style {
            BorderStyle::Solid => {
                self.conn.shape_mask(SO::SET, SK::BOUNDING, strip, 0, 0, x11rb::NONE)
                    .context("Failed to reset border strip shape")?;
            }
            BorderStyle::Dashed => {
                self.conn.shape_rectangles(
                    SO::SET,
                    SK::BOUNDING,
                    ClipOrdering::UNSORTED,
                    strip,
                    0,
                    0,
                    &dash_rects(rect),
                )
                .context("Failed to shape dashed border strip")?;
            }
        }
        Ok(())
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        // Destroy each strip independently so one failure doesn't leak the rest
        for &strip in &self.strips {
            if let Err(e) = self.conn.destroy_window(strip) {
                error!(window = strip, error = %e, "Failed to destroy border strip");
            }
        }
        let _ = self.conn.flush();
    }
}

/// Border drawn as X11 overlay windows
#[derive(Default)]
pub struct X11Overlay {
    target: Option<Window>,
    source: Option<DrawSource>,
    session: Option<OverlaySession>,
}

impl X11Overlay {
    /// `target` of `None` frames the whole screen
    pub fn new(target: Option<Window>) -> Self {
        Self {
            target,
            source: None,
            session: None,
        }
    }
}

impl RenderTarget for X11Overlay {
    fn attach(&mut self, source: DrawSource) -> Result<()> {
        let session = OverlaySession::open(self.target)
            .context("Failed to install border overlay")?;
        self.session = Some(session);
        self.source = Some(source);
        Ok(())
    }

    fn request_repaint(&mut self) {
        let (Some(session), Some(source)) = (&self.session, &self.source) else {
            return;
        };
        if let Err(e) = session.paint(&source.current()) {
            error!(error = ?e, "Failed to paint border");
        }
    }

    fn detach(&mut self) {
        if self.session.take().is_some() {
            info!("Border overlay removed");
        }
        self.source = None;
    }
}
