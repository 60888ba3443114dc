//! The window operations the visibility logic depends on

use std::time::Duration;

use tracing::debug;

use crate::settings::WindowGeometry;

/// Errors raised by a window while transitioning
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("window transition failed: {0}")]
    Transition(String),
}

/// A top-level window that can be shown, hidden and faded
pub trait WindowSurface {
    fn is_visible(&self) -> bool;

    fn is_minimized(&self) -> bool;

    /// Make the window visible in its normal (restored) state
    fn show_normal(&mut self);

    /// Bring the window to the foreground and give it focus
    fn activate(&mut self);

    /// Animate opacity from `from` to `to` over `duration`
    fn fade(&mut self, from: f32, to: f32, duration: Duration) -> Result<(), WindowError>;

    /// Make the window non-visible immediately
    fn hide(&mut self);

    fn geometry(&self) -> WindowGeometry;

    fn set_geometry(&mut self, geometry: WindowGeometry);
}

/// Window state without a native window behind it
///
/// Stands in for the view when the app runs resident without a GUI front
/// end attached; front ends learn about transitions from app events.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    visible: bool,
    minimized: bool,
    focused: bool,
    opacity: f32,
    geometry: WindowGeometry,
    fail_fades: bool,
}

impl HeadlessWindow {
    /// A hidden window placed at `geometry`; unusable values fall back to defaults
    pub fn new(geometry: WindowGeometry) -> Self {
        Self {
            visible: false,
            minimized: false,
            focused: false,
            opacity: 0.0,
            geometry: geometry.normalized(),
            fail_fades: false,
        }
    }
}

#[cfg(test)]
impl HeadlessWindow {
    /// Mark the window minimized, as a window manager would
    pub fn minimize(&mut self) {
        self.minimized = true;
        self.focused = false;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Make every fade fail, for exercising fallback paths
    pub fn with_failing_fades(mut self) -> Self {
        self.fail_fades = true;
        self
    }
}

impl WindowSurface for HeadlessWindow {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_minimized(&self) -> bool {
        self.minimized
    }

    fn show_normal(&mut self) {
        self.visible = true;
        self.minimized = false;
    }

    fn activate(&mut self) {
        self.focused = true;
    }

    fn fade(&mut self, from: f32, to: f32, duration: Duration) -> Result<(), WindowError> {
        if self.fail_fades {
            return Err(WindowError::Transition("fade unavailable".to_string()));
        }
        debug!(from, to, duration_ms = duration.as_millis() as u64, "fade");
        self.opacity = to;
        Ok(())
    }

    fn hide(&mut self) {
        self.visible = false;
        self.focused = false;
        self.opacity = 0.0;
    }

    fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn set_geometry(&mut self, geometry: WindowGeometry) {
        self.geometry = geometry.normalized();
    }
}
