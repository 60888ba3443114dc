//! Show/hide transitions for the main window
//!
//! Hotkey presses, tray actions, minimize and close all funnel through
//! [`VisibilityController`]. It owns no data, only the transition rules.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::surface::WindowSurface;

/// Length of the cosmetic fade in and out
pub const FADE_DURATION: Duration = Duration::from_millis(200);

/// What a close request turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// The window was hidden; the process keeps running
    Hide,
    /// An exit was requested first; the process should terminate
    Exit,
}

pub struct VisibilityController<W: WindowSurface> {
    window: W,
    /// Set by an explicit exit so the next close is not intercepted
    really_closing: bool,
}

impl<W: WindowSurface> VisibilityController<W> {
    pub fn new(window: W) -> Self {
        Self {
            window,
            really_closing: false,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// Visible and not minimized
    pub fn is_shown(&self) -> bool {
        self.window.is_visible() && !self.window.is_minimized()
    }

    /// Hide if shown, otherwise show; returns whether the window is shown after
    pub fn toggle(&mut self) -> bool {
        if self.is_shown() {
            self.hide();
        } else {
            self.show();
        }
        self.is_shown()
    }

    /// Restore, focus and fade in
    pub fn show(&mut self) {
        self.window.show_normal();
        self.window.activate();
        if let Err(e) = self.window.fade(0.0, 1.0, FADE_DURATION) {
            // Already visible; the fade is cosmetic
            debug!(error = %e, "fade-in skipped");
        }
        info!("window shown");
    }

    /// Fade out then hide; hides immediately if the fade fails
    pub fn hide(&mut self) {
        if let Err(e) = self.window.fade(1.0, 0.0, FADE_DURATION) {
            warn!(error = %e, "fade-out failed, hiding immediately");
        }
        self.window.hide();
        info!("window hidden");
    }

    /// Minimizing is a hide request
    pub fn on_minimized(&mut self) {
        debug!("window minimized");
        self.hide();
    }

    /// Intercept the close control unless an exit was requested
    pub fn on_close_requested(&mut self) -> CloseDecision {
        if self.really_closing {
            CloseDecision::Exit
        } else {
            debug!("close intercepted");
            self.hide();
            CloseDecision::Hide
        }
    }

    /// Let the next close through
    pub fn request_exit(&mut self) {
        self.really_closing = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WindowGeometry;
    use crate::window::HeadlessWindow;

    fn controller() -> VisibilityController<HeadlessWindow> {
        VisibilityController::new(HeadlessWindow::new(WindowGeometry::default()))
    }

    #[test]
    fn test_starts_hidden() {
        let vc = controller();
        assert!(!vc.is_shown());
        assert!(!vc.window().is_visible());
    }

    #[test]
    fn test_toggle_flips_without_drift() {
        let mut vc = controller();
        assert!(vc.toggle());
        assert!(!vc.toggle());
        assert!(vc.toggle());
        assert!(vc.window().is_visible());
        assert_eq!(vc.window().opacity(), 1.0);
        assert!(vc.window().is_focused());
    }

    #[test]
    fn test_toggle_on_minimized_window_shows() {
        let mut vc = controller();
        vc.show();
        vc.window_mut().minimize();
        assert!(!vc.is_shown());

        assert!(vc.toggle());
        assert!(!vc.window().is_minimized());
    }

    #[test]
    fn test_minimize_hides() {
        let mut vc = controller();
        vc.show();
        vc.window_mut().minimize();
        vc.on_minimized();
        assert!(!vc.window().is_visible());
    }

    #[test]
    fn test_failed_fade_still_hides() {
        let mut vc =
            VisibilityController::new(HeadlessWindow::new(WindowGeometry::default()).with_failing_fades());
        vc.show();
        assert!(vc.is_shown());

        vc.hide();
        assert!(!vc.window().is_visible());
    }

    #[test]
    fn test_close_hides_unless_exit_requested() {
        let mut vc = controller();
        vc.show();

        assert_eq!(vc.on_close_requested(), CloseDecision::Hide);
        assert!(!vc.is_shown());

        vc.request_exit();
        assert_eq!(vc.on_close_requested(), CloseDecision::Exit);
    }
}
