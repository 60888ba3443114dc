//! Main window visibility

mod surface;
mod visibility;

pub use surface::{HeadlessWindow, WindowSurface};
pub use visibility::{CloseDecision, VisibilityController};
