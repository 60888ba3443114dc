//! Shortcut collection storage
//!
//! Loads the user's shortcut document (with bundled and embedded fallbacks),
//! answers category and search queries, and persists every mutation through
//! an ordered write queue.

mod record;
mod shortcuts;
mod writer;

pub use record::{Category, NewShortcut, ShortcutPatch, ShortcutRecord};
pub use shortcuts::{LoadSource, ShortcutStore};
pub use writer::{PersistQueue, SaveTicket};
