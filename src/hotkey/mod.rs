//! Hotkey module for the global show/hide binding
//!
//! Parses `Mod+Mod+Key` text, registers it with the OS through a
//! [`HotkeyBackend`], and forwards each press to the controller.

mod combo;
mod listener;
mod registrar;

pub use combo::HotkeyCombination;
pub use listener::PlatformBackend;
pub use registrar::{HotkeyBackend, HotkeyEvent, HotkeyRegistrar};

#[cfg(test)]
pub(crate) use registrar::{testing, HOTKEY_ID};
