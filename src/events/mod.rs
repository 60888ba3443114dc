//! Events module for state-change notifications
//!
//! The controller owns all state; views and the tray learn about changes
//! from these events instead of binding to the data directly.

use serde::{Deserialize, Serialize};

/// Events broadcast by the controller after each state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// The main window became visible
    WindowShown,

    /// The main window was hidden
    WindowHidden,

    /// The shortcut collection changed
    ShortcutsChanged {
        /// Number of shortcuts after the change
        count: usize,
    },

    /// Settings were updated
    SettingsChanged,

    /// The global hotkey is bound
    HotkeyRegistered {
        /// Canonical text of the bound combination
        combination: String,
    },

    /// The global hotkey could not be bound
    HotkeyUnavailable {
        combination: String,
    },

    /// A non-blocking message for the user (tray balloon)
    Notice { title: String, message: String },

    /// The app is about to exit
    ExitRequested,
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::WindowShown => write!(f, "WINDOW_SHOWN"),
            AppEvent::WindowHidden => write!(f, "WINDOW_HIDDEN"),
            AppEvent::ShortcutsChanged { count } => write!(f, "SHORTCUTS_CHANGED ({count})"),
            AppEvent::SettingsChanged => write!(f, "SETTINGS_CHANGED"),
            AppEvent::HotkeyRegistered { combination } => {
                write!(f, "HOTKEY_REGISTERED ({combination})")
            }
            AppEvent::HotkeyUnavailable { combination } => {
                write!(f, "HOTKEY_UNAVAILABLE ({combination})")
            }
            AppEvent::Notice { title, .. } => write!(f, "NOTICE ({title})"),
            AppEvent::ExitRequested => write!(f, "EXIT_REQUESTED"),
        }
    }
}
