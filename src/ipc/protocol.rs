//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::app::{AppStatus, CategoryListing};
use crate::events::AppEvent;
use crate::settings::Settings;
use crate::store::{NewShortcut, ShortcutPatch, ShortcutRecord};

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from a tray agent or view to the app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current app status
    GetStatus,

    /// Subscribe to state change notifications
    Subscribe,

    /// Tray "Show"
    Show,

    /// Tray "Hide"
    Hide,

    /// Show if hidden, hide if shown
    Toggle,

    /// Tray "Exit"; the only way to terminate the app
    Exit,

    /// The view window was minimized
    Minimize,

    /// The view window's close control was used
    Close,

    /// Filter shortcuts by category and search text
    Query {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        search: Option<String>,
    },

    /// Category names for the picker
    ListCategories,

    AddShortcut { shortcut: NewShortcut },

    UpdateShortcut { id: String, patch: ShortcutPatch },

    RemoveShortcut { id: String },

    GetSettings,

    UpdateSettings { settings: Settings },
}

/// Responses from the app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current app status
    Status(AppStatus),

    /// Subscription confirmed
    Subscribed,

    /// Request accepted
    Ack,

    Shortcuts { shortcuts: Vec<ShortcutRecord> },

    Categories(CategoryListing),

    /// A created or updated shortcut; `None` when the id was unknown
    Shortcut { shortcut: Option<ShortcutRecord> },

    Removed { id: String, removed: bool },

    Settings { settings: Settings },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An app event occurred
    Event { event: AppEvent },
}
