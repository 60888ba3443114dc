//! User settings document
//!
//! Stored as camelCase JSON next to the shortcut document. A missing or
//! malformed file yields the built-in defaults.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::store::{PersistQueue, SaveTicket};

pub const DEFAULT_HOTKEY: &str = "Ctrl+Alt+K";
pub const MIN_GRID_COLUMNS: i32 = 3;
pub const MAX_GRID_COLUMNS: i32 = 8;
const DEFAULT_GRID_COLUMNS: i32 = 4;
const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;

/// Color scheme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl From<String> for Theme {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            _ => Theme::System,
        }
    }
}

/// Saved window placement; unset values mean default placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowGeometry {
    #[serde(rename = "windowWidth", alias = "WindowWidth")]
    pub width: Option<f64>,
    #[serde(rename = "windowHeight", alias = "WindowHeight")]
    pub height: Option<f64>,
    #[serde(rename = "windowLeft", alias = "WindowLeft")]
    pub left: Option<f64>,
    #[serde(rename = "windowTop", alias = "WindowTop")]
    pub top: Option<f64>,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            width: Some(DEFAULT_WIDTH),
            height: Some(DEFAULT_HEIGHT),
            left: None,
            top: None,
        }
    }
}

impl WindowGeometry {
    /// Width and height, substituting defaults for unusable values
    pub fn size(&self) -> (f64, f64) {
        let usable = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0);
        (
            usable(self.width).unwrap_or(DEFAULT_WIDTH),
            usable(self.height).unwrap_or(DEFAULT_HEIGHT),
        )
    }

    /// Top-left corner, only when both coordinates are set
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.left, self.top) {
            (Some(left), Some(top)) if left.is_finite() && top.is_finite() => Some((left, top)),
            _ => None,
        }
    }

    /// Usable size, and a position only when both coordinates are usable
    pub fn normalized(&self) -> Self {
        let (width, height) = self.size();
        let position = self.position();
        Self {
            width: Some(width),
            height: Some(height),
            left: position.map(|(left, _)| left),
            top: position.map(|(_, top)| top),
        }
    }
}

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Text form of the toggle hotkey, e.g. `Ctrl+Alt+K`
    #[serde(alias = "GlobalHotkey")]
    pub global_hotkey: String,
    #[serde(alias = "startWithWindows", alias = "StartWithWindows")]
    pub start_with_system: bool,
    #[serde(alias = "GridColumns", deserialize_with = "clamped_columns")]
    grid_columns: i32,
    #[serde(alias = "Theme")]
    pub theme: Theme,
    #[serde(flatten)]
    pub window: WindowGeometry,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_hotkey: DEFAULT_HOTKEY.to_string(),
            start_with_system: true,
            grid_columns: DEFAULT_GRID_COLUMNS,
            theme: Theme::default(),
            window: WindowGeometry::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, or defaults if absent or unreadable
    pub async fn load(path: &Path) -> Self {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read settings, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed settings, using defaults");
                Self::default()
            }
        }
    }

    /// Queue the settings for writing
    pub fn save(&self, path: &Path, queue: &PersistQueue) -> SaveTicket {
        queue.write_json(path, self)
    }

    pub fn grid_columns(&self) -> i32 {
        self.grid_columns
    }

    /// Set the column count, clamped to the supported range
    pub fn set_grid_columns(&mut self, columns: i32) {
        self.grid_columns = columns.clamp(MIN_GRID_COLUMNS, MAX_GRID_COLUMNS);
    }
}

fn clamped_columns<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(MIN_GRID_COLUMNS as i64, MAX_GRID_COLUMNS as i64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.global_hotkey, "Ctrl+Alt+K");
        assert_eq!(settings.grid_columns(), 4);
        assert_eq!(settings.theme, Theme::System);
        assert_eq!(settings.window.size(), (800.0, 600.0));
        assert_eq!(settings.window.position(), None);
    }

    #[test]
    fn test_grid_columns_clamped() {
        let mut settings = Settings::default();
        settings.set_grid_columns(1);
        assert_eq!(settings.grid_columns(), 3);
        settings.set_grid_columns(12);
        assert_eq!(settings.grid_columns(), 8);
        settings.set_grid_columns(5);
        assert_eq!(settings.grid_columns(), 5);

        let loaded: Settings = serde_json::from_str(r#"{"gridColumns": 42}"#).unwrap();
        assert_eq!(loaded.grid_columns(), 8);
        let loaded: Settings = serde_json::from_str(r#"{"gridColumns": -2}"#).unwrap();
        assert_eq!(loaded.grid_columns(), 3);
    }

    #[test]
    fn test_unknown_theme_reads_as_system() {
        let loaded: Settings = serde_json::from_str(r#"{"theme": "Dark"}"#).unwrap();
        assert_eq!(loaded.theme, Theme::Dark);
        let loaded: Settings = serde_json::from_str(r#"{"theme": "Solarized"}"#).unwrap();
        assert_eq!(loaded.theme, Theme::System);
    }

    #[test]
    fn test_unset_geometry_round_trips_as_null() {
        let mut settings = Settings::default();
        settings.window.left = Some(f64::NAN);
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"windowLeft\":null"));
        assert!(json.contains("\"windowTop\":null"));

        let loaded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.window.left, None);
        assert_eq!(loaded.window.position(), None);
    }

    #[test]
    fn test_invalid_size_uses_default() {
        let geometry = WindowGeometry {
            width: Some(-5.0),
            height: None,
            left: Some(10.0),
            top: Some(20.0),
        };
        assert_eq!(geometry.size(), (800.0, 600.0));
        assert_eq!(geometry.position(), Some((10.0, 20.0)));

        let half_placed = WindowGeometry {
            width: Some(1024.0),
            height: Some(f64::INFINITY),
            left: Some(10.0),
            top: Some(f64::NAN),
        };
        assert_eq!(
            half_placed.normalized(),
            WindowGeometry {
                width: Some(1024.0),
                height: Some(600.0),
                left: None,
                top: None,
            }
        );
    }

    #[test]
    fn test_legacy_start_with_windows_alias() {
        let loaded: Settings = serde_json::from_str(r#"{"startWithWindows": false}"#).unwrap();
        assert!(!loaded.start_with_system);
        assert_eq!(loaded.global_hotkey, DEFAULT_HOTKEY);
    }

    #[test]
    fn test_pascal_case_settings_load() {
        let json = r#"{
            "GlobalHotkey": "Ctrl+Shift+P",
            "StartWithWindows": false,
            "GridColumns": 6,
            "Theme": "Dark",
            "WindowWidth": 1024.0,
            "WindowHeight": 700.0,
            "WindowLeft": 10.0,
            "WindowTop": 20.0
        }"#;
        let loaded: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(loaded.global_hotkey, "Ctrl+Shift+P");
        assert!(!loaded.start_with_system);
        assert_eq!(loaded.grid_columns(), 6);
        assert_eq!(loaded.theme, Theme::Dark);
        assert_eq!(loaded.window.size(), (1024.0, 700.0));
        assert_eq!(loaded.window.position(), Some((10.0, 20.0)));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load(&path).await, Settings::default());

        std::fs::write(&path, "[1, 2").unwrap();
        assert_eq!(Settings::load(&path).await, Settings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let (queue, _task) = PersistQueue::spawn();

        let mut settings = Settings::default();
        settings.global_hotkey = "Alt+Shift+P".into();
        settings.set_grid_columns(6);
        settings.window.left = Some(100.0);
        settings.window.top = Some(50.0);
        settings.save(&path, &queue).wait().await.unwrap();

        assert_eq!(Settings::load(&path).await, settings);
    }
}
