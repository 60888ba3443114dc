//! Configuration loading and management

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment override for the per-user data directory
pub const DATA_DIR_ENV: &str = "POWERKEYS_DATA_DIR";

/// Environment override for the IPC listen address
pub const CONTROL_ADDR_ENV: &str = "POWERKEYS_CONTROL_ADDR";

const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:47615";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for per-user data (shortcuts, settings, lock file)
    pub data_dir: PathBuf,

    /// User shortcut document
    pub shortcuts_path: PathBuf,

    /// User settings document
    pub settings_path: PathBuf,

    /// Shortcut document shipped next to the executable, if any
    pub bundled_shortcuts_path: Option<PathBuf>,

    /// Loopback address the control server listens on
    pub control_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .context("no per-user configuration directory on this system")?
                .join("PowerKeys"),
        };

        let control_addr = std::env::var(CONTROL_ADDR_ENV)
            .unwrap_or_else(|_| DEFAULT_CONTROL_ADDR.to_string())
            .parse()
            .with_context(|| format!("invalid {CONTROL_ADDR_ENV}"))?;

        let bundled_shortcuts_path = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("Resources").join("shortcuts.json")));

        Ok(Self::with_data_dir(data_dir, bundled_shortcuts_path, control_addr))
    }

    /// Build a configuration rooted at an explicit data directory
    pub fn with_data_dir(
        data_dir: PathBuf,
        bundled_shortcuts_path: Option<PathBuf>,
        control_addr: SocketAddr,
    ) -> Self {
        Self {
            shortcuts_path: data_dir.join("shortcuts.json"),
            settings_path: data_dir.join("settings.json"),
            bundled_shortcuts_path,
            control_addr,
            data_dir,
        }
    }

    /// Path of the single-instance lock file used off Windows
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("powerkeys.lock")
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}
