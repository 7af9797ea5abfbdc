//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Which gestures are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Left-Option + Left-Shift toggles Korean <-> Japanese
    pub chord_toggle: bool,
    /// Left-Shift + Space toggles Korean <-> Latin
    pub shift_space_toggle: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            chord_toggle: true,
            shift_space_toggle: true,
        }
    }
}

impl FeatureFlags {
    /// Apply a partial update, keeping fields it leaves unset
    pub fn with(self, update: FeatureUpdate) -> Self {
        Self {
            chord_toggle: update.chord_toggle.unwrap_or(self.chord_toggle),
            shift_space_toggle: update.shift_space_toggle.unwrap_or(self.shift_space_toggle),
        }
    }
}

/// A partial change to [`FeatureFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord_toggle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_space_toggle: Option<bool>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Gestures enabled at startup
    pub features: FeatureFlags,

    /// Push a human-readable toast to subscribers after each switch
    pub show_notification: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("kawa");

        let socket_path = lookup("KAWA_SOCKET_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let defaults = FeatureFlags::default();
        let features = FeatureFlags {
            chord_toggle: flag(&lookup, "KAWA_CHORD_TOGGLE", defaults.chord_toggle)?,
            shift_space_toggle: flag(
                &lookup,
                "KAWA_SHIFT_SPACE_TOGGLE",
                defaults.shift_space_toggle,
            )?,
        };
        let show_notification = flag(&lookup, "KAWA_SHOW_NOTIFICATION", false)?;

        Ok(Self {
            socket_path,
            data_dir,
            features,
            show_notification,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got {raw:?}"),
    }
}
