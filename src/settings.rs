//! Extension settings store
//!
//! The daemon's own key/value store, persisted as JSON at
//! `~/.config/touchpadd/config.json`. Every key is typed; change dispatch
//! for the engine's own writes happens synchronously inside the engine,
//! while external edits to the file are picked up through a `notify`
//! watcher and re-dispatched per changed key after a reload diff.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::engine::EngineEvent;

// ============================================================================
// Constants
// ============================================================================

/// Default config directory name
const CONFIG_DIR: &str = "touchpadd";

/// Default config file name
const CONFIG_FILE: &str = "config.json";

// ============================================================================
// Keys and typed values
// ============================================================================

/// Watched extension settings keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// `touchpad-enabled`: canonical user intent for the touchpad
    TouchpadEnabled,
    /// `switch-method`: which mechanism disables the hardware
    SwitchMethod,
    /// `show-panelicon`: always show the panel icon
    ShowPanelIcon,
    /// `show-notifications`: raise a notification on every state change
    ShowNotifications,
    /// `autoswitch-touchpad`: toggle the touchpad on mouse hotplug
    AutoswitchTouchpad,
    /// `autoswitch-trackpoint`: toggle the trackpoint on mouse hotplug
    AutoswitchTrackpoint,
}

impl SettingKey {
    /// The key name as it appears in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::TouchpadEnabled => "touchpad-enabled",
            SettingKey::SwitchMethod => "switch-method",
            SettingKey::ShowPanelIcon => "show-panelicon",
            SettingKey::ShowNotifications => "show-notifications",
            SettingKey::AutoswitchTouchpad => "autoswitch-touchpad",
            SettingKey::AutoswitchTrackpoint => "autoswitch-trackpoint",
        }
    }
}

/// The mechanism used to actually disable the touchpad.
///
/// `Gconf` leaves everything to the desktop's `send-events` setting;
/// `Xinput` additionally flips every touchpad device via the external
/// `xinput` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMethod {
    #[default]
    Gconf,
    Xinput,
}

impl std::fmt::Display for SwitchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwitchMethod::Gconf => write!(f, "gconf"),
            SwitchMethod::Xinput => write!(f, "xinput"),
        }
    }
}

// ============================================================================
// Persisted configuration
// ============================================================================

/// On-disk shape of the extension settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Should the touchpad be usable
    #[serde(rename = "touchpad-enabled", default = "default_true")]
    pub touchpad_enabled: bool,

    /// Hardware switch mechanism
    #[serde(rename = "switch-method", default)]
    pub switch_method: SwitchMethod,

    /// Always show the panel icon
    #[serde(rename = "show-panelicon", default = "default_true")]
    pub show_panelicon: bool,

    /// Raise a notification on every enable/disable
    #[serde(rename = "show-notifications", default = "default_true")]
    pub show_notifications: bool,

    /// Auto-toggle the touchpad when a mouse is plugged/unplugged
    #[serde(rename = "autoswitch-touchpad", default = "default_true")]
    pub autoswitch_touchpad: bool,

    /// Auto-toggle the trackpoint when a mouse is plugged/unplugged
    #[serde(rename = "autoswitch-trackpoint", default)]
    pub autoswitch_trackpoint: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            touchpad_enabled: true,
            switch_method: SwitchMethod::Gconf,
            show_panelicon: true,
            show_notifications: true,
            autoswitch_touchpad: true,
            autoswitch_trackpoint: false,
        }
    }
}

/// Get the default config directory path
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE))
}

// ============================================================================
// Store
// ============================================================================

/// The extension settings store.
///
/// Owned by the engine; all reads/writes go through typed accessors.
/// Writes that change a value persist the file; the engine dispatches the
/// resulting change handling itself, depth-first, the way a settings
/// backend delivers change signals to a local writer.
pub struct ExtensionSettings {
    config: ExtensionConfig,
    path: Option<PathBuf>,
    writable: bool,
}

impl ExtensionSettings {
    /// Load the store from `path`, falling back to defaults on any error.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let config = match read_config(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Extension settings loaded");
                config
            }
            Err(ConfigError::Missing) => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                ExtensionConfig::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                ExtensionConfig::default()
            }
        };

        let writable = key_writability(path);
        if !writable {
            tracing::warn!(path = %path.display(), "Config file is read-only, settings writes will not persist");
        }

        Self {
            config,
            path: Some(path.to_path_buf()),
            writable,
        }
    }

    /// An in-memory store with no backing file. Used for tests and for
    /// systems without a resolvable config directory.
    pub fn in_memory(config: ExtensionConfig) -> Self {
        Self {
            config,
            path: None,
            writable: true,
        }
    }

    /// Whether keys in this store accept writes
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn touchpad_enabled(&self) -> bool {
        self.config.touchpad_enabled
    }

    pub fn switch_method(&self) -> SwitchMethod {
        self.config.switch_method
    }

    pub fn show_panelicon(&self) -> bool {
        self.config.show_panelicon
    }

    pub fn show_notifications(&self) -> bool {
        self.config.show_notifications
    }

    pub fn autoswitch_touchpad(&self) -> bool {
        self.config.autoswitch_touchpad
    }

    pub fn autoswitch_trackpoint(&self) -> bool {
        self.config.autoswitch_trackpoint
    }

    /// Set the touchpad flag. Returns whether the value changed.
    pub fn set_touchpad_enabled(&mut self, enabled: bool) -> bool {
        if self.config.touchpad_enabled == enabled {
            return false;
        }
        self.config.touchpad_enabled = enabled;
        self.committed(SettingKey::TouchpadEnabled);
        true
    }

    /// Set the trackpoint autoswitch preference. Returns whether the value
    /// changed.
    pub fn set_autoswitch_trackpoint(&mut self, enabled: bool) -> bool {
        if self.config.autoswitch_trackpoint == enabled {
            return false;
        }
        self.config.autoswitch_trackpoint = enabled;
        self.committed(SettingKey::AutoswitchTrackpoint);
        true
    }

    /// Re-read the backing file and apply every key whose value differs
    /// from the in-memory state. Returns the changed keys, oldest-first,
    /// for the caller to dispatch.
    ///
    /// Our own saves produce no diff, which is what keeps the file watcher
    /// from feeding the engine its own writes.
    pub fn reload(&mut self) -> Vec<SettingKey> {
        let path = match &self.path {
            Some(p) => p.clone(),
            None => return Vec::new(),
        };

        let fresh = match read_config(&path) {
            Ok(config) => config,
            Err(ConfigError::Missing) => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unparsable config edit");
                return Vec::new();
            }
        };

        let mut changed = Vec::new();
        if fresh.touchpad_enabled != self.config.touchpad_enabled {
            changed.push(SettingKey::TouchpadEnabled);
        }
        if fresh.switch_method != self.config.switch_method {
            changed.push(SettingKey::SwitchMethod);
        }
        if fresh.show_panelicon != self.config.show_panelicon {
            changed.push(SettingKey::ShowPanelIcon);
        }
        if fresh.show_notifications != self.config.show_notifications {
            changed.push(SettingKey::ShowNotifications);
        }
        if fresh.autoswitch_touchpad != self.config.autoswitch_touchpad {
            changed.push(SettingKey::AutoswitchTouchpad);
        }
        if fresh.autoswitch_trackpoint != self.config.autoswitch_trackpoint {
            changed.push(SettingKey::AutoswitchTrackpoint);
        }

        if !changed.is_empty() {
            tracing::info!(keys = ?changed, "Config file edited externally, reloading");
            self.config = fresh;
        }
        changed
    }

    /// Persist a changed key
    fn committed(&mut self, key: SettingKey) {
        tracing::debug!(key = key.as_str(), "Extension key changed");
        self.save();
    }

    fn save(&self) {
        let path = match &self.path {
            Some(p) => p,
            None => return,
        };
        if !self.writable {
            tracing::warn!(path = %path.display(), "Skipping save, config file is not writable");
            return;
        }
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to create config directory");
                return;
            }
        }
        match serde_json::to_string_pretty(&self.config) {
            Ok(contents) => {
                if let Err(e) = fs::write(path, contents) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to save config");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize config");
            }
        }
    }
}

/// Whether keys backed by `path` accept writes
fn key_writability(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => !meta.permissions().readonly(),
        // Missing file: writable iff we could create it later
        Err(_) => true,
    }
}

fn read_config(path: &Path) -> Result<ExtensionConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing);
    }
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    serde_json::from_str(&contents).map_err(ConfigError::Parse)
}

/// Errors while reading the config file
#[derive(Debug)]
enum ConfigError {
    /// File does not exist
    Missing,
    /// I/O error reading the file
    Io(std::io::Error),
    /// JSON parsing error
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing => write!(f, "config file missing"),
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Config file watcher
// ============================================================================

/// Watches the config file for external edits.
///
/// The subscription lives exactly as long as this handle; dropping it
/// cancels the watch.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch `path`'s parent directory and forward edits of `path` itself
    /// to the engine as [`EngineEvent::ConfigFileChanged`].
    pub fn spawn(
        path: &Path,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<Self, notify::Error> {
        let file_name = path.file_name().map(|n| n.to_os_string());
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).ok();

        let mut watcher = notify::recommended_watcher(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let ours = event.paths.iter().any(|p| {
                        p.file_name().map(|n| Some(n.to_os_string()) == file_name).unwrap_or(false)
                    });
                    if ours {
                        let _ = events.send(EngineEvent::ConfigFileChanged);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config watch error");
                }
            },
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Watching config file for edits");
        Ok(Self { _watcher: watcher })
    }
}

// ============================================================================
// Tests
// ============================================================================
