//! Configuration management for the injection engine.
//!
//! Loads the settings snapshot from a TOML file and provides runtime defaults.
//! The engine never caches a snapshot across operations; it asks its
//! [`SettingsSource`] again each time a setting matters.

use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the engine mounts anything at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Verbose diagnostics, forces `debug` logging
    #[serde(default)]
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
            debug: false,
        }
    }
}

impl GeneralConfig {
    /// The filter directive binaries should log with
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Watchdog presence check interval
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_ms: u64,

    /// Page address poll interval
    #[serde(default = "default_navigation_poll")]
    pub navigation_poll_ms: u64,

    /// Delay between a detected navigation and the remount
    #[serde(default = "default_remount_delay")]
    pub remount_delay_ms: u64,

    /// Delay before retrying a failed mount
    #[serde(default = "default_mount_retry")]
    pub mount_retry_ms: u64,

    /// How long a transient notice stays on the page
    #[serde(default = "default_notice_duration")]
    pub notice_duration_ms: u64,

    /// Window in which identical captures are treated as one
    #[serde(default = "default_capture_dedup")]
    pub capture_dedup_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval(),
            navigation_poll_ms: default_navigation_poll(),
            remount_delay_ms: default_remount_delay(),
            mount_retry_ms: default_mount_retry(),
            notice_duration_ms: default_notice_duration(),
            capture_dedup_ms: default_capture_dedup(),
        }
    }
}

impl TimingConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms.max(1))
    }

    pub fn navigation_poll(&self) -> Duration {
        Duration::from_millis(self.navigation_poll_ms.max(1))
    }

    pub fn remount_delay(&self) -> Duration {
        Duration::from_millis(self.remount_delay_ms)
    }

    pub fn mount_retry(&self) -> Duration {
        Duration::from_millis(self.mount_retry_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn capture_dedup(&self) -> Duration {
        Duration::from_millis(self.capture_dedup_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Platforms whose outgoing messages are captured
    #[serde(default = "default_enabled_platforms")]
    pub enabled_platforms: Vec<String>,

    /// Number of previous turns attached to a capture
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Character cap per attached turn
    #[serde(default = "default_turn_char_cap")]
    pub turn_char_cap: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled_platforms: default_enabled_platforms(),
            recent_turns: default_recent_turns(),
            turn_char_cap: default_turn_char_cap(),
        }
    }
}

impl CaptureConfig {
    pub fn is_enabled_for(&self, platform: Platform) -> bool {
        self.enabled_platforms
            .iter()
            .any(|name| Platform::from_name(name) == Some(platform))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Block labels offered for injection; empty means every label
    #[serde(default)]
    pub enabled_labels: Vec<String>,
}

impl MemoryConfig {
    pub fn is_label_enabled(&self, label: &str) -> bool {
        self.enabled_labels.is_empty()
            || self
                .enabled_labels
                .iter()
                .any(|l| l.eq_ignore_ascii_case(label))
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_watchdog_interval() -> u64 {
    2000
}

fn default_navigation_poll() -> u64 {
    1000
}

fn default_remount_delay() -> u64 {
    500
}

fn default_mount_retry() -> u64 {
    1000
}

fn default_notice_duration() -> u64 {
    3000
}

fn default_capture_dedup() -> u64 {
    1500
}

fn default_enabled_platforms() -> Vec<String> {
    Platform::ALL.iter().map(|p| p.as_str().to_string()).collect()
}

fn default_recent_turns() -> usize {
    2
}

fn default_turn_char_cap() -> usize {
    500
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memory-injector")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Where the engine gets its read-only settings snapshot from
pub trait SettingsSource {
    fn snapshot(&self) -> Config;
}

impl SettingsSource for Config {
    fn snapshot(&self) -> Config {
        self.clone()
    }
}

/// Settings that can be swapped while the engine runs
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<Config>>);

impl SharedSettings {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Replace the current snapshot
    pub fn replace(&self, config: Config) {
        match self.0.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

impl SettingsSource for SharedSettings {
    fn snapshot(&self) -> Config {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Re-reads the TOML file on every snapshot
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsSource for FileSettings {
    fn snapshot(&self) -> Config {
        Config::load_from_path(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.enabled);
        assert_eq!(config.timing.watchdog_interval_ms, 2000);
        assert_eq!(config.capture.recent_turns, 2);
        assert!(Platform::ALL
            .iter()
            .all(|p| config.capture.is_enabled_for(*p)));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
log_level = "warn"
debug = true

[timing]
remount_delay_ms = 250

[capture]
enabled_platforms = ["claude", "Gemini"]

[memory]
enabled_labels = ["human"]
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.effective_log_level(), "debug");
        assert_eq!(config.timing.remount_delay(), Duration::from_millis(250));
        assert_eq!(config.timing.navigation_poll_ms, 1000);
        assert!(config.capture.is_enabled_for(Platform::Gemini));
        assert!(!config.capture.is_enabled_for(Platform::ChatGpt));
        assert!(config.memory.is_label_enabled("Human"));
        assert!(!config.memory.is_label_enabled("persona"));
    }

    #[test]
    fn test_empty_label_list_enables_everything() {
        let memory = MemoryConfig::default();
        assert!(memory.is_label_enabled("anything"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.capture.turn_char_cap = 42;
        config.save_to_path(path.clone()).unwrap();

        let loaded = Config::load_from_path(path.clone());
        assert_eq!(loaded.capture.turn_char_cap, 42);

        let settings = FileSettings::new(path);
        assert_eq!(settings.snapshot().capture.turn_char_cap, 42);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timing = [not toml").unwrap();
        let loaded = Config::load_from_path(path);
        assert_eq!(loaded.timing.mount_retry_ms, 1000);
    }

    #[test]
    fn test_shared_settings_replace() {
        let shared = SharedSettings::new(Config::default());
        let mut next = Config::default();
        next.general.enabled = false;
        shared.replace(next);
        assert!(!shared.snapshot().general.enabled);
    }
}
