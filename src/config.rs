//! Configuration loading and management
//!
//! The configuration is a YAML file describing the OBS connection and the
//! list of masks to bind to hotkeys.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::mask::usable_scene_hint;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "conf.yaml";

/// Default OBS WebSocket port
const DEFAULT_PORT: u16 = 4455;

/// Errors that can occur while loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yml::Error,
    },

    #[error("invalid address format in config: {0} (must not contain ':' or a protocol other than http:// or ws://)")]
    InvalidAddress(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// OBS WebSocket connection settings
    pub obs: ObsConfig,

    /// Require the source to exist in a hinted scene before trusting the hint
    #[serde(default)]
    pub verify_scene_hints: bool,

    /// Configured masks, in file order
    #[serde(default)]
    pub masks: Vec<MaskConfig>,
}

/// OBS WebSocket connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Omitted when the server has authentication disabled
    #[serde(default)]
    pub password: Option<String>,
}

/// A single mask entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaskConfig {
    #[serde(default)]
    pub name: String,

    /// OBS source name
    #[serde(default)]
    pub source: String,

    /// Optional scene hint; empty means auto-detect
    #[serde(default)]
    pub scene: String,

    #[serde(default)]
    pub hotkey: HotkeyConfig,
}

/// Key plus modifier names, as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub modifiers: Vec<String>,
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_owned()));
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        let config = Self::from_yaml(&data).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        // Fail early on an address we can't turn into a URL
        config.obs.host()?;

        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(data: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(data)
    }

    /// Masks eligible for activation: name and source set, names unique.
    ///
    /// Ineligible entries are logged and skipped.
    pub fn active_masks(&self) -> Vec<&MaskConfig> {
        let mut seen = HashSet::new();
        let mut active = Vec::with_capacity(self.masks.len());

        for mask in &self.masks {
            if !mask.is_eligible() {
                warn!(
                    mask = %mask.name,
                    source = %mask.source,
                    "invalid mask configuration, skipping"
                );
                continue;
            }
            if !seen.insert(mask.name.as_str()) {
                warn!(mask = %mask.name, "duplicate mask name, skipping");
                continue;
            }
            active.push(mask);
        }

        active
    }
}

impl ObsConfig {
    /// Host part of the address with any `http://` or `ws://` prefix removed
    pub fn host(&self) -> Result<&str, ConfigError> {
        let address = self.address.trim();
        let host = address
            .strip_prefix("http://")
            .or_else(|| address.strip_prefix("ws://"))
            .unwrap_or(address);

        // IPv6 literals and embedded ports are unsupported
        if host.is_empty() || host.contains(':') {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }
        Ok(host)
    }

    /// WebSocket URL of the OBS server
    pub fn websocket_url(&self) -> Result<String, ConfigError> {
        Ok(format!("ws://{}:{}", self.host()?, self.port))
    }
}

impl MaskConfig {
    /// Name and source must both be present
    pub fn is_eligible(&self) -> bool {
        !self.name.trim().is_empty() && !self.source.trim().is_empty()
    }

    /// The scene hint, if it names a usable scene
    pub fn scene_hint(&self) -> Option<&str> {
        usable_scene_hint(&self.scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
obs:
  address: "ws://192.168.1.10"
  port: 4455
  password: "hunter2"
masks:
  - name: Blur
    source: BlurFilter
    hotkey:
      key: B
      modifiers: [ctrl, shift]
  - name: Logo
    source: LogoPNG
    scene: Intro
    hotkey:
      key: L
      modifiers: [alt]
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.obs.password.as_deref(), Some("hunter2"));
        assert!(!config.verify_scene_hints);
        assert_eq!(config.masks.len(), 2);
        assert_eq!(config.masks[0].hotkey.modifiers, vec!["ctrl", "shift"]);
        assert_eq!(config.masks[1].scene_hint(), Some("Intro"));
        assert_eq!(config.masks[0].scene_hint(), None);
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_yaml(include_str!("../conf.example.yaml")).unwrap();
        assert_eq!(config.active_masks().len(), 2);
        assert_eq!(config.masks[1].hotkey.key, "F9");
    }

    #[test]
    fn test_websocket_url_strips_protocol() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.obs.websocket_url().unwrap(), "ws://192.168.1.10:4455");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("obs: {}\n").unwrap();
        assert_eq!(config.obs.websocket_url().unwrap(), "ws://localhost:4455");
        assert!(config.obs.password.is_none());
        assert!(config.masks.is_empty());
    }

    #[test]
    fn test_address_with_port_rejected() {
        let config = Config::from_yaml("obs:\n  address: \"http://host:4455\"\n").unwrap();
        assert!(matches!(
            config.obs.host(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_placeholder_and_blank_hints_ignored() {
        let placeholder = MaskConfig {
            scene: "场景".to_string(),
            ..Default::default()
        };
        let blank = MaskConfig {
            scene: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(placeholder.scene_hint(), None);
        assert_eq!(blank.scene_hint(), None);
    }

    #[test]
    fn test_active_masks_skips_invalid_and_duplicates() {
        let yaml = r#"
obs: {}
masks:
  - name: A
    source: SrcA
  - name: ""
    source: SrcB
  - name: C
  - name: A
    source: Other
  - name: D
    source: SrcD
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let names: Vec<_> = config.active_masks().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
        assert_eq!(config.active_masks()[0].source, "SrcA");
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("obs-mask-hotkeys-does-not-exist.yaml");
        assert!(matches!(Config::load(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "obs-mask-hotkeys-test-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.masks[0].name, "Blur");
    }

    #[test]
    fn test_load_rejects_bad_yaml() {
        let path = std::env::temp_dir().join(format!(
            "obs-mask-hotkeys-bad-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "obs: [unterminated").unwrap();
        let result = Config::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
