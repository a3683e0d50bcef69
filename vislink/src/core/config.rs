//! Configuration
//!
//! TOML-backed configuration with typed sections. The engine itself only
//! needs [`LinkConfig`]; embedding applications can hang their own sections
//! off the same store by implementing [`Configurable`].

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::core::handshake::Identity;

/// Trait for types loadable from a configuration section.
///
/// `PREFIX` names the TOML table the section is read from.
pub trait Configurable: DeserializeOwned + Default {
    const PREFIX: &'static str;
}

/// Configuration storage with TOML support
pub struct ConfigStore {
    data: toml::Value,
    path: Option<PathBuf>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigStore {
    /// Create an empty store; every section deserializes to its default
    pub fn empty() -> Self {
        Self {
            data: toml::Value::Table(Default::default()),
            path: None,
        }
    }

    /// Parse a store from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let data: toml::Value =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML: {}", e))?;
        Ok(Self { data, path: None })
    }

    /// Load a store from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let data: toml::Value = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse TOML in '{}': {}", path.display(), e))?;

        Ok(Self {
            data,
            path: Some(path.to_path_buf()),
        })
    }

    /// Get a typed section, falling back to its default when absent
    pub fn get<C: Configurable>(&self) -> Result<C> {
        let section = self
            .data
            .get(C::PREFIX)
            .cloned()
            .unwrap_or(toml::Value::Table(Default::default()));

        debug!("Loading config section: {}", C::PREFIX);

        let config: C = section
            .try_into()
            .map_err(|e| anyhow!("Failed to deserialize config section '{}': {}", C::PREFIX, e))?;

        Ok(config)
    }

    /// Check whether a section is present
    pub fn has_section(&self, prefix: &str) -> bool {
        self.data.get(prefix).is_some()
    }

    /// Path the store was loaded from, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Engine configuration section
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LinkConfig {
    /// WebSocket URL of the device endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Access token appended to the URL as a query parameter
    #[serde(default)]
    pub access_token: Option<String>,

    /// Name this endpoint announces during the identity handshake
    #[serde(default = "default_name")]
    pub name: String,

    /// Version this endpoint announces during the identity handshake
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional vendor string for the identity record
    #[serde(default)]
    pub vendor: Option<String>,

    /// Capacity of the engine's command and inbound channels
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            access_token: None,
            name: default_name(),
            version: default_version(),
            vendor: None,
            channel_capacity: default_capacity(),
        }
    }
}

impl LinkConfig {
    /// Device URL with the access token appended if configured
    pub fn url_with_token(&self) -> String {
        match &self.access_token {
            Some(token) if !token.is_empty() => {
                if self.url.contains('?') {
                    format!("{}&access_token={}", self.url, token)
                } else {
                    format!("{}?access_token={}", self.url, token)
                }
            }
            _ => self.url.clone(),
        }
    }

    /// Identity record announced during the handshake
    pub fn identity(&self) -> Identity {
        Identity {
            name: self.name.clone(),
            version: self.version.clone(),
            vendor: self.vendor.clone(),
        }
    }
}

fn default_url() -> String {
    "ws://192.168.0.10:2342".to_string()
}

fn default_name() -> String {
    "vislink".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_capacity() -> usize {
    100
}

impl Configurable for LinkConfig {
    const PREFIX: &'static str = "link";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_yields_defaults() {
        let store = ConfigStore::empty();
        let config: LinkConfig = store.get().unwrap();
        assert_eq!(config.url, default_url());
        assert_eq!(config.channel_capacity, 100);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn section_overrides_defaults() {
        let toml = r#"
            [link]
            url = "ws://10.0.0.7:2342"
            name = "inspection-host"
        "#;

        let store = ConfigStore::parse(toml).unwrap();
        let config: LinkConfig = store.get().unwrap();
        assert_eq!(config.url, "ws://10.0.0.7:2342");
        assert_eq!(config.name, "inspection-host");
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn token_is_appended_as_query() {
        let mut config = LinkConfig::default();
        config.access_token = Some("secret".into());
        assert!(config.url_with_token().ends_with("?access_token=secret"));

        config.url = "ws://device/ws?mode=rpc".into();
        assert!(config.url_with_token().ends_with("&access_token=secret"));
    }

    #[test]
    fn missing_section_is_not_an_error() {
        let store = ConfigStore::parse("[other]\nx = 1\n").unwrap();
        assert!(!store.has_section("link"));
        assert!(store.get::<LinkConfig>().is_ok());
    }
}
