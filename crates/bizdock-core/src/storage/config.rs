use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::StorageProvider;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory configuration document.
///
/// Keys may be flat (`"ext.directory": "..."`) or nested
/// (`{"ext": {"directory": "..."}}`); [`ConfigData::get`] resolves both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hashmap(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    fn lookup(&self, key: &str) -> Option<&serde_json::Value> {
        if let Some(value) = self.values.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Get a configuration value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.lookup(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Merge with another config, overriding existing values
    pub fn merge(&mut self, other: &ConfigData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let serialized = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self).map_err(|e| serialization("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(&self).map_err(|e| serialization("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(&self).map_err(|e| serialization("toml", e)),
        };
        Ok(serialized?)
    }

    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| deserialization("json", e)),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| deserialization("yaml", e)),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| deserialization("toml", e)),
        };
        Ok(parsed?)
    }

    /// Load a configuration file through `provider`. A missing file yields
    /// an empty configuration.
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        if !provider.exists(path) {
            return Ok(Self::new());
        }
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat(path.display().to_string())
        })?;
        let content = provider.read_to_string(path)?;
        Self::deserialize(&content, format)
    }

    /// Save through `provider`, in the format given by the file extension
    /// (JSON if unknown).
    pub fn save(&self, provider: &dyn StorageProvider, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path).unwrap_or(ConfigFormat::Json);
        provider.write_string(path, &self.serialize(format)?)
    }
}

fn serialization<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::SerializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}

fn deserialization<E: std::error::Error + Send + Sync + 'static>(format: &str, e: E) -> StorageSystemError {
    StorageSystemError::DeserializationError {
        format: format.to_string(),
        source: Box::new(e),
    }
}

pub const EXT_DIRECTORY: &str = "ext.directory";
pub const EXT_AUTO_REFRESH_STATUS: &str = "ext.auto_refresh.status";
pub const EXT_AUTO_REFRESH_FREQUENCY: &str = "ext.auto_refresh.frequency";
pub const PUBLIC_URL: &str = "public.url";
pub const CONTEXT_PATH: &str = "context.path";
pub const PLUGINS_SHARED_STORAGE: &str = "plugins.shared_storage";
pub const PLUGINS_PROBE_TIMEOUT: &str = "plugins.probe_timeout";
pub const PLUGINS_EVENT_BROADCASTING: &str = "plugins.event_broadcasting";

/// Typed runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Directory scanned for bundles
    pub extension_directory: PathBuf,
    pub auto_refresh: bool,
    pub auto_refresh_frequency: Duration,
    pub public_url: String,
    pub context_path: String,
    /// Root of the storage shared by plugins
    pub shared_storage: PathBuf,
    /// Bound of the liveness probe run before a plugin start
    pub probe_timeout: Duration,
    /// Post OUT messages when business objects change
    pub event_broadcasting: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&ConfigData::new())
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &ConfigData) -> Self {
        Self {
            extension_directory: PathBuf::from(config.get_or(EXT_DIRECTORY, "extensions".to_string())),
            auto_refresh: config.get_or(EXT_AUTO_REFRESH_STATUS, false),
            auto_refresh_frequency: Duration::from_secs(config.get_or(EXT_AUTO_REFRESH_FREQUENCY, 30u64).max(1)),
            public_url: config.get_or(PUBLIC_URL, "http://localhost:9000".to_string()),
            context_path: config.get_or(CONTEXT_PATH, String::new()),
            shared_storage: PathBuf::from(config.get_or(PLUGINS_SHARED_STORAGE, "shared".to_string())),
            probe_timeout: Duration::from_secs(config.get_or(PLUGINS_PROBE_TIMEOUT, 5u64)),
            event_broadcasting: config.get_or(PLUGINS_EVENT_BROADCASTING, false),
        }
    }

    /// Prefix of the links generated for extension commands
    pub fn extension_link_prefix(&self) -> String {
        format!(
            "{}{}/ext",
            self.public_url.trim_end_matches('/'),
            self.context_path.trim_end_matches('/')
        )
    }
}
