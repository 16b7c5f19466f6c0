//! # BizDock Plugin System Errors
//!
//! [`PluginSystemError`] covers plugin administration: invalid lifecycle
//! transitions, unknown configurations, malformed event messages and store
//! failures. [`PluginError`] is the recoverable error a plugin runner returns
//! from its hooks; it never crosses the registry boundary as such.
use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Operation error on plugin {plugin_id}: {message}", plugin_id = .plugin_id.map(|id| id.to_string()).unwrap_or_else(|| "<unknown>".to_string()))]
    OperationError {
        plugin_id: Option<i64>,
        message: String,
    },

    #[error("Unknown plugin configuration {0}")]
    UnknownPlugin(i64),

    #[error("Invalid event message: {0}")]
    InvalidMessage(String),

    #[error("Plugin registration error for '{identifier}': {message}")]
    RegistrationError {
        identifier: String,
        message: String,
    },

    #[error("Plugin configuration error for plugin {plugin_id}: {message}")]
    ConfigurationError {
        plugin_id: i64,
        message: String,
    },

    #[error("Plugin store error: {0}")]
    StoreError(String),

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

impl PluginSystemError {
    pub fn operation(plugin_id: i64, message: impl Into<String>) -> Self {
        PluginSystemError::OperationError {
            plugin_id: Some(plugin_id),
            message: message.into(),
        }
    }

    pub fn configuration(plugin_id: i64, message: impl Into<String>) -> Self {
        PluginSystemError::ConfigurationError {
            plugin_id,
            message: message.into(),
        }
    }
}

/// Error returned by the hooks of a plugin runner
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PluginError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message followed by the chain of its causes
    pub fn detail(&self) -> String {
        let mut detail = self.message.clone();
        let mut cause = StdError::source(self);
        while let Some(e) = cause {
            detail.push_str("\nCaused by: ");
            detail.push_str(&e.to_string());
            cause = e.source();
        }
        detail
    }
}

impl From<crate::kernel::error::Error> for PluginError {
    fn from(e: crate::kernel::error::Error) -> Self {
        PluginError::with_source("runtime operation failed", e)
    }
}
