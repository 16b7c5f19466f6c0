//! # BizDock Extension Errors
//!
//! [`ExtensionError`] covers bundle loading (missing file, missing or
//! malformed descriptor, controller instantiation), descriptor validation,
//! class resolution and the extension manager operations.
use std::path::PathBuf;

use crate::web_command::error::WebCommandError;

/// Boxed cause attached to a load failure
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Unable to load the extension '{path}': {message}")]
    LoadError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Invalid extension descriptor: {message}")]
    DescriptorError { message: String },

    #[error("Extension manager error: {0}")]
    ManagerError(String),

    #[error("Unknown class '{class_name}' in the extension '{extension}'")]
    UnknownClass {
        extension: String,
        class_name: String,
    },

    #[error("Web command error: {0}")]
    WebCommand(#[from] WebCommandError),
}

impl ExtensionError {
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ExtensionError::LoadError {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn load_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: impl Into<BoxedCause>,
    ) -> Self {
        ExtensionError::LoadError {
            path: path.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn descriptor(message: impl Into<String>) -> Self {
        ExtensionError::DescriptorError {
            message: message.into(),
        }
    }
}
