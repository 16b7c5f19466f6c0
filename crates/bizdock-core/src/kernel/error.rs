//! # BizDock Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] enum and the [`Result`] alias returned by
//! every public operation of the runtime.
//!
//! Each subsystem owns a typed error ([`ExtensionError`], [`WebCommandError`],
//! [`PluginSystemError`], [`EventSystemError`], [`StorageSystemError`]) that
//! converts into [`Error`] through `#[from]`, so `?` works across module
//! boundaries. Kernel lifecycle failures (bootstrap, component start/stop)
//! carry the [`KernelLifecyclePhase`] they happened in.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::event::error::EventSystemError;
use crate::extension::error::ExtensionError;
use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;
use crate::web_command::error::WebCommandError;

/// Error type shared by the whole runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Bundle loading and extension management failures
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// Command registration, dispatch or link generation failures
    #[error("Web command error: {0}")]
    WebCommand(#[from] WebCommandError),

    /// Plugin registry, lifecycle and dispatch failures
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Worker pool failures
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// I/O and configuration document failures
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase:?}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        type_id_str: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error related to the DependencyRegistry operations or component lookup failures.
    #[error("Component registry error during operation '{operation}': {message}")]
    ComponentRegistryError {
        operation: String,
        component_name: Option<String>,
        message: String,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("RunPreCheck")]
    RunPreCheck,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Wrap an I/O error with the operation and the path it failed on.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }
}
