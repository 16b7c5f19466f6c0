//! # BizDock Core
//!
//! Extension loading and plugin lifecycle runtime. Extensions are bundle
//! files whose descriptor declares web controllers, plugin types, i18n
//! messages and menu changes; plugin configurations of those types are
//! registered, started, stopped and fed provisioning events through
//! per-plugin worker pools.
pub mod event;
pub mod extension;
pub mod kernel;
pub mod plugin_system;
pub mod storage;
pub mod utils;
pub mod web_command;

pub use event::{EventMessage, FlowType, MessageType};
pub use extension::{ClassRegistry, ExtensionManager};
pub use kernel::error::Error as KernelError;
pub use kernel::Application;
pub use plugin_system::{DefaultPluginManager, PluginManager, PluginRunner, PluginStatus};
pub use storage::{RuntimeSettings, StorageProvider};
pub use web_command::{Controller, RequestContext};

#[cfg(test)]
mod tests;
