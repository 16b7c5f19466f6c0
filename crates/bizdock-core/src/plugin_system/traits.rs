use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::event::EventMessage;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::error::PluginError;

/// Entry a started plugin adds to the tools menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMenuDescriptor {
    pub label: String,
    /// Relative to the plugin controllers
    pub path: String,
}

/// An action a plugin offers on an object of a data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginActionDescriptor {
    pub identifier: String,
    pub label: String,
    pub is_admin: bool,
    pub data_type: String,
}

/// Core trait implemented by the runner of one plugin configuration.
///
/// `start` and `stop` run on the lifecycle worker of the configuration; the
/// two message handlers run on its IN and OUT worker pools. A hook that
/// panics is treated like a hook returning an error.
#[async_trait]
pub trait PluginRunner: Send + Sync {
    /// Called once when the runner is instantiated for a configuration
    async fn init(&self, _context: Arc<PluginContext>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PluginError>;

    /// Errors are logged, the plugin is considered stopped anyway
    async fn stop(&self) -> Result<(), PluginError>;

    /// A message coming from the plugin side
    async fn handle_in_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError>;

    /// A message going to the plugin side
    async fn handle_out_provisioning_message(&self, message: &EventMessage) -> Result<(), PluginError>;

    fn menu_descriptor(&self) -> Option<PluginMenuDescriptor> {
        None
    }

    fn action_descriptors(&self) -> Vec<PluginActionDescriptor> {
        Vec::new()
    }
}
