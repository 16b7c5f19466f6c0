//! Persistence façade of the plugin manager.
//!
//! [`PluginStore`] is what the surrounding application implements on top of
//! its database; [`InMemoryPluginStore`] keeps everything in process and is
//! what the CLI and the tests use.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::event::{EventInterfaceConfiguration, EventMessage, FlowType};
use crate::plugin_system::error::PluginSystemError;

pub const LOG_EVENT_START: &str = "START";
pub const LOG_EVENT_STOP: &str = "STOP";
pub const LOG_EVENT_UNKNOWN: &str = "UNKNOWN";

/// Shared identity of a plugin type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDefinition {
    pub identifier: String,
    /// False when no loaded extension provides the identifier
    pub is_available: bool,
}

/// A named instance of a plugin definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfiguration {
    pub id: i64,
    pub name: String,
    pub identifier: String,
    pub is_autostart: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginLogEntry {
    pub plugin_configuration_id: i64,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_error: bool,
    /// `START`, `STOP` or the type of the handled message
    pub event: String,
    pub log_message: String,
    pub data_type: Option<String>,
    pub internal_id: Option<i64>,
    pub external_id: Option<String>,
}

impl PluginLogEntry {
    pub fn lifecycle(plugin_configuration_id: i64, event: &str, is_error: bool, log_message: impl Into<String>) -> Self {
        Self {
            plugin_configuration_id,
            transaction_id: None,
            created_at: Utc::now(),
            is_error,
            event: event.to_string(),
            log_message: log_message.into(),
            data_type: None,
            internal_id: None,
            external_id: None,
        }
    }

    /// Entry about the handling of `message`, if any
    pub fn event_handling(
        plugin_configuration_id: i64,
        transaction_id: impl Into<String>,
        is_error: bool,
        message: Option<&EventMessage>,
        log_message: impl Into<String>,
    ) -> Self {
        Self {
            plugin_configuration_id,
            transaction_id: Some(transaction_id.into()),
            created_at: Utc::now(),
            is_error,
            event: message
                .map(|m| m.message_type.as_str())
                .unwrap_or(LOG_EVENT_UNKNOWN)
                .to_string(),
            log_message: log_message.into(),
            data_type: message.and_then(|m| m.data_type.clone()),
            internal_id: message.and_then(|m| m.internal_id),
            external_id: message.and_then(|m| m.external_id.clone()),
        }
    }
}

/// Saved value of a configuration block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfigurationBlock {
    pub identifier: String,
    pub version: i32,
    pub value: Vec<u8>,
}

/// Association between an internal object and an external one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationLink {
    pub id: i64,
    pub plugin_configuration_id: i64,
    pub internal_id: Option<i64>,
    pub external_id: Option<String>,
    pub link_type: String,
    pub parent_id: Option<i64>,
}

#[async_trait]
pub trait PluginStore: Send + Sync {
    async fn definitions(&self) -> Result<Vec<PluginDefinition>, PluginSystemError>;

    /// Return the definition of `identifier`, creating an available one
    async fn ensure_definition(&self, identifier: &str) -> Result<PluginDefinition, PluginSystemError>;

    async fn set_definition_availability(&self, identifier: &str, is_available: bool) -> Result<(), PluginSystemError>;

    async fn configurations(&self) -> Result<Vec<PluginConfiguration>, PluginSystemError>;

    async fn configuration(&self, id: i64) -> Result<Option<PluginConfiguration>, PluginSystemError>;

    async fn create_configuration(
        &self,
        name: &str,
        identifier: &str,
        is_autostart: bool,
    ) -> Result<PluginConfiguration, PluginSystemError>;

    async fn set_autostart(&self, id: i64, is_autostart: bool) -> Result<(), PluginSystemError>;

    /// Delete a configuration and everything attached to it
    async fn delete_configuration(&self, id: i64) -> Result<(), PluginSystemError>;

    async fn save_log(&self, entry: PluginLogEntry) -> Result<(), PluginSystemError>;

    async fn logs(&self, id: i64) -> Result<Vec<PluginLogEntry>, PluginSystemError>;

    async fn state(&self, id: i64) -> Result<Option<Vec<u8>>, PluginSystemError>;

    async fn set_state(&self, id: i64, state: Option<Vec<u8>>) -> Result<(), PluginSystemError>;

    async fn configuration_block(
        &self,
        id: i64,
        block_identifier: &str,
    ) -> Result<Option<StoredConfigurationBlock>, PluginSystemError>;

    async fn save_configuration_block(&self, id: i64, block: StoredConfigurationBlock) -> Result<(), PluginSystemError>;

    /// Every link of a configuration, by ascending id
    async fn links(&self, id: i64) -> Result<Vec<IdentificationLink>, PluginSystemError>;

    /// Persist a link; its `id` is assigned by the store
    async fn create_link(&self, link: IdentificationLink) -> Result<IdentificationLink, PluginSystemError>;

    async fn delete_link(&self, link_id: i64) -> Result<(), PluginSystemError>;

    async fn registration(
        &self,
        id: i64,
        data_type: &str,
        internal_id: i64,
    ) -> Result<Option<Vec<u8>>, PluginSystemError>;

    async fn set_registration(
        &self,
        id: i64,
        data_type: &str,
        internal_id: i64,
        configuration: Vec<u8>,
    ) -> Result<(), PluginSystemError>;

    async fn remove_registration(&self, id: i64, data_type: &str, internal_id: i64) -> Result<(), PluginSystemError>;

    async fn event_interface_configuration(
        &self,
        id: i64,
        flow: FlowType,
    ) -> Result<Option<EventInterfaceConfiguration>, PluginSystemError>;

    async fn set_event_interface_configuration(
        &self,
        id: i64,
        flow: FlowType,
        configuration: EventInterfaceConfiguration,
    ) -> Result<(), PluginSystemError>;
}

#[derive(Debug, Default)]
struct StoreState {
    definitions: Vec<PluginDefinition>,
    configurations: Vec<PluginConfiguration>,
    next_configuration_id: i64,
    logs: Vec<PluginLogEntry>,
    states: HashMap<i64, Vec<u8>>,
    blocks: HashMap<(i64, String), StoredConfigurationBlock>,
    links: Vec<IdentificationLink>,
    next_link_id: i64,
    registrations: HashMap<(i64, String, i64), Vec<u8>>,
    event_interfaces: HashMap<(i64, FlowType), EventInterfaceConfiguration>,
}

/// Store keeping everything in memory
#[derive(Debug, Default)]
pub struct InMemoryPluginStore {
    state: Mutex<StoreState>,
}

impl InMemoryPluginStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown_configuration(id: i64) -> PluginSystemError {
    PluginSystemError::StoreError(format!("Plugin configuration for {} not found", id))
}

#[async_trait]
impl PluginStore for InMemoryPluginStore {
    async fn definitions(&self) -> Result<Vec<PluginDefinition>, PluginSystemError> {
        Ok(self.state.lock().await.definitions.clone())
    }

    async fn ensure_definition(&self, identifier: &str) -> Result<PluginDefinition, PluginSystemError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.definitions.iter().find(|d| d.identifier == identifier) {
            return Ok(existing.clone());
        }
        let definition = PluginDefinition {
            identifier: identifier.to_string(),
            is_available: true,
        };
        state.definitions.push(definition.clone());
        Ok(definition)
    }

    async fn set_definition_availability(&self, identifier: &str, is_available: bool) -> Result<(), PluginSystemError> {
        let mut state = self.state.lock().await;
        let definition = state
            .definitions
            .iter_mut()
            .find(|d| d.identifier == identifier)
            .ok_or_else(|| PluginSystemError::StoreError(format!("Unknown plugin definition '{}'", identifier)))?;
        definition.is_available = is_available;
        Ok(())
    }

    async fn configurations(&self) -> Result<Vec<PluginConfiguration>, PluginSystemError> {
        Ok(self.state.lock().await.configurations.clone())
    }

    async fn configuration(&self, id: i64) -> Result<Option<PluginConfiguration>, PluginSystemError> {
        Ok(self
            .state
            .lock()
            .await
            .configurations
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_configuration(
        &self,
        name: &str,
        identifier: &str,
        is_autostart: bool,
    ) -> Result<PluginConfiguration, PluginSystemError> {
        let mut state = self.state.lock().await;
        state.next_configuration_id += 1;
        let configuration = PluginConfiguration {
            id: state.next_configuration_id,
            name: name.to_string(),
            identifier: identifier.to_string(),
            is_autostart,
        };
        state.configurations.push(configuration.clone());
        Ok(configuration)
    }

    async fn set_autostart(&self, id: i64, is_autostart: bool) -> Result<(), PluginSystemError> {
        let mut state = self.state.lock().await;
        let configuration = state
            .configurations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| unknown_configuration(id))?;
        configuration.is_autostart = is_autostart;
        Ok(())
    }

    async fn delete_configuration(&self, id: i64) -> Result<(), PluginSystemError> {
        let mut state = self.state.lock().await;
        let before = state.configurations.len();
        state.configurations.retain(|c| c.id != id);
        if state.configurations.len() == before {
            return Err(unknown_configuration(id));
        }
        state.logs.retain(|l| l.plugin_configuration_id != id);
        state.states.remove(&id);
        state.blocks.retain(|(owner, _), _| *owner != id);
        state.links.retain(|l| l.plugin_configuration_id != id);
        state.registrations.retain(|(owner, _, _), _| *owner != id);
        state.event_interfaces.retain(|(owner, _), _| *owner != id);
        Ok(())
    }

    async fn save_log(&self, entry: PluginLogEntry) -> Result<(), PluginSystemError> {
        self.state.lock().await.logs.push(entry);
        Ok(())
    }

    async fn logs(&self, id: i64) -> Result<Vec<PluginLogEntry>, PluginSystemError> {
        Ok(self
            .state
            .lock()
            .await
            .logs
            .iter()
            .filter(|l| l.plugin_configuration_id == id)
            .cloned()
            .collect())
    }

    async fn state(&self, id: i64) -> Result<Option<Vec<u8>>, PluginSystemError> {
        Ok(self.state.lock().await.states.get(&id).cloned())
    }

    async fn set_state(&self, id: i64, value: Option<Vec<u8>>) -> Result<(), PluginSystemError> {
        let mut state = self.state.lock().await;
        if !state.configurations.iter().any(|c| c.id == id) {
            return Err(unknown_configuration(id));
        }
        match value {
            Some(bytes) => state.states.insert(id, bytes),
            None => state.states.remove(&id),
        };
        Ok(())
    }

    async fn configuration_block(
        &self,
        id: i64,
        block_identifier: &str,
    ) -> Result<Option<StoredConfigurationBlock>, PluginSystemError> {
        Ok(self
            .state
            .lock()
            .await
            .blocks
            .get(&(id, block_identifier.to_string()))
            .cloned())
    }

    async fn save_configuration_block(&self, id: i64, block: StoredConfigurationBlock) -> Result<(), PluginSystemError> {
        self.state
            .lock()
            .await
            .blocks
            .insert((id, block.identifier.clone()), block);
        Ok(())
    }

    async fn links(&self, id: i64) -> Result<Vec<IdentificationLink>, PluginSystemError> {
        Ok(self
            .state
            .lock()
            .await
            .links
            .iter()
            .filter(|l| l.plugin_configuration_id == id)
            .cloned()
            .collect())
    }

    async fn create_link(&self, mut link: IdentificationLink) -> Result<IdentificationLink, PluginSystemError> {
        let mut state = self.state.lock().await;
        state.next_link_id += 1;
        link.id = state.next_link_id;
        state.links.push(link.clone());
        Ok(link)
    }

    async fn delete_link(&self, link_id: i64) -> Result<(), PluginSystemError> {
        self.state.lock().await.links.retain(|l| l.id != link_id);
        Ok(())
    }

    async fn registration(
        &self,
        id: i64,
        data_type: &str,
        internal_id: i64,
    ) -> Result<Option<Vec<u8>>, PluginSystemError> {
        Ok(self
            .state
            .lock()
            .await
            .registrations
            .get(&(id, data_type.to_string(), internal_id))
            .cloned())
    }

    async fn set_registration(
        &self,
        id: i64,
        data_type: &str,
        internal_id: i64,
        configuration: Vec<u8>,
    ) -> Result<(), PluginSystemError> {
        self.state
            .lock()
            .await
            .registrations
            .insert((id, data_type.to_string(), internal_id), configuration);
        Ok(())
    }

    async fn remove_registration(&self, id: i64, data_type: &str, internal_id: i64) -> Result<(), PluginSystemError> {
        self.state
            .lock()
            .await
            .registrations
            .remove(&(id, data_type.to_string(), internal_id));
        Ok(())
    }

    async fn event_interface_configuration(
        &self,
        id: i64,
        flow: FlowType,
    ) -> Result<Option<EventInterfaceConfiguration>, PluginSystemError> {
        Ok(self.state.lock().await.event_interfaces.get(&(id, flow)).copied())
    }

    async fn set_event_interface_configuration(
        &self,
        id: i64,
        flow: FlowType,
        configuration: EventInterfaceConfiguration,
    ) -> Result<(), PluginSystemError> {
        self.state
            .lock()
            .await
            .event_interfaces
            .insert((id, flow), configuration);
        Ok(())
    }
}
