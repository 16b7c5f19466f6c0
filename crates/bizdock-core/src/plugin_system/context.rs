//! Services offered by the runtime to one plugin configuration.
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::Level;
use tokio::sync::RwLock;

use crate::event::EventMessage;
use crate::extension::descriptor::{ConfigurationBlockDescriptor, ConfigurationBlockType, PluginDescriptor};
use crate::plugin_system::error::{PluginError, PluginSystemError};
use crate::plugin_system::store::{
    IdentificationLink, PluginLogEntry, PluginStore, StoredConfigurationBlock, LOG_EVENT_START, LOG_EVENT_STOP,
};
use crate::storage::StorageProvider;
use crate::utils::properties;

/// Transaction id of the log written when a plugin asks to be stopped
pub const KILL_TRANSACTION_ID: &str = "-9";

/// What a plugin context needs from the plugin manager
#[async_trait]
pub trait PluginHost: Send + Sync {
    async fn post_out_message(&self, message: EventMessage) -> Result<(), PluginSystemError>;

    async fn request_stop(&self, plugin_configuration_id: i64);
}

/// Process-wide values shared by every plugin
#[derive(Debug, Default)]
pub struct SharedContext {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.values.write().await.insert(key.into(), value);
    }

    pub async fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.values.write().await.remove(key)
    }
}

/// Context of one plugin configuration, handed to its runner at init.
pub struct PluginContext {
    plugin_configuration_id: i64,
    plugin_configuration_name: String,
    descriptor: Arc<PluginDescriptor>,
    prefix: String,
    store: Arc<dyn PluginStore>,
    host: Arc<dyn PluginHost>,
    shared_storage: Arc<dyn StorageProvider>,
    shared_context: Arc<SharedContext>,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_configuration_id", &self.plugin_configuration_id)
            .field("identifier", &self.descriptor.identifier)
            .finish_non_exhaustive()
    }
}

fn plugin_failure(e: PluginSystemError) -> PluginError {
    PluginError::with_source("plugin store operation failed", e)
}

impl PluginContext {
    pub fn new(
        plugin_configuration_id: i64,
        plugin_configuration_name: impl Into<String>,
        descriptor: Arc<PluginDescriptor>,
        store: Arc<dyn PluginStore>,
        host: Arc<dyn PluginHost>,
        shared_storage: Arc<dyn StorageProvider>,
        shared_context: Arc<SharedContext>,
    ) -> Self {
        let prefix = format!("[PLUGIN {}-{}] ", descriptor.identifier, plugin_configuration_id);
        Self {
            plugin_configuration_id,
            plugin_configuration_name: plugin_configuration_name.into(),
            descriptor,
            prefix,
            store,
            host,
            shared_storage,
            shared_context,
        }
    }

    pub fn plugin_configuration_id(&self) -> i64 {
        self.plugin_configuration_id
    }

    pub fn plugin_configuration_name(&self) -> &str {
        &self.plugin_configuration_name
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn shared_context(&self) -> &Arc<SharedContext> {
        &self.shared_context
    }

    pub fn log(&self, level: Level, message: &str, error: Option<&(dyn StdError + 'static)>) {
        match error {
            Some(e) => log::log!(level, "{}{}: {}", self.prefix, message, e),
            None => log::log!(level, "{}{}", self.prefix, message),
        }
    }

    // Reports

    pub async fn report_on_start_up(&self, is_error: bool, message: &str, error: Option<&PluginError>) -> Result<(), PluginError> {
        let text = with_trace(message, error);
        self.store
            .save_log(PluginLogEntry::lifecycle(self.plugin_configuration_id, LOG_EVENT_START, is_error, text))
            .await
            .map_err(plugin_failure)
    }

    pub async fn report_on_stop(&self, is_error: bool, message: &str, error: Option<&PluginError>) -> Result<(), PluginError> {
        let text = with_trace(message, error);
        self.store
            .save_log(PluginLogEntry::lifecycle(self.plugin_configuration_id, LOG_EVENT_STOP, is_error, text))
            .await
            .map_err(plugin_failure)
    }

    pub async fn report_on_event_handling(
        &self,
        transaction_id: &str,
        is_error: bool,
        message: Option<&EventMessage>,
        log_message: &str,
        error: Option<&PluginError>,
    ) -> Result<(), PluginError> {
        let text = with_trace(log_message, error);
        self.store
            .save_log(PluginLogEntry::event_handling(
                self.plugin_configuration_id,
                transaction_id,
                is_error,
                message,
                text,
            ))
            .await
            .map_err(plugin_failure)
    }

    /// Free-form report, not tied to a message
    pub async fn report_message(&self, transaction_id: &str, is_error: bool, log_message: &str) -> Result<(), PluginError> {
        self.report_on_event_handling(transaction_id, is_error, None, log_message, None)
            .await
    }

    // State

    pub async fn get_state(&self) -> Result<Option<Vec<u8>>, PluginError> {
        self.store
            .state(self.plugin_configuration_id)
            .await
            .map_err(plugin_failure)
    }

    pub async fn set_state(&self, state: Option<Vec<u8>>) -> Result<(), PluginError> {
        self.store
            .set_state(self.plugin_configuration_id, state)
            .await
            .map_err(plugin_failure)
    }

    // Configuration blocks

    fn block(&self, identifier: &str) -> Result<&ConfigurationBlockDescriptor, PluginError> {
        self.descriptor.configuration_block(identifier).ok_or_else(|| {
            PluginError::new(format!(
                "Unknown configuration block '{}' for the plugin {}",
                identifier, self.descriptor.identifier
            ))
        })
    }

    /// Saved value of a block and whether it is older than the descriptor
    /// version. Without a saved value, the default is returned (never
    /// stale) if `default_if_null` is set.
    pub async fn get_configuration(
        &self,
        block_identifier: &str,
        default_if_null: bool,
    ) -> Result<Option<(bool, Vec<u8>)>, PluginError> {
        let block = self.block(block_identifier)?;
        let stored = self
            .store
            .configuration_block(self.plugin_configuration_id, block_identifier)
            .await
            .map_err(plugin_failure)?;
        Ok(match stored {
            Some(saved) => Some((saved.version < block.version, saved.value)),
            None if default_if_null => Some((false, block.default_value.clone())),
            None => None,
        })
    }

    /// Value of a PROPERTIES block, migrated to the layout of the default
    /// value (and saved) when the saved version is stale.
    pub async fn get_configuration_and_merge_with_default(&self, block_identifier: &str) -> Result<Vec<u8>, PluginError> {
        let block = self.block(block_identifier)?;
        if block.block_type != ConfigurationBlockType::Properties {
            return Err(PluginError::new(
                "This function can only work with properties configuration block",
            ));
        }
        let Some(saved) = self
            .store
            .configuration_block(self.plugin_configuration_id, block_identifier)
            .await
            .map_err(plugin_failure)?
        else {
            return Ok(block.default_value.clone());
        };
        if saved.version >= block.version {
            return Ok(saved.value);
        }

        let current = String::from_utf8(saved.value).map_err(|e| {
            PluginError::with_source(
                "Error while accessing the configuration, inconsistent state, please reset the configuration to default",
                e,
            )
        })?;
        let default = String::from_utf8_lossy(&block.default_value);
        let merged = properties::merge_with_default(&current, &default).into_bytes();
        self.store
            .save_configuration_block(
                self.plugin_configuration_id,
                StoredConfigurationBlock {
                    identifier: block.identifier.clone(),
                    version: block.version,
                    value: merged.clone(),
                },
            )
            .await
            .map_err(plugin_failure)?;
        Ok(merged)
    }

    pub async fn set_configuration(&self, block_identifier: &str, value: Vec<u8>) -> Result<(), PluginError> {
        let block = self.block(block_identifier)?;
        self.store
            .save_configuration_block(
                self.plugin_configuration_id,
                StoredConfigurationBlock {
                    identifier: block.identifier.clone(),
                    version: block.version,
                    value,
                },
            )
            .await
            .map_err(plugin_failure)
    }

    // Registrations

    pub async fn is_registered(&self, data_type: &str, internal_id: i64) -> Result<bool, PluginError> {
        Ok(self.get_registration_configuration(data_type, internal_id).await?.is_some())
    }

    pub async fn get_registration_configuration(
        &self,
        data_type: &str,
        internal_id: i64,
    ) -> Result<Option<Vec<u8>>, PluginError> {
        self.store
            .registration(self.plugin_configuration_id, data_type, internal_id)
            .await
            .map_err(plugin_failure)
    }

    pub async fn set_registration_configuration(
        &self,
        data_type: &str,
        internal_id: i64,
        configuration: Vec<u8>,
    ) -> Result<(), PluginError> {
        self.store
            .set_registration(self.plugin_configuration_id, data_type, internal_id, configuration)
            .await
            .map_err(plugin_failure)
    }

    pub async fn remove_registration(&self, data_type: &str, internal_id: i64) -> Result<(), PluginError> {
        self.store
            .remove_registration(self.plugin_configuration_id, data_type, internal_id)
            .await
            .map_err(plugin_failure)
    }

    // Identification links

    async fn links_of_type(&self, link_type: &str) -> Result<Vec<IdentificationLink>, PluginError> {
        let links = self
            .store
            .links(self.plugin_configuration_id)
            .await
            .map_err(plugin_failure)?;
        Ok(links.into_iter().filter(|l| l.link_type == link_type).collect())
    }

    /// The link matching both ids exactly
    async fn unique_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
    ) -> Result<Option<IdentificationLink>, PluginError> {
        Ok(self
            .links_of_type(link_type)
            .await?
            .into_iter()
            .find(|l| l.internal_id == internal_id && l.external_id.as_deref() == external_id))
    }

    /// A link of `link_type` holding either of the ids
    async fn one_to_one_link(
        &self,
        internal_id: i64,
        external_id: &str,
        link_type: &str,
    ) -> Result<Option<IdentificationLink>, PluginError> {
        Ok(self
            .links_of_type(link_type)
            .await?
            .into_iter()
            .find(|l| l.internal_id == Some(internal_id) || l.external_id.as_deref() == Some(external_id)))
    }

    pub async fn multiple_internal_ids(&self, external_id: &str, link_type: &str) -> Result<Vec<i64>, PluginError> {
        Ok(self
            .links_of_type(link_type)
            .await?
            .into_iter()
            .filter(|l| l.external_id.as_deref() == Some(external_id))
            .filter_map(|l| l.internal_id)
            .collect())
    }

    pub async fn multiple_external_ids(&self, internal_id: i64, link_type: &str) -> Result<Vec<String>, PluginError> {
        Ok(self
            .links_of_type(link_type)
            .await?
            .into_iter()
            .filter(|l| l.internal_id == Some(internal_id))
            .filter_map(|l| l.external_id)
            .collect())
    }

    pub async fn unique_internal_id(&self, external_id: &str, link_type: &str) -> Result<Option<i64>, PluginError> {
        let ids = self.multiple_internal_ids(external_id, link_type).await?;
        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            _ => Err(PluginError::new(format!(
                "More than one link has been found for the external id {}",
                external_id
            ))),
        }
    }

    pub async fn unique_external_id(&self, internal_id: i64, link_type: &str) -> Result<Option<String>, PluginError> {
        let mut ids = self.multiple_external_ids(internal_id, link_type).await?;
        match ids.len() {
            0 => Ok(None),
            1 => Ok(ids.pop()),
            _ => Err(PluginError::new(format!(
                "More than one link has been found for the internal id {}",
                internal_id
            ))),
        }
    }

    /// Internal id linked to `external_id` under the given parent link
    pub async fn unique_internal_id_with_parent(
        &self,
        external_id: &str,
        link_type: &str,
        parent_internal_id: Option<i64>,
        parent_external_id: Option<&str>,
        parent_link_type: &str,
    ) -> Result<Option<i64>, PluginError> {
        let parent = self
            .unique_link(parent_internal_id, parent_external_id, parent_link_type)
            .await?
            .ok_or_else(|| PluginError::new("Impossible to find the parent link"))?;
        let ids: Vec<Option<i64>> = self
            .links_of_type(link_type)
            .await?
            .into_iter()
            .filter(|l| l.parent_id == Some(parent.id) && l.external_id.as_deref() == Some(external_id))
            .map(|l| l.internal_id)
            .collect();
        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(*id),
            _ => Err(PluginError::new(format!(
                "More than one link has been found for the external id {}",
                external_id
            ))),
        }
    }

    /// Ids of the children of type `child_link_type` of a link
    pub async fn children_of_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
        child_link_type: &str,
    ) -> Result<Vec<(Option<i64>, Option<String>)>, PluginError> {
        let Some(parent) = self.unique_link(internal_id, external_id, link_type).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .links_of_type(child_link_type)
            .await?
            .into_iter()
            .filter(|l| l.parent_id == Some(parent.id))
            .map(|l| (l.internal_id, l.external_id))
            .collect())
    }

    /// Link two objects, neither of which may already be linked for `link_type`
    pub async fn create_one_to_one_link(&self, internal_id: i64, external_id: &str, link_type: &str) -> Result<(), PluginError> {
        if self.one_to_one_link(internal_id, external_id, link_type).await?.is_some() {
            return Err(PluginError::new(format!(
                "A link already exists between {} and {} for the linkType {} for the plugin {}",
                internal_id, external_id, link_type, self.plugin_configuration_id
            )));
        }
        self.create_link(Some(internal_id), Some(external_id), link_type).await
    }

    pub async fn create_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
    ) -> Result<(), PluginError> {
        self.insert_link(internal_id, external_id, link_type, None).await
    }

    /// Create a link under the parent link designated by the parent ids
    pub async fn create_child_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
        parent_internal_id: Option<i64>,
        parent_external_id: Option<&str>,
        parent_link_type: &str,
    ) -> Result<(), PluginError> {
        let parent = self
            .unique_link(parent_internal_id, parent_external_id, parent_link_type)
            .await?
            .ok_or_else(|| PluginError::new("Impossible to find the parent link"))?;
        self.insert_link(internal_id, external_id, link_type, Some(parent.id))
            .await
    }

    async fn insert_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
        parent_id: Option<i64>,
    ) -> Result<(), PluginError> {
        self.store
            .create_link(IdentificationLink {
                id: 0,
                plugin_configuration_id: self.plugin_configuration_id,
                internal_id,
                external_id: external_id.map(str::to_string),
                link_type: link_type.to_string(),
                parent_id,
            })
            .await
            .map(|_| ())
            .map_err(plugin_failure)
    }

    async fn delete_with_children(&self, link: &IdentificationLink) -> Result<(), PluginError> {
        let links = self
            .store
            .links(self.plugin_configuration_id)
            .await
            .map_err(plugin_failure)?;
        for child in links.iter().filter(|l| l.parent_id == Some(link.id)) {
            self.store.delete_link(child.id).await.map_err(plugin_failure)?;
        }
        self.store.delete_link(link.id).await.map_err(plugin_failure)
    }

    pub async fn delete_one_to_one_link(&self, internal_id: i64, external_id: &str, link_type: &str) -> Result<bool, PluginError> {
        match self.one_to_one_link(internal_id, external_id, link_type).await? {
            Some(link) => {
                self.delete_with_children(&link).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn delete_link(
        &self,
        internal_id: Option<i64>,
        external_id: Option<&str>,
        link_type: &str,
    ) -> Result<bool, PluginError> {
        match self.unique_link(internal_id, external_id, link_type).await? {
            Some(link) => {
                self.delete_with_children(&link).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn flush_all_links(&self) -> Result<(), PluginError> {
        let links = self
            .store
            .links(self.plugin_configuration_id)
            .await
            .map_err(plugin_failure)?;
        // Children before parents
        for link in links.iter().filter(|l| l.parent_id.is_some()) {
            self.store.delete_link(link.id).await.map_err(plugin_failure)?;
        }
        for link in links.iter().filter(|l| l.parent_id.is_none()) {
            self.store.delete_link(link.id).await.map_err(plugin_failure)?;
        }
        Ok(())
    }

    // Messaging

    pub async fn post_out_message(&self, message: EventMessage) -> Result<(), PluginError> {
        self.host
            .post_out_message(message)
            .await
            .map_err(|e| PluginError::with_source("unable to post the message", e))
    }

    /// Ask the plugin manager to stop this plugin
    pub async fn kill_me(&self) -> Result<(), PluginError> {
        self.host.request_stop(self.plugin_configuration_id).await;
        self.report_message(KILL_TRANSACTION_ID, true, "Plugin kill was requested")
            .await
    }

    // Shared storage

    pub fn shared_storage_read(&self, path: &Path) -> Result<Vec<u8>, PluginError> {
        Ok(self.shared_storage.read_to_bytes(path)?)
    }

    pub fn shared_storage_write(&self, path: &Path, contents: &[u8]) -> Result<(), PluginError> {
        Ok(self.shared_storage.write_bytes(path, contents)?)
    }

    pub fn shared_storage_delete(&self, path: &Path) -> Result<(), PluginError> {
        if self.shared_storage.is_dir(path) {
            Ok(self.shared_storage.remove_dir_all(path)?)
        } else {
            Ok(self.shared_storage.remove_file(path)?)
        }
    }

    /// Entries of a directory, relative to the shared storage root
    pub fn shared_storage_list(&self, path: &Path) -> Result<Vec<PathBuf>, PluginError> {
        Ok(self.shared_storage.read_dir(path)?)
    }

    pub fn shared_storage_rename(&self, from: &Path, to: &Path) -> Result<(), PluginError> {
        Ok(self.shared_storage.rename(from, to)?)
    }

    /// Move a file into `target_directory`, keeping its name
    pub fn shared_storage_move_to(&self, source: &Path, target_directory: &Path) -> Result<PathBuf, PluginError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| PluginError::new(format!("'{}' has no file name", source.display())))?;
        let target = target_directory.join(file_name);
        self.shared_storage.rename(source, &target)?;
        Ok(target)
    }
}

fn with_trace(message: &str, error: Option<&PluginError>) -> String {
    match error {
        Some(e) => format!("{}\nError trace:\n{}", message, e.detail()),
        None => message.to_string(),
    }
}
