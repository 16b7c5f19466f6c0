use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::event::directory::ActorDirectory;
use crate::event::pool::WorkerPool;
use crate::event::{EventInterfaceConfiguration, EventMessage, FlowType, MessageType};
use crate::extension::descriptor::PluginDescriptor;
use crate::extension::manager::ExtensionManager;
use crate::extension::menu::MenuItem;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants::{PLUGIN_TOOL_ITEM_PREFIX, SHUTDOWN_GRACE_SECS};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::context::{PluginContext, PluginHost, SharedContext};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::lifecycle::{spawn_lifecycle_worker, RunnerProcessor};
use crate::plugin_system::registry::{EventPools, PluginRegistry, RegistrationEntry};
use crate::plugin_system::status::{LifecycleMessage, PluginStatus, StatusCallback};
use crate::plugin_system::store::{PluginLogEntry, PluginStore, StoredConfigurationBlock, LOG_EVENT_START};
use crate::storage::local::LocalStorageProvider;
use crate::storage::{RuntimeSettings, StorageProvider};

/// Summary of a registered plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: i64,
    pub name: String,
    pub identifier: String,
    pub status: PluginStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigurationExport {
    identifier: String,
    blocks: Vec<ExportedBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportedBlock {
    identifier: String,
    version: i32,
    value: String,
}

/// Plugin administration interface
#[async_trait]
pub trait PluginManager: KernelComponent {
    /// Create a configuration of the plugin `identifier` and register it
    async fn register_plugin(&self, name: &str, identifier: &str) -> Result<i64>;

    /// Register the runner of an existing configuration, in `STOPPED`
    async fn register_plugin_runner(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Only permitted while the plugin is `STOPPED`
    async fn unregister_plugin(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Unregister the plugin, then delete its links and its configuration
    async fn delete_plugin(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Start the plugin and flag it for autostart
    async fn start_plugin(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Stop the plugin and clear its autostart flag
    async fn stop_plugin(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Request a start. The outcome is observed through the status.
    async fn start_plugin_runner(&self, plugin_configuration_id: i64) -> Result<()>;

    /// Request a stop. The outcome is observed through the status.
    async fn stop_plugin_runner(&self, plugin_configuration_id: i64);

    async fn get_plugin_status(&self, plugin_configuration_id: i64) -> Result<PluginStatus>;

    async fn registered_plugins(&self) -> Vec<PluginInfo>;

    async fn post_out_message(&self, message: EventMessage) -> Result<()>;

    async fn post_in_message(&self, message: EventMessage) -> Result<()>;
}

struct ManagerInner {
    settings: RuntimeSettings,
    store: Arc<dyn PluginStore>,
    extensions: ExtensionManager,
    directory: Arc<ActorDirectory>,
    registry: PluginRegistry,
    shared_storage: Arc<dyn StorageProvider>,
    shared_context: Arc<SharedContext>,
    callbacks: Mutex<Option<mpsc::UnboundedSender<StatusCallback>>>,
}

/// Registry of plugin configurations and driver of their lifecycle and
/// event dispatch.
#[derive(Clone)]
pub struct DefaultPluginManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

/// The plugin manager as seen from plugin contexts. Holds a weak reference
/// so that contexts do not keep the manager alive.
struct ManagerHost(Weak<ManagerInner>);

impl ManagerHost {
    fn manager(&self) -> Option<DefaultPluginManager> {
        self.0.upgrade().map(|inner| DefaultPluginManager { inner })
    }
}

#[async_trait]
impl PluginHost for ManagerHost {
    async fn post_out_message(&self, message: EventMessage) -> std::result::Result<(), PluginSystemError> {
        match self.manager() {
            Some(manager) => manager.post(FlowType::Out, message).await,
            None => Err(PluginSystemError::InternalError(
                "the plugin manager is no longer running".to_string(),
            )),
        }
    }

    async fn request_stop(&self, plugin_configuration_id: i64) {
        if let Some(manager) = self.manager() {
            manager.stop_plugin_runner(plugin_configuration_id).await;
        }
    }
}

fn tool_item_uuid(entry: &RegistrationEntry) -> String {
    format!(
        "{}{}_{}",
        PLUGIN_TOOL_ITEM_PREFIX,
        entry.identifier(),
        entry.plugin_configuration_id()
    )
}

impl DefaultPluginManager {
    pub fn new(settings: RuntimeSettings, store: Arc<dyn PluginStore>, extensions: ExtensionManager) -> Self {
        let shared_storage: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(settings.shared_storage.clone()));
        Self {
            inner: Arc::new(ManagerInner {
                settings,
                store,
                extensions,
                directory: Arc::new(ActorDirectory::new()),
                registry: PluginRegistry::new(),
                shared_storage,
                shared_context: Arc::new(SharedContext::new()),
                callbacks: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn PluginStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.inner.registry
    }

    pub fn extensions(&self) -> &ExtensionManager {
        &self.inner.extensions
    }

    pub fn directory(&self) -> &Arc<ActorDirectory> {
        &self.inner.directory
    }

    pub fn shared_context(&self) -> &Arc<SharedContext> {
        &self.inner.shared_context
    }

    /// Synchronize the plugin definitions with the loaded extensions, then
    /// register every available configuration and start the autostart ones.
    pub async fn init(&self) -> Result<()> {
        let store = &self.inner.store;
        let descriptors = self.inner.extensions.plugin_descriptors().await;

        for definition in store.definitions().await? {
            let available = descriptors.iter().any(|d| d.identifier == definition.identifier);
            if definition.is_available != available {
                info!(
                    "The plugin definition {} is now {}",
                    definition.identifier,
                    if available { "available" } else { "unavailable" }
                );
                store
                    .set_definition_availability(&definition.identifier, available)
                    .await?;
            }
        }
        for descriptor in &descriptors {
            store.ensure_definition(&descriptor.identifier).await?;
        }

        let configurations = store.configurations().await?;
        for descriptor in descriptors.iter().filter(|d| d.auto_register) {
            if !configurations.iter().any(|c| c.identifier == descriptor.identifier) {
                let created = store
                    .create_configuration(&descriptor.name, &descriptor.identifier, true)
                    .await?;
                info!(
                    "Created the configuration {} for the auto-registered plugin {}",
                    created.id, descriptor.identifier
                );
            }
        }

        self.status_sender().await;

        for configuration in store.configurations().await? {
            if !descriptors.iter().any(|d| d.identifier == configuration.identifier) {
                warn!(
                    "The plugin {} ({}) is not available, it is not registered",
                    configuration.id, configuration.identifier
                );
                continue;
            }
            if let Err(e) = self.register_plugin_runner(configuration.id).await {
                error!("Unable to register the plugin {}: {}", configuration.id, e);
                continue;
            }
            if configuration.is_autostart {
                if let Err(e) = self.start_plugin_runner(configuration.id).await {
                    error!("Unable to start the plugin {}: {}", configuration.id, e);
                }
            }
        }
        info!("Plugin manager initialized with {} plugin(s)", self.inner.registry.len().await);
        Ok(())
    }

    /// Stop every plugin and wait, up to a bound, for the stops to complete
    pub async fn shutdown(&self) {
        self.stop_all().await;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(SHUTDOWN_GRACE_SECS);
        loop {
            let mut stopping = 0;
            for entry in self.inner.registry.entries().await {
                if entry.status().await == PluginStatus::Stopping {
                    stopping += 1;
                }
            }
            if stopping == 0 {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("{} plugin(s) still stopping at shutdown", stopping);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        info!("Plugin manager stopped");
    }

    /// Stop every stoppable plugin
    pub async fn stop_all(&self) {
        for entry in self.inner.registry.entries().await {
            if entry.status().await.is_stoppable() {
                self.stop_plugin_runner(entry.plugin_configuration_id()).await;
            }
        }
    }

    pub async fn stop_all_plugins_with_identifier(&self, identifier: &str) {
        for entry in self.inner.registry.entries().await {
            if entry.identifier() == identifier && entry.status().await.is_stoppable() {
                self.stop_plugin_runner(entry.plugin_configuration_id()).await;
            }
        }
    }

    /// Plugin types provided by the loaded extensions
    pub async fn extension_plugins(&self) -> Vec<PluginDescriptor> {
        self.inner.extensions.plugin_descriptors().await
    }

    /// Registered plugins offering a registration configurator for `data_type`
    pub async fn plugins_supporting_registration(&self, data_type: &str) -> Vec<PluginInfo> {
        let mut supporting = Vec::new();
        for entry in self.inner.registry.entries().await {
            if entry.descriptor().registration_configurator(data_type).is_some() {
                supporting.push(info_of(&entry).await);
            }
        }
        supporting
    }

    /// True when neither event interface of the plugin answers the probe
    pub async fn event_interfaces_stopped(&self, plugin_configuration_id: i64) -> bool {
        for flow in [FlowType::In, FlowType::Out] {
            let address = flow.router_address(plugin_configuration_id);
            if !self
                .inner
                .directory
                .is_stopped(&address, self.inner.settings.probe_timeout)
                .await
            {
                return false;
            }
        }
        true
    }

    pub async fn logs(&self, plugin_configuration_id: i64) -> Result<Vec<PluginLogEntry>> {
        Ok(self.inner.store.logs(plugin_configuration_id).await?)
    }

    /// Post an OUT message about a changed business object, if event
    /// broadcasting is enabled
    pub async fn notify_object_change(
        &self,
        data_type: &str,
        internal_id: i64,
        kind: MessageType,
        payload: Option<serde_json::Value>,
    ) -> Result<()> {
        if !self.inner.settings.event_broadcasting {
            return Ok(());
        }
        let mut message = EventMessage::internal(internal_id, data_type, kind);
        message.payload = payload;
        Ok(self.post(FlowType::Out, message).await?)
    }

    // Configuration blocks

    async fn descriptor_of(&self, plugin_configuration_id: i64) -> std::result::Result<PluginDescriptor, PluginSystemError> {
        if let Some(entry) = self.inner.registry.get(plugin_configuration_id).await {
            return Ok(entry.descriptor().as_ref().clone());
        }
        let configuration = self
            .inner
            .store
            .configuration(plugin_configuration_id)
            .await?
            .ok_or(PluginSystemError::UnknownPlugin(plugin_configuration_id))?;
        self.inner
            .extensions
            .plugin_descriptor(&configuration.identifier)
            .await
            .ok_or_else(|| PluginSystemError::RegistrationError {
                identifier: configuration.identifier.clone(),
                message: "No loaded extension provides this plugin".to_string(),
            })
    }

    /// Saved value of a configuration block, or its default value
    pub async fn plugin_configuration_block(&self, plugin_configuration_id: i64, block_identifier: &str) -> Result<Vec<u8>> {
        let descriptor = self.descriptor_of(plugin_configuration_id).await?;
        let block = descriptor.configuration_block(block_identifier).ok_or_else(|| {
            PluginSystemError::configuration(
                plugin_configuration_id,
                format!("Unknown configuration block {}", block_identifier),
            )
        })?;
        let stored = self
            .inner
            .store
            .configuration_block(plugin_configuration_id, block_identifier)
            .await?;
        Ok(stored.map(|s| s.value).unwrap_or_else(|| block.default_value.clone()))
    }

    /// Save a configuration block with the version of its descriptor
    pub async fn update_plugin_configuration(
        &self,
        plugin_configuration_id: i64,
        block_identifier: &str,
        value: Vec<u8>,
    ) -> Result<()> {
        let descriptor = self.descriptor_of(plugin_configuration_id).await?;
        let block = descriptor.configuration_block(block_identifier).ok_or_else(|| {
            PluginSystemError::configuration(
                plugin_configuration_id,
                format!("Unknown configuration block {}", block_identifier),
            )
        })?;
        self.inner
            .store
            .save_configuration_block(
                plugin_configuration_id,
                StoredConfigurationBlock {
                    identifier: block.identifier.clone(),
                    version: block.version,
                    value,
                },
            )
            .await?;
        info!(
            "Configuration block {} of the plugin {} updated",
            block_identifier, plugin_configuration_id
        );
        Ok(())
    }

    /// Every configuration block of the plugin as a JSON document
    pub async fn export_plugin_configuration(&self, plugin_configuration_id: i64) -> Result<String> {
        let descriptor = self.descriptor_of(plugin_configuration_id).await?;
        let mut blocks = Vec::with_capacity(descriptor.configuration_blocks.len());
        for block in &descriptor.configuration_blocks {
            let stored = self
                .inner
                .store
                .configuration_block(plugin_configuration_id, &block.identifier)
                .await?;
            let (version, value) = match stored {
                Some(stored) => (stored.version, stored.value),
                None => (block.version, block.default_value.clone()),
            };
            blocks.push(ExportedBlock {
                identifier: block.identifier.clone(),
                version,
                value: String::from_utf8_lossy(&value).into_owned(),
            });
        }
        let export = ConfigurationExport {
            identifier: descriptor.identifier.clone(),
            blocks,
        };
        let document = serde_json::to_string_pretty(&export).map_err(|e| {
            PluginSystemError::configuration(plugin_configuration_id, format!("Unable to export the configuration: {}", e))
        })?;
        Ok(document)
    }

    /// Load blocks exported by [`Self::export_plugin_configuration`]. Blocks
    /// unknown to the plugin are skipped.
    pub async fn import_plugin_configuration(&self, plugin_configuration_id: i64, document: &str) -> Result<()> {
        let descriptor = self.descriptor_of(plugin_configuration_id).await?;
        let export: ConfigurationExport = serde_json::from_str(document).map_err(|e| {
            PluginSystemError::configuration(plugin_configuration_id, format!("Invalid configuration export: {}", e))
        })?;
        if export.identifier != descriptor.identifier {
            return Err(PluginSystemError::configuration(
                plugin_configuration_id,
                format!(
                    "The export belongs to the plugin {}, not to {}",
                    export.identifier, descriptor.identifier
                ),
            )
            .into());
        }
        for block in export.blocks {
            let Some(known) = descriptor.configuration_block(&block.identifier) else {
                warn!(
                    "Skipping the unknown configuration block {} for the plugin {}",
                    block.identifier, plugin_configuration_id
                );
                continue;
            };
            self.inner
                .store
                .save_configuration_block(
                    plugin_configuration_id,
                    StoredConfigurationBlock {
                        identifier: known.identifier.clone(),
                        version: known.version,
                        value: block.value.into_bytes(),
                    },
                )
                .await?;
        }
        info!("Configuration of the plugin {} imported", plugin_configuration_id);
        Ok(())
    }

    // Status callbacks

    /// Sender of the status callback worker, spawning the worker if needed
    async fn status_sender(&self) -> mpsc::UnboundedSender<StatusCallback> {
        let mut callbacks = self.inner.callbacks.lock().await;
        if let Some(sender) = callbacks.as_ref() {
            return sender.clone();
        }
        let (sender, mut mailbox) = mpsc::unbounded_channel::<StatusCallback>();
        let manager = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(callback) = mailbox.recv().await {
                let Some(inner) = manager.upgrade() else {
                    break;
                };
                DefaultPluginManager { inner }.apply_status(callback).await;
            }
            debug!("Status callback worker exited");
        });
        *callbacks = Some(sender.clone());
        sender
    }

    async fn apply_status(&self, callback: StatusCallback) {
        let Some(entry) = self.inner.registry.get(callback.plugin_configuration_id).await else {
            debug!(
                "Status {} reported for the unregistered plugin {}",
                callback.status, callback.plugin_configuration_id
            );
            return;
        };
        entry.set_status(callback.status).await;
        info!(
            "The plugin {} is now {}",
            callback.plugin_configuration_id, callback.status
        );

        let menu = self.inner.extensions.menu();
        match callback.status {
            PluginStatus::Started => {
                if let Some(descriptor) = entry.runner().menu_descriptor() {
                    let url = format!(
                        "{}/{}{}",
                        self.inner.settings.extension_link_prefix(),
                        callback.plugin_configuration_id,
                        descriptor.path
                    );
                    menu.add_tool_item(MenuItem::new(tool_item_uuid(&entry), descriptor.label, url))
                        .await;
                }
            }
            PluginStatus::Stopped | PluginStatus::StartFailed => {
                menu.remove_tool_item(&tool_item_uuid(&entry)).await;
            }
            _ => {}
        }
    }

    // Event dispatch

    async fn event_interface_configuration(&self, plugin_configuration_id: i64, flow: FlowType) -> EventInterfaceConfiguration {
        match self
            .inner
            .store
            .event_interface_configuration(plugin_configuration_id, flow)
            .await
        {
            Ok(Some(configuration)) => configuration,
            Ok(None) => EventInterfaceConfiguration::default(),
            Err(e) => {
                warn!(
                    "Unable to read the {} interface configuration of the plugin {}, using the defaults: {}",
                    flow, plugin_configuration_id, e
                );
                EventInterfaceConfiguration::default()
            }
        }
    }

    /// Create the worker pools declared by the descriptor, OUT first
    async fn create_pools(&self, entry: &Arc<RegistrationEntry>) -> std::result::Result<EventPools, PluginSystemError> {
        let mut pools = EventPools::default();
        let processor = Arc::new(RunnerProcessor {
            runner: entry.runner().clone(),
            context: entry.context().clone(),
        });
        let id = entry.plugin_configuration_id();
        if entry.descriptor().has_out_interface() {
            let config = self.event_interface_configuration(id, FlowType::Out).await;
            match WorkerPool::spawn(self.inner.directory.clone(), FlowType::Out, config, processor.clone()).await {
                Ok(pool) => pools.output = Some(pool),
                Err(e) => {
                    pools.tear_down();
                    return Err(PluginSystemError::operation(id, format!("Unable to create the OUT interface: {}", e)));
                }
            }
        }
        if entry.descriptor().has_in_interface() {
            let config = self.event_interface_configuration(id, FlowType::In).await;
            match WorkerPool::spawn(self.inner.directory.clone(), FlowType::In, config, processor).await {
                Ok(pool) => pools.input = Some(pool),
                Err(e) => {
                    pools.tear_down();
                    return Err(PluginSystemError::operation(id, format!("Unable to create the IN interface: {}", e)));
                }
            }
        }
        Ok(pools)
    }

    async fn post(&self, flow: FlowType, message: EventMessage) -> std::result::Result<(), PluginSystemError> {
        if !message.is_consistent() {
            return Err(PluginSystemError::InvalidMessage(message.to_string()));
        }

        if message.message_type == MessageType::Custom {
            let Some(target) = message.plugin_configuration_id else {
                return Err(PluginSystemError::InvalidMessage(message.to_string()));
            };
            match self.inner.registry.get(target).await {
                Some(entry) if entry.status().await == PluginStatus::Started => {
                    dispatch(&entry, flow, message).await;
                }
                _ => info!(
                    "No event dispatched {} since the plugin {} is not started",
                    message.transaction_id, target
                ),
            }
            return Ok(());
        }

        let data_type = message.data_type.clone().unwrap_or_default();
        let mut delivered = 0;
        for entry in self.inner.registry.entries().await {
            if entry.descriptor().supports_data_type(&data_type) && entry.status().await == PluginStatus::Started {
                dispatch(&entry, flow, message.clone()).await;
                delivered += 1;
            }
        }
        debug!(
            "Event {} for the data type {} handed to {} plugin(s)",
            message.transaction_id, data_type, delivered
        );
        Ok(())
    }
}

async fn info_of(entry: &RegistrationEntry) -> PluginInfo {
    PluginInfo {
        id: entry.plugin_configuration_id(),
        name: entry.plugin_configuration_name().to_string(),
        identifier: entry.identifier().to_string(),
        status: entry.status().await,
    }
}

async fn dispatch(entry: &RegistrationEntry, flow: FlowType, message: EventMessage) {
    let pools = entry.pools().await;
    let Some(pool) = pools.get(flow) else {
        info!(
            "No event dispatched {} to the plugin {} since its {} interface is not started",
            message.transaction_id,
            entry.plugin_configuration_id(),
            flow
        );
        return;
    };
    debug!(
        "Dispatching the event {} to the plugin {} through {}",
        message.transaction_id,
        entry.plugin_configuration_id(),
        pool.address()
    );
    if let Err(e) = pool.tell(message) {
        warn!("Event not dispatched to the plugin {}: {}", entry.plugin_configuration_id(), e);
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn register_plugin(&self, name: &str, identifier: &str) -> Result<i64> {
        let store = &self.inner.store;
        let descriptor = self
            .inner
            .extensions
            .plugin_descriptor(identifier)
            .await
            .ok_or_else(|| PluginSystemError::RegistrationError {
                identifier: identifier.to_string(),
                message: "No loaded extension provides this plugin".to_string(),
            })?;
        if !descriptor.multi_instance
            && store
                .configurations()
                .await?
                .iter()
                .any(|c| c.identifier == identifier)
        {
            return Err(PluginSystemError::RegistrationError {
                identifier: identifier.to_string(),
                message: "The plugin does not allow multiple instances".to_string(),
            }
            .into());
        }

        store.ensure_definition(identifier).await?;
        let configuration = store.create_configuration(name, identifier, false).await?;
        if let Err(e) = self.register_plugin_runner(configuration.id).await {
            if let Err(cleanup) = store.delete_configuration(configuration.id).await {
                warn!(
                    "Unable to delete the configuration {} after a failed registration: {}",
                    configuration.id, cleanup
                );
            }
            return Err(e);
        }
        Ok(configuration.id)
    }

    async fn register_plugin_runner(&self, plugin_configuration_id: i64) -> Result<()> {
        let id = plugin_configuration_id;
        let _structure = self.inner.registry.lock_structure().await;
        if self.inner.registry.contains(id).await {
            return Err(PluginSystemError::operation(id, "The plugin is already registered").into());
        }

        let configuration = self
            .inner
            .store
            .configuration(id)
            .await?
            .ok_or(PluginSystemError::UnknownPlugin(id))?;
        let descriptor = self
            .inner
            .extensions
            .plugin_descriptor(&configuration.identifier)
            .await
            .ok_or_else(|| PluginSystemError::RegistrationError {
                identifier: configuration.identifier.clone(),
                message: "No loaded extension provides this plugin".to_string(),
            })?;
        let descriptor = Arc::new(descriptor);

        let context = Arc::new(PluginContext::new(
            id,
            configuration.name.clone(),
            descriptor.clone(),
            self.inner.store.clone(),
            Arc::new(ManagerHost(Arc::downgrade(&self.inner))),
            self.inner.shared_storage.clone(),
            self.inner.shared_context.clone(),
        ));
        let runner = self
            .inner
            .extensions
            .load_plugin_instance(&configuration.identifier, id, context.clone())
            .await
            .map_err(|e| PluginSystemError::RegistrationError {
                identifier: configuration.identifier.clone(),
                message: e.to_string(),
            })?;

        let callbacks = self.status_sender().await;
        let lifecycle = spawn_lifecycle_worker(id, runner.clone(), self.inner.store.clone(), callbacks);
        self.inner
            .registry
            .insert(Arc::new(RegistrationEntry::new(
                id,
                configuration.name,
                descriptor,
                runner,
                context,
                lifecycle,
            )))
            .await;
        Ok(())
    }

    async fn unregister_plugin(&self, plugin_configuration_id: i64) -> Result<()> {
        let id = plugin_configuration_id;
        let _structure = self.inner.registry.lock_structure().await;
        let entry = self
            .inner
            .registry
            .get(id)
            .await
            .ok_or(PluginSystemError::UnknownPlugin(id))?;
        {
            let _operation = entry.lock_operation().await;
            let status = entry.status().await;
            if status != PluginStatus::Stopped {
                error!("Attempt to unregister the plugin {} while {}", id, status);
                return Err(
                    PluginSystemError::operation(id, "Cannot unregister a plugin which is already running").into(),
                );
            }
            self.inner.registry.remove(id).await;
        }
        if let Err(e) = self
            .inner
            .extensions
            .unload_plugin_instance(entry.identifier(), id)
            .await
        {
            warn!("Unable to unload the instance of the plugin {}: {}", id, e);
        }
        info!("The plugin {} is unregistered", id);
        Ok(())
    }

    async fn delete_plugin(&self, plugin_configuration_id: i64) -> Result<()> {
        let id = plugin_configuration_id;
        match self.unregister_plugin(id).await {
            Ok(()) => {}
            Err(Error::PluginSystem(PluginSystemError::UnknownPlugin(_))) => {
                debug!("The plugin {} is not registered, deleting its configuration only", id);
            }
            Err(e) => return Err(e),
        }

        let store = &self.inner.store;
        let links = store.links(id).await?;
        for link in links.iter().filter(|l| l.parent_id.is_some()) {
            store.delete_link(link.id).await?;
        }
        for link in links.iter().filter(|l| l.parent_id.is_none()) {
            store.delete_link(link.id).await?;
        }
        store.delete_configuration(id).await?;
        info!("The plugin {} is deleted", id);
        Ok(())
    }

    async fn start_plugin(&self, plugin_configuration_id: i64) -> Result<()> {
        self.inner.store.set_autostart(plugin_configuration_id, true).await?;
        self.start_plugin_runner(plugin_configuration_id).await
    }

    async fn stop_plugin(&self, plugin_configuration_id: i64) -> Result<()> {
        self.inner.store.set_autostart(plugin_configuration_id, false).await?;
        self.stop_plugin_runner(plugin_configuration_id).await;
        Ok(())
    }

    async fn start_plugin_runner(&self, plugin_configuration_id: i64) -> Result<()> {
        let id = plugin_configuration_id;
        let Some(entry) = self.inner.registry.get(id).await else {
            error!("Attempt to start an unknown or unregistered plugin {}", id);
            return Ok(());
        };
        let _operation = entry.lock_operation().await;
        if entry.status().await != PluginStatus::Stopped {
            error!("The plugin {} is not stopped, cannot start it", id);
            return Ok(());
        }
        if !self.event_interfaces_stopped(id).await {
            error!("The router for the plugin configuration {} is not stopped, cannot start it", id);
            return Ok(());
        }

        info!("The plugin {} is starting", id);
        entry.set_status(PluginStatus::Starting).await;

        let outcome = match self.create_pools(&entry).await {
            Ok(pools) => {
                *entry.pools().await = pools;
                if entry.signal(LifecycleMessage::Start) {
                    Ok(())
                } else {
                    Err(PluginSystemError::InternalError(format!(
                        "the lifecycle worker of the plugin {} is gone",
                        id
                    )))
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            entry.pools().await.tear_down();
            let uuid = Uuid::new_v4();
            error!("The plugin {} failed to start, error id {}: {}", id, uuid, e);
            let log = PluginLogEntry::lifecycle(
                id,
                LOG_EVENT_START,
                true,
                format!("The plugin {} failed to start, see the error {}", id, uuid),
            );
            if let Err(store_error) = self.inner.store.save_log(log).await {
                warn!("Unable to save a log of the plugin {}: {}", id, store_error);
            }
            entry.set_status(PluginStatus::Stopped).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn stop_plugin_runner(&self, plugin_configuration_id: i64) {
        let id = plugin_configuration_id;
        let Some(entry) = self.inner.registry.get(id).await else {
            error!("Attempt to stop an unknown or unregistered plugin {}", id);
            return;
        };
        let _operation = entry.lock_operation().await;
        if !entry.status().await.is_stoppable() {
            error!("The plugin {} is not started, cannot stop it", id);
            return;
        }

        info!("The plugin {} is stopping", id);
        entry.set_status(PluginStatus::Stopping).await;
        if !entry.signal(LifecycleMessage::Stop) {
            error!("The lifecycle worker of the plugin {} is gone, marking it stopped", id);
            entry.set_status(PluginStatus::Stopped).await;
        }
        entry.pools().await.tear_down();
    }

    async fn get_plugin_status(&self, plugin_configuration_id: i64) -> Result<PluginStatus> {
        match self.inner.registry.get(plugin_configuration_id).await {
            Some(entry) => Ok(entry.status().await),
            None => Err(PluginSystemError::UnknownPlugin(plugin_configuration_id).into()),
        }
    }

    async fn registered_plugins(&self) -> Vec<PluginInfo> {
        let mut plugins = Vec::new();
        for entry in self.inner.registry.entries().await {
            plugins.push(info_of(&entry).await);
        }
        plugins
    }

    async fn post_out_message(&self, message: EventMessage) -> Result<()> {
        Ok(self.post(FlowType::Out, message).await?)
    }

    async fn post_in_message(&self, message: EventMessage) -> Result<()> {
        Ok(self.post(FlowType::In, message).await?)
    }
}

#[async_trait]
impl KernelComponent for DefaultPluginManager {
    fn name(&self) -> &'static str {
        "DefaultPluginManager"
    }

    async fn initialize(&self) -> Result<()> {
        self.init().await
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown().await;
        Ok(())
    }
}
