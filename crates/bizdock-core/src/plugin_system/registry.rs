use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use tokio::sync::{mpsc, Mutex, MutexGuard, RwLock};

use crate::event::pool::WorkerPool;
use crate::event::FlowType;
use crate::extension::descriptor::PluginDescriptor;
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::status::{LifecycleMessage, PluginStatus};
use crate::plugin_system::traits::PluginRunner;

/// The IN and OUT worker pools of a started plugin
#[derive(Debug, Default)]
pub(crate) struct EventPools {
    pub(crate) input: Option<WorkerPool>,
    pub(crate) output: Option<WorkerPool>,
}

impl EventPools {
    pub(crate) fn get(&self, flow: FlowType) -> Option<&WorkerPool> {
        match flow {
            FlowType::In => self.input.as_ref(),
            FlowType::Out => self.output.as_ref(),
        }
    }

    /// Shut the IN pool down, then the OUT pool
    pub(crate) fn tear_down(&mut self) {
        if let Some(pool) = self.input.take() {
            pool.shutdown();
        }
        if let Some(pool) = self.output.take() {
            pool.shutdown();
        }
    }
}

/// Live state of a registered plugin configuration
pub struct RegistrationEntry {
    plugin_configuration_id: i64,
    plugin_configuration_name: String,
    descriptor: Arc<PluginDescriptor>,
    runner: Arc<dyn PluginRunner>,
    context: Arc<PluginContext>,
    status: RwLock<PluginStatus>,
    /// Serializes start and stop of this entry
    operation: Mutex<()>,
    pools: Mutex<EventPools>,
    /// Dropping the entry closes the mailbox and ends the worker
    lifecycle: mpsc::UnboundedSender<LifecycleMessage>,
}

impl fmt::Debug for RegistrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationEntry")
            .field("plugin_configuration_id", &self.plugin_configuration_id)
            .field("identifier", &self.descriptor.identifier)
            .finish_non_exhaustive()
    }
}

impl RegistrationEntry {
    pub(crate) fn new(
        plugin_configuration_id: i64,
        plugin_configuration_name: String,
        descriptor: Arc<PluginDescriptor>,
        runner: Arc<dyn PluginRunner>,
        context: Arc<PluginContext>,
        lifecycle: mpsc::UnboundedSender<LifecycleMessage>,
    ) -> Self {
        Self {
            plugin_configuration_id,
            plugin_configuration_name,
            descriptor,
            runner,
            context,
            status: RwLock::new(PluginStatus::Stopped),
            operation: Mutex::new(()),
            pools: Mutex::new(EventPools::default()),
            lifecycle,
        }
    }

    pub fn plugin_configuration_id(&self) -> i64 {
        self.plugin_configuration_id
    }

    pub fn plugin_configuration_name(&self) -> &str {
        &self.plugin_configuration_name
    }

    pub fn identifier(&self) -> &str {
        &self.descriptor.identifier
    }

    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    pub fn runner(&self) -> &Arc<dyn PluginRunner> {
        &self.runner
    }

    pub fn context(&self) -> &Arc<PluginContext> {
        &self.context
    }

    pub async fn status(&self) -> PluginStatus {
        *self.status.read().await
    }

    pub(crate) async fn set_status(&self, status: PluginStatus) {
        *self.status.write().await = status;
    }

    pub(crate) async fn lock_operation(&self) -> MutexGuard<'_, ()> {
        self.operation.lock().await
    }

    pub(crate) async fn pools(&self) -> MutexGuard<'_, EventPools> {
        self.pools.lock().await
    }

    /// Returns false when the lifecycle worker is gone
    pub(crate) fn signal(&self, message: LifecycleMessage) -> bool {
        self.lifecycle.send(message).is_ok()
    }
}

/// Registered plugin configurations, keyed by configuration id.
///
/// Structural changes go through [`PluginRegistry::lock_structure`]; start
/// and stop only lock the entry they work on.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    entries: RwLock<HashMap<i64, Arc<RegistrationEntry>>>,
    structure: Mutex<()>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn lock_structure(&self) -> MutexGuard<'_, ()> {
        self.structure.lock().await
    }

    pub async fn get(&self, plugin_configuration_id: i64) -> Option<Arc<RegistrationEntry>> {
        self.entries.read().await.get(&plugin_configuration_id).cloned()
    }

    pub async fn contains(&self, plugin_configuration_id: i64) -> bool {
        self.entries.read().await.contains_key(&plugin_configuration_id)
    }

    /// Entries sorted by configuration id
    pub async fn entries(&self) -> Vec<Arc<RegistrationEntry>> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.plugin_configuration_id());
        entries
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub(crate) async fn insert(&self, entry: Arc<RegistrationEntry>) {
        info!(
            "The plugin {} ({}) is registered",
            entry.plugin_configuration_id(),
            entry.identifier()
        );
        self.entries
            .write()
            .await
            .insert(entry.plugin_configuration_id(), entry);
    }

    pub(crate) async fn remove(&self, plugin_configuration_id: i64) -> Option<Arc<RegistrationEntry>> {
        self.entries.write().await.remove(&plugin_configuration_id)
    }
}
