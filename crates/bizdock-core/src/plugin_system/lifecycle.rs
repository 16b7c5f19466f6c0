//! Per-plugin workers: the lifecycle worker running the start and stop
//! hooks, and the processor the worker pools use to reach the runner.
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::pool::ProvisioningProcessor;
use crate::event::{EventMessage, FlowType};
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::error::PluginError;
use crate::plugin_system::status::{LifecycleMessage, PluginStatus, StatusCallback};
use crate::plugin_system::store::{PluginLogEntry, PluginStore, LOG_EVENT_START, LOG_EVENT_STOP};
use crate::plugin_system::traits::PluginRunner;

/// Run a hook in its own task so that a panic is reported as a failure
async fn run_hook<F>(hook: F) -> Result<(), PluginError>
where
    F: std::future::Future<Output = Result<(), PluginError>> + Send + 'static,
{
    match tokio::spawn(hook).await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(PluginError::with_source("the plugin hook panicked", join_error)),
    }
}

/// Spawn the lifecycle worker of a plugin configuration. The worker exits
/// when its mailbox is dropped.
pub(crate) fn spawn_lifecycle_worker(
    plugin_configuration_id: i64,
    runner: Arc<dyn PluginRunner>,
    store: Arc<dyn PluginStore>,
    callbacks: mpsc::UnboundedSender<StatusCallback>,
) -> mpsc::UnboundedSender<LifecycleMessage> {
    let (sender, mut mailbox) = mpsc::unbounded_channel::<LifecycleMessage>();
    tokio::spawn(async move {
        debug!("Lifecycle worker of the plugin {} started", plugin_configuration_id);
        while let Some(message) = mailbox.recv().await {
            let status = match message {
                LifecycleMessage::Start => start(plugin_configuration_id, &runner, &store).await,
                LifecycleMessage::Stop => stop(plugin_configuration_id, &runner, &store).await,
            };
            let callback = StatusCallback {
                plugin_configuration_id,
                status,
            };
            if callbacks.send(callback).is_err() {
                warn!(
                    "Status {} of the plugin {} not reported, the status callback worker is stopped",
                    status, plugin_configuration_id
                );
            }
        }
        debug!("Lifecycle worker of the plugin {} exited", plugin_configuration_id);
    });
    sender
}

async fn save_log(store: &Arc<dyn PluginStore>, entry: PluginLogEntry) {
    let plugin_configuration_id = entry.plugin_configuration_id;
    if let Err(e) = store.save_log(entry).await {
        warn!("Unable to save a log of the plugin {}: {}", plugin_configuration_id, e);
    }
}

async fn start(plugin_configuration_id: i64, runner: &Arc<dyn PluginRunner>, store: &Arc<dyn PluginStore>) -> PluginStatus {
    let hook_runner = runner.clone();
    match run_hook(async move { hook_runner.start().await }).await {
        Ok(()) => {
            info!("The plugin {} has been started", plugin_configuration_id);
            save_log(
                store,
                PluginLogEntry::lifecycle(
                    plugin_configuration_id,
                    LOG_EVENT_START,
                    false,
                    format!("The plugin {} has been started successfully", plugin_configuration_id),
                ),
            )
            .await;
            PluginStatus::Started
        }
        Err(e) => {
            error!("Error while starting the plugin {}: {}", plugin_configuration_id, e.detail());
            save_log(
                store,
                PluginLogEntry::lifecycle(
                    plugin_configuration_id,
                    LOG_EVENT_START,
                    true,
                    format!("The plugin {} failed to start: {}", plugin_configuration_id, e.detail()),
                ),
            )
            .await;
            PluginStatus::StartFailed
        }
    }
}

async fn stop(plugin_configuration_id: i64, runner: &Arc<dyn PluginRunner>, store: &Arc<dyn PluginStore>) -> PluginStatus {
    let hook_runner = runner.clone();
    match run_hook(async move { hook_runner.stop().await }).await {
        Ok(()) => {
            info!("The plugin {} has been stopped", plugin_configuration_id);
            save_log(
                store,
                PluginLogEntry::lifecycle(
                    plugin_configuration_id,
                    LOG_EVENT_STOP,
                    false,
                    format!("The plugin {} has been stopped successfully", plugin_configuration_id),
                ),
            )
            .await;
        }
        Err(e) => {
            let uuid = Uuid::new_v4();
            error!(
                "Error while stopping the plugin {}, error id {}: {}",
                plugin_configuration_id,
                uuid,
                e.detail()
            );
            save_log(
                store,
                PluginLogEntry::lifecycle(
                    plugin_configuration_id,
                    LOG_EVENT_STOP,
                    true,
                    format!(
                        "The plugin {} reported an error while stopping, see the error {}",
                        plugin_configuration_id, uuid
                    ),
                ),
            )
            .await;
        }
    }
    PluginStatus::Stopped
}

/// Hands pool messages to the runner of one plugin configuration
pub(crate) struct RunnerProcessor {
    pub(crate) runner: Arc<dyn PluginRunner>,
    pub(crate) context: Arc<PluginContext>,
}

#[async_trait]
impl ProvisioningProcessor for RunnerProcessor {
    fn plugin_configuration_id(&self) -> i64 {
        self.context.plugin_configuration_id()
    }

    async fn process(&self, flow: FlowType, message: &EventMessage) -> Result<(), PluginError> {
        match flow {
            FlowType::In => self.runner.handle_in_provisioning_message(message).await,
            FlowType::Out => self.runner.handle_out_provisioning_message(message).await,
        }
    }

    async fn record_failure(&self, _flow: FlowType, message: &EventMessage, description: &str) {
        let log_message = format!("{}\nMessage was : {}", description, message);
        if let Err(e) = self
            .context
            .report_on_event_handling(&message.transaction_id, true, Some(message), &log_message, None)
            .await
        {
            warn!(
                "Unable to save the failure of transaction {} for the plugin {}: {}",
                message.transaction_id,
                self.plugin_configuration_id(),
                e
            );
        }
    }
}
