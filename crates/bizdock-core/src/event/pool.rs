use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::event::directory::{ActorDirectory, PoolEnvelope};
use crate::event::error::EventSystemError;
use crate::event::supervisor::{Directive, RestartPolicy};
use crate::event::{EventInterfaceConfiguration, EventMessage, FlowType};
use crate::plugin_system::error::PluginError;

/// Hands provisioning messages to a plugin
#[async_trait]
pub trait ProvisioningProcessor: Send + Sync {
    fn plugin_configuration_id(&self) -> i64;

    async fn process(&self, flow: FlowType, message: &EventMessage) -> Result<(), PluginError>;

    /// Persist a failure that cannot be recovered with a resync
    async fn record_failure(&self, flow: FlowType, message: &EventMessage, description: &str);
}

/// State shared by the workers of one pool
struct WorkerShared {
    address: String,
    generation: u64,
    flow: FlowType,
    config: EventInterfaceConfiguration,
    processor: Arc<dyn ProvisioningProcessor>,
    directory: Arc<ActorDirectory>,
    receiver: Mutex<mpsc::UnboundedReceiver<PoolEnvelope>>,
    resync: mpsc::WeakUnboundedSender<PoolEnvelope>,
    cancelled: Arc<AtomicBool>,
    live_workers: AtomicUsize,
}

/// Fixed set of workers consuming one mailbox for one plugin and one flow
pub struct WorkerPool {
    address: String,
    plugin_configuration_id: i64,
    sender: mpsc::UnboundedSender<PoolEnvelope>,
    cancelled: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("address", &self.address)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Create the pool of `processor` for `flow` and list it in `directory`.
    pub async fn spawn(
        directory: Arc<ActorDirectory>,
        flow: FlowType,
        config: EventInterfaceConfiguration,
        processor: Arc<dyn ProvisioningProcessor>,
    ) -> Result<Self, EventSystemError> {
        let plugin_configuration_id = processor.plugin_configuration_id();
        let address = flow.router_address(plugin_configuration_id);
        let (sender, receiver) = mpsc::unbounded_channel();
        let generation = directory.register(&address, &sender).await?;
        let cancelled = Arc::new(AtomicBool::new(false));

        let shared = Arc::new(WorkerShared {
            address: address.clone(),
            generation,
            flow,
            config,
            processor,
            directory,
            receiver: Mutex::new(receiver),
            resync: sender.downgrade(),
            cancelled: cancelled.clone(),
            live_workers: AtomicUsize::new(config.pool_size()),
        });

        let workers = (0..config.pool_size())
            .map(|index| tokio::spawn(run_worker(shared.clone(), index)))
            .collect();
        info!(
            "Created the {} worker pool {} with {} workers",
            flow,
            address,
            config.pool_size()
        );

        Ok(Self {
            address,
            plugin_configuration_id,
            sender,
            cancelled,
            workers,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Enqueue a message; fails only once every worker has exited
    pub fn tell(&self, message: EventMessage) -> Result<(), EventSystemError> {
        let transaction_id = message.transaction_id.clone();
        self.sender
            .send(PoolEnvelope::Deliver(message))
            .map_err(|_| EventSystemError::PoolClosed {
                address: self.address.clone(),
                transaction_id,
            })
    }

    /// Stop the pool. Queued messages are dropped; messages being processed
    /// complete. The pool stays in the directory until its last worker exits.
    pub fn shutdown(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!(
            "Stopping the worker pool {} of the plugin {}",
            self.address, self.plugin_configuration_id
        );
        drop(self.sender);
    }
}

async fn run_worker(shared: Arc<WorkerShared>, index: usize) {
    debug!("Worker {}#{} started", shared.address, index);
    let mut policy = RestartPolicy::new(shared.config.retries(), shared.config.retry_window());

    loop {
        let envelope = {
            let mut receiver = shared.receiver.lock().await;
            receiver.recv().await
        };
        let Some(envelope) = envelope else {
            break;
        };

        match envelope {
            PoolEnvelope::Identify(reply) => {
                let _ = reply.send(shared.address.clone());
            }
            PoolEnvelope::Deliver(message) => {
                if shared.cancelled.load(Ordering::SeqCst) {
                    info!(
                        "Dropping the message {} since the worker pool {} is stopping",
                        message.transaction_id, shared.address
                    );
                    continue;
                }
                if let Err(failure) = shared.deliver(message).await {
                    match policy.on_failure() {
                        Directive::Resume => error!(
                            "An provisioning processor of the plugin {} reported an exception, retry: {}",
                            shared.processor.plugin_configuration_id(),
                            failure
                        ),
                        Directive::Escalate => error!(
                            "The provisioning processor {}#{} of the plugin {} reported {} exception(s) within {:?}, over its budget of {}, retry: {}",
                            shared.address,
                            index,
                            shared.processor.plugin_configuration_id(),
                            policy.failures(),
                            shared.config.retry_window(),
                            shared.config.retries(),
                            failure
                        ),
                    }
                }
            }
        }
    }

    debug!("Worker {}#{} exited", shared.address, index);
    if shared.live_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
        shared.receiver.lock().await.close();
        shared.directory.deregister(&shared.address, shared.generation).await;
        info!("The worker pool {} is stopped", shared.address);
    }
}

impl WorkerShared {
    /// Process one message. An error is returned when the failure must be
    /// escalated to the restart policy.
    async fn deliver(&self, message: EventMessage) -> Result<(), String> {
        let plugin_id = self.processor.plugin_configuration_id();
        debug!(
            "[BEGIN] Transaction {} for plugin {} with message type {}",
            message.transaction_id, plugin_id, message.message_type
        );

        let processor = self.processor.clone();
        let flow = self.flow;
        let task_message = message.clone();
        let outcome = tokio::spawn(async move { processor.process(flow, &task_message).await }).await;

        let failure = match outcome {
            Ok(Ok(())) => {
                debug!("[SUCCESS] Transaction {} for plugin {}", message.transaction_id, plugin_id);
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => format!("the processor aborted: {}", join_error),
        };

        if !message.message_type.is_terminal_on_failure() {
            let resync = message.resync_message();
            warn!(
                "[FAILURE] Transaction {} for event message processing worker for plugin {}, attempt to recover with a resync {}: {}",
                message.transaction_id, plugin_id, resync.transaction_id, failure
            );
            match self.resync.upgrade() {
                Some(sender) if sender.send(PoolEnvelope::Deliver(resync)).is_ok() => {}
                _ => warn!(
                    "The resync of transaction {} is dropped since the worker pool {} is stopping",
                    message.transaction_id, self.address
                ),
            }
            return Ok(());
        }

        let description = format!(
            "[FAILURE] Transaction {} for event message processing actor for plugin {} failed",
            message.transaction_id, plugin_id
        );
        self.processor.record_failure(flow, &message, &description).await;
        Err(format!("{}: {}", description, failure))
    }
}
