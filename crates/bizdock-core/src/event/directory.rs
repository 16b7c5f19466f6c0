use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::event::error::EventSystemError;
use crate::event::EventMessage;

/// What a worker pool mailbox carries
#[derive(Debug)]
pub enum PoolEnvelope {
    Deliver(EventMessage),
    /// Liveness probe, answered with the pool address
    Identify(oneshot::Sender<String>),
}

#[derive(Debug)]
struct DirectoryEntry {
    generation: u64,
    sender: mpsc::WeakUnboundedSender<PoolEnvelope>,
}

/// Address book of the running worker pools.
///
/// A pool is listed from its creation until its last worker has exited,
/// which includes the time it spends draining after a teardown.
#[derive(Debug, Default)]
pub struct ActorDirectory {
    entries: Mutex<HashMap<String, DirectoryEntry>>,
    next_generation: AtomicU64,
}

impl ActorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a new pool under `address`, returning its generation
    pub(crate) async fn register(
        &self,
        address: &str,
        sender: &mpsc::UnboundedSender<PoolEnvelope>,
    ) -> Result<u64, EventSystemError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(address) {
            return Err(EventSystemError::PoolAlreadyRunning {
                address: address.to_string(),
            });
        }
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        entries.insert(
            address.to_string(),
            DirectoryEntry {
                generation,
                sender: sender.downgrade(),
            },
        );
        Ok(generation)
    }

    /// Remove `address` if it still belongs to `generation`
    pub(crate) async fn deregister(&self, address: &str, generation: u64) {
        let mut entries = self.entries.lock().await;
        if entries.get(address).map(|e| e.generation) == Some(generation) {
            entries.remove(address);
            debug!("Worker pool {} removed from the directory", address);
        }
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.entries.lock().await.contains_key(address)
    }

    /// Probe the pool at `address`.
    ///
    /// The pool is stopped when it is not listed, its mailbox is closed or
    /// the probe is dropped unanswered, which only happens once its last
    /// worker is gone. A stopped pool is removed from the directory. A pool
    /// that answers, that does not answer within `timeout`, or that is
    /// still draining after a teardown is not stopped.
    pub async fn is_stopped(&self, address: &str, timeout: Duration) -> bool {
        let (generation, sender) = {
            let entries = self.entries.lock().await;
            match entries.get(address) {
                None => return true,
                Some(entry) => (entry.generation, entry.sender.upgrade()),
            }
        };
        let Some(sender) = sender else {
            debug!("Worker pool {} is still draining", address);
            return false;
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if sender.send(PoolEnvelope::Identify(reply_tx)).is_err() {
            self.deregister(address, generation).await;
            return true;
        }
        drop(sender);

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(identity)) => {
                debug!("Worker pool {} identified as {}", address, identity);
                false
            }
            Ok(Err(_)) => {
                debug!("Worker pool {} exited before answering", address);
                self.deregister(address, generation).await;
                true
            }
            Err(_) => {
                debug!("Worker pool {} did not answer within {:?}", address, timeout);
                false
            }
        }
    }
}
