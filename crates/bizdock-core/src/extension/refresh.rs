use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Outcome of one refresh pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Bundles unloaded then loaded again
    pub reloaded: Vec<PathBuf>,
    /// Bundles unloaded whose new version failed to load
    pub failed: Vec<(PathBuf, String)>,
}

impl RefreshReport {
    pub fn is_empty(&self) -> bool {
        self.reloaded.is_empty() && self.failed.is_empty()
    }
}

/// Recurring background task. The first tick fires one period after the
/// spawn; a tick that overruns the period makes the next one skipped.
#[derive(Debug)]
pub(crate) struct RefreshTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// `tick` returns `None` once there is nothing left to refresh, which
    /// ends the task.
    pub(crate) fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (shutdown, mut cancelled) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = interval.tick() => match tick() {
                        Some(pass) => pass.await,
                        None => break,
                    },
                }
            }
            debug!("Extension refresh task exited");
        });
        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Stop the task, waiting for a pass in progress to complete
    pub(crate) async fn cancel(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = self.handle.await;
    }
}
