//! Poll scheduler — drives each (contract, family) pair on its own interval.
//!
//! Every pair gets a dedicated task: one catch-up pass at startup, then one
//! pass per tick. A failed pass is logged and retried on the next tick; the
//! checkpoint untouched by the failed pass makes the retry safe. Shutdown is
//! cooperative: tasks finish any in-flight pass, then stop between ticks.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ChainClient;
use crate::replay::Replayer;

/// Owns the polling tasks and the shutdown channel they listen on.
pub struct PollScheduler {
    shutdown: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawn the polling task for one pair. The first pass runs immediately
    /// so a restarted process catches up without waiting out an interval.
    pub fn spawn<C: ChainClient + 'static>(&mut self, replayer: Replayer<C>, interval: Duration) {
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let key = replayer.key();
            info!(key = %key, interval_ms = interval.as_millis() as u64, "pair polling started");

            run_logged(&replayer, &key).await;

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!(key = %key, "pair polling stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        run_logged(&replayer, &key).await;
                    }
                }
            }
        });
        self.handles.push(handle);
    }

    /// Number of pairs currently being polled.
    pub fn pair_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop all pairs and wait for their tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_logged<C: ChainClient>(replayer: &Replayer<C>, key: &str) {
    if let Err(e) = replayer.run_pass().await {
        warn!(key = %key, error = %e, "pass failed, retrying next tick");
    }
}
