//! Start/stop lifecycle for background loops.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

/// A cancellable fixed-interval loop. The first tick fires immediately.
pub struct PeriodicTask {
    name: &'static str,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    pub fn new(name: &'static str) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            name,
            shutdown_tx,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the loop. Does nothing if it is already running.
    pub fn start<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let name = self.name;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("{} received shutdown signal", name);
                        break;
                    }
                    _ = ticker.tick() => tick().await,
                }
            }
        });

        match self.handle.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(_) => warn!("{} handle lock poisoned, task cannot be joined", name),
        }
        info!("{} started, interval {:?}", name, period);
    }

    /// Signal the loop and wait for the in-flight tick to finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.shutdown_tx.send(());

        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("{} task ended abnormally: {}", self.name, e);
            }
        }
        info!("{} stopped", self.name);
    }
}
