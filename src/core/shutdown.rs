//! Shutdown Coordination
//!
//! Turns process signals into one broadcast shutdown notification that the
//! demo runtime races against its own work.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the application
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been requested, including before this call
    pub async fn requested(&self) {
        let mut shutdown_rx = self.subscribe();
        if self.is_shutdown_requested() {
            return;
        }
        let _ = shutdown_rx.recv().await;
    }

    /// Trigger shutdown on SIGINT, SIGTERM, SIGHUP or SIGQUIT
    ///
    /// A second signal exits the process immediately with status 130.
    pub fn listen_for_signals(&self) {
        let signal_count = Arc::new(AtomicUsize::new(0));

        #[cfg(unix)]
        {
            // Die quietly when stdout is a closed pipe
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            use tokio::signal::unix::{signal, SignalKind};
            let signals = [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
                SignalKind::quit(),
            ];

            for kind in signals {
                let coordinator = self.clone();
                let signal_count = Arc::clone(&signal_count);
                tokio::spawn(async move {
                    if let Ok(mut sig) = signal(kind) {
                        while sig.recv().await.is_some() {
                            coordinator.on_signal(&signal_count);
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    coordinator.on_signal(&signal_count);
                }
            });
        }
    }

    fn on_signal(&self, signal_count: &AtomicUsize) {
        if signal_count.fetch_add(1, Ordering::AcqRel) >= 1 {
            log::warn!("Second shutdown signal received; exiting without draining");
            std::process::exit(130);
        }
        log::warn!("Shutdown requested; draining in-flight deliveries");
        self.trigger_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
