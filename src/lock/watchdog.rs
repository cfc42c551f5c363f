//! Background lease renewal.
//!
//! ```text
//!     ┌──────────── every renew_interval ────────────┐
//!     │                                              │
//!     ▼                                              │
//!   recv_timeout ──stop/disconnect──► exit           │
//!     │ timeout                                      │
//!     ▼                                              │
//!   compare_and_pexpire(key, token, lease)           │
//!     ├─ Ok(true)  ─► renewed ───────────────────────┤
//!     ├─ Err(_)    ─► warn, keep going ──────────────┘
//!     └─ Ok(false) ─► lease lost, exit
//! ```

use super::token::HolderToken;
use crate::store::AtomicStore;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const THREAD_NAME: &str = "warden-watchdog";

/// Handle to one renewal thread. Stopping joins the thread.
#[derive(Debug)]
pub(crate) struct Watchdog {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Watchdog {
    /// Spawns a thread renewing `key` for `token` every `interval_ms`.
    pub(crate) fn spawn<S>(
        store: Arc<S>,
        key: String,
        token: HolderToken,
        lease_ms: u64,
        interval_ms: u64,
    ) -> io::Result<Self>
    where
        S: AtomicStore + ?Sized + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                info!(
                    "Started lease watchdog for '{}' (lease: {}ms, interval: {}ms)",
                    key, lease_ms, interval_ms
                );

                loop {
                    match stop_rx.recv_timeout(Duration::from_millis(interval_ms)) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Lease watchdog for '{}' stopping", key);
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            match store.compare_and_pexpire(&key, token.as_str(), lease_ms) {
                                Ok(true) => debug!("Renewed lease on '{}'", key),
                                Ok(false) => {
                                    warn!("Lease on '{}' lost, stopping watchdog", key);
                                    break;
                                }
                                Err(e) => warn!("Failed to renew lease on '{}': {}", key, e),
                            }
                        }
                    }
                }

                flag.store(false, Ordering::Release);
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            running,
        })
    }

    /// Whether the renewal thread is still running.
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signals the thread and waits for it to exit. Idempotent.
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // A thread that already exited has dropped its receiver
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Lease watchdog thread panicked");
            }
        }
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
