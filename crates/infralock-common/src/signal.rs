//! Cancellation signal shared by long-lived waits
//!
//! A [`CancelSignal`] is a cheap, clonable handle. Cancellation is sticky: a wait
//! that starts after the signal fired observes it immediately.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Cancellation handle observed by waits and watch loops
#[derive(Clone, Debug)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a new, not yet cancelled signal
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Fire the signal. Every clone observes it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Check if the signal has fired
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolve once the signal has fired
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
///
/// Returns a signal that is cancelled when the process is asked to stop
pub fn wait_for_shutdown_signal() -> CancelSignal {
    let shutdown = CancelSignal::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, cancelling pending operations");
            }
            _ = terminate => {
                info!("Received SIGTERM, cancelling pending operations");
            }
        }

        shutdown_clone.cancel();
    });

    shutdown
}
