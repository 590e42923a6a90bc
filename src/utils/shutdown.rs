// src/utils/shutdown.rs
use std::future::Future;
use std::io;
use tokio::sync::watch;
use tracing::{error, info};

/// Flips `tx` to true when `signal` fires.
///
/// The engine reads a closed channel as a shutdown request, so if the signal
/// handler cannot be installed the sender is held for the life of the process.
pub async fn forward_shutdown<F>(signal: F, tx: watch::Sender<bool>)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("🛑 Ctrl-C received, finishing current cycle...");
            let _ = tx.send(true);
        }
        Err(e) => {
            error!(
                "Cannot listen for Ctrl-C ({}). Stop the process with SIGTERM instead.",
                e
            );
            let _tx = tx;
            std::future::pending::<()>().await;
        }
    }
}
