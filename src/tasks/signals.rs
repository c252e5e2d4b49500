use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::events::{LoopInput, QueueSender};

/// Cancel `cancel` on Ctrl-C or SIGTERM.
pub fn spawn_shutdown_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(err) => {
                    warn!("failed to register SIGTERM handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = cancel.cancelled() => return,
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => info!("ctrl-c received; initiating shutdown"),
                Err(err) => {
                    warn!("ctrl-c handler failed: {err}");
                    return;
                }
            },
            _ = terminate => info!("SIGTERM received; initiating shutdown"),
        }
        cancel.cancel();
    })
}

/// Forward cancellation into the main-loop queue as a close request.
pub fn spawn_close_bridge(cancel: CancellationToken, queue: QueueSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        queue.post(LoopInput::Close);
    })
}
