//! Accept loop and graceful shutdown
//!
//! Spawns one handler task per accepted connection. On the shutdown signal it
//! stops accepting, tells every handler to close, and waits a bounded time
//! for them to finish.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::relay::Relay;

/// Accept connections until `shutdown` resolves, then drain
///
/// The fan-out loop for `relay` must already be running.
pub async fn serve<F>(
    listener: TcpListener,
    relay: Relay,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let relay = relay.clone();
                    let stop_rx = stop_rx.clone();

                    // Spawn handler task for each connection
                    tasks.spawn(async move {
                        if let Err(e) = handle_connection(stream, relay, stop_rx).await {
                            warn!("Connection from {} failed: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
        }
    }

    drop(listener);
    stop_tx.send_replace(true);

    drain(tasks, config.shutdown_timeout).await
}

/// Wait up to `timeout` for every task, then abort the rest
///
/// Tasks still running at the deadline make the shutdown fail.
pub async fn drain(mut tasks: JoinSet<()>, timeout: Duration) -> Result<(), AppError> {
    debug!("Draining {} connection task(s)", tasks.len());

    let finished = tokio::time::timeout(timeout, async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }
    })
    .await;

    if finished.is_ok() {
        return Ok(());
    }

    let pending = tasks.len();
    tasks.abort_all();
    Err(AppError::Shutdown { timeout, pending })
}

/// Resolve on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
