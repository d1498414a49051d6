//! WebSocket connection handler
//!
//! Handles one accepted TCP connection: WebSocket handshake, registration,
//! the read loop feeding the broadcast queue, and deregistration.

use futures_util::{Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::config::WS_PATH;
use crate::connection::Connection;
use crate::error::{AppError, DecodeError};
use crate::message::decode_frame;
use crate::registry::Registry;
use crate::relay::Relay;
use crate::types::ConnectionId;

/// Handle a new TCP connection
///
/// Returns `Err` only when the handshake fails. Decode failures and peer
/// disconnects are the normal way for a connection to end.
pub async fn handle_connection(
    stream: TcpStream,
    relay: Relay,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path)
        .await
        .map_err(AppError::Upgrade)?;
    let (ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    relay
        .registry()
        .add(Connection::new(conn_id, peer_addr.clone(), Box::pin(ws_sender)))
        .await;
    let membership = Membership::new(conn_id, relay.registry().clone());

    info!("Client {} connected from {}", conn_id, peer_addr);

    match read_loop(conn_id, &mut ws_receiver, &relay, &mut shutdown).await {
        Ok(()) => debug!("Closing {} for shutdown", conn_id),
        Err(AppError::Decode(DecodeError::Closed)) => {
            debug!("Client {} closed the connection", conn_id)
        }
        Err(e) => warn!("Dropping client {}: {}", conn_id, e),
    }

    membership.release().await;
    info!("Client {} disconnected", conn_id);

    Ok(())
}

/// Accept the upgrade only on the relay endpoint. Any origin is allowed.
fn check_path(req: &Request, resp: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == WS_PATH {
        return Ok(resp);
    }

    let mut err = ErrorResponse::new(Some(format!("Not found: {}", req.uri().path())));
    *err.status_mut() = StatusCode::NOT_FOUND;
    Err(err)
}

/// Read frames until the peer goes away, a frame fails to decode, or shutdown
///
/// Never touches the registry; decoded messages go to the broadcast queue.
async fn read_loop<S>(
    conn_id: ConnectionId,
    frames: &mut S,
    relay: &Relay,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = shutdown.changed() => return Ok(()),
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(DecodeError::Transport(e).into()),
            None => return Err(DecodeError::Closed.into()),
        };

        let Some(msg) = decode_frame(frame)? else {
            continue;
        };

        debug!("Message from {} as '{}'", conn_id, msg.username);
        relay.publish(msg)?;
    }
}

/// Registry membership of one connection task
///
/// `release` deregisters and closes. If the task unwinds or is aborted
/// before that, `Drop` schedules the same cleanup.
struct Membership {
    id: ConnectionId,
    registry: Registry,
    released: bool,
}

impl Membership {
    fn new(id: ConnectionId, registry: Registry) -> Self {
        Self {
            id,
            registry,
            released: false,
        }
    }

    async fn release(mut self) {
        deregister(&self.registry, self.id).await;
        self.released = true;
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let registry = self.registry.clone();
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { deregister(&registry, id).await });
        }
    }
}

/// Remove from the registry and close, unless the fan-out loop already did
async fn deregister(registry: &Registry, id: ConnectionId) {
    if let Some(conn) = registry.remove(id).await {
        conn.close().await;
    }
}
