//! WebSocket session handling for a single client.
//!
//! The handler performs the handshake, joins the world, then runs two halves:
//! a writer task that forwards the connection's outbound queue to the socket,
//! and a read loop that routes inbound frames into the world. The read loop
//! ends on close, transport error, or eviction by the broadcast router;
//! whichever happens first, the player is removed from the world once.

use super::{ConnectionId, ConnectionState};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::Subscriber;
use crate::world::World;
use blockworld_protocol::{BlockUpdate, Message, PlayerId};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// How long the writer may keep flushing queued frames after the read loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Drives one accepted socket from handshake to cleanup.
///
/// # Errors
///
/// Returns a [`ServerError::Network`] if the handshake fails or times out,
/// and propagates join failures. Errors after the connection opened are
/// logged and end the session without being returned.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_id: ConnectionId,
    world: Arc<World>,
    config: Arc<ServerConfig>,
) -> Result<(), ServerError> {
    let mut state = ConnectionState::Connecting;

    let ws_stream = timeout(config.handshake_timeout(), accept_async(stream))
        .await
        .map_err(|_| ServerError::Network(format!("WebSocket handshake with {addr} timed out")))?
        .map_err(|e| ServerError::Network(format!("WebSocket handshake with {addr} failed: {e}")))?;

    let (mut ws_sink, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<Arc<str>>(config.outbound_queue_capacity);
    let evicted = Arc::new(Notify::new());

    let writer_evicted = evicted.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(WsMessage::text(payload.to_string())).await {
                error!("Failed to send to connection {}: {}", connection_id, e);
                writer_evicted.notify_one();
                return;
            }
        }
        let _ = ws_sink.close().await;
    });

    let subscriber = Subscriber::new(connection_id, outbound, evicted.clone());
    let player_id = match world.join(subscriber).await {
        Ok(player_id) => player_id,
        Err(e) => {
            writer.abort();
            return Err(e);
        }
    };
    state.open(player_id.clone());
    info!("🔗 Connection {} from {} opened as player {}", connection_id, addr, player_id);

    loop {
        tokio::select! {
            _ = evicted.notified() => {
                warn!("🚫 Connection {} ({}) evicted", connection_id, player_id);
                break;
            }
            frame = ws_receiver.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    route_message(&world, &player_id, text.as_str()).await;
                }
                Some(Ok(WsMessage::Binary(_))) => {
                    warn!("Ignoring binary frame from player {}", player_id);
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("Connection {} requested close", connection_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error for connection {}: {}", connection_id, e);
                    break;
                }
            }
        }
    }

    if let Some(player_id) = state.close() {
        world.leave(connection_id, &player_id).await;
    }

    // Every sender is gone once the router forgot us, so the writer flushes and exits.
    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }
    info!("🔌 Connection {} from {} closed", connection_id, addr);
    Ok(())
}

/// Applies one inbound text frame from `player_id` to the world.
///
/// Malformed frames, unknown kinds, server-only kinds and moves that claim
/// another player's id are logged and dropped; none of them close the
/// connection.
pub async fn route_message(world: &World, player_id: &PlayerId, text: &str) {
    let message = match Message::decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("⚠️ Dropping message from player {}: {}", player_id, e);
            return;
        }
    };

    match message {
        Message::BlockUpdate { block_update } => match block_update {
            BlockUpdate::Add(block) => {
                debug!("Player {} adds block {}", player_id, block.key);
                world.blocks().add(block).await;
            }
            BlockUpdate::Remove(block) => {
                debug!("Player {} removes block {}", player_id, block.key);
                world.blocks().remove(&block.key).await;
            }
        },
        Message::PlayerMove { player_id: stated, position } => {
            if &stated != player_id {
                warn!("⚠️ Player {} tried to move player {}, dropped", player_id, stated);
                return;
            }
            if !position.is_finite() {
                warn!("⚠️ Player {} sent a non-finite position, dropped", player_id);
                return;
            }
            world.players().set_position(&stated, position).await;
        }
        other => {
            warn!("⚠️ Ignoring server-only {} message from player {}", other.kind(), player_id);
        }
    }
}
