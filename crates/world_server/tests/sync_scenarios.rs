//! End-to-end synchronization scenarios over real WebSocket connections.
//!
//! Each test starts a server on an ephemeral loopback port and drives it with
//! raw `tokio-tungstenite` clients, asserting on the exact frames received.

use blockworld_protocol::{Block, BlockType, BlockUpdate, IVec3, Message, PlayerId, Vec3};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};
use world_server::{FlatTerrain, ServerConfig, WorldServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerConfig) -> (Arc<WorldServer>, SocketAddr) {
    let server = Arc::new(WorldServer::new(config));
    let listener = server.bind().expect("bind listener");
    let addr = listener.local_addr().expect("local addr");

    let running = server.clone();
    tokio::spawn(async move { running.serve(listener).await });
    (server, addr)
}

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        terrain: FlatTerrain::EMPTY,
        ..ServerConfig::default()
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
    ws
}

async fn recv(ws: &mut Client) -> Message {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error");
        if let WsMessage::Text(text) = frame {
            return Message::decode(text.as_str()).expect("server sent an undecodable frame");
        }
    }
}

async fn expect_silence(ws: &mut Client, window: Duration) {
    if let Ok(Some(Ok(WsMessage::Text(text)))) = timeout(window, ws.next()).await {
        panic!("unexpected frame: {text}");
    }
}

async fn send(ws: &mut Client, message: &Message) {
    ws.send(WsMessage::text(message.encode().unwrap())).await.expect("send");
}

async fn join(addr: SocketAddr) -> (Client, PlayerId, Vec<Block>) {
    let mut ws = connect(addr).await;
    match recv(&mut ws).await {
        Message::InitialState { player_id, blocks, .. } => (ws, player_id, blocks),
        other => panic!("expected initialState, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn late_joiner_snapshot_contains_earlier_block() {
    let (_server, addr) = start_server(test_config()).await;

    let (mut a, _a_id, blocks) = join(addr).await;
    assert!(blocks.is_empty());

    let block = Block::new(IVec3::ZERO, BlockType::Grass);
    send(&mut a, &Message::BlockUpdate { block_update: BlockUpdate::Add(block.clone()) }).await;

    // the echo proves the store applied the add
    assert_eq!(
        recv(&mut a).await,
        Message::BlockUpdate { block_update: BlockUpdate::Add(block.clone()) }
    );

    let (_b, b_id, blocks) = join(addr).await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].key.as_str(), "0-0-0");

    assert_eq!(
        recv(&mut a).await,
        Message::PlayerJoin { player_id: b_id, position: Vec3::new(0.0, 1.0, 0.0) }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn player_move_fans_out_to_other_clients() {
    let (_server, addr) = start_server(test_config()).await;
    let (mut a, a_id, _) = join(addr).await;
    let (mut b, _b_id, _) = join(addr).await;
    recv(&mut a).await; // playerJoin for b

    let position = Vec3::new(1.0, 0.0, 1.0);
    send(&mut a, &Message::PlayerMove { player_id: a_id.clone(), position }).await;

    assert_eq!(recv(&mut b).await, Message::PlayerMove { player_id: a_id, position });
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_state_lists_already_connected_players() {
    let (_server, addr) = start_server(test_config()).await;
    let (_a, a_id, _) = join(addr).await;

    let mut b = connect(addr).await;
    match recv(&mut b).await {
        Message::InitialState { players, .. } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].player_id, a_id);
        }
        other => panic!("expected initialState, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_publishes_leave_exactly_once() {
    let (server, addr) = start_server(test_config()).await;
    let (mut a, _a_id, _) = join(addr).await;
    let (mut b, b_id, _) = join(addr).await;
    recv(&mut a).await; // playerJoin for b

    b.close(None).await.expect("close");
    drop(b);

    assert_eq!(recv(&mut a).await, Message::PlayerLeave { player_id: b_id.clone() });
    expect_silence(&mut a, Duration::from_millis(300)).await;
    assert!(!server.world().players().contains(&b_id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropped_socket_without_close_publishes_leave_once() {
    let (server, addr) = start_server(test_config()).await;
    let (mut a, _a_id, _) = join(addr).await;
    let (b, b_id, _) = join(addr).await;
    recv(&mut a).await; // playerJoin for b

    // no close frame, the TCP stream just goes away
    drop(b);

    assert_eq!(recv(&mut a).await, Message::PlayerLeave { player_id: b_id.clone() });
    expect_silence(&mut a, Duration::from_millis(300)).await;
    assert!(!server.world().players().contains(&b_id).await);
}

/// Reads `stream` until it ends, forwarding every `playerLeave` it sees.
fn forward_leaves(mut stream: SplitStream<Client>) -> mpsc::UnboundedReceiver<PlayerId> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            if let WsMessage::Text(text) = frame {
                if let Ok(Message::PlayerLeave { player_id }) = Message::decode(text.as_str()) {
                    let _ = tx.send(player_id);
                }
            }
        }
    });
    rx
}

#[tokio::test(flavor = "multi_thread")]
async fn client_that_never_reads_is_evicted() {
    let config = ServerConfig {
        outbound_queue_capacity: 16,
        ..test_config()
    };
    let (server, addr) = start_server(config).await;
    let (a, _a_id, _) = join(addr).await;
    let (b, b_id, _) = join(addr).await;
    // c stays connected but its frames are never read
    let (_c, c_id, _) = join(addr).await;

    let (mut a_sink, a_stream) = a.split();
    let (_b_sink, b_stream) = b.split();
    let _a_leaves = forward_leaves(a_stream);
    let mut b_leaves = forward_leaves(b_stream);

    // large frames fill the socket buffers towards c quickly
    let padding = "x".repeat(32 * 1024);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    let mut sent = 0;
    while server.world().players().contains(&c_id).await {
        assert!(tokio::time::Instant::now() < deadline, "stalled client was never evicted");
        assert!(sent < 2000, "stalled client survived {sent} broadcasts");
        let mut block = Block::new(IVec3::new(sent % 64, sent / 64, 0), BlockType::Stone);
        block.uuid = padding.clone();
        let add = Message::BlockUpdate { block_update: BlockUpdate::Add(block) };
        a_sink.send(WsMessage::text(add.encode().unwrap())).await.expect("send");
        sent += 1;
    }

    let leave = timeout(RECV_TIMEOUT, b_leaves.recv())
        .await
        .expect("timed out waiting for playerLeave")
        .expect("b's stream ended");
    assert_eq!(leave, c_id);
    assert!(timeout(Duration::from_millis(300), b_leaves.recv()).await.is_err());
    assert!(server.world().players().contains(&b_id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_frames_do_not_close_the_connection() {
    let (server, addr) = start_server(test_config()).await;
    let (mut a, a_id, _) = join(addr).await;

    a.send(WsMessage::text("{not json".to_string())).await.unwrap();
    a.send(WsMessage::text(r#"{"type":"fly","playerId":"x"}"#.to_string())).await.unwrap();
    a.send(WsMessage::binary(vec![1u8, 2, 3])).await.unwrap();

    let block = Block::new(IVec3::new(3, 0, 3), BlockType::Stone);
    send(&mut a, &Message::BlockUpdate { block_update: BlockUpdate::Add(block.clone()) }).await;
    assert_eq!(
        recv(&mut a).await,
        Message::BlockUpdate { block_update: BlockUpdate::Add(block) }
    );
    assert!(server.world().players().contains(&a_id).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_add_is_broadcast_once() {
    let (_server, addr) = start_server(test_config()).await;
    let (mut a, _a_id, _) = join(addr).await;

    let first = Block::new(IVec3::new(1, 0, 1), BlockType::Sand);
    let racing = Block::new(IVec3::new(1, 0, 1), BlockType::Wood);
    send(&mut a, &Message::BlockUpdate { block_update: BlockUpdate::Add(first.clone()) }).await;
    send(&mut a, &Message::BlockUpdate { block_update: BlockUpdate::Add(racing) }).await;

    assert_eq!(
        recv(&mut a).await,
        Message::BlockUpdate { block_update: BlockUpdate::Add(first) }
    );
    expect_silence(&mut a, Duration::from_millis(300)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connections_beyond_the_limit_are_refused() {
    let config = ServerConfig { max_connections: 1, ..test_config() };
    let (server, addr) = start_server(config).await;
    let (_a, _a_id, _) = join(addr).await;

    let refused = timeout(RECV_TIMEOUT, connect_async(format!("ws://{addr}"))).await;
    assert!(matches!(refused, Ok(Err(_))));
    assert_eq!(server.world().players().len().await, 1);
}
