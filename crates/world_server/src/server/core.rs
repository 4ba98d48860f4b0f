//! Core world server implementation.
//!
//! `WorldServer` owns the shared [`World`], binds the listening socket and
//! runs the accept loop that spawns one handler task per connection.

use crate::{
    config::ServerConfig,
    connection::{handle_connection, ConnectionId},
    error::ServerError,
    world::World,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const LISTEN_BACKLOG: i32 = 1024;

/// The authoritative world server.
///
/// Constructing the server generates the terrain; [`WorldServer::start`]
/// binds the configured address and serves until [`WorldServer::shutdown`]
/// is called.
pub struct WorldServer {
    /// Server configuration settings
    config: Arc<ServerConfig>,

    /// Shared stores and broadcast router
    world: Arc<World>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    next_connection_id: AtomicUsize,
    active_connections: Arc<AtomicUsize>,
}

impl WorldServer {
    /// Creates a new server and seeds its world from `config.terrain`.
    pub fn new(config: ServerConfig) -> Self {
        let world = Arc::new(World::new(config.terrain, config.spawn_position));
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            world,
            shutdown_sender,
            next_connection_id: AtomicUsize::new(1),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn world(&self) -> Arc<World> {
        self.world.clone()
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Creates the listening socket with address reuse enabled.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("Failed to set SO_REUSEADDR: {}", e);
        }

        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to make listener non-blocking: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))?;

        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;
        info!("✅ Listener bound on {}", local);
        Ok(listener)
    }

    /// Runs the accept loop on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        info!(
            "🚀 World server accepting connections ({} block(s) loaded)",
            self.world.blocks().len().await
        );

        loop {
            tokio::select! {
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let active = self.active_connections.load(Ordering::Acquire);
                        if active >= self.config.max_connections {
                            warn!(
                                "🚧 Refusing connection from {}: {} of {} slots in use",
                                addr, active, self.config.max_connections
                            );
                            drop(stream);
                            continue;
                        }

                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let connection_id: ConnectionId =
                            self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                        let slot = ConnectionSlot::acquire(self.active_connections.clone());
                        let world = self.world.clone();
                        let config = self.config.clone();

                        tokio::spawn(async move {
                            let _slot = slot;
                            if let Err(e) = handle_connection(stream, addr, connection_id, world, config).await {
                                error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Signals the accept loop to stop.
    pub fn shutdown(&self) {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
    }
}

/// Holds one of the `max_connections` slots for the life of a handler task.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
