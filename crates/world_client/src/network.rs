//! WebSocket transport for a client session.
//!
//! A connection owns two tasks: a writer draining the outbound queue into the
//! socket, and a reader decoding frames into the inbound queue. Sending never
//! waits on the network; the caller polls inbound messages once per frame.

use crate::error::ClientError;
use crate::replica::{ClientReplica, ReplicaChange};
use blockworld_protocol::Message;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, trace, warn};

/// Default depth of the outbound and inbound queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub struct NetworkClient {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Receiver<Message>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl NetworkClient {
    /// Opens a WebSocket to `url` and starts the reader and writer tasks.
    pub async fn connect(url: &str, capacity: usize) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connect(format!("{url}: {e}")))?;
        info!("🔗 Connected to {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let capacity = capacity.max(1);
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(capacity);
        let (inbound_tx, inbound) = mpsc::channel::<Message>(capacity);
        let closed = Arc::new(AtomicBool::new(false));

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unencodable {} message: {}", message.kind(), e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    debug!("Outbound send failed: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader_closed = closed.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match Message::decode(text.as_str()) {
                        Ok(message) => {
                            trace!("Received {}", message.kind());
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring undecodable frame: {}", e),
                    },
                    Ok(WsMessage::Close(_)) => {
                        debug!("Server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Inbound stream error: {}", e);
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::Release);
        });

        Ok(Self {
            outbound,
            inbound,
            closed,
            reader,
            writer,
        })
    }

    /// Queues `message` for the server without waiting.
    ///
    /// A full queue drops the message with a warning; a finished session is
    /// reported as [`ClientError::Closed`].
    pub fn send(&self, message: Message) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        match self.outbound.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                warn!("Outbound queue full, dropping {}", message.kind());
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(ClientError::Closed),
        }
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        match self.inbound.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits for the next inbound message; `None` once the session ended and
    /// everything received was consumed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Applies every message received so far to `replica`, in arrival order.
    pub fn drain_inbound(&mut self, replica: &mut ClientReplica) -> Vec<ReplicaChange> {
        let mut changes = Vec::new();
        while let Some(message) = self.try_recv() {
            let change = replica.apply(message);
            if change != ReplicaChange::Unchanged {
                changes.push(change);
            }
        }
        changes
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    /// Flushes queued messages, closes the socket and stops both tasks.
    pub async fn close(mut self) {
        let (dummy, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut self.outbound, dummy));
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), &mut self.writer).await;
        self.reader.abort();
        self.writer.abort();
        info!("👋 Disconnected");
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
