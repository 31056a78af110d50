//! WebSocket connection management.
//!
//! [`ConnectionManager`] owns at most one live connection. Inbound frames and
//! lifecycle changes are delivered as [`TransportEvent`]s through
//! [`ConnectionManager::next_event`], in the order the socket produced them.
//! Every event is tagged with the connection it belongs to; once a
//! connection is closed or replaced, anything it still had in flight is
//! discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use sandcrate_exec_core::{Error, Result};

use crate::endpoint::Endpoint;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the socket ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// How long a locally initiated close may spend flushing the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Identifier of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle and data events emitted by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open
    Opened,
    /// One inbound text or binary frame
    Message(Vec<u8>),
    /// The connection ended
    Closed {
        /// WebSocket close code
        code: u16,
        /// Close reason
        reason: String,
    },
    /// A read or write failed
    Error(String),
}

type TaggedEvent = (ConnectionId, TransportEvent);

struct LiveConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
    healthy: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LiveConnection {
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

/// Owner of the single transport connection of one executor.
pub struct ConnectionManager {
    endpoint: Endpoint,
    live: Option<LiveConnection>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    next_id: u64,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("connection", &self.live.as_ref().map(|live| live.id))
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager for the given endpoint. No connection is opened yet.
    pub fn new(endpoint: Endpoint) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            endpoint,
            live: None,
            events_tx,
            events_rx,
            next_id: 1,
        }
    }

    /// The endpoint this manager dials.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether a healthy connection is currently open.
    pub fn is_open(&self) -> bool {
        self.live.as_ref().is_some_and(LiveConnection::is_healthy)
    }

    /// Identifier of the current connection, if any.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|live| live.id)
    }

    /// Open the connection, reusing the current one if it is still healthy.
    pub async fn open(&mut self) -> Result<ConnectionId> {
        if let Some(live) = &self.live {
            if live.is_healthy() {
                debug!("Reusing open connection: id={}", live.id);
                return Ok(live.id);
            }
            debug!("Discarding unhealthy connection: id={}", live.id);
            self.teardown();
        }

        let request = self.endpoint.client_request()?;
        info!("Opening connection: url={}", self.endpoint);

        let (socket, _response) = connect_async(request).await.map_err(|e| {
            error!("Failed to connect to {}: {}", self.endpoint, e);
            Error::Transport(format!("failed to connect to {}: {e}", self.endpoint))
        })?;

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let healthy = Arc::new(AtomicBool::new(true));

        // Opened is queued before the reader starts so it is always first.
        let _ = self.events_tx.send((id, TransportEvent::Opened));

        let reader = tokio::spawn(read_loop(
            id,
            stream,
            self.events_tx.clone(),
            Arc::clone(&healthy),
        ));
        let writer = tokio::spawn(write_loop(
            id,
            sink,
            outbound_rx,
            self.events_tx.clone(),
            Arc::clone(&healthy),
        ));

        self.live = Some(LiveConnection {
            id,
            outbound: outbound_tx,
            healthy,
            reader,
            writer,
        });

        info!("Connection opened: id={}, url={}", id, self.endpoint);
        Ok(id)
    }

    /// Queue a text frame on the open connection.
    ///
    /// Only the absence of a connection is reported here; write failures
    /// arrive later as [`TransportEvent::Error`].
    pub fn send(&self, text: String) -> Result<()> {
        let live = match &self.live {
            Some(live) if live.is_healthy() => live,
            _ => return Err(Error::NotConnected),
        };

        debug!("Sending frame: id={}, {} bytes", live.id, text.len());
        live.outbound
            .send(Message::Text(text))
            .map_err(|_| Error::NotConnected)
    }

    /// Close the connection.
    ///
    /// Safe to call repeatedly or before anything was opened. Once this
    /// returns, [`next_event`](Self::next_event) yields nothing from the
    /// closed connection.
    pub fn close(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };

        info!("Closing connection: id={}", live.id);
        live.reader.abort();
        // The writer flushes the close frame and exits on its own.
        if live.outbound.send(Message::Close(None)).is_err() {
            live.writer.abort();
        }
        self.drain_pending();
    }

    /// Wait for the next event of the current connection.
    ///
    /// Returns `None` when no connection is live. A `Closed` event also
    /// releases the connection, so a later [`open`](Self::open) dials again.
    /// Cancel safe.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let current = self.live.as_ref()?.id;
            let (id, event) = self.events_rx.recv().await?;

            if id != current {
                debug!("Discarding event from stale connection: id={}", id);
                continue;
            }

            if let TransportEvent::Closed { code, reason } = &event {
                info!(
                    "Connection closed by peer: id={}, code={}, reason='{}'",
                    id, code, reason
                );
                self.teardown();
            }

            return Some(event);
        }
    }

    /// Drop the current connection without a closing handshake.
    fn teardown(&mut self) {
        if let Some(live) = self.live.take() {
            live.reader.abort();
            live.writer.abort();
        }
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        let mut discarded = 0usize;
        while self.events_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} pending transport events", discarded);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    id: ConnectionId,
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TaggedEvent>,
    healthy: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let _ = events.send((id, TransportEvent::Message(text.into_bytes())));
            }
            Ok(Message::Binary(data)) => {
                let _ = events.send((id, TransportEvent::Message(data)));
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.into_owned()))
                    .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                healthy.store(false, Ordering::SeqCst);
                let _ = events.send((id, TransportEvent::Closed { code, reason }));
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Read failed: id={}, {}", id, e);
                healthy.store(false, Ordering::SeqCst);
                let detail = e.to_string();
                let _ = events.send((id, TransportEvent::Error(detail.clone())));
                let _ = events.send((
                    id,
                    TransportEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: detail,
                    },
                ));
                return;
            }
        }
    }

    healthy.store(false, Ordering::SeqCst);
    let _ = events.send((
        id,
        TransportEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection dropped".to_string(),
        },
    ));
}

async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<TaggedEvent>,
    healthy: Arc<AtomicBool>,
) {
    while let Some(message) = outbound.recv().await {
        if matches!(message, Message::Close(_)) {
            let flushed = tokio::time::timeout(CLOSE_GRACE, async {
                let _ = sink.send(message).await;
                let _ = sink.close().await;
            })
            .await;
            if flushed.is_err() {
                debug!("Close frame not flushed in time: id={}", id);
            }
            return;
        }

        if let Err(e) = sink.send(message).await {
            warn!("Write failed: id={}, {}", id, e);
            healthy.store(false, Ordering::SeqCst);
            let _ = events.send((id, TransportEvent::Error(e.to_string())));
            return;
        }
    }
}
