//! Real-time event channel used by the chat relay.
//!
//! ## Design
//! - [`ChannelTransport`] is the seam: `emit` an event, `subscribe` to inbound
//!   events. The relay never knows which implementation it is talking to.
//! - [`RealtimeChannel`] is the WebSocket client. A single background task owns
//!   the socket, reconnects after `reconnect_delay` when it drops, and drains an
//!   unbounded outbound queue so `emit` never blocks. Events emitted while
//!   disconnected stay queued until the next connection.
//! - [`LoopbackChannel`] keeps everything in memory. It records what was
//!   emitted and lets the caller inject inbound events; with echo enabled it
//!   rebroadcasts outbound chat the way the server does.
//! - Frames are JSON text: `{"event": "<name>", "data": <payload>}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ChannelError;

/// Outbound chat event name.
pub const SEND_MESSAGE_EVENT: &str = "send_message";
/// Inbound chat event name, broadcast to every participant.
pub const RECEIVE_MESSAGE_EVENT: &str = "receive_message";

/// Capacity of the inbound fan-out channel.
const INBOUND_CAPACITY: usize = 256;

/// Escalate reconnect logging from `warn` to `error` after this many failures.
const FAILURES_BEFORE_ERROR: u32 = 5;

/// One named event and its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl ChannelEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize `payload` into an event, or report which event failed.
    pub fn encode<T: Serialize>(event: &str, payload: &T) -> Result<Self, ChannelError> {
        let data = serde_json::to_value(payload).map_err(|e| ChannelError::Encode {
            event: event.to_string(),
            detail: e.to_string(),
        })?;
        Ok(Self::new(event, data))
    }
}

/// A bidirectional event transport.
pub trait ChannelTransport: Send + Sync {
    /// Queue `event` for delivery. Does not wait for the server.
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError>;

    /// Receive every inbound event from now on.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}

// ---------------------------------------------------------------------------
// WebSocket client
// ---------------------------------------------------------------------------

/// Auto-reconnecting WebSocket channel with an explicit lifecycle.
///
/// [`connect`](Self::connect) spawns the connection task and must be called
/// inside a tokio runtime. [`disconnect`](Self::disconnect) stops it and is
/// safe to call more than once.
pub struct RealtimeChannel {
    url: String,
    outbound: mpsc::UnboundedSender<ChannelEvent>,
    inbound: broadcast::Sender<ChannelEvent>,
    shutdown: watch::Sender<bool>,
    connected: watch::Receiver<bool>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    /// Start connecting to the configured channel URL in the background.
    pub fn connect(config: &ClientConfig) -> Self {
        let url = config.channel_url();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (connected_tx, connected) = watch::channel(false);

        let task = tokio::spawn(run_connection(
            url.clone(),
            config.reconnect_delay,
            outbound_rx,
            inbound.clone(),
            shutdown_rx,
            connected_tx,
        ));

        Self {
            url,
            outbound,
            inbound,
            shutdown,
            connected,
            closed: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the socket is currently open.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Wait until the socket is open, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.connected.clone();
        tokio::time::timeout(timeout, rx.wait_for(|up| *up))
            .await
            .map(|res| res.is_ok())
            .unwrap_or(false)
    }

    /// Close the socket and stop reconnecting. Idempotent.
    pub async fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(true);
        let task = self
            .task
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, url = %self.url, "channel task ended abnormally");
            }
            info!(url = %self.url, "channel disconnected");
        }
    }
}

impl ChannelTransport for RealtimeChannel {
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        self.outbound.send(event).map_err(|_| ChannelError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inbound.subscribe()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PumpExit {
    Shutdown,
    Dropped,
}

/// Connection loop: connect, pump frames until the socket drops, wait, retry.
async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    mut outbound_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    inbound_tx: broadcast::Sender<ChannelEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    connected_tx: watch::Sender<bool>,
) {
    let mut consecutive_failures: u32 = 0;
    // Event whose write failed on the last socket; resent first on the next.
    let mut pending: Option<ChannelEvent> = None;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let attempt = tokio::select! {
            res = tokio_tungstenite::connect_async(url.as_str()) => res,
            _ = shutdown_rx.changed() => break,
        };

        match attempt {
            Ok((ws_stream, _response)) => {
                consecutive_failures = 0;
                connected_tx.send_replace(true);
                info!(url = %url, "channel connected");

                let exit = pump(
                    ws_stream,
                    &mut outbound_rx,
                    &mut pending,
                    &inbound_tx,
                    &mut shutdown_rx,
                )
                .await;
                connected_tx.send_replace(false);
                if exit == PumpExit::Shutdown {
                    break;
                }
                warn!(url = %url, "channel dropped, will reconnect");
            }
            Err(e) => {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let err = ChannelError::Connect {
                    url: url.clone(),
                    detail: e.to_string(),
                };
                if consecutive_failures >= FAILURES_BEFORE_ERROR {
                    error!(
                        error = %err,
                        consecutive_failures,
                        "channel connect failed repeatedly, will retry"
                    );
                } else {
                    warn!(error = %err, "channel connect failed, will retry");
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// Multiplex one open socket with the outbound queue and the shutdown signal.
async fn pump(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    outbound_rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    pending: &mut Option<ChannelEvent>,
    inbound_tx: &broadcast::Sender<ChannelEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> PumpExit {
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    if let Some(event) = pending.take() {
        debug!(event = %event.event, "resending event held from previous connection");
        if !send_event(&mut ws_sink, event, pending).await {
            return PumpExit::Dropped;
        }
    }

    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                let Some(event) = out else {
                    let _ = ws_sink.close().await;
                    return PumpExit::Shutdown;
                };
                if !send_event(&mut ws_sink, event, pending).await {
                    return PumpExit::Dropped;
                }
            }

            frame = ws_stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ChannelEvent>(&text) {
                            // No subscribers is fine; the event is simply unobserved.
                            Ok(event) => { let _ = inbound_tx.send(event); }
                            Err(e) => debug!(error = %e, "ignoring non-event frame"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return PumpExit::Dropped,
                    Some(Ok(_)) => {} // Binary / ping / pong frames
                }
            }

            _ = shutdown_rx.changed() => {
                let _ = ws_sink.send(WsMessage::Close(None)).await;
                return PumpExit::Shutdown;
            }
        }
    }
}

/// Write one event to the socket.
///
/// Returns `false` when the socket failed; the event is then parked in
/// `pending` for the next connection. Unencodable events are dropped.
async fn send_event<S>(sink: &mut S, event: ChannelEvent, pending: &mut Option<ChannelEvent>) -> bool
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = match serde_json::to_string(&event) {
        Ok(text) => text,
        Err(e) => {
            warn!(event = %event.event, error = %e, "dropping unencodable event");
            return true;
        }
    };
    match sink.send(WsMessage::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(event = %event.event, error = %e, "socket write failed, event held for reconnect");
            *pending = Some(event);
            false
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// In-process transport: records outbound events, injects inbound ones.
pub struct LoopbackChannel {
    inbound: broadcast::Sender<ChannelEvent>,
    sent: Mutex<Vec<ChannelEvent>>,
    echo: bool,
    closed: AtomicBool,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        Self {
            inbound,
            sent: Mutex::new(Vec::new()),
            echo: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Rebroadcast every `send_message` as `receive_message`, sender included.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Inject an inbound event. Returns the number of subscribers reached.
    pub fn deliver(&self, event: ChannelEvent) -> usize {
        self.inbound.send(event).unwrap_or(0)
    }

    /// Everything emitted so far, oldest first.
    pub fn sent(&self) -> Vec<ChannelEvent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Refuse further emits.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for LoopbackChannel {
    fn emit(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(event.clone());
        }
        if self.echo && event.event == SEND_MESSAGE_EVENT {
            let _ = self
                .inbound
                .send(ChannelEvent::new(RECEIVE_MESSAGE_EVENT, event.data));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inbound.subscribe()
    }
}

/// Shared handle type used by the relay and controller.
pub type SharedTransport = Arc<dyn ChannelTransport>;
