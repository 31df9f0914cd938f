//! Group chat relay: optimistic local echo plus inbound fan-in.
//!
//! ## Design
//! - `send` appends to the local log before emitting; the server is never the
//!   source of truth for the sender's own copy.
//! - Inbound `receive_message` events are appended in arrival order. A message
//!   whose id is already logged is dropped, so the server echoing our own
//!   message back does not double-insert it. Messages without an id are
//!   always appended.
//! - The relay's receive handler is a spawned task holding a subscription to
//!   the transport. `detach` aborts it; the transport itself lives on.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::{ChannelEvent, SharedTransport, RECEIVE_MESSAGE_EVENT, SEND_MESSAGE_EVENT};
use crate::models::{ChatLog, ChatMessage};

struct RelayShared {
    log: Mutex<ChatLog>,
    attached: AtomicBool,
    // Ids of messages sent from this relay, recorded before they are emitted.
    own_ids: Mutex<HashSet<String>>,
}

impl RelayShared {
    /// Append an inbound message unless detached or already logged.
    ///
    /// `attached` is read under the log lock, and `detach` clears it under the
    /// same lock, so no append lands after `detach` returns.
    fn append_inbound(&self, message: ChatMessage) -> bool {
        let Ok(mut log) = self.log.lock() else {
            return false;
        };
        if !self.attached.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(id) = message.id.as_deref() {
            if log.contains_id(id) {
                debug!(id, "dropping duplicate chat message");
                return false;
            }
        }
        log.push(message);
        true
    }
}

/// Sends and receives chat messages over a [`ChannelTransport`](crate::channel::ChannelTransport).
pub struct ChatRelay {
    transport: SharedTransport,
    author: String,
    shared: Arc<RelayShared>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl ChatRelay {
    /// Subscribe to `transport` and start appending inbound messages.
    ///
    /// Must be called inside a tokio runtime.
    pub fn attach(transport: SharedTransport, author: impl Into<String>) -> Self {
        let shared = Arc::new(RelayShared {
            log: Mutex::new(ChatLog::new()),
            attached: AtomicBool::new(true),
            own_ids: Mutex::new(HashSet::new()),
        });
        // Subscribe before spawning so nothing sent after attach is missed.
        let mut rx = transport.subscribe();
        let task_shared = Arc::clone(&shared);
        let receiver = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handle_event(&task_shared, event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "chat receiver fell behind, messages lost");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            transport,
            author: author.into(),
            shared,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Send `text` as the local author.
    ///
    /// Blank input is ignored: nothing is logged and nothing is emitted.
    /// Otherwise the message is logged first, then emitted; an emit failure is
    /// logged and the local copy stays.
    pub fn send(&self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let message = ChatMessage::outgoing(self.author.clone(), text);
        if let (Some(id), Ok(mut own)) = (message.id.clone(), self.shared.own_ids.lock()) {
            own.insert(id);
        }
        if let Ok(mut log) = self.shared.log.lock() {
            log.push(message.clone());
        }

        let emitted = ChannelEvent::encode(SEND_MESSAGE_EVENT, &message)
            .and_then(|event| self.transport.emit(event));
        if let Err(e) = emitted {
            warn!(error = %e, "chat message not delivered to channel");
        }
        Some(message)
    }

    /// Whether `message` was sent from this relay, judged by id.
    ///
    /// The id is recorded before the message reaches the transport, so a
    /// server echo is recognised however fast it comes back.
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.id.as_deref().is_some_and(|id| {
            self.shared
                .own_ids
                .lock()
                .is_ok_and(|own| own.contains(id))
        })
    }

    /// Append an inbound message. Returns whether the log grew.
    pub fn on_receive(&self, message: ChatMessage) -> bool {
        self.shared.append_inbound(message)
    }

    /// Deregister the receive handler. Safe to call repeatedly.
    pub fn detach(&self) {
        {
            let _log = self.shared.log.lock().unwrap_or_else(PoisonError::into_inner);
            self.shared.attached.store(false, Ordering::SeqCst);
        }
        if let Ok(mut guard) = self.receiver.lock() {
            if let Some(task) = guard.take() {
                task.abort();
                debug!("chat receive handler detached");
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.shared.attached.load(Ordering::SeqCst)
    }

    /// Copy of the log, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.shared
            .log
            .lock()
            .map(|log| log.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.shared.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ChatRelay {
    fn drop(&mut self) {
        self.detach();
    }
}

fn handle_event(shared: &RelayShared, event: ChannelEvent) {
    if event.event != RECEIVE_MESSAGE_EVENT {
        return;
    }
    match serde_json::from_value::<ChatMessage>(event.data) {
        Ok(message) => {
            shared.append_inbound(message);
        }
        Err(e) => debug!(error = %e, "ignoring malformed chat payload"),
    }
}
