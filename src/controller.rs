//! Client session controller: the single owner of connectivity status, trip
//! session, chat relay and view state.
//!
//! Component errors stop here. Upload failures become one
//! [`Notification::Error`] each, probe failures become
//! [`ConnectivityStatus::Unreachable`], and channel failures are only logged.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::SharedTransport;
use crate::chat::ChatRelay;
use crate::config::ClientConfig;
use crate::error::UploadError;
use crate::models::{ChatMessage, ConnectivityStatus, TripSession};
use crate::probe::ConnectivityProber;
use crate::session::SessionStore;
use crate::upload::ItineraryUploader;

/// Top-level view selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Plan,
    Expense,
}

/// A message for the user, drained by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Info(String),
    Error(String),
}

/// Presentation state. `loading` is true while an upload is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub active_tab: Tab,
    pub loading: bool,
}

/// What happened to an upload request.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The session was replaced with the backend's itinerary.
    Applied,
    /// Another upload was in flight; this one was not sent.
    Busy,
    /// The response arrived after the upload was invalidated and was dropped.
    Discarded,
    /// The upload failed; the session is unchanged and the user was notified.
    Failed(UploadError),
}

impl UploadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UploadOutcome::Applied)
    }
}

pub struct SessionController {
    config: ClientConfig,
    prober: Arc<ConnectivityProber>,
    uploader: ItineraryUploader,
    sessions: SessionStore,
    status: Arc<Mutex<ConnectivityStatus>>,
    active_tab: Mutex<Tab>,
    notifications: Mutex<Vec<Notification>>,
    relay: Option<ChatRelay>,
}

impl SessionController {
    /// Controller with an empty session and no chat channel.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            prober: Arc::new(ConnectivityProber::new(&config)),
            uploader: ItineraryUploader::new(&config),
            sessions: SessionStore::new(),
            status: Arc::new(Mutex::new(ConnectivityStatus::Unknown)),
            active_tab: Mutex::new(Tab::Plan),
            notifications: Mutex::new(Vec::new()),
            relay: None,
            config,
        }
    }

    /// Attach a chat relay over `transport`. Must be called inside a tokio runtime.
    pub fn with_channel(mut self, transport: SharedTransport) -> Self {
        let relay = ChatRelay::attach(transport, self.config.display_name.clone());
        self.relay = Some(relay);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -- Connectivity -------------------------------------------------------

    /// Probe the backend once and record the result.
    pub async fn probe(&self) -> ConnectivityStatus {
        let status = self.prober.check().await;
        set_status(&self.status, status);
        status
    }

    /// Probe on a background task so the caller is never blocked.
    pub fn spawn_probe(&self) -> JoinHandle<ConnectivityStatus> {
        let prober = Arc::clone(&self.prober);
        let slot = Arc::clone(&self.status);
        tokio::spawn(async move {
            let status = prober.check().await;
            set_status(&slot, status);
            status
        })
    }

    pub fn connectivity(&self) -> ConnectivityStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectivityStatus::Unknown)
    }

    // -- Itinerary ----------------------------------------------------------

    /// Upload an image and, on success, replace the trip session with the
    /// backend's itinerary.
    pub async fn upload_image(&self, image: Vec<u8>, filename: &str) -> UploadOutcome {
        let ticket = match self.sessions.begin_upload() {
            Ok(ticket) => ticket,
            Err(_) => {
                debug!(filename, "upload ignored, another is in flight");
                return UploadOutcome::Busy;
            }
        };

        let result = self.uploader.upload(image, filename).await;
        match self.sessions.finish(ticket, result) {
            Ok(()) => {
                let session = self.sessions.snapshot();
                info!(filename, days = session.itinerary.len(), "trip session replaced");
                self.notify(Notification::Info(format!(
                    "Itinerary ready: {} day(s)",
                    session.itinerary.len()
                )));
                UploadOutcome::Applied
            }
            Err(UploadError::Superseded { current }) => {
                debug!(filename, current, "late upload response discarded");
                UploadOutcome::Discarded
            }
            Err(e) => {
                warn!(error = %e, filename, "upload failed");
                self.notify(Notification::Error(format!("Upload failed: {e}")));
                UploadOutcome::Failed(e)
            }
        }
    }

    /// Invalidate any in-flight upload, e.g. when the user leaves the view.
    pub fn navigate_away(&self) {
        self.sessions.invalidate_pending();
    }

    /// Current trip session (empty before the first successful upload).
    pub fn session(&self) -> TripSession {
        self.sessions.snapshot()
    }

    // -- Chat ---------------------------------------------------------------

    /// Send a chat line. Returns the logged message, or `None` for blank
    /// input or when no channel is attached.
    pub fn send_chat(&self, text: &str) -> Option<ChatMessage> {
        match &self.relay {
            Some(relay) => relay.send(text),
            None => {
                debug!("chat send without a channel");
                None
            }
        }
    }

    /// Whether `message` was sent from this controller's chat relay.
    pub fn is_own_message(&self, message: &ChatMessage) -> bool {
        self.relay.as_ref().is_some_and(|relay| relay.is_own(message))
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.relay
            .as_ref()
            .map(|relay| relay.messages())
            .unwrap_or_default()
    }

    pub fn chat_relay(&self) -> Option<&ChatRelay> {
        self.relay.as_ref()
    }

    // -- View ---------------------------------------------------------------

    pub fn select_tab(&self, tab: Tab) {
        if let Ok(mut active) = self.active_tab.lock() {
            *active = tab;
        }
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            active_tab: self.active_tab.lock().map(|t| *t).unwrap_or_default(),
            loading: self.sessions.is_uploading(),
        }
    }

    /// Remove and return pending notifications, oldest first.
    pub fn take_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|mut n| std::mem::take(&mut *n))
            .unwrap_or_default()
    }

    fn notify(&self, notification: Notification) {
        if let Ok(mut pending) = self.notifications.lock() {
            pending.push(notification);
        }
    }

    /// Detach the chat handler. The channel itself is left to its owner.
    pub fn shutdown(&self) {
        if let Some(relay) = &self.relay {
            relay.detach();
        }
    }
}

fn set_status(slot: &Mutex<ConnectivityStatus>, status: ConnectivityStatus) {
    if let Ok(mut current) = slot.lock() {
        *current = status;
    }
}
