//! Error types for the session client.
//!
//! Every variant carries enough context to diagnose the failure without
//! inspecting the originating `reqwest` / `tungstenite` error. None of these
//! escape the [`SessionController`](crate::controller::SessionController):
//! they are turned into [`ConnectivityStatus`](crate::models::ConnectivityStatus)
//! changes, user notifications, or log lines.

use thiserror::Error;

/// Failure of the one-shot backend reachability probe. Display-only.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// TCP connect, DNS or timeout failure.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The backend replied with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// The response body could not be read.
    #[error("unreadable response body from {url}: {detail}")]
    Body { url: String, detail: String },
}

/// Failure of an itinerary upload. The current trip session is never
/// modified when one of these is returned.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Zero-length image buffer; nothing was sent.
    #[error("image '{filename}' is empty")]
    EmptyImage { filename: String },
    /// Another upload is still awaiting its response.
    #[error("an upload is already in progress")]
    InFlight,
    /// TCP connect or DNS failure.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The request did not complete within the upload timeout.
    #[error("upload to {url} timed out")]
    Timeout { url: String },
    /// The backend replied with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// The response body was not a trip session JSON document.
    #[error("malformed trip session response: {detail}")]
    Decode { detail: String },
    /// The response decoded but would leave the session partially populated.
    #[error("invalid trip session: {reason}")]
    Invalid { reason: String },
    /// The response arrived after its upload was invalidated.
    #[error("upload response discarded: superseded by generation {current}")]
    Superseded { current: u64 },
}

/// Real-time channel failures. Logged, never shown to the user.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The WebSocket handshake failed.
    #[error("channel connect to {url} failed: {detail}")]
    Connect { url: String, detail: String },
    /// The channel was disconnected and no longer accepts events.
    #[error("channel is closed")]
    Closed,
    /// The outbound payload could not be serialized.
    #[error("could not encode '{event}' event: {detail}")]
    Encode { event: String, detail: String },
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("backend URL '{0}' must start with http:// or https://")]
    InvalidUrl(String),
}
