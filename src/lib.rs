//! Session client for the travel planner assistant.
//!
//! A [`SessionController`] owns everything the client knows:
//!
//! 1. **Connectivity** — one `GET /` probe, recorded as a [`ConnectivityStatus`].
//! 2. **Trip session** — an image is posted to `/api/upload-image` and the
//!    returned itinerary replaces the session wholesale.
//! 3. **Group chat** — messages travel over a [`ChannelTransport`]; local sends
//!    are logged optimistically and inbound echoes are deduplicated by id.
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env();
//! let channel = Arc::new(RealtimeChannel::connect(&config));
//! let controller = SessionController::new(config).with_channel(channel.clone());
//! controller.spawn_probe();
//! controller.upload_image(std::fs::read("trip.jpg")?, "trip.jpg").await;
//! controller.send_chat("landing at 10");
//! ```

pub mod channel;
pub mod chat;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod probe;
pub mod render;
pub mod session;
pub mod upload;

pub use channel::{ChannelEvent, ChannelTransport, LoopbackChannel, RealtimeChannel};
pub use chat::ChatRelay;
pub use config::ClientConfig;
pub use controller::{Notification, SessionController, Tab, UploadOutcome, ViewState};
pub use error::{ChannelError, ConfigError, ConnectivityError, UploadError};
pub use models::{
    Activity, ActivityKind, ChatLog, ChatMessage, ConnectivityStatus, DayPlan, TripSession,
    LOCAL_AUTHOR,
};
pub use session::SessionStore;
