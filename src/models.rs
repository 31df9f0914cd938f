//! Trip session and chat data model.
//!
//! Wire shapes match the backend JSON exactly; `TripSession` decodes from the
//! upload response and `ChatMessage` is the payload of the chat events.

use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Author sentinel for messages sent from this client.
pub const LOCAL_AUTHOR: &str = "Me";

// ---------------------------------------------------------------------------
// Itinerary
// ---------------------------------------------------------------------------

/// Category tag of an activity. Display only; unknown tags are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Transport,
    Food,
    Fun,
    Lodging,
    Sightseeing,
    Other(String),
}

impl From<String> for ActivityKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "transport" => ActivityKind::Transport,
            "food" => ActivityKind::Food,
            "fun" => ActivityKind::Fun,
            "lodging" => ActivityKind::Lodging,
            "sightseeing" => ActivityKind::Sightseeing,
            _ => ActivityKind::Other(tag),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Transport => write!(f, "transport"),
            ActivityKind::Food => write!(f, "food"),
            ActivityKind::Fun => write!(f, "fun"),
            ActivityKind::Lodging => write!(f, "lodging"),
            ActivityKind::Sightseeing => write!(f, "sightseeing"),
            ActivityKind::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// One scheduled item within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// `HH:MM` as supplied by the backend.
    pub time: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
}

/// A single itinerary day. Activities keep backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    /// 1-based day number.
    pub day: u32,
    pub date: String,
    pub activities: Vec<Activity>,
}

/// The client's itinerary-derived state.
///
/// Either empty (nothing uploaded yet) or fully populated. Use
/// [`TripSession::decode`] for untrusted input; it refuses partial documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSession {
    pub dates: Vec<String>,
    pub destinations: Vec<String>,
    pub itinerary: Vec<DayPlan>,
}

impl TripSession {
    /// An empty session, as held before the first upload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.itinerary.is_empty()
    }

    /// `(start, end)` of the trip, if dates are known.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        let first = self.dates.first()?;
        let last = self.dates.last()?;
        Some((first.as_str(), last.as_str()))
    }

    /// Decode an upload response body, failing closed.
    ///
    /// Rejects anything that is not the expected JSON shape, a day number of
    /// zero, and documents missing dates, destinations or days. Day order and
    /// uniqueness are taken as given.
    pub fn decode(body: &[u8]) -> Result<Self, UploadError> {
        let session: TripSession = serde_json::from_slice(body).map_err(|e| UploadError::Decode {
            detail: e.to_string(),
        })?;
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> Result<(), UploadError> {
        let invalid = |reason: &str| UploadError::Invalid {
            reason: reason.to_string(),
        };
        if self.itinerary.is_empty() {
            return Err(invalid("itinerary has no days"));
        }
        if self.dates.is_empty() {
            return Err(invalid("dates are missing"));
        }
        if self.destinations.is_empty() {
            return Err(invalid("destinations are missing"));
        }
        if let Some(plan) = self.itinerary.iter().find(|p| p.day == 0) {
            return Err(invalid(&format!("day numbers are 1-based, got 0 on {}", plan.date)));
        }
        Ok(())
    }

    /// Two-day Tokyo sample itinerary shown before uploads were available.
    pub fn sample() -> Self {
        let activity = |time: &str, title: &str, kind: ActivityKind| Activity {
            time: time.to_string(),
            title: title.to_string(),
            kind,
        };
        Self {
            dates: vec!["2024-04-01".to_string(), "2024-04-02".to_string()],
            destinations: vec!["Tokyo".to_string()],
            itinerary: vec![
                DayPlan {
                    day: 1,
                    date: "2024-04-01".to_string(),
                    activities: vec![
                        activity("10:00", "Arrive at Narita Airport", ActivityKind::Transport),
                        activity("18:00", "Dinner in Shinjuku", ActivityKind::Food),
                    ],
                },
                DayPlan {
                    day: 2,
                    date: "2024-04-02".to_string(),
                    activities: vec![activity("09:00", "Tokyo Disneyland", ActivityKind::Fun)],
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A chat line, as sent on `send_message` and received on `receive_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Client-generated id. Absent on messages from clients that do not set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub author: String,
    pub message: String,
    /// `HH:MM`, stamped by the sending client.
    pub time: String,
}

impl ChatMessage {
    /// Build an outgoing message with a fresh id and the current local time.
    pub fn outgoing(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Some(uuid::Uuid::new_v4().to_string()),
            author: author.into(),
            message: message.into(),
            time: local_hhmm(),
        }
    }

    pub fn is_local(&self, local_author: &str) -> bool {
        self.author == local_author
    }
}

/// Current local wall-clock time as `HH:MM`.
pub fn local_hhmm() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

/// Append-only chat history in local receipt/send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Whether a message with this id has already been logged.
    pub fn contains_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id.as_deref() == Some(id))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Result of the backend reachability probe. Display only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectivityStatus {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityStatus::Unknown => write!(f, "checking"),
            ConnectivityStatus::Reachable => write!(f, "backend reachable"),
            ConnectivityStatus::Unreachable => write!(f, "backend unreachable"),
        }
    }
}
