use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A broadcast event flowing through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Login { name: String },
    Logout { name: String },
    Chat { name: String, text: String },
    Shutdown,
}

/// Wire frame delivered to clients: an event stamped by the hub.
///
/// Stamps are assigned in dispatch order and clamped non-decreasing, so the
/// timestamp order every client sees matches the intake order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ChatEvent,
}

/// Inbound text frame from a client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub text: String,
}
