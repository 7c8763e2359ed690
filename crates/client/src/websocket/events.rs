//! Payload and session event types
//!
//! Defines the JSON payloads carried in STOMP frame bodies and the events a
//! transport session reports back to the widget loop.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ConnectionError;

// =============================================================================
// Frame Payloads
// =============================================================================

/// Chat message or typing ping, in both directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sender_id: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub sender_name: String,

    /// Empty for typing pings
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,

    /// True when the message comes from support staff or the support bot.
    /// The server names this field `admin`.
    #[serde(rename = "admin", alias = "isOperatorOrigin", default)]
    pub is_operator_origin: bool,

    /// Only set on operator replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
}

/// Device alert pushed on the notification feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    pub message: String,
}

/// The server serializes unset strings as `null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Session Events
// =============================================================================

/// Events a transport session reports to the widget loop.
///
/// Every event carries the id of the session that produced it so the loop
/// can ignore stragglers from a session it already replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Handshake accepted and every topic of the subscription set bound
    Connected { session_id: Uuid },

    /// Transport or handshake failure before the session was usable
    Failed {
        session_id: Uuid,
        error: ConnectionError,
    },

    /// A MESSAGE frame arrived on a bound topic
    Frame {
        session_id: Uuid,
        destination: String,
        body: String,
    },

    /// The transport went away after a successful handshake
    Closed {
        session_id: Uuid,
        error: Option<ConnectionError>,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::Connected { session_id }
            | SessionEvent::Failed { session_id, .. }
            | SessionEvent::Frame { session_id, .. }
            | SessionEvent::Closed { session_id, .. } => *session_id,
        }
    }
}
