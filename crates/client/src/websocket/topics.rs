//! Topic naming and subscription sets
//!
//! Everything here is a pure function of the role (and, for personal topics,
//! the identity id). The widget never builds a destination string anywhere
//! else.

use supportlink_shared::{IdentityId, Role};

/// Operator broadcast of every customer message
pub const OPERATOR_MESSAGES: &str = "/topic/admin/messages";
/// Operator broadcast of customer typing pings
pub const OPERATOR_TYPING: &str = "/topic/admin/typing";

/// Customer messages to support
pub const CUSTOMER_OUTBOUND: &str = "/app/chat";
/// Operator replies to one customer
pub const OPERATOR_OUTBOUND: &str = "/app/chat/admin";
/// Customer typing pings
pub const TYPING_OUTBOUND: &str = "/app/chat/typing";

/// Which UI surface a session feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// The chat widget
    Chat,
    /// The alert toast stack
    Alerts,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Chat => "chat",
            Surface::Alerts => "alerts",
        }
    }
}

/// A subscribable inbound topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Replies addressed to one customer
    PersonalMessages(IdentityId),
    /// Messages from any customer
    OperatorMessages,
    /// Typing pings from any customer
    OperatorTyping,
    /// Device alerts for one identity
    Notifications(IdentityId),
}

impl Topic {
    pub fn destination(&self) -> String {
        match self {
            Topic::PersonalMessages(id) => format!("/topic/messages/{}", id),
            Topic::OperatorMessages => OPERATOR_MESSAGES.to_string(),
            Topic::OperatorTyping => OPERATOR_TYPING.to_string(),
            Topic::Notifications(id) => format!("/topic/notifications/{}", id),
        }
    }
}

/// The complete set of topics bound by one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: Vec<Topic>,
}

impl SubscriptionSet {
    pub fn for_surface(surface: Surface, role: Role, identity_id: &IdentityId) -> Self {
        let topics = match (surface, role) {
            (Surface::Chat, Role::Customer) => vec![Topic::PersonalMessages(identity_id.clone())],
            (Surface::Chat, Role::Operator) => vec![Topic::OperatorMessages, Topic::OperatorTyping],
            (Surface::Alerts, _) => vec![Topic::Notifications(identity_id.clone())],
        };
        Self { topics }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Resolve an inbound destination to the bound topic it belongs to
    pub fn find(&self, destination: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.destination() == destination)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Where chat messages from this role are published
pub fn outbound_destination(role: Role) -> &'static str {
    match role {
        Role::Customer => CUSTOMER_OUTBOUND,
        Role::Operator => OPERATOR_OUTBOUND,
    }
}

/// Where typing pings from this role are published. Operators never send them.
pub fn typing_destination(role: Role) -> Option<&'static str> {
    match role {
        Role::Customer => Some(TYPING_OUTBOUND),
        Role::Operator => None,
    }
}
