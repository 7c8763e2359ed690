//! Topic routing
//!
//! Decodes an inbound frame body and decides which store handles it. The
//! router is stateless: it only knows the role and the topics its session
//! bound, so frames are handled in exactly the order the session delivers
//! them.

use supportlink_shared::{CounterpartyId, Role};

use super::events::{AlertPayload, ChatPayload};
use super::topics::{SubscriptionSet, Topic};
use crate::conversation::{InboundMessage, SUPPORT_COUNTERPARTY_ID, SUPPORT_COUNTERPARTY_NAME};
use crate::error::DecodeError;

/// Where a decoded frame goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Conversation store, inbound message
    Message(InboundMessage),
    /// Signal store, typing indicator
    Typing { from_name: String },
    /// Signal store, alert toast
    Alert { text: String },
}

/// Per-session frame router
#[derive(Debug, Clone)]
pub struct TopicRouter {
    role: Role,
    subscriptions: SubscriptionSet,
}

impl TopicRouter {
    pub fn new(role: Role, subscriptions: SubscriptionSet) -> Self {
        Self {
            role,
            subscriptions,
        }
    }

    pub fn route(&self, destination: &str, body: &str) -> Result<Routed, DecodeError> {
        let topic = self
            .subscriptions
            .find(destination)
            .ok_or_else(|| DecodeError::UnboundTopic(destination.to_string()))?;

        match (self.role, topic) {
            (Role::Customer, Topic::PersonalMessages(_)) => {
                let payload: ChatPayload = serde_json::from_str(body)?;
                Ok(Routed::Message(InboundMessage {
                    counterparty_id: CounterpartyId::from(SUPPORT_COUNTERPARTY_ID),
                    counterparty_name: SUPPORT_COUNTERPARTY_NAME.to_string(),
                    sender_id: payload.sender_id,
                    text: payload.content,
                    is_operator_origin: payload.is_operator_origin,
                }))
            }
            (Role::Operator, Topic::OperatorMessages) => {
                let payload: ChatPayload = serde_json::from_str(body)?;
                if payload.sender_id.trim().is_empty() {
                    return Err(DecodeError::Frame("message without senderId".to_string()));
                }
                Ok(Routed::Message(InboundMessage {
                    counterparty_id: CounterpartyId::from(payload.sender_id.clone()),
                    counterparty_name: payload.sender_name,
                    sender_id: payload.sender_id,
                    text: payload.content,
                    is_operator_origin: payload.is_operator_origin,
                }))
            }
            (Role::Operator, Topic::OperatorTyping) => {
                let payload: ChatPayload = serde_json::from_str(body)?;
                Ok(Routed::Typing {
                    from_name: payload.sender_name,
                })
            }
            (_, Topic::Notifications(_)) => {
                let payload: AlertPayload = serde_json::from_str(body)?;
                Ok(Routed::Alert {
                    text: payload.message,
                })
            }
            // A subscription set never pairs a role with another role's topics
            _ => Err(DecodeError::UnboundTopic(destination.to_string())),
        }
    }
}
