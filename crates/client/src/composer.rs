//! Outbound message composition
//!
//! Turns the input buffer into a publishable payload, or refuses with a
//! [`ValidationError`]. Refusals are no-ops for the user: the buffer stays as
//! it was and nothing is published.

use supportlink_shared::{CounterpartyId, Identity, Role};

use crate::error::ValidationError;
use crate::websocket::events::ChatPayload;
use crate::websocket::topics::{outbound_destination, typing_destination};

/// A payload ready to publish, with the thread it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub destination: &'static str,
    pub payload: ChatPayload,
    /// Operator replies only
    pub target: Option<CounterpartyId>,
}

#[derive(Debug, Clone, Default)]
pub struct Composer {
    input: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the draft with what the user typed
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Current draft, untrimmed
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Empty the draft after a successful send or an identity change
    pub fn clear(&mut self) {
        self.input.clear();
    }

    /// Build the chat payload for the current input.
    ///
    /// The text is sent as typed; trimming only decides emptiness.
    pub fn compose(
        &self,
        identity: &Identity,
        connected: bool,
        selected: Option<&CounterpartyId>,
    ) -> Result<OutgoingMessage, ValidationError> {
        if self.input.trim().is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        if !connected {
            return Err(ValidationError::NotConnected);
        }

        let target = match identity.role {
            Role::Customer => None,
            Role::Operator => Some(
                selected
                    .cloned()
                    .ok_or(ValidationError::NoCounterpartySelected)?,
            ),
        };

        Ok(OutgoingMessage {
            destination: outbound_destination(identity.role),
            payload: ChatPayload {
                sender_id: identity.identity_id.to_string(),
                sender_name: identity.display_name.clone(),
                content: self.input.clone(),
                is_operator_origin: identity.role.is_operator(),
                recipient_id: target.as_ref().map(|id| id.to_string()),
            },
            target,
        })
    }
}

/// Typing ping for the operators' typing feed. Customers only.
pub fn typing_ping(
    identity: &Identity,
    connected: bool,
) -> Result<(&'static str, ChatPayload), ValidationError> {
    let destination = typing_destination(identity.role).ok_or(ValidationError::WrongRole)?;
    if !connected {
        return Err(ValidationError::NotConnected);
    }
    Ok((
        destination,
        ChatPayload {
            sender_id: identity.identity_id.to_string(),
            sender_name: identity.display_name.clone(),
            content: String::new(),
            is_operator_origin: false,
            recipient_id: None,
        },
    ))
}

#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Identity {
        Identity::new("u1", Role::Customer, "Ana", "tok")
    }

    fn operator() -> Identity {
        Identity::new("admin1", Role::Operator, "Dana", "tok")
    }

    fn composer(text: &str) -> Composer {
        let mut composer = Composer::new();
        composer.set_input(text);
        composer
    }

    #[test]
    fn test_customer_message() {
        let out = composer("Hi there ").compose(&customer(), true, None).unwrap();
        assert_eq!(out.destination, "/app/chat");
        assert_eq!(out.payload.sender_id, "u1");
        assert_eq!(out.payload.sender_name, "Ana");
        assert_eq!(out.payload.content, "Hi there ");
        assert!(!out.payload.is_operator_origin);
        assert!(out.payload.recipient_id.is_none());
        assert!(out.target.is_none());
    }

    #[test]
    fn test_operator_reply_targets_selection() {
        let selected = CounterpartyId::from("cust42");
        let out = composer("On it")
            .compose(&operator(), true, Some(&selected))
            .unwrap();
        assert_eq!(out.destination, "/app/chat/admin");
        assert_eq!(out.payload.recipient_id.as_deref(), Some("cust42"));
        assert!(out.payload.is_operator_origin);
        assert_eq!(out.target, Some(selected));
    }

    #[test]
    fn test_refusals_in_order() {
        assert_eq!(
            composer("   ").compose(&operator(), false, None),
            Err(ValidationError::EmptyInput)
        );
        assert_eq!(
            composer("hi").compose(&operator(), false, None),
            Err(ValidationError::NotConnected)
        );
        assert_eq!(
            composer("hi").compose(&operator(), true, None),
            Err(ValidationError::NoCounterpartySelected)
        );
    }

    #[test]
    fn test_typing_ping_is_customer_only() {
        let (destination, payload) = typing_ping(&customer(), true).unwrap();
        assert_eq!(destination, "/app/chat/typing");
        assert_eq!(payload.sender_name, "Ana");
        assert!(payload.content.is_empty());

        assert_eq!(typing_ping(&operator(), true), Err(ValidationError::WrongRole));
        assert_eq!(
            typing_ping(&customer(), false),
            Err(ValidationError::NotConnected)
        );
    }
}
