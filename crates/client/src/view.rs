//! Role-dependent presentation text
//!
//! Pure functions of the role, so every host renders the widget the same way.

use supportlink_shared::Role;

use crate::conversation::{Direction, Message};

pub const NOTIFICATION_TITLE: &str = "Overconsumption Alert";

pub fn header_title(role: Role) -> &'static str {
    match role {
        Role::Customer => "Chat Support",
        Role::Operator => "Support Panel",
    }
}

/// Label shown above a message bubble
pub fn sender_label(message: &Message) -> &'static str {
    match (message.direction, message.is_operator_origin) {
        (Direction::Out, _) => "You",
        (Direction::In, true) => "Support Agent",
        (Direction::In, false) => "Bot",
    }
}

pub fn typing_caption(from_name: &str) -> String {
    format!("{} is typing...", from_name)
}

/// Shown in place of an empty thread
pub fn empty_thread_hint(role: Role, display_name: &str) -> String {
    match role {
        Role::Customer => format!(
            "Hello, {}! I'm your automated assistant. If I can't answer, a human agent will step in.",
            display_name
        ),
        Role::Operator => "Select a user to start chatting".to_string(),
    }
}

pub fn input_placeholder(role: Role) -> &'static str {
    match role {
        Role::Customer => "Type a message...",
        Role::Operator => "Type a reply...",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn message(direction: Direction, is_operator_origin: bool) -> Message {
        Message {
            text: "hi".to_string(),
            direction,
            sender_id: "x".to_string(),
            is_operator_origin,
            received_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_titles() {
        assert_eq!(header_title(Role::Customer), "Chat Support");
        assert_eq!(header_title(Role::Operator), "Support Panel");
    }

    #[test]
    fn test_sender_labels() {
        assert_eq!(sender_label(&message(Direction::Out, false)), "You");
        assert_eq!(sender_label(&message(Direction::Out, true)), "You");
        assert_eq!(sender_label(&message(Direction::In, true)), "Support Agent");
        assert_eq!(sender_label(&message(Direction::In, false)), "Bot");
    }

    #[test]
    fn test_hints() {
        assert_eq!(typing_caption("Carla"), "Carla is typing...");
        assert!(empty_thread_hint(Role::Customer, "Ana").starts_with("Hello, Ana!"));
        assert_eq!(
            empty_thread_hint(Role::Operator, "Dana"),
            "Select a user to start chatting"
        );
    }
}
