//! Line-oriented rendering of widget snapshots
//!
//! Each snapshot is compared with the previous one and only the differences
//! are printed.

use supportlink_client::conversation::{Direction, Message};
use supportlink_client::view;
use supportlink_client::WidgetState;
use supportlink_shared::Role;

#[derive(Debug, Default)]
pub struct Renderer {
    last: WidgetState,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, next: &WidgetState) -> Vec<String> {
        let mut out = Vec::new();
        let last = &self.last;

        let identity_changed = next.identity_id != last.identity_id || next.role != last.role;
        if identity_changed {
            if let (Some(id), Some(role)) = (&next.identity_id, next.role) {
                out.push(format!("== {} ({}) ==", view::header_title(role), id));
            }
        }

        if next.connection != last.connection {
            out.push(format!("* chat {}", next.connection.as_str()));
        }
        if next.alerts_connection != last.alerts_connection {
            out.push(format!("* alerts {}", next.alerts_connection.as_str()));
        }
        if next.is_open != last.is_open {
            out.push(if next.is_open { "* panel opened" } else { "* panel closed" }.to_string());
        }

        for thread in &next.threads {
            if !last
                .threads
                .iter()
                .any(|t| t.counterparty_id == thread.counterparty_id)
            {
                out.push(format!(
                    "+ {} ({})",
                    thread.counterparty_id, thread.counterparty_name
                ));
            }
        }

        // A new thread on screen is printed in full
        let thread_switched = identity_changed || next.selected != last.selected;
        if thread_switched {
            if let Some(selected) = &next.selected {
                out.push(format!("* chatting with {}", selected));
            }
        }
        let already_shown = if thread_switched { 0 } else { last.messages.len() };
        if let Some(role) = next.role {
            if thread_switched && next.messages.is_empty() {
                out.push(format!("  {}", view::empty_thread_hint(role, &next.display_name)));
            }
            for message in next.messages.iter().skip(already_shown) {
                out.push(format!("[{}] {}", label(role, next, message), message.text));
            }
            if identity_changed {
                out.push(format!("> {}", view::input_placeholder(role)));
            }
        }

        if let Some(typing) = &next.typing {
            if last.typing.as_ref() != Some(typing) {
                out.push(format!("~ {}", view::typing_caption(&typing.from_name)));
            }
        }

        // Positions shift as toasts expire; the id does not
        for notification in &next.notifications {
            if !last.notifications.iter().any(|n| n.id == notification.id) {
                out.push(format!(
                    "! {}: {} (/dismiss {})",
                    view::NOTIFICATION_TITLE,
                    notification.text,
                    notification.id
                ));
            }
        }

        self.last = next.clone();
        out
    }
}

fn label(role: Role, state: &WidgetState, message: &Message) -> String {
    match (role, message.direction) {
        // Operators see who wrote
        (Role::Operator, Direction::In) => state
            .threads
            .iter()
            .find(|t| Some(&t.counterparty_id) == state.selected.as_ref())
            .map(|t| t.counterparty_name.clone())
            .unwrap_or_else(|| message.sender_id.clone()),
        _ => view::sender_label(message).to_string(),
    }
}
