//! Stdin command parsing

use supportlink_client::signals::NotificationId;
use supportlink_client::WidgetState;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Plain text to send
    Message(String),
    Select(String),
    ToggleOpen,
    /// Toast id, or 1-based position in the current toast list
    Dismiss(String),
    Typing,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if !trimmed.starts_with('/') {
        return Input::Message(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match (command, arg) {
        ("/select", Some(id)) => Input::Select(id.to_string()),
        ("/dismiss", Some(id)) => Input::Dismiss(id.to_string()),
        ("/open", None) => Input::ToggleOpen,
        ("/typing", None) => Input::Typing,
        ("/quit" | "/exit", None) => Input::Quit,
        _ => Input::Unknown(trimmed.to_string()),
    }
}

/// Resolve a `/dismiss` argument against the toasts on screen right now.
///
/// Toast ids never parse as numbers, so a number is always a position.
pub fn resolve_notification(state: &WidgetState, arg: &str) -> NotificationId {
    arg.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| state.notifications.get(index))
        .map(|n| n.id.clone())
        .unwrap_or_else(|| NotificationId::from(arg))
}

pub const HELP: &str = "Commands: <text> send, /select <id>, /open, /dismiss <id|n>, /typing, /quit";
