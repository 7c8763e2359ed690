//! Observable widget state
//!
//! A plain snapshot published after every loop turn. Hosts render from it and
//! never mutate it; changes go through `WidgetHandle`.

use supportlink_shared::{CounterpartyId, Identity, IdentityId, Role};

use crate::conversation::{ConversationStore, Message, Thread};
use crate::signals::{Notification, SignalStore, TypingSignal};
use crate::websocket::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub message_count: usize,
}

impl ThreadSummary {
    fn of(thread: &Thread) -> Self {
        Self {
            counterparty_id: thread.counterparty_id.clone(),
            counterparty_name: thread.counterparty_name.clone(),
            message_count: thread.len(),
        }
    }

    fn describes(&self, thread: &Thread) -> bool {
        self.counterparty_id == thread.counterparty_id
            && self.counterparty_name == thread.counterparty_name
            && self.message_count == thread.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WidgetState {
    pub identity_id: Option<IdentityId>,
    pub role: Option<Role>,
    pub display_name: String,

    // Sessions
    pub connection: ConnectionState,
    pub alerts_connection: ConnectionState,

    // Conversations
    pub is_open: bool,
    pub threads: Vec<ThreadSummary>,
    pub selected: Option<CounterpartyId>,
    /// Messages of the thread on screen
    pub messages: Vec<Message>,

    // Ephemeral signals
    pub typing: Option<TypingSignal>,
    pub notifications: Vec<Notification>,

    pub input: String,
}

impl WidgetState {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Bring the snapshot up to date in place. Returns true when anything
    /// changed.
    ///
    /// Threads only ever grow, so while the same thread stays on screen only
    /// its new messages are copied.
    pub(crate) fn sync(&mut self, sources: &Sources<'_>) -> bool {
        let identity = sources.identity;
        let mut changed = false;

        let identity_id = identity.map(|i| &i.identity_id);
        let mut reset = self.identity_id.as_ref() != identity_id;
        if reset {
            self.identity_id = identity_id.cloned();
        }
        reset |= assign(&mut self.role, identity.map(|i| i.role));
        changed |= reset;

        let display_name = identity.map_or("", |i| i.display_name.as_str());
        if self.display_name != display_name {
            self.display_name = display_name.to_string();
            changed = true;
        }
        if self.input != sources.input {
            self.input = sources.input.to_string();
            changed = true;
        }
        changed |= assign(&mut self.connection, sources.connection);
        changed |= assign(&mut self.alerts_connection, sources.alerts_connection);
        changed |= assign(&mut self.is_open, sources.is_open);

        changed |= self.sync_conversations(sources.conversations, reset);
        changed |= self.sync_signals(sources.signals);
        changed
    }

    fn sync_conversations(&mut self, store: Option<&ConversationStore>, reset: bool) -> bool {
        let Some(store) = store else {
            let changed =
                !self.threads.is_empty() || self.selected.is_some() || !self.messages.is_empty();
            self.threads.clear();
            self.selected = None;
            self.messages.clear();
            return changed;
        };

        let mut changed = false;
        let threads = store.threads();
        let summaries_match = self.threads.len() == threads.len()
            && self.threads.iter().zip(&threads).all(|(s, t)| s.describes(t));
        if !summaries_match {
            self.threads = threads.iter().map(|t| ThreadSummary::of(t)).collect();
            changed = true;
        }

        let selected = store.selected();
        let switched = reset || self.selected.as_ref() != selected;
        if self.selected.as_ref() != selected {
            self.selected = selected.cloned();
            changed = true;
        }

        let current = store.current_thread().map(Thread::messages).unwrap_or_default();
        changed | self.sync_messages(current, switched)
    }

    fn sync_messages(&mut self, current: &[Message], switched: bool) -> bool {
        let shown = self.messages.len();
        let continues = !switched
            && current.len() >= shown
            && (shown == 0 || current.get(shown - 1) == self.messages.last());

        if continues {
            let Some(new) = current.get(shown..).filter(|new| !new.is_empty()) else {
                return false;
            };
            self.messages.extend_from_slice(new);
            return true;
        }

        if self.messages.as_slice() == current {
            return false;
        }
        self.messages.clear();
        self.messages.extend_from_slice(current);
        true
    }

    fn sync_signals(&mut self, signals: &SignalStore) -> bool {
        let mut changed = false;
        if self.typing.as_ref() != signals.typing() {
            self.typing = signals.typing().cloned();
            changed = true;
        }
        if self.notifications.as_slice() != signals.notifications() {
            self.notifications = signals.notifications().to_vec();
            changed = true;
        }
        changed
    }
}

/// Live widget data a snapshot is synced from
pub(crate) struct Sources<'a> {
    pub identity: Option<&'a Identity>,
    pub connection: ConnectionState,
    pub alerts_connection: ConnectionState,
    pub is_open: bool,
    pub input: &'a str,
    pub conversations: Option<&'a ConversationStore>,
    pub signals: &'a SignalStore,
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
