//! Conversation store
//!
//! Holds every thread the widget knows about. Customers always have exactly
//! one implicit thread with support; operators get one thread per customer,
//! created on that customer's first message. Messages are kept in local
//! append order; the server carries no sequence numbers to reorder by.

use std::collections::HashMap;

use supportlink_shared::{CounterpartyId, Role};
use time::OffsetDateTime;

/// Counterparty key of a customer's implicit support thread
pub const SUPPORT_COUNTERPARTY_ID: &str = "SUPPORT";
/// Display name of a customer's implicit support thread
pub const SUPPORT_COUNTERPARTY_NAME: &str = "Support";
/// Name given to a thread opened by an outbound message before the customer
/// ever wrote
pub const PLACEHOLDER_COUNTERPARTY_NAME: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// A message as stored in a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub direction: Direction,
    pub sender_id: String,
    pub is_operator_origin: bool,
    pub received_at: OffsetDateTime,
}

/// A decoded inbound message, already attributed to a counterparty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    pub sender_id: String,
    pub text: String,
    pub is_operator_origin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub counterparty_id: CounterpartyId,
    pub counterparty_name: String,
    messages: Vec<Message>,
}

impl Thread {
    fn new(counterparty_id: CounterpartyId, counterparty_name: String) -> Self {
        Self {
            counterparty_id,
            counterparty_name,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// What an inbound message changed beyond the thread itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InboundOutcome {
    /// A thread was created for a new counterparty
    pub opened_thread: bool,
    /// First inbound message ever seen by an operator; the panel should open
    pub expand_surface: bool,
    /// The new thread became the selection
    pub auto_selected: bool,
}

#[derive(Debug, Clone)]
pub enum ConversationStore {
    Customer {
        thread: Thread,
    },
    Operator {
        threads: HashMap<CounterpartyId, Thread>,
        /// Thread creation order
        order: Vec<CounterpartyId>,
        selected: Option<CounterpartyId>,
        seen_inbound: bool,
    },
}

impl ConversationStore {
    pub fn new(role: Role) -> Self {
        match role {
            Role::Customer => ConversationStore::Customer {
                thread: Thread::new(
                    CounterpartyId::from(SUPPORT_COUNTERPARTY_ID),
                    SUPPORT_COUNTERPARTY_NAME.to_string(),
                ),
            },
            Role::Operator => ConversationStore::Operator {
                threads: HashMap::new(),
                order: Vec::new(),
                selected: None,
                seen_inbound: false,
            },
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ConversationStore::Customer { .. } => Role::Customer,
            ConversationStore::Operator { .. } => Role::Operator,
        }
    }

    pub fn append_inbound(&mut self, inbound: InboundMessage) -> InboundOutcome {
        let message = Message {
            text: inbound.text,
            direction: Direction::In,
            sender_id: inbound.sender_id,
            is_operator_origin: inbound.is_operator_origin,
            received_at: OffsetDateTime::now_utc(),
        };

        match self {
            ConversationStore::Customer { thread } => {
                thread.messages.push(message);
                InboundOutcome::default()
            }
            ConversationStore::Operator {
                threads,
                order,
                selected,
                seen_inbound,
            } => {
                let mut outcome = InboundOutcome {
                    expand_surface: !*seen_inbound,
                    ..InboundOutcome::default()
                };
                *seen_inbound = true;

                let id = inbound.counterparty_id;
                match threads.get_mut(&id) {
                    Some(thread) => {
                        if !inbound.counterparty_name.trim().is_empty() {
                            thread.counterparty_name = inbound.counterparty_name;
                        }
                        thread.messages.push(message);
                    }
                    None => {
                        let mut thread = Thread::new(id.clone(), inbound.counterparty_name);
                        thread.messages.push(message);
                        threads.insert(id.clone(), thread);
                        order.push(id.clone());
                        outcome.opened_thread = true;
                        tracing::debug!(counterparty_id = %id, "Opened thread");
                    }
                }

                if selected.is_none() {
                    *selected = Some(id);
                    outcome.auto_selected = true;
                }
                outcome
            }
        }
    }

    /// Record a message this widget sent. For operators `target` names the
    /// customer; an unknown target gets a fresh thread. Returns false when an
    /// operator has no target.
    pub fn append_outbound(
        &mut self,
        target: Option<&CounterpartyId>,
        sender_id: &str,
        text: &str,
    ) -> bool {
        let message = Message {
            text: text.to_string(),
            direction: Direction::Out,
            sender_id: sender_id.to_string(),
            is_operator_origin: self.role().is_operator(),
            received_at: OffsetDateTime::now_utc(),
        };

        match self {
            ConversationStore::Customer { thread } => {
                thread.messages.push(message);
                true
            }
            ConversationStore::Operator { threads, order, .. } => {
                let Some(id) = target else {
                    return false;
                };
                threads
                    .entry(id.clone())
                    .or_insert_with(|| {
                        order.push(id.clone());
                        Thread::new(id.clone(), PLACEHOLDER_COUNTERPARTY_NAME.to_string())
                    })
                    .messages
                    .push(message);
                true
            }
        }
    }

    /// Select the thread shown to an operator. Unknown ids are ignored.
    pub fn select(&mut self, id: &CounterpartyId) -> bool {
        match self {
            ConversationStore::Customer { .. } => false,
            ConversationStore::Operator {
                threads, selected, ..
            } => {
                if !threads.contains_key(id) {
                    tracing::debug!(counterparty_id = %id, "Ignoring selection of unknown thread");
                    return false;
                }
                *selected = Some(id.clone());
                true
            }
        }
    }

    pub fn selected(&self) -> Option<&CounterpartyId> {
        match self {
            ConversationStore::Customer { .. } => None,
            ConversationStore::Operator { selected, .. } => selected.as_ref(),
        }
    }

    pub fn thread(&self, id: &CounterpartyId) -> Option<&Thread> {
        match self {
            ConversationStore::Customer { thread } => {
                (&thread.counterparty_id == id).then_some(thread)
            }
            ConversationStore::Operator { threads, .. } => threads.get(id),
        }
    }

    /// The thread on screen: the support thread for a customer, the selected
    /// one for an operator
    pub fn current_thread(&self) -> Option<&Thread> {
        match self {
            ConversationStore::Customer { thread } => Some(thread),
            ConversationStore::Operator {
                threads, selected, ..
            } => selected.as_ref().and_then(|id| threads.get(id)),
        }
    }

    /// All threads in creation order
    pub fn threads(&self) -> Vec<&Thread> {
        match self {
            ConversationStore::Customer { thread } => vec![thread],
            ConversationStore::Operator { threads, order, .. } => {
                order.iter().filter_map(|id| threads.get(id)).collect()
            }
        }
    }
}
