//! Ephemeral signal store
//!
//! Typing indicators and alert toasts that expire on their own. Expiry is a
//! deadline queue the widget loop drains with [`SignalStore::fire_due`];
//! nothing here spawns timers, so every transition happens on the loop.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

use rand::Rng;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::config::Config;

/// "Someone is typing" indicator. Only one is shown at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingSignal {
    pub from_name: String,
    pub expires_at: Instant,
}

/// Unique toast id: creation time, a per-store sequence and a random suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(String);

impl NotificationId {
    fn generate(seq: u64) -> Self {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let salt: u32 = rand::thread_rng().gen();
        Self(format!("{}-{}-{:08x}", millis, seq, salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub text: String,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Decay {
    ClearTyping,
    RemoveNotification(NotificationId),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    due: Instant,
    seq: u64,
    decay: Decay,
}

#[derive(Debug)]
pub struct SignalStore {
    typing_decay: Duration,
    notification_decay: Duration,
    typing: Option<TypingSignal>,
    notifications: Vec<Notification>,
    queue: BinaryHeap<Reverse<Scheduled>>,
    seq: u64,
}

impl SignalStore {
    pub fn new(typing_decay: Duration, notification_decay: Duration) -> Self {
        Self {
            typing_decay,
            notification_decay,
            typing: None,
            notifications: Vec::new(),
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.typing_decay, config.notification_decay)
    }

    /// Show `from_name` as typing.
    ///
    /// Each ping schedules its own clear. An earlier ping's clear is not
    /// cancelled, so the indicator goes away one decay after the first ping
    /// of a burst even while pings keep arriving.
    pub fn raise_typing(&mut self, from_name: impl Into<String>, now: Instant) {
        let expires_at = now + self.typing_decay;
        self.typing = Some(TypingSignal {
            from_name: from_name.into(),
            expires_at,
        });
        self.schedule(expires_at, Decay::ClearTyping);
    }

    /// Show a toast that removes itself one notification decay from `now`
    pub fn raise_notification(&mut self, text: impl Into<String>, now: Instant) -> NotificationId {
        self.seq += 1;
        let id = NotificationId::generate(self.seq);
        let expires_at = now + self.notification_decay;
        self.notifications.push(Notification {
            id: id.clone(),
            text: text.into(),
            expires_at,
        });
        self.schedule(expires_at, Decay::RemoveNotification(id.clone()));
        tracing::debug!(notification_id = %id, "Raised notification");
        id
    }

    /// Remove a toast before it expires. Unknown ids are ignored.
    pub fn dismiss(&mut self, id: &NotificationId) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| &n.id != id);
        self.notifications.len() != before
    }

    /// Earliest pending expiry, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse(s)| s.due)
    }

    /// Apply every expiry due at or before `now`. Returns true when anything
    /// visible changed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        let mut changed = false;
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.due > now {
                break;
            }
            let Some(Reverse(scheduled)) = self.queue.pop() else {
                break;
            };
            match scheduled.decay {
                Decay::ClearTyping => {
                    changed |= self.typing.take().is_some();
                }
                Decay::RemoveNotification(id) => {
                    changed |= self.dismiss(&id);
                }
            }
        }
        changed
    }

    /// The indicator on screen, if any
    pub fn typing(&self) -> Option<&TypingSignal> {
        self.typing.as_ref()
    }

    /// Active toasts, oldest first
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Drop every signal and pending expiry
    pub fn clear(&mut self) {
        self.typing = None;
        self.notifications.clear();
        self.queue.clear();
    }

    fn schedule(&mut self, due: Instant, decay: Decay) {
        self.seq += 1;
        self.queue.push(Reverse(Scheduled {
            due,
            seq: self.seq,
            decay,
        }));
    }
}
