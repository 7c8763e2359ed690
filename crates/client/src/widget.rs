//! Widget event loop
//!
//! One tokio task owns every store and session. Host commands, session events
//! and decay deadlines are applied one at a time, and the resulting
//! [`WidgetState`] is published on a `watch` channel after each turn.

use std::sync::Arc;

use supportlink_shared::{CounterpartyId, Identity};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use crate::composer::{typing_ping, Composer};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{ConnectionError, ValidationError};
use crate::signals::{NotificationId, SignalStore};
use crate::state::{Sources, WidgetState};
use crate::websocket::{
    Connector, Routed, SessionEvent, SessionSettings, Surface, TopicRouter, TransportSession,
};

/// Called with every connection error. Errors never go anywhere else.
pub type ConnectionObserver = Arc<dyn Fn(Surface, &ConnectionError) + Send + Sync>;

#[derive(Debug)]
pub enum WidgetCommand {
    SetIdentity(Option<Identity>),
    SetInput(String),
    SendMessage,
    SignalTyping,
    SelectCounterparty(CounterpartyId),
    ToggleOpen,
    DismissNotification(NotificationId),
    Shutdown(oneshot::Sender<()>),
}

/// Widget builder
pub struct Widget {
    config: Config,
    connector: Arc<dyn Connector>,
    observer: Option<ConnectionObserver>,
}

impl Widget {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            observer: None,
        }
    }

    pub fn on_connection_error<F>(mut self, observer: F) -> Self
    where
        F: Fn(Surface, &ConnectionError) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Start the event loop. Must be called inside a tokio runtime.
    pub fn spawn(self) -> WidgetHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WidgetState::default());

        let event_loop = EventLoop {
            settings: SessionSettings::from_config(&self.config),
            signals: SignalStore::from_config(&self.config),
            config: self.config,
            connector: self.connector,
            observer: self.observer,
            identity: None,
            chat: None,
            alerts: None,
            conversations: None,
            composer: Composer::new(),
            is_open: false,
            events_tx,
            state: state_tx,
        };
        tokio::spawn(event_loop.run(commands_rx, events_rx));

        WidgetHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }
}

/// Spawn a widget without a connection observer
pub fn spawn(config: Config, connector: Arc<dyn Connector>) -> WidgetHandle {
    Widget::new(config, connector).spawn()
}

/// Host-side handle. Cheap to clone; the loop stops when the last handle is
/// dropped or on [`WidgetHandle::shutdown`].
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    commands: mpsc::UnboundedSender<WidgetCommand>,
    state: watch::Receiver<WidgetState>,
}

impl WidgetHandle {
    /// Bind the widget to an identity, or unbind it with `None`
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.send(WidgetCommand::SetIdentity(identity));
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.send(WidgetCommand::SetInput(text.into()));
    }

    pub fn send_message(&self) {
        self.send(WidgetCommand::SendMessage);
    }

    pub fn signal_typing(&self) {
        self.send(WidgetCommand::SignalTyping);
    }

    pub fn select_counterparty(&self, id: impl Into<CounterpartyId>) {
        self.send(WidgetCommand::SelectCounterparty(id.into()));
    }

    pub fn toggle_open(&self) {
        self.send(WidgetCommand::ToggleOpen);
    }

    pub fn dismiss_notification(&self, id: NotificationId) {
        self.send(WidgetCommand::DismissNotification(id));
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<WidgetState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> WidgetState {
        self.state.borrow().clone()
    }

    /// Stop the loop and wait until both sessions are closed
    pub async fn shutdown(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(WidgetCommand::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    fn send(&self, command: WidgetCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Widget loop already stopped, dropping command");
        }
    }
}

// =============================================================================
// Event Loop
// =============================================================================

struct Slot {
    session: TransportSession,
    router: TopicRouter,
}

struct EventLoop {
    config: Config,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    observer: Option<ConnectionObserver>,

    identity: Option<Identity>,
    chat: Option<Slot>,
    alerts: Option<Slot>,

    conversations: Option<ConversationStore>,
    signals: SignalStore,
    composer: Composer,
    is_open: bool,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<WidgetState>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<WidgetCommand>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        tracing::debug!("Widget loop started");

        loop {
            let deadline = self.signals.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(WidgetCommand::Shutdown(ack)) => {
                        self.teardown().await;
                        let _ = ack.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.signals.fire_due(Instant::now());
                }
            }

            self.publish();
        }

        self.teardown().await;
    }

    async fn handle_command(&mut self, command: WidgetCommand) {
        match command {
            WidgetCommand::SetIdentity(identity) => self.set_identity(identity).await,
            WidgetCommand::SetInput(text) => self.composer.set_input(text),
            WidgetCommand::SendMessage => self.send_message(),
            WidgetCommand::SignalTyping => self.signal_typing(),
            WidgetCommand::SelectCounterparty(id) => {
                if let Some(conversations) = self.conversations.as_mut() {
                    conversations.select(&id);
                }
            }
            WidgetCommand::ToggleOpen => self.is_open = !self.is_open,
            WidgetCommand::DismissNotification(id) => {
                self.signals.dismiss(&id);
            }
            // Handled by the loop
            WidgetCommand::Shutdown(_) => {}
        }
    }

    async fn set_identity(&mut self, identity: Option<Identity>) {
        if identity == self.identity {
            tracing::debug!("Identity unchanged, keeping sessions");
            return;
        }

        // The old sessions are gone before the new identity connects
        self.close_sessions().await;

        self.conversations = identity.as_ref().map(|i| ConversationStore::new(i.role));
        self.signals.clear();
        self.composer.clear();
        self.is_open = false;
        self.identity = identity;

        let Some(identity) = self.identity.clone() else {
            tracing::info!("Identity cleared");
            return;
        };

        tracing::info!(
            identity_id = %identity.identity_id,
            role = %identity.role,
            "Identity changed"
        );
        self.chat = self.open_slot(&identity, Surface::Chat);
        if self.config.enable_alert_feed {
            self.alerts = self.open_slot(&identity, Surface::Alerts);
        }
    }

    fn open_slot(&self, identity: &Identity, surface: Surface) -> Option<Slot> {
        let session = TransportSession::open(
            identity,
            surface,
            &self.settings,
            Arc::clone(&self.connector),
            self.events_tx.clone(),
        )?;
        let router = TopicRouter::new(identity.role, session.subscriptions().clone());
        Some(Slot { session, router })
    }

    async fn close_sessions(&mut self) {
        let chat = self.chat.take();
        let alerts = self.alerts.take();
        tokio::join!(close_slot(chat), close_slot(alerts));
    }

    async fn teardown(&mut self) {
        self.close_sessions().await;
        tracing::info!("Widget stopped");
    }

    // =========================================================================
    // Session events
    // =========================================================================

    fn handle_event(&mut self, event: SessionEvent) {
        let Some((surface, slot)) = self.slot_for(&event) else {
            tracing::debug!(
                session_id = %event.session_id(),
                "Ignoring event from a closed session"
            );
            return;
        };
        slot.session.apply(&event);

        let routed = match &event {
            SessionEvent::Frame {
                destination, body, ..
            } => match slot.router.route(destination, body) {
                Ok(routed) => Some(routed),
                Err(e) => {
                    tracing::warn!(
                        surface = surface.as_str(),
                        destination = %destination,
                        error = %e,
                        "Dropping inbound frame"
                    );
                    None
                }
            },
            _ => None,
        };

        match event {
            SessionEvent::Connected { session_id } => {
                tracing::info!(
                    session_id = %session_id,
                    surface = surface.as_str(),
                    "Live updates enabled"
                );
            }
            SessionEvent::Failed { error, .. } => self.report(surface, &error),
            SessionEvent::Closed {
                error: Some(error), ..
            } => self.report(surface, &error),
            SessionEvent::Closed { error: None, .. } => {}
            SessionEvent::Frame { .. } => {
                if let Some(routed) = routed {
                    self.apply_routed(routed);
                }
            }
        }
    }

    fn slot_for(&mut self, event: &SessionEvent) -> Option<(Surface, &mut Slot)> {
        let id = event.session_id();
        let owns = |slot: &Option<Slot>| {
            slot.as_ref()
                .is_some_and(|s| s.session.session_id() == id)
        };

        if owns(&self.chat) {
            Some((Surface::Chat, self.chat.as_mut()?))
        } else if owns(&self.alerts) {
            Some((Surface::Alerts, self.alerts.as_mut()?))
        } else {
            None
        }
    }

    fn apply_routed(&mut self, routed: Routed) {
        let now = Instant::now();
        match routed {
            Routed::Message(inbound) => {
                let Some(conversations) = self.conversations.as_mut() else {
                    return;
                };
                tracing::debug!(
                    counterparty_id = %inbound.counterparty_id,
                    "Inbound message"
                );
                let outcome = conversations.append_inbound(inbound);
                if outcome.opened_thread {
                    tracing::info!(
                        threads = conversations.threads().len(),
                        auto_selected = outcome.auto_selected,
                        "New conversation"
                    );
                }
                if outcome.expand_surface {
                    self.is_open = true;
                }
            }
            Routed::Typing { from_name } => self.signals.raise_typing(from_name, now),
            Routed::Alert { text } => {
                self.signals.raise_notification(text, now);
            }
        }
    }

    fn report(&self, surface: Surface, error: &ConnectionError) {
        tracing::warn!(
            surface = surface.as_str(),
            error = %error,
            "Live updates unavailable"
        );
        if let Some(observer) = &self.observer {
            observer(surface, error);
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    fn chat_connected(&self) -> bool {
        self.chat.as_ref().is_some_and(|s| s.session.is_connected())
    }

    fn send_message(&mut self) {
        let connected = self.chat_connected();
        let (Some(identity), Some(conversations)) =
            (self.identity.as_ref(), self.conversations.as_mut())
        else {
            tracing::debug!("Send refused: no identity");
            return;
        };

        let outgoing = match self
            .composer
            .compose(identity, connected, conversations.selected())
        {
            Ok(outgoing) => outgoing,
            Err(reason) => {
                tracing::debug!(reason = %reason, "Send refused");
                return;
            }
        };

        let published = match self.chat.as_ref() {
            Some(chat) => chat
                .session
                .publish(outgoing.destination, &outgoing.payload),
            None => Err(ConnectionError::Closed),
        };
        if let Err(e) = published {
            tracing::debug!(
                reason = %ValidationError::NotConnected,
                error = %e,
                "Send refused"
            );
            return;
        }

        conversations.append_outbound(
            outgoing.target.as_ref(),
            identity.identity_id.as_str(),
            &outgoing.payload.content,
        );
        self.composer.clear();
    }

    fn signal_typing(&mut self) {
        let Some(identity) = self.identity.as_ref() else {
            return;
        };
        let (destination, payload) = match typing_ping(identity, self.chat_connected()) {
            Ok(ping) => ping,
            Err(reason) => {
                tracing::debug!(reason = %reason, "Typing ping refused");
                return;
            }
        };
        if let Some(chat) = self.chat.as_ref() {
            if let Err(e) = chat.session.publish(destination, &payload) {
                tracing::debug!(error = %e, "Typing ping not sent");
            }
        }
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    fn publish(&self) {
        let session_state = |slot: &Option<Slot>| {
            slot.as_ref()
                .map(|s| s.session.state())
                .unwrap_or_default()
        };
        let sources = Sources {
            identity: self.identity.as_ref(),
            connection: session_state(&self.chat),
            alerts_connection: session_state(&self.alerts),
            is_open: self.is_open,
            input: self.composer.input(),
            conversations: self.conversations.as_ref(),
            signals: &self.signals,
        };
        self.state.send_if_modified(|state| state.sync(&sources));
    }
}

async fn close_slot(slot: Option<Slot>) {
    if let Some(slot) = slot {
        slot.session.close().await;
    }
}
