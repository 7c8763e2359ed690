//! Transport session management
//!
//! A `TransportSession` owns one connection for one identity and one surface.
//! The protocol runs in a spawned driver task that reports back through
//! [`SessionEvent`]s, so a slow or hung handshake never stalls the widget.
//! Closing (explicitly or by dropping the session) always goes through a
//! graceful STOMP `DISCONNECT` before the transport is released.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use supportlink_shared::Identity;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::SessionEvent;
use super::stomp::{Command, Frame};
use super::topics::{SubscriptionSet, Surface};
use super::transport::{Connector, FrameLink};
use crate::config::Config;
use crate::error::ConnectionError;

/// Connection lifecycle as seen by the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// Lowercase name used in logs and the console status line
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

/// Endpoint settings shared by every session of a widget
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub url: String,
    pub stomp_host: String,
    pub disconnect_grace: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.ws_url.clone(),
            stomp_host: config.stomp_host.clone(),
            disconnect_grace: config.disconnect_grace,
        }
    }
}

#[derive(Debug)]
enum SessionCommand {
    Publish { destination: String, body: String },
    Close,
}

/// One live connection bound to `(identity, surface)`
#[derive(Debug)]
pub struct TransportSession {
    session_id: Uuid,
    surface: Surface,
    subscriptions: SubscriptionSet,
    state: ConnectionState,
    disconnect_grace: Duration,
    commands: Option<mpsc::UnboundedSender<SessionCommand>>,
    driver: Option<JoinHandle<()>>,
}

impl TransportSession {
    /// Start connecting for `identity`.
    ///
    /// Returns `None` without touching the network when the identity has no
    /// id or no credential.
    pub fn open(
        identity: &Identity,
        surface: Surface,
        settings: &SessionSettings,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Option<Self> {
        if !identity.is_complete() {
            tracing::debug!(
                surface = surface.as_str(),
                "Identity has no id or credential, not opening a session"
            );
            return None;
        }

        let session_id = Uuid::new_v4();
        let subscriptions =
            SubscriptionSet::for_surface(surface, identity.role, &identity.identity_id);
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = Driver {
            session_id,
            url: settings.url.clone(),
            stomp_host: settings.stomp_host.clone(),
            credential: identity.credential.clone(),
            subscriptions: subscriptions.clone(),
            connector,
            commands: rx,
            events,
        };
        let handle = tokio::spawn(driver.run());

        tracing::info!(
            session_id = %session_id,
            identity_id = %identity.identity_id,
            role = %identity.role,
            surface = surface.as_str(),
            "Opening transport session"
        );

        Some(Self {
            session_id,
            surface,
            subscriptions,
            state: ConnectionState::Connecting,
            disconnect_grace: settings.disconnect_grace,
            commands: Some(tx),
            driver: Some(handle),
        })
    }

    /// Tag carried by every [`SessionEvent`] this session's driver emits
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    /// Last state folded in by [`TransportSession::apply`]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Fold a driver event into the session state. Returns false for events
    /// that belong to another session.
    pub fn apply(&mut self, event: &SessionEvent) -> bool {
        if event.session_id() != self.session_id {
            return false;
        }
        match event {
            SessionEvent::Connected { .. } => self.state = ConnectionState::Connected,
            SessionEvent::Failed { .. } => self.state = ConnectionState::Failed,
            SessionEvent::Closed { .. } => self.state = ConnectionState::Disconnected,
            SessionEvent::Frame { .. } => {}
        }
        true
    }

    /// Queue a JSON payload for publishing. Fire-and-forget: success only
    /// means the frame was handed to the driver.
    pub fn publish<T: Serialize>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::Closed);
        }
        let body = serde_json::to_string(payload).map_err(|e| {
            tracing::error!(error = ?e, "Failed to serialize outbound payload");
            ConnectionError::Transport(e.to_string())
        })?;
        let commands = self.commands.as_ref().ok_or(ConnectionError::Closed)?;
        commands
            .send(SessionCommand::Publish {
                destination: destination.to_string(),
                body,
            })
            .map_err(|_| ConnectionError::Closed)
    }

    /// Gracefully disconnect and release the transport.
    ///
    /// Waits at most the configured grace period for the driver to send
    /// `DISCONNECT`; after that the driver is aborted.
    pub async fn close(mut self) {
        let Some(commands) = self.commands.take() else {
            return;
        };
        let _ = commands.send(SessionCommand::Close);
        drop(commands);

        if let Some(mut driver) = self.driver.take() {
            if tokio::time::timeout(self.disconnect_grace, &mut driver)
                .await
                .is_err()
            {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Graceful disconnect timed out, aborting transport"
                );
                driver.abort();
            }
        }

        self.state = ConnectionState::Disconnected;
        tracing::info!(
            session_id = %self.session_id,
            surface = self.surface.as_str(),
            "Transport session closed"
        );
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        // The driver still disconnects gracefully on its own
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(SessionCommand::Close);
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

struct Driver {
    session_id: Uuid,
    url: String,
    stomp_host: String,
    credential: String,
    subscriptions: SubscriptionSet,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Driver {
    async fn run(mut self) {
        let session_id = self.session_id;

        let connected = tokio::select! {
            result = self.connector.connect(&self.url) => Some(result),
            _ = close_requested(&mut self.commands) => None,
        };
        let mut link = match connected {
            Some(Ok(link)) => link,
            Some(Err(error)) => {
                self.fail(error);
                return;
            }
            None => {
                tracing::debug!(session_id = %session_id, "Closed before transport was up");
                return;
            }
        };

        let handshake = tokio::select! {
            result = handshake(&mut link, &self.stomp_host, &self.credential) => Some(result),
            _ = close_requested(&mut self.commands) => None,
        };
        match handshake {
            Some(Ok(())) => {}
            Some(Err(error)) => {
                self.fail(error);
                disconnect(session_id, link);
                return;
            }
            None => {
                disconnect(session_id, link);
                return;
            }
        }

        // Bind every topic or none
        for (index, topic) in self.subscriptions.topics().iter().enumerate() {
            let frame = Frame::subscribe(&format!("sub-{}", index), &topic.destination());
            if link.outbound.send(frame.encode()).is_err() {
                self.fail(ConnectionError::Closed);
                return;
            }
        }

        tracing::info!(
            session_id = %session_id,
            topics = self.subscriptions.len(),
            "Transport session connected"
        );
        if self.events.send(SessionEvent::Connected { session_id }).is_err() {
            disconnect(session_id, link);
            return;
        }

        let close_error = loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Publish { destination, body }) => {
                        let frame = Frame::send(&destination, body);
                        if link.outbound.send(frame.encode()).is_err() {
                            break Some(ConnectionError::Closed);
                        }
                    }
                    Some(SessionCommand::Close) | None => {
                        disconnect(session_id, link);
                        return;
                    }
                },
                raw = link.inbound.recv() => match raw {
                    Some(raw) => {
                        if let Some(error) = self.forward(&raw) {
                            break Some(error);
                        }
                    }
                    None => break Some(ConnectionError::Closed),
                },
            }
        };

        tracing::warn!(
            session_id = %session_id,
            error = ?close_error,
            "Transport session lost"
        );
        let _ = self.events.send(SessionEvent::Closed {
            session_id,
            error: close_error,
        });
        disconnect(session_id, link);
    }

    /// Hand a MESSAGE frame to the widget. Returns an error when the server
    /// ends the session.
    fn forward(&self, raw: &str) -> Option<ConnectionError> {
        let frame = match Frame::decode(raw) {
            Ok(Some(frame)) => frame,
            Ok(None) => return None, // heart-beat
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Dropping malformed frame");
                return None;
            }
        };

        match frame.command {
            Command::Message => {
                let Some(destination) = frame.get("destination").map(str::to_string) else {
                    tracing::warn!(session_id = %self.session_id, "Dropping MESSAGE without destination");
                    return None;
                };
                let _ = self.events.send(SessionEvent::Frame {
                    session_id: self.session_id,
                    destination,
                    body: frame.body,
                });
                None
            }
            Command::Error => {
                let message = frame.get("message").unwrap_or(frame.body.as_str());
                Some(ConnectionError::HandshakeRejected(message.to_string()))
            }
            other => {
                tracing::debug!(
                    session_id = %self.session_id,
                    command = other.as_str(),
                    "Ignoring frame"
                );
                None
            }
        }
    }

    fn fail(&self, error: ConnectionError) {
        tracing::warn!(
            session_id = %self.session_id,
            error = %error,
            "Transport session failed"
        );
        let _ = self.events.send(SessionEvent::Failed {
            session_id: self.session_id,
            error,
        });
    }
}

/// Resolves once the owner asked for a close or dropped the session
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<SessionCommand>) {
    loop {
        match commands.recv().await {
            Some(SessionCommand::Publish { destination, .. }) => {
                tracing::debug!(destination = %destination, "Dropping publish before connect");
            }
            Some(SessionCommand::Close) | None => return,
        }
    }
}

async fn handshake(
    link: &mut FrameLink,
    stomp_host: &str,
    credential: &str,
) -> Result<(), ConnectionError> {
    link.outbound
        .send(Frame::connect(stomp_host, credential).encode())
        .map_err(|_| ConnectionError::Closed)?;

    loop {
        let raw = link.inbound.recv().await.ok_or(ConnectionError::Closed)?;
        match Frame::decode(&raw) {
            Ok(None) => continue,
            Ok(Some(frame)) => {
                return match frame.command {
                    Command::Connected => Ok(()),
                    Command::Error => Err(ConnectionError::HandshakeRejected(
                        frame.get("message").unwrap_or(frame.body.as_str()).to_string(),
                    )),
                    other => Err(ConnectionError::UnexpectedFrame(other.as_str().to_string())),
                };
            }
            Err(e) => return Err(ConnectionError::UnexpectedFrame(e.to_string())),
        }
    }
}

/// Send `DISCONNECT` and release the transport, whether or not the send works
fn disconnect(session_id: Uuid, link: FrameLink) {
    let receipt = format!("disconnect-{}", session_id);
    if link.outbound.send(Frame::disconnect(&receipt).encode()).is_err() {
        tracing::debug!(session_id = %session_id, "Transport already gone, skipping DISCONNECT");
    }
    drop(link);
}

#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::transport::MemoryConnector;
    use async_trait::async_trait;
    use supportlink_shared::Role;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    /// Connector whose transport never comes up
    struct StalledConnector;

    #[async_trait]
    impl Connector for StalledConnector {
        async fn connect(&self, _url: &str) -> Result<FrameLink, ConnectionError> {
            futures::future::pending().await
        }
    }

    /// Connector that blocks its worker thread, so the driver cannot observe
    /// a close request until the grace period is long gone
    struct HungConnector {
        entered: Arc<Notify>,
        block_for: Duration,
    }

    #[async_trait]
    impl Connector for HungConnector {
        async fn connect(&self, _url: &str) -> Result<FrameLink, ConnectionError> {
            self.entered.notify_one();
            std::thread::sleep(self.block_for);
            futures::future::pending().await
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            url: "ws://memory/ws".to_string(),
            stomp_host: "memory".to_string(),
            disconnect_grace: Duration::from_secs(1),
        }
    }

    fn decode(raw: &str) -> Frame {
        Frame::decode(raw).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_incomplete_identity_is_a_no_op() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "");

        let session =
            TransportSession::open(&identity, Surface::Chat, &settings(), Arc::new(connector), tx);
        assert!(session.is_none());
        assert!(peers.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handshake_subscribe_and_graceful_close() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "tok");

        let mut session =
            TransportSession::open(&identity, Surface::Chat, &settings(), Arc::new(connector), tx)
                .unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);

        let mut peer = peers.recv().await.unwrap();
        let connect = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(connect.command, Command::Connect);
        assert_eq!(connect.get("Authorization"), Some("Bearer tok"));
        peer.to_client
            .send("CONNECTED\nversion:1.2\n\n\0".to_string())
            .unwrap();

        let subscribe = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(subscribe.command, Command::Subscribe);
        assert_eq!(subscribe.get("destination"), Some("/topic/messages/u1"));

        let event = events.recv().await.unwrap();
        assert!(session.apply(&event));
        assert!(session.is_connected());

        session
            .publish("/app/chat", &serde_json::json!({"content": "hi"}))
            .unwrap();
        let send = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(send.command, Command::Send);
        assert_eq!(send.get("destination"), Some("/app/chat"));
        assert_eq!(send.body, r#"{"content":"hi"}"#);

        session.close().await;
        let disconnect = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(disconnect.command, Command::Disconnect);
        // Transport released after the DISCONNECT
        assert!(peer.from_client.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_handshake_error_reports_failure() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("admin1", Role::Operator, "Dana", "bad");

        let mut session =
            TransportSession::open(&identity, Surface::Chat, &settings(), Arc::new(connector), tx)
                .unwrap();
        let mut peer = peers.recv().await.unwrap();
        let _connect = peer.from_client.recv().await.unwrap();
        peer.to_client
            .send("ERROR\nmessage:Bad credentials\n\n\0".to_string())
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            SessionEvent::Failed {
                session_id: session.session_id(),
                error: ConnectionError::HandshakeRejected("Bad credentials".to_string()),
            }
        );
        assert!(session.apply(&event));
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(session.publish("/app/chat/admin", &"x").is_err());
    }

    #[tokio::test]
    async fn test_drop_still_disconnects() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "tok");

        let session =
            TransportSession::open(&identity, Surface::Chat, &settings(), Arc::new(connector), tx)
                .unwrap();
        let mut peer = peers.recv().await.unwrap();
        let _connect = peer.from_client.recv().await.unwrap();
        peer.to_client
            .send("CONNECTED\nversion:1.2\n\n\0".to_string())
            .unwrap();
        let _subscribe = peer.from_client.recv().await.unwrap();
        let _connected = events.recv().await.unwrap();

        drop(session);
        let disconnect = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(disconnect.command, Command::Disconnect);
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_and_garbage_dropped() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("admin1", Role::Operator, "Dana", "tok");

        let session =
            TransportSession::open(&identity, Surface::Chat, &settings(), Arc::new(connector), tx)
                .unwrap();
        let mut peer = peers.recv().await.unwrap();
        let _connect = peer.from_client.recv().await.unwrap();
        peer.to_client
            .send("CONNECTED\nversion:1.2\n\n\0".to_string())
            .unwrap();
        let _sub_messages = peer.from_client.recv().await.unwrap();
        let _sub_typing = peer.from_client.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Connected { .. }
        ));

        peer.to_client.send("GARBAGE".to_string()).unwrap();
        peer.to_client.send("\n".to_string()).unwrap();
        peer.to_client
            .send("MESSAGE\ndestination:/topic/admin/messages\n\n{}\0".to_string())
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Frame {
                session_id: session.session_id(),
                destination: "/topic/admin/messages".to_string(),
                body: "{}".to_string(),
            }
        );

        drop(peer.to_client);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Closed {
                error: Some(ConnectionError::Closed),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_close_while_connecting_skips_the_grace_period() {
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "tok");
        let settings = SessionSettings {
            disconnect_grace: Duration::from_secs(60),
            ..settings()
        };

        let session = TransportSession::open(
            &identity,
            Surface::Chat,
            &settings,
            Arc::new(StalledConnector),
            tx,
        )
        .unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);

        timeout(Duration::from_secs(5), session.close())
            .await
            .unwrap();
        // No Failed or Closed event for a session that was never up
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_during_stalled_handshake_disconnects() {
        let (connector, mut peers) = MemoryConnector::new();
        let (tx, mut events) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "tok");
        let settings = SessionSettings {
            disconnect_grace: Duration::from_secs(60),
            ..settings()
        };

        let session =
            TransportSession::open(&identity, Surface::Chat, &settings, Arc::new(connector), tx)
                .unwrap();
        let mut peer = peers.recv().await.unwrap();
        let connect = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(connect.command, Command::Connect);

        // CONNECTED never comes
        timeout(Duration::from_secs(5), session.close())
            .await
            .unwrap();

        let disconnect = decode(&peer.from_client.recv().await.unwrap());
        assert_eq!(disconnect.command, Command::Disconnect);
        assert!(disconnect.get("receipt").unwrap().starts_with("disconnect-"));
        assert!(peer.from_client.recv().await.is_none());
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_aborts_driver_after_grace_period() {
        let entered = Arc::new(Notify::new());
        let connector = HungConnector {
            entered: Arc::clone(&entered),
            block_for: Duration::from_millis(1500),
        };
        let (tx, _events) = mpsc::unbounded_channel();
        let identity = Identity::new("u1", Role::Customer, "Ana", "tok");
        let settings = SessionSettings {
            disconnect_grace: Duration::from_millis(50),
            ..settings()
        };

        let session =
            TransportSession::open(&identity, Surface::Chat, &settings, Arc::new(connector), tx)
                .unwrap();
        entered.notified().await;

        let started = std::time::Instant::now();
        session.close().await;
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
