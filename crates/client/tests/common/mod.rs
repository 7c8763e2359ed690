//! In-memory STOMP broker for widget tests
//!
//! The test plays the server by hand: accept a connection, answer the
//! handshake, read what the widget sent and deliver frames back.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use supportlink_client::websocket::stomp::{Command, Frame};
use supportlink_client::websocket::{Connector, MemoryConnector, MemoryPeer};
use supportlink_client::{Config, WidgetState};
use supportlink_shared::{Identity, Role};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(30);

pub fn config() -> Config {
    Config {
        enable_alert_feed: false,
        ..Config::default()
    }
}

pub fn customer(id: &str) -> Identity {
    Identity::new(id, Role::Customer, "Ana", "token-1")
}

pub fn operator(id: &str) -> Identity {
    Identity::new(id, Role::Operator, "Dana", "token-2")
}

pub struct Broker {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl Broker {
    pub fn new() -> (Arc<dyn Connector>, Self) {
        let (connector, peers) = MemoryConnector::new();
        (Arc::new(connector), Self { peers })
    }

    pub async fn accept(&mut self) -> Client {
        let peer = timeout(WAIT, self.peers.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped");
        Client { peer }
    }

    pub fn try_accept(&mut self) -> Option<Client> {
        self.peers.try_recv().ok().map(|peer| Client { peer })
    }
}

/// Server side of one widget connection
pub struct Client {
    peer: MemoryPeer,
}

impl Client {
    pub async fn next_frame(&mut self) -> Frame {
        let raw = timeout(WAIT, self.peer.from_client.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("client closed the transport");
        Frame::decode(&raw).unwrap().expect("unexpected heart-beat")
    }

    /// Frame already queued, without waiting
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        let raw = self.peer.from_client.try_recv().ok()?;
        Frame::decode(&raw).unwrap()
    }

    /// True once the widget released the transport
    pub async fn closed(&mut self) -> bool {
        timeout(WAIT, self.peer.from_client.recv())
            .await
            .expect("timed out waiting for close")
            .is_none()
    }

    /// Accept the CONNECT and return it
    pub async fn handshake(&mut self) -> Frame {
        let connect = self.next_frame().await;
        assert_eq!(connect.command, Command::Connect);
        self.send_raw("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0");
        connect
    }

    pub async fn reject(&mut self, message: &str) {
        let connect = self.next_frame().await;
        assert_eq!(connect.command, Command::Connect);
        self.send_raw(&format!("ERROR\nmessage:{}\n\n\0", message));
    }

    /// Read `n` SUBSCRIBE frames and return their destinations
    pub async fn subscriptions(&mut self, n: usize) -> Vec<String> {
        let mut destinations = Vec::new();
        for _ in 0..n {
            let frame = self.next_frame().await;
            assert_eq!(frame.command, Command::Subscribe);
            destinations.push(frame.get("destination").unwrap().to_string());
        }
        destinations
    }

    pub fn deliver(&self, destination: &str, body: &str) {
        self.send_raw(&format!(
            "MESSAGE\ndestination:{}\nsubscription:sub-0\nmessage-id:1\ncontent-type:application/json\n\n{}\0",
            destination, body
        ));
    }

    pub fn send_raw(&self, raw: &str) {
        self.peer.to_client.send(raw.to_string()).unwrap();
    }
}

pub async fn wait_for<F>(state: &mut watch::Receiver<WidgetState>, condition: F) -> WidgetState
where
    F: FnMut(&WidgetState) -> bool,
{
    timeout(WAIT, state.wait_for(condition))
        .await
        .expect("timed out waiting for widget state")
        .expect("widget loop stopped")
        .clone()
}
