//! Physical transports
//!
//! A [`Connector`] turns an endpoint URL into a [`FrameLink`]: a pair of
//! channels carrying raw text frames. The transport session speaks STOMP over
//! the link and never touches the socket directly, so tests can swap the
//! WebSocket for an in-memory peer.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::ConnectionError;

/// Text channel pair bound to one open transport.
///
/// Dropping `outbound` tears the transport down.
#[derive(Debug)]
pub struct FrameLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameLink, ConnectionError>;
}

// =============================================================================
// WebSocket
// =============================================================================

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<FrameLink, ConnectionError> {
        let (socket, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(WsMessage::Text(text)) => text.as_str().to_owned(),
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::warn!("Dropping non UTF-8 binary WebSocket message");
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue, // tungstenite answers pings itself
                    Err(e) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                };
                if in_tx.send(text).is_err() {
                    break; // Session gone
                }
            }
        });

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "WebSocket close handshake failed");
            }
            reader.abort();
        });

        tracing::debug!(url = %url, "WebSocket transport established");

        Ok(FrameLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Far end of an in-memory link, handed to whoever plays the server
#[derive(Debug)]
pub struct MemoryPeer {
    pub url: String,
    /// Frames the client sent
    pub from_client: mpsc::UnboundedReceiver<String>,
    /// Frames to deliver to the client
    pub to_client: mpsc::UnboundedSender<String>,
}

/// In-process transport. Every `connect` hands a [`MemoryPeer`] to the
/// receiver returned by [`MemoryConnector::new`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accepted, peers) = mpsc::unbounded_channel();
        (Self { accepted }, peers)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<FrameLink, ConnectionError> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        self.accepted
            .send(MemoryPeer {
                url: url.to_string(),
                from_client: out_rx,
                to_client: in_tx,
            })
            .map_err(|_| ConnectionError::Transport(format!("nothing listening at {}", url)))?;

        Ok(FrameLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::WebSocketStream;

    #[tokio::test]
    async fn test_memory_link_carries_frames_both_ways() {
        let (connector, mut peers) = MemoryConnector::new();
        let mut link = connector.connect("ws://memory/ws").await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        assert_eq!(peer.url, "ws://memory/ws");

        link.outbound.send("ping".to_string()).unwrap();
        assert_eq!(peer.from_client.recv().await.unwrap(), "ping");

        peer.to_client.send("pong".to_string()).unwrap();
        assert_eq!(link.inbound.recv().await.unwrap(), "pong");

        drop(link);
        assert!(peer.from_client.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_memory_connect_fails_without_listener() {
        let (connector, peers) = MemoryConnector::new();
        drop(peers);
        let result = connector.connect("ws://memory/ws").await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
    }

    // =========================================================================
    // WebSocket against a local tungstenite server
    // =========================================================================

    const WAIT: Duration = Duration::from_secs(10);

    /// Bind a local listener, connect the WebSocket transport to it and
    /// return both ends
    async fn ws_pair() -> (FrameLink, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio_tungstenite::accept_async(stream).await.unwrap()
        });

        let link = WsConnector.connect(&url).await.unwrap();
        (link, server.await.unwrap())
    }

    async fn server_recv(server: &mut WebSocketStream<TcpStream>) -> Option<WsMessage> {
        timeout(WAIT, server.next())
            .await
            .unwrap()
            .map(|msg| msg.unwrap())
    }

    async fn client_recv(link: &mut FrameLink) -> Option<String> {
        timeout(WAIT, link.inbound.recv()).await.unwrap()
    }

    #[tokio::test]
    async fn test_ws_text_frames_both_ways() {
        let (mut link, mut server) = ws_pair().await;

        link.outbound
            .send("SEND\ndestination:/app/chat\n\nhi\0".to_string())
            .unwrap();
        let received = server_recv(&mut server).await.unwrap();
        assert_eq!(
            received.into_text().unwrap().as_str(),
            "SEND\ndestination:/app/chat\n\nhi\0"
        );

        server
            .send(WsMessage::Text("MESSAGE\ndestination:/topic/x\n\n{}\0".into()))
            .await
            .unwrap();
        assert_eq!(
            client_recv(&mut link).await.as_deref(),
            Some("MESSAGE\ndestination:/topic/x\n\n{}\0")
        );
    }

    #[tokio::test]
    async fn test_ws_binary_frames_fall_back_to_utf8() {
        let (mut link, mut server) = ws_pair().await;

        server
            .send(WsMessage::Binary(b"CONNECTED\n\n\0".to_vec().into()))
            .await
            .unwrap();
        server
            .send(WsMessage::Binary(vec![0xff, 0xfe, 0x00].into()))
            .await
            .unwrap();
        server.send(WsMessage::Text("after".into())).await.unwrap();

        assert_eq!(
            client_recv(&mut link).await.as_deref(),
            Some("CONNECTED\n\n\0")
        );
        // The invalid message is skipped, not fatal
        assert_eq!(client_recv(&mut link).await.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_ws_server_close_ends_inbound() {
        let (mut link, mut server) = ws_pair().await;

        server.close(None).await.unwrap();
        assert!(client_recv(&mut link).await.is_none());
    }

    #[tokio::test]
    async fn test_ws_last_frame_is_flushed_before_close() {
        let (link, mut server) = ws_pair().await;

        link.outbound
            .send("DISCONNECT\nreceipt:disconnect-1\n\n\0".to_string())
            .unwrap();
        drop(link);

        let last = server_recv(&mut server).await.unwrap();
        assert_eq!(
            last.into_text().unwrap().as_str(),
            "DISCONNECT\nreceipt:disconnect-1\n\n\0"
        );
        assert!(matches!(
            server_recv(&mut server).await,
            Some(WsMessage::Close(_)) | None
        ));
    }

    #[tokio::test]
    async fn test_ws_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);

        let result = WsConnector.connect(&url).await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
    }
}
