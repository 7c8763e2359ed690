//! Client error types
//!
//! None of these ever reach the hosting application as a failure: connection
//! errors degrade the widget to "no live updates", decode errors drop a single
//! frame and validation errors turn a click into a no-op.

/// Transport or handshake failure. Recoverable: the session moves to
/// `Failed` or `Disconnected` and the widget keeps running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),
    #[error("Unexpected frame during handshake: {0}")]
    UnexpectedFrame(String),
    #[error("Connection closed")]
    Closed,
}

/// Malformed inbound frame. The frame is dropped; nothing else is affected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    Frame(String),
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Frame on unbound topic: {0}")]
    UnboundTopic(String),
}

/// Reasons a send is silently refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Input is empty")]
    EmptyInput,
    #[error("No connected session")]
    NotConnected,
    #[error("No counterparty selected")]
    NoCounterpartySelected,
    #[error("Action not available for this role")]
    WrongRole,
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
            other => ConnectionError::Transport(other.to_string()),
        }
    }
}
