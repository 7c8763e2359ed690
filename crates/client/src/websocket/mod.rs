//! Real-time transport for the support widget
//!
//! Speaks STOMP over a WebSocket to the support server:
//! - Topic naming per role and surface
//! - STOMP frame encoding and decoding
//! - Session lifecycle (connect, subscribe, publish, disconnect)
//! - Routing of inbound frames to the stores
//!
//! # Architecture
//!
//! - **Transport**: `Connector` trait turning a URL into a text frame link
//! - **Stomp**: Frame codec
//! - **Connection**: `TransportSession` and its driver task
//! - **Topics**: Subscription sets and outbound destinations
//! - **Router**: Stateless per-session frame dispatch
//! - **Events**: Payloads and session events

pub mod connection;
pub mod events;
pub mod router;
pub mod stomp;
pub mod topics;
pub mod transport;

pub use connection::{ConnectionState, SessionSettings, TransportSession};
pub use events::{AlertPayload, ChatPayload, SessionEvent};
pub use router::{Routed, TopicRouter};
pub use topics::{SubscriptionSet, Surface, Topic};
pub use transport::{Connector, FrameLink, MemoryConnector, MemoryPeer, WsConnector};
