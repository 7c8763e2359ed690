//! SupportLink client library
//!
//! Real-time routing core of the support chat widget: one transport session
//! per identity, role-dependent topic routing, conversation threads and
//! self-expiring typing and alert signals.

pub mod composer;
pub mod config;
pub mod conversation;
pub mod error;
pub mod signals;
pub mod state;
pub mod view;
pub mod websocket;
pub mod widget;

pub use config::Config;
pub use error::{ConnectionError, DecodeError, ValidationError};
pub use state::WidgetState;
pub use widget::{spawn, Widget, WidgetHandle};
