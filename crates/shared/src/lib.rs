//! SupportLink Shared Types
//!
//! This crate contains the identity types and errors shared between the
//! messaging client library and its hosts.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
