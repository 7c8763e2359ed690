//! Common types used across SupportLink

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Identity ID wrapper (the id the auth provider assigns to a user)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Counterparty ID wrapper (the other side of a conversation thread)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterpartyId(pub String);

impl CounterpartyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterpartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CounterpartyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CounterpartyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Roles
// =============================================================================

/// Role of the signed-in identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// End user talking to support through one combined thread
    Customer,
    /// Support staff juggling one thread per customer
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Operator => "OPERATOR",
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Role::Operator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SharedError;

    /// Accepts both the canonical names and the auth provider's legacy
    /// `CLIENT` / `ADMIN` role strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" | "CLIENT" => Ok(Role::Customer),
            "OPERATOR" | "ADMIN" => Ok(Role::Operator),
            _ => Err(SharedError::InvalidRole(s.to_string())),
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Signed-in identity as supplied by the auth provider.
///
/// Equality covers every field: a changed credential or display name is a
/// different identity as far as the messaging session is concerned.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub identity_id: IdentityId,
    pub role: Role,
    pub display_name: String,
    /// Opaque bearer credential
    pub credential: String,
}

impl Identity {
    pub fn new(
        identity_id: impl Into<IdentityId>,
        role: Role,
        display_name: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            role,
            display_name: display_name.into(),
            credential: credential.into(),
        }
    }

    /// Whether this identity carries enough to open a session
    pub fn is_complete(&self) -> bool {
        !self.identity_id.is_blank() && !self.credential.trim().is_empty()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("identity_id", &self.identity_id)
            .field("role", &self.role)
            .field("display_name", &self.display_name)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}
