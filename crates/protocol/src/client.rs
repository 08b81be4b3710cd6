use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opens sessions to device endpoints.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Establish a session to `address`.
    async fn connect(&self, address: &str) -> Result<Box<dyn Session>, ConnectionFault>;
}

/// One open session to a device's address space.
///
/// Sessions are owned by a single unit of work and never shared; see
/// [`crate::SessionGuard`] for the scoped wrapper the gateway uses.
#[async_trait]
pub trait Session: Send + Sync {
    /// Entry point for address-space traversal.
    fn root_node(&self) -> NodeHandle;

    /// Direct children of `node`.
    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>, ProtocolFault>;

    async fn classify(&self, node: &NodeHandle) -> Result<NodeClass, ProtocolFault>;

    /// Display name of `node` (the browse name).
    async fn name(&self, node: &NodeHandle) -> Result<String, ProtocolFault>;

    async fn read_value(&self, identifier: &str) -> Result<PointValue, ProtocolFault>;

    /// Release the session. Idempotent and infallible.
    async fn disconnect(&self);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Address-space types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque reference to a node, carrying its protocol-native identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    identifier: String,
}

impl NodeHandle {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Node classification as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Carries a readable value (a variable).
    ValueBearing,
    /// Purely organizational (objects, folders).
    #[default]
    Structural,
}

/// A value read from a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PointValue {
    /// Whether the value reads as "on": `true`, non-zero, or a non-empty
    /// string other than `"0"` / `"false"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            PointValue::Bool(b) => *b,
            PointValue::Int(i) => *i != 0,
            PointValue::Float(f) => *f != 0.0 && !f.is_nan(),
            PointValue::Text(s) => {
                let s = s.trim();
                !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false")
            }
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Bool(b) => write!(f, "{b}"),
            PointValue::Int(i) => write!(f, "{i}"),
            PointValue::Float(x) => write!(f, "{x}"),
            PointValue::Text(s) => f.write_str(s),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Faults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session establishment failed. Terminal for the current unit of work.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionFault {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not resolve server address '{0}'")]
    Unresolvable(String),

    #[error("connection refused by '{0}'")]
    Refused(String),

    #[error("connecting to '{address}' timed out after {after_ms}ms")]
    Timeout { address: String, after_ms: u64 },

    #[error("session setup with '{address}' failed: {reason}")]
    Session { address: String, reason: String },
}

/// An operation on an open session failed. Non-fatal for the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolFault {
    #[error("browsing children of {node} failed: {reason}")]
    Browse { node: String, reason: String },

    #[error("reading attributes of {node} failed: {reason}")]
    Attribute { node: String, reason: String },

    #[error("reading {identifier} failed: {reason}")]
    Read { identifier: String, reason: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl From<ConnectionFault> for pb_domain::Error {
    fn from(fault: ConnectionFault) -> Self {
        pb_domain::Error::Connection(fault.to_string())
    }
}

impl From<ProtocolFault> for pb_domain::Error {
    fn from(fault: ProtocolFault) -> Self {
        pb_domain::Error::Protocol(fault.to_string())
    }
}
