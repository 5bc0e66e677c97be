//! Type-safe identifiers for consensus participants and groups.

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// ServerId - consensus participant identifier
// ============================================================================

/// Unique identifier of a consensus participant.
///
/// Opaque to the transport layer: it is only ever used as a map key and as
/// the addressee of outbound messages. An id is never recycled while an
/// address mapping for it exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(pub u64);

impl ServerId {
    /// Create a new `ServerId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ServerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ServerId> for u64 {
    fn from(value: ServerId) -> Self {
        value.0
    }
}

impl std::str::FromStr for ServerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(ServerId)
    }
}

// ============================================================================
// GroupId - consensus group identifier
// ============================================================================

/// Identifier of one consensus group.
///
/// A transport instance is bound to exactly one group for its entire
/// lifetime; the id travels with every outbound message so the receiving
/// node can route it to the right group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl GroupId {
    /// Create a new `GroupId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<GroupId> for u64 {
    fn from(value: GroupId) -> Self {
        value.0
    }
}

// ============================================================================
// ServerInfo - opaque administrative payload
// ============================================================================

/// Opaque payload attached to a server when it is administratively added
/// to a group.
///
/// The consensus engine treats it as bytes; the transport interprets it
/// as an encoded network address. Consumed at the point of `add_server`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo(Vec<u8>);

impl ServerInfo {
    /// Wrap raw payload bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwrap the raw payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
