//! Error types at the transport-call boundary.
//!
//! The taxonomy separates the messaging layer's verdict on a send
//! ([`MessagingError`]), the consensus engine's verdict on an inbound
//! request/response dispatch ([`EngineError`]), and the transport's own
//! failures ([`TransportError`]). Fire-and-forget completion policy is a
//! direct match on these enums: a timeout is swallowed, anything else is
//! logged once and then dropped.

use alder_raft_types::ServerId;
use snafu::Snafu;

/// Outcome of a messaging-layer send.
///
/// Reported by the substrate performing the actual network I/O. The
/// `Timeout` variant is distinguished from all other failures; the
/// transport's logging policy depends on that split.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum MessagingError {
    /// The send did not complete before its deadline.
    #[snafu(display("request to {peer} timed out"))]
    Timeout {
        /// Destination of the send.
        peer: ServerId,
    },

    /// Connecting to the peer failed, or the connection dropped mid-send.
    #[snafu(display("connection to {peer} failed: {reason}"))]
    Connection {
        /// Destination of the send.
        peer: ServerId,
        /// Description of the connection failure.
        reason: String,
    },

    /// The message could not be encoded for the wire.
    #[snafu(display("failed to encode message for {peer}: {reason}"))]
    Codec {
        /// Destination of the send.
        peer: ServerId,
        /// Description of the encoding failure.
        reason: String,
    },

    /// The peer received the message and refused it.
    #[snafu(display("{peer} rejected the request: {reason}"))]
    Rejected {
        /// Destination of the send.
        peer: ServerId,
        /// Reason reported by the peer.
        reason: String,
    },
}

impl MessagingError {
    /// True for the deadline-expiry outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failure surfaced by the consensus engine while serving a
/// request/response dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// The engine is shutting down and no longer serves requests.
    #[snafu(display("consensus engine is stopped"))]
    Stopped,

    /// The engine cannot serve the request right now.
    #[snafu(display("consensus engine busy: {reason}"))]
    Busy {
        /// Description of what the engine is waiting on.
        reason: String,
    },
}

/// Errors returned by the transport's fallible operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    /// No address mapping exists for the destination.
    #[snafu(display("no address known for server {id}"))]
    UnknownServer {
        /// The unresolvable destination.
        id: ServerId,
    },

    /// The messaging layer failed to deliver the call.
    #[snafu(display("messaging failure: {source}"))]
    Messaging {
        /// The substrate's verdict.
        source: MessagingError,
    },

    /// An administrative payload did not decode to a network address.
    ///
    /// The mapping is not installed; the caller sees the failure.
    #[snafu(display("malformed server info for {id}: {source}"))]
    MalformedServerInfo {
        /// The server the payload was supplied for.
        id: ServerId,
        /// The JSON decoding failure.
        source: serde_json::Error,
    },

    /// A snapshot transfer was cancelled by its caller.
    #[snafu(display("snapshot transfer to {id} aborted"))]
    SnapshotAborted {
        /// Destination of the cancelled transfer.
        id: ServerId,
    },

    /// The consensus engine failed an inbound request/response dispatch.
    #[snafu(display("engine dispatch failed: {source}"))]
    Engine {
        /// The engine's verdict.
        source: EngineError,
    },
}

impl TransportError {
    /// True when the underlying outcome was a messaging-layer timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Messaging { source } if source.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Display
    // =========================================================================

    #[test]
    fn messaging_timeout_display_names_the_peer() {
        let err = MessagingError::Timeout {
            peer: ServerId::new(7),
        };
        assert_eq!(err.to_string(), "request to 7 timed out");
    }

    #[test]
    fn unknown_server_display_names_the_id() {
        let err = TransportError::UnknownServer {
            id: ServerId::new(3),
        };
        assert_eq!(err.to_string(), "no address known for server 3");
    }

    #[test]
    fn malformed_server_info_display_carries_the_decode_failure() {
        let source = serde_json::from_slice::<std::net::SocketAddr>(b"null").unwrap_err();
        let err = TransportError::MalformedServerInfo {
            id: ServerId::new(9),
            source,
        };
        assert!(err.to_string().starts_with("malformed server info for 9: "));
    }

    // =========================================================================
    // Timeout classification
    // =========================================================================

    #[test]
    fn timeout_classification_only_matches_messaging_timeouts() {
        let timeout = TransportError::Messaging {
            source: MessagingError::Timeout {
                peer: ServerId::new(1),
            },
        };
        assert!(timeout.is_timeout());

        let connection = TransportError::Messaging {
            source: MessagingError::Connection {
                peer: ServerId::new(1),
                reason: "refused".to_string(),
            },
        };
        assert!(!connection.is_timeout());

        let unresolved = TransportError::UnknownServer {
            id: ServerId::new(1),
        };
        assert!(!unresolved.is_timeout());
    }
}
