//! Shared Raft value types for Alder.
//!
//! This crate holds the identifiers and message types exchanged between
//! the consensus engine, the RPC transport and the cluster messaging
//! layer, without requiring any of those heavier crates. Everything here
//! is a plain serde-derived value type.
//!
//! # Module Organization
//!
//! - [`id`]: participant and group identifiers, administrative payloads
//! - [`message`]: the Raft message variants the transport routes

pub mod id;
pub mod message;

// ============================================================================
// Re-exports: Identifiers
// ============================================================================
pub use id::GroupId;
pub use id::ServerId;
pub use id::ServerInfo;
// ============================================================================
// Re-exports: Messages
// ============================================================================
pub use message::AppendEntriesReply;
pub use message::AppendEntriesRequest;
pub use message::AppendOutcome;
pub use message::EntryPayload;
pub use message::InstallSnapshot;
pub use message::LogEntry;
pub use message::LogId;
pub use message::ReadBarrierReply;
pub use message::ReadId;
pub use message::ReadQuorum;
pub use message::ReadQuorumReply;
pub use message::SnapshotDescriptor;
pub use message::SnapshotId;
pub use message::SnapshotReply;
pub use message::TimeoutNow;
pub use message::VoteReply;
pub use message::VoteRequest;
