//! Raft message value types carried by the RPC transport.
//!
//! Every type here is an immutable value produced by the consensus engine
//! (outbound) or by the messaging layer's deserializer (inbound). The
//! transport routes them between the two without reading or mutating
//! their contents, so these definitions are shared by both sides of the
//! wire without pulling in either implementation.

use serde::Deserialize;
use serde::Serialize;

use crate::id::ServerId;

/// Position of an entry in the replicated log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogId {
    /// Term in which the entry was created.
    pub term: u64,
    /// Index of the entry in the log.
    pub index: u64,
}

/// Payload of a single replicated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPayload {
    /// No-op entry a new leader appends to commit entries from earlier
    /// terms.
    Blank,
    /// Opaque state-machine command.
    Command(Vec<u8>),
    /// Cluster membership change.
    Membership(Vec<ServerId>),
}

/// A single replicated log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Where the entry sits in the log.
    pub log_id: LogId,
    /// What the entry carries.
    pub payload: EntryPayload,
}

/// Leader-to-follower log replication request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    /// The leader's current term.
    pub term: u64,
    /// Log position immediately preceding `entries`.
    pub prev_log_id: LogId,
    /// The leader's commit index.
    pub leader_commit: u64,
    /// Entries to replicate; empty for a heartbeat.
    pub entries: Vec<LogEntry>,
}

/// Follower verdict on a replication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppendOutcome {
    /// Entries were appended.
    Accepted {
        /// Index of the last entry the follower now holds.
        last_new_index: u64,
    },
    /// The follower's log does not match at `prev_log_id`.
    Rejected {
        /// First index at which the logs diverge.
        non_matching_index: u64,
        /// Index of the follower's last entry.
        last_index: u64,
    },
}

/// Follower reply to [`AppendEntriesRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesReply {
    /// The follower's current term.
    pub term: u64,
    /// The follower's commit index.
    pub commit_index: u64,
    /// Whether the entries were accepted.
    pub outcome: AppendOutcome,
}

/// Candidate request for a vote in an election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    /// The candidate's current term.
    pub term: u64,
    /// Position of the candidate's last log entry.
    pub last_log_id: LogId,
    /// True for the non-disruptive pre-vote round.
    pub prevote: bool,
    /// True when the election was started by a leadership transfer and
    /// voters should ignore leader stickiness.
    pub force: bool,
}

/// Voter reply to [`VoteRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReply {
    /// The voter's current term.
    pub term: u64,
    /// Whether the vote was granted.
    pub granted: bool,
    /// Echoes the request's pre-vote flag.
    pub prevote: bool,
}

/// Leadership-transfer nudge: the recipient should start an election
/// immediately instead of waiting out its election timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutNow {
    /// The sender's current term.
    pub term: u64,
}

/// Identifier of one linearizable read round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadId(pub u64);

impl std::fmt::Display for ReadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Leader probe confirming it still holds a quorum for a read round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadQuorum {
    /// The leader's current term.
    pub term: u64,
    /// The leader's commit index.
    pub leader_commit: u64,
    /// The read round being confirmed.
    pub read_id: ReadId,
}

/// Follower acknowledgement of a [`ReadQuorum`] probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadQuorumReply {
    /// The follower's current term.
    pub term: u64,
    /// The follower's commit index.
    pub commit_index: u64,
    /// Echoes the probed read round.
    pub read_id: ReadId,
}

/// Identifier of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata describing a snapshot offered to a lagging follower.
///
/// The snapshot content itself travels out of band; only the descriptor
/// crosses this transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    /// Identifier used to fetch the content.
    pub id: SnapshotId,
    /// Last log position the snapshot covers.
    pub last_included: LogId,
}

/// Leader offer to install a snapshot on a follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSnapshot {
    /// The leader's current term.
    pub term: u64,
    /// The snapshot being offered.
    pub snapshot: SnapshotDescriptor,
}

/// Follower verdict on an [`InstallSnapshot`] offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReply {
    /// The follower's current term.
    pub term: u64,
    /// Whether the snapshot was installed.
    pub success: bool,
}

/// Leader answer to a read-barrier request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadBarrierReply {
    /// The barrier is satisfied once the caller observes `index` applied.
    Acknowledged {
        /// Commit index the caller must wait for.
        index: u64,
    },
    /// The addressee is not the leader; retry against `leader_hint` if
    /// known.
    NotALeader {
        /// Current leader, when the addressee knows one.
        leader_hint: Option<ServerId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_outcome_distinguishes_accept_and_reject() {
        let accepted = AppendOutcome::Accepted { last_new_index: 9 };
        let rejected = AppendOutcome::Rejected {
            non_matching_index: 4,
            last_index: 6,
        };
        assert_ne!(accepted, rejected);
    }

    #[test]
    fn heartbeat_request_carries_no_entries() {
        let heartbeat = AppendEntriesRequest {
            term: 3,
            prev_log_id: LogId { term: 3, index: 12 },
            leader_commit: 12,
            entries: Vec::new(),
        };
        assert!(heartbeat.entries.is_empty());
    }

    #[test]
    fn read_barrier_reply_not_a_leader_may_omit_hint() {
        let reply = ReadBarrierReply::NotALeader { leader_hint: None };
        assert_eq!(reply, ReadBarrierReply::NotALeader { leader_hint: None });
    }
}
