//! Contract with the cluster messaging substrate.

use std::net::SocketAddr;
use std::time::Duration;

use alder_raft_types::AppendEntriesReply;
use alder_raft_types::AppendEntriesRequest;
use alder_raft_types::GroupId;
use alder_raft_types::InstallSnapshot;
use alder_raft_types::ReadBarrierReply;
use alder_raft_types::ReadQuorum;
use alder_raft_types::ReadQuorumReply;
use alder_raft_types::ServerId;
use alder_raft_types::SnapshotReply;
use alder_raft_types::TimeoutNow;
use alder_raft_types::VoteReply;
use alder_raft_types::VoteRequest;
use async_trait::async_trait;

use crate::error::MessagingError;

/// Outbound operations provided by the cluster messaging layer.
///
/// The substrate owns connections, serialization and the wire format;
/// the transport only picks the destination address, the deadline and
/// the payload. Every operation carries the sending group and server so
/// the receiving node can route the message to the right consensus
/// group.
///
/// `deadline` bounds how long the substrate may spend on the send;
/// `None` leaves the call bounded only by the caller's own cancellation.
/// A send that outlives its deadline must fail with
/// [`MessagingError::Timeout`], never with another variant.
#[async_trait]
pub trait ClusterMessaging: Send + Sync {
    /// Replicate log entries on a follower and wait for its verdict.
    async fn send_append_entries(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesReply, MessagingError>;

    /// Deliver a replication verdict back to the leader.
    async fn send_append_entries_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        reply: AppendEntriesReply,
    ) -> Result<(), MessagingError>;

    /// Deliver a vote request to a voter.
    async fn send_vote_request(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        request: VoteRequest,
    ) -> Result<(), MessagingError>;

    /// Deliver a vote verdict back to a candidate.
    async fn send_vote_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        reply: VoteReply,
    ) -> Result<(), MessagingError>;

    /// Deliver a leadership-transfer nudge.
    async fn send_timeout_now(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        request: TimeoutNow,
    ) -> Result<(), MessagingError>;

    /// Deliver a read-quorum probe to a follower.
    async fn send_read_quorum(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        request: ReadQuorum,
    ) -> Result<(), MessagingError>;

    /// Deliver a read-quorum acknowledgement back to the leader.
    async fn send_read_quorum_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        reply: ReadQuorumReply,
    ) -> Result<(), MessagingError>;

    /// Offer a snapshot to a lagging follower and wait for its verdict.
    async fn send_snapshot(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, MessagingError>;

    /// Ask the leader to execute a read barrier and wait for its answer.
    async fn execute_read_barrier_on_leader(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
    ) -> Result<ReadBarrierReply, MessagingError>;
}
