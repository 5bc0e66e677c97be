//! Contract with the local consensus engine's inbound surface.

use alder_raft_types::AppendEntriesReply;
use alder_raft_types::AppendEntriesRequest;
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

use crate::error::EngineError;

/// Inbound message handlers exposed by the consensus engine.
///
/// The transport forwards each received message to the matching handler
/// with the verified origin id. One-way handlers must not block: the
/// engine enqueues the message and applies it on its own schedule. The
/// two request/response handlers are awaited, and their result travels
/// back to whatever delivered the message.
///
/// The handler is injected into the transport at construction, so a
/// message can never arrive before a dispatch target exists.
#[async_trait]
pub trait RaftEngineHandler: Send + Sync {
    /// A leader asks us to append entries.
    fn append_entries(&self, from: ServerId, request: AppendEntriesRequest);

    /// A follower reports its verdict on our replication request.
    fn append_entries_reply(&self, from: ServerId, reply: AppendEntriesReply);

    /// A candidate asks for our vote.
    fn request_vote(&self, from: ServerId, request: VoteRequest);

    /// A voter reports its verdict on our vote request.
    fn request_vote_reply(&self, from: ServerId, reply: VoteReply);

    /// The current leader asks us to start an election immediately.
    fn timeout_now(&self, from: ServerId, request: TimeoutNow);

    /// The leader probes whether it still holds a quorum.
    fn read_quorum(&self, from: ServerId, request: ReadQuorum);

    /// A follower acknowledges our read-quorum probe.
    fn read_quorum_reply(&self, from: ServerId, reply: ReadQuorumReply);

    /// A peer asks us, as the leader, to execute a read barrier.
    async fn execute_read_barrier(&self, from: ServerId) -> Result<ReadBarrierReply, EngineError>;

    /// A leader offers us a snapshot to install.
    async fn apply_snapshot(
        &self,
        from: ServerId,
        snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, EngineError>;
}
