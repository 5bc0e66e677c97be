//! RPC transport binding the consensus engine to the messaging layer.
//!
//! Outbound, the transport turns the engine's intents into network sends:
//! request/response calls suspend the caller until the substrate answers,
//! while fire-and-forget calls return immediately and run detached under
//! the [`DispatchGate`]. Inbound, it is the dispatch surface the
//! messaging layer invokes with each received message, forwarding to the
//! engine handler bound at construction.
//!
//! A transport instance belongs to exactly one consensus group and one
//! local server id, both fixed at construction. Apart from the gate's
//! phase it holds no mutable state.

use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use alder_raft_types::AppendEntriesReply;
use alder_raft_types::AppendEntriesRequest;
use alder_raft_types::GroupId;
use alder_raft_types::InstallSnapshot;
use alder_raft_types::ReadBarrierReply;
use alder_raft_types::ReadQuorum;
use alder_raft_types::ReadQuorumReply;
use alder_raft_types::ServerId;
use alder_raft_types::ServerInfo;
use alder_raft_types::SnapshotReply;
use alder_raft_types::TimeoutNow;
use alder_raft_types::VoteReply;
use alder_raft_types::VoteRequest;
use async_trait::async_trait;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use crate::error::EngineSnafu;
use crate::error::MessagingSnafu;
use crate::error::SnapshotAbortedSnafu;
use crate::error::TransportError;
use crate::gate::DispatchGate;
use crate::handler::RaftEngineHandler;
use crate::messaging::ClusterMessaging;
use crate::resolver::decode_server_info;
use crate::resolver::AddressResolver;
use crate::timeout::one_way_rpc_timeout;

/// Outbound operations the consensus engine requires from its transport.
///
/// This is a pluggable contract: the engine is written against this
/// trait, [`RaftRpcService`] is the production implementation, and test
/// doubles substitute behind the same signatures.
///
/// The fire-and-forget operations return before any network work starts
/// and never report an outcome; the engine's own timers recover from
/// lost messages. They must be called from within a Tokio runtime.
#[async_trait]
pub trait RaftRpc: Send + Sync {
    /// Offer a snapshot to `dest` and wait for its verdict.
    ///
    /// No deadline is enforced here; `cancel` is the caller's handle for
    /// giving up on the transfer.
    async fn send_snapshot(
        &self,
        dest: ServerId,
        snapshot: InstallSnapshot,
        cancel: CancellationToken,
    ) -> Result<SnapshotReply, TransportError>;

    /// Replicate log entries on `dest` and wait for its reply.
    ///
    /// No additional deadline is layered here; the substrate's own
    /// timeout, if any, applies.
    async fn send_append_entries(
        &self,
        dest: ServerId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesReply, TransportError>;

    /// Ask the leader `dest` to execute a read barrier and wait for its
    /// answer.
    async fn execute_read_barrier_on_leader(
        &self,
        dest: ServerId,
    ) -> Result<ReadBarrierReply, TransportError>;

    /// Send a replication verdict to the leader `dest`. Fire-and-forget.
    fn send_append_entries_reply(&self, dest: ServerId, reply: AppendEntriesReply);

    /// Send a vote request to the voter `dest`. Fire-and-forget.
    fn send_vote_request(&self, dest: ServerId, request: VoteRequest);

    /// Send a vote verdict to the candidate `dest`. Fire-and-forget.
    fn send_vote_reply(&self, dest: ServerId, reply: VoteReply);

    /// Tell `dest` to start an election immediately. Fire-and-forget.
    fn send_timeout_now(&self, dest: ServerId, request: TimeoutNow);

    /// Probe `dest` for read-quorum confirmation. Fire-and-forget.
    fn send_read_quorum(&self, dest: ServerId, request: ReadQuorum);

    /// Acknowledge a read-quorum probe from `dest`. Fire-and-forget.
    fn send_read_quorum_reply(&self, dest: ServerId, reply: ReadQuorumReply);

    /// Install a non-expirable address mapping for `id` from an
    /// administrative payload. Replaces any previous mapping for `id`.
    ///
    /// Fails without installing anything when the payload does not
    /// decode to a network address.
    fn add_server(&self, id: ServerId, info: ServerInfo) -> Result<(), TransportError>;

    /// Drop any address mapping for `id`. Unknown ids are a no-op.
    fn remove_server(&self, id: ServerId);

    /// Stop accepting new fire-and-forget sends and wait for the ones
    /// already in flight.
    ///
    /// After this returns, every further fire-and-forget call is a
    /// no-op. Calling `abort` again is safe and completes immediately.
    async fn abort(&self);
}

/// Everything a detached send needs once it leaves the caller's stack.
struct OutboundLink<M> {
    messaging: Arc<M>,
    resolver: AddressResolver,
    group: GroupId,
    local: ServerId,
}

// Manual Clone: M itself is behind an Arc and need not be Clone.
impl<M> Clone for OutboundLink<M> {
    fn clone(&self) -> Self {
        Self {
            messaging: Arc::clone(&self.messaging),
            resolver: self.resolver.clone(),
            group: self.group,
            local: self.local,
        }
    }
}

/// Production transport: resolves peers through the address registry and
/// sends through the cluster messaging layer.
pub struct RaftRpcService<M, H> {
    link: OutboundLink<M>,
    handler: Arc<H>,
    gate: DispatchGate,
    one_way_failures: Arc<AtomicU64>,
}

impl<M, H> RaftRpcService<M, H>
where
    M: ClusterMessaging + 'static,
    H: RaftEngineHandler,
{
    /// Bind a transport to one consensus group and local server id.
    ///
    /// The handler is the consensus engine's inbound surface; injecting
    /// it here means the transport is fully wired before the messaging
    /// layer can deliver the first message to it.
    pub fn new(
        group: GroupId,
        local: ServerId,
        messaging: Arc<M>,
        handler: Arc<H>,
        resolver: AddressResolver,
    ) -> Self {
        Self {
            link: OutboundLink {
                messaging,
                resolver,
                group,
                local,
            },
            handler,
            gate: DispatchGate::new(),
            one_way_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The consensus group this transport serves.
    pub fn group(&self) -> GroupId {
        self.link.group
    }

    /// The local server this transport sends on behalf of.
    pub fn local_server(&self) -> ServerId {
        self.link.local
    }

    /// The address-resolution facade, shared with the message-receipt
    /// glue so it can record learned origin addresses.
    pub fn resolver(&self) -> &AddressResolver {
        &self.link.resolver
    }

    /// Fire-and-forget sends still in flight.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Fire-and-forget sends that failed for a reason other than a
    /// timeout since construction.
    pub fn one_way_failures(&self) -> u64 {
        self.one_way_failures.load(Ordering::Relaxed)
    }

    /// Launch a best-effort send through the dispatch gate.
    ///
    /// The send is registered before any network work starts and
    /// deregisters when it finishes, whatever the path. A timeout
    /// outcome completes silently; any other failure is logged exactly
    /// once with the destination id, then dropped.
    fn spawn_one_way<F>(&self, dest: ServerId, what: &'static str, send: F)
    where
        F: Future<Output = Result<(), TransportError>> + Send + 'static,
    {
        let failures = Arc::clone(&self.one_way_failures);
        let spawned = self.gate.try_spawn(async move {
            match send.await {
                Ok(()) => {}
                Err(err) if err.is_timeout() => {}
                Err(err) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    error!(peer = %dest, error = %err, "failed to send {}", what);
                }
            }
        });
        if !spawned {
            debug!(peer = %dest, "transport closing, dropped outbound {}", what);
        }
    }
}

#[async_trait]
impl<M, H> RaftRpc for RaftRpcService<M, H>
where
    M: ClusterMessaging + 'static,
    H: RaftEngineHandler,
{
    async fn send_snapshot(
        &self,
        dest: ServerId,
        snapshot: InstallSnapshot,
        cancel: CancellationToken,
    ) -> Result<SnapshotReply, TransportError> {
        let link = &self.link;
        let addr = link.resolver.resolve(dest)?;
        tokio::select! {
            _ = cancel.cancelled() => SnapshotAbortedSnafu { id: dest }.fail(),
            reply = link.messaging.send_snapshot(addr, None, link.group, link.local, dest, snapshot) => {
                reply.context(MessagingSnafu)
            }
        }
    }

    async fn send_append_entries(
        &self,
        dest: ServerId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesReply, TransportError> {
        let link = &self.link;
        let addr = link.resolver.resolve(dest)?;
        link.messaging
            .send_append_entries(addr, None, link.group, link.local, dest, request)
            .await
            .context(MessagingSnafu)
    }

    async fn execute_read_barrier_on_leader(
        &self,
        dest: ServerId,
    ) -> Result<ReadBarrierReply, TransportError> {
        let link = &self.link;
        let addr = link.resolver.resolve(dest)?;
        link.messaging
            .execute_read_barrier_on_leader(addr, None, link.group, link.local, dest)
            .await
            .context(MessagingSnafu)
    }

    fn send_append_entries_reply(&self, dest: ServerId, reply: AppendEntriesReply) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "append entries reply", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_append_entries_reply(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    reply,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn send_vote_request(&self, dest: ServerId, request: VoteRequest) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "vote request", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_vote_request(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    request,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn send_vote_reply(&self, dest: ServerId, reply: VoteReply) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "vote reply", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_vote_reply(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    reply,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn send_timeout_now(&self, dest: ServerId, request: TimeoutNow) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "timeout now", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_timeout_now(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    request,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn send_read_quorum(&self, dest: ServerId, request: ReadQuorum) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "read quorum", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_read_quorum(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    request,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn send_read_quorum_reply(&self, dest: ServerId, reply: ReadQuorumReply) {
        let link = self.link.clone();
        self.spawn_one_way(dest, "read quorum reply", async move {
            let addr = link.resolver.resolve(dest)?;
            link.messaging
                .send_read_quorum_reply(
                    addr,
                    Some(one_way_rpc_timeout()),
                    link.group,
                    link.local,
                    dest,
                    reply,
                )
                .await
                .context(MessagingSnafu)
        });
    }

    fn add_server(&self, id: ServerId, info: ServerInfo) -> Result<(), TransportError> {
        let addr = decode_server_info(id, &info)?;
        // Administered entries never expire; only entries learned from
        // message origin metadata do.
        self.link.resolver.set_administered(id, addr);
        Ok(())
    }

    fn remove_server(&self, id: ServerId) {
        self.link.resolver.forget(id);
    }

    async fn abort(&self) {
        self.gate.close().await;
    }
}

// ============================================================================
// Inbound dispatch
// ============================================================================

/// Dispatchers invoked by the messaging layer when a peer message for
/// this group arrives, carrying the verified origin id and the
/// deserialized message.
///
/// One-way dispatchers forward to the engine and return immediately; the
/// engine's own queuing applies backpressure. The two request/response
/// dispatchers await the engine and hand its answer back to the caller,
/// which owns sending the reply over the wire.
impl<M, H> RaftRpcService<M, H>
where
    M: ClusterMessaging + 'static,
    H: RaftEngineHandler,
{
    /// A leader sent us entries to append.
    pub fn append_entries(&self, from: ServerId, request: AppendEntriesRequest) {
        self.handler.append_entries(from, request);
    }

    /// A follower answered our replication request.
    pub fn append_entries_reply(&self, from: ServerId, reply: AppendEntriesReply) {
        self.handler.append_entries_reply(from, reply);
    }

    /// A candidate asked for our vote.
    pub fn request_vote(&self, from: ServerId, request: VoteRequest) {
        self.handler.request_vote(from, request);
    }

    /// A voter answered our vote request.
    pub fn request_vote_reply(&self, from: ServerId, reply: VoteReply) {
        self.handler.request_vote_reply(from, reply);
    }

    /// The leader told us to start an election immediately.
    pub fn timeout_now_request(&self, from: ServerId, request: TimeoutNow) {
        self.handler.timeout_now(from, request);
    }

    /// The leader probed us for read-quorum confirmation.
    pub fn read_quorum_request(&self, from: ServerId, request: ReadQuorum) {
        self.handler.read_quorum(from, request);
    }

    /// A follower acknowledged our read-quorum probe.
    pub fn read_quorum_reply(&self, from: ServerId, reply: ReadQuorumReply) {
        self.handler.read_quorum_reply(from, reply);
    }

    /// A peer asked us to execute a read barrier; returns the engine's
    /// answer unmodified.
    pub async fn execute_read_barrier(
        &self,
        from: ServerId,
    ) -> Result<ReadBarrierReply, TransportError> {
        self.handler
            .execute_read_barrier(from)
            .await
            .context(EngineSnafu)
    }

    /// A leader offered us a snapshot; returns the engine's verdict
    /// unmodified.
    pub async fn apply_snapshot(
        &self,
        from: ServerId,
        snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, TransportError> {
        self.handler
            .apply_snapshot(from, snapshot)
            .await
            .context(EngineSnafu)
    }
}

#[cfg(test)]
mod tests {
    use alder_raft_types::LogId;

    use super::*;
    use crate::resolver::encode_server_info;
    use crate::resolver::InMemoryAddressRegistry;
    use crate::test_support::RecordingEngine;
    use crate::test_support::RecordingMessaging;

    fn service() -> (
        Arc<RecordingMessaging>,
        RaftRpcService<RecordingMessaging, RecordingEngine>,
    ) {
        let messaging = RecordingMessaging::new();
        let registry = InMemoryAddressRegistry::new();
        let rpc = RaftRpcService::new(
            GroupId::new(1),
            ServerId::new(100),
            Arc::clone(&messaging),
            RecordingEngine::new(),
            AddressResolver::new(registry),
        );
        (messaging, rpc)
    }

    #[test]
    fn construction_fixes_group_and_local_ids() {
        let (_, rpc) = service();
        assert_eq!(rpc.group(), GroupId::new(1));
        assert_eq!(rpc.local_server(), ServerId::new(100));
    }

    #[tokio::test]
    async fn fire_and_forget_returns_without_waiting_for_the_send() {
        let (messaging, rpc) = service();
        let peer = ServerId::new(7);
        rpc.add_server(peer, encode_server_info("10.0.0.7:7000".parse().unwrap()).unwrap())
            .unwrap();
        messaging.hold_sends();

        // Returns while the send is still parked inside the substrate.
        rpc.send_vote_request(
            peer,
            VoteRequest {
                term: 1,
                last_log_id: LogId { term: 0, index: 0 },
                prevote: true,
                force: false,
            },
        );
        messaging.wait_for_sends(1).await;
        assert_eq!(rpc.in_flight(), 1);

        messaging.release_sends();
        rpc.abort().await;
        assert_eq!(rpc.in_flight(), 0);
    }
}
