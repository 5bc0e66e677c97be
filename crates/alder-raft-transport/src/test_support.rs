//! Deterministic test doubles for the transport's collaborators.
//!
//! Minimal implementations of [`ClusterMessaging`], [`RaftEngineHandler`]
//! and a log-capturing `tracing` subscriber, used by this crate's own
//! tests. Nothing here touches the network or the clock.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use alder_raft_types::AppendEntriesReply;
use alder_raft_types::AppendEntriesRequest;
use alder_raft_types::AppendOutcome;
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
use tokio::sync::watch;

use crate::error::EngineError;
use crate::error::MessagingError;
use crate::handler::RaftEngineHandler;
use crate::messaging::ClusterMessaging;

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// RecordingMessaging
// ============================================================================

/// Which messaging operation a recorded send went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    AppendEntries,
    AppendEntriesReply,
    VoteRequest,
    VoteReply,
    TimeoutNow,
    ReadQuorum,
    ReadQuorumReply,
    Snapshot,
    ReadBarrier,
}

/// One send observed by [`RecordingMessaging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub kind: MessageKind,
    pub addr: SocketAddr,
    pub deadline: Option<Duration>,
    pub group: GroupId,
    pub from: ServerId,
    pub dest: ServerId,
}

/// Messaging double that records every send and returns scripted
/// outcomes.
///
/// Sends are recorded before the optional hold point, so a test can
/// observe that a send has started, keep it in flight across a shutdown,
/// and then release it.
pub struct RecordingMessaging {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<MessagingError>>,
    append_replies: Mutex<VecDeque<AppendEntriesReply>>,
    snapshot_replies: Mutex<VecDeque<SnapshotReply>>,
    read_barrier_replies: Mutex<VecDeque<ReadBarrierReply>>,
    hold: watch::Sender<bool>,
}

impl Default for RecordingMessaging {
    fn default() -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            append_replies: Mutex::new(VecDeque::new()),
            snapshot_replies: Mutex::new(VecDeque::new()),
            read_barrier_replies: Mutex::new(VecDeque::new()),
            hold,
        }
    }
}

impl RecordingMessaging {
    /// Create a recording double behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Park every send at its hold point until released.
    pub fn hold_sends(&self) {
        let _ = self.hold.send(true);
    }

    /// Release all held sends.
    pub fn release_sends(&self) {
        let _ = self.hold.send(false);
    }

    /// Script the next send to fail with `error`.
    pub fn fail_next(&self, error: MessagingError) {
        locked(&self.failures).push_back(error);
    }

    /// Script the reply for the next `send_append_entries`.
    pub fn script_append_reply(&self, reply: AppendEntriesReply) {
        locked(&self.append_replies).push_back(reply);
    }

    /// Script the reply for the next `send_snapshot`.
    pub fn script_snapshot_reply(&self, reply: SnapshotReply) {
        locked(&self.snapshot_replies).push_back(reply);
    }

    /// Script the reply for the next `execute_read_barrier_on_leader`.
    pub fn script_read_barrier_reply(&self, reply: ReadBarrierReply) {
        locked(&self.read_barrier_replies).push_back(reply);
    }

    /// All sends observed so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        locked(&self.sent).clone()
    }

    /// Number of sends observed so far.
    pub fn sent_count(&self) -> usize {
        locked(&self.sent).len()
    }

    /// Wait until at least `n` sends have been observed.
    ///
    /// Panics after five seconds; a test that waits longer has lost the
    /// send it expected.
    pub async fn wait_for_sends(&self, n: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.sent_count() < n {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(waited.is_ok(), "expected {n} sends, saw {}", self.sent_count());
    }

    fn record(
        &self,
        kind: MessageKind,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
    ) {
        locked(&self.sent).push(SentMessage {
            kind,
            addr,
            deadline,
            group,
            from,
            dest,
        });
    }

    async fn hold_point(&self) {
        let mut rx = self.hold.subscribe();
        let _ = rx.wait_for(|held| !held).await;
    }

    fn take_failure(&self) -> Option<MessagingError> {
        locked(&self.failures).pop_front()
    }

    fn unit_outcome(&self) -> Result<(), MessagingError> {
        match self.take_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterMessaging for RecordingMessaging {
    async fn send_append_entries(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _request: AppendEntriesRequest,
    ) -> Result<AppendEntriesReply, MessagingError> {
        self.record(MessageKind::AppendEntries, addr, deadline, group, from, dest);
        self.hold_point().await;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(locked(&self.append_replies).pop_front().unwrap_or(
            AppendEntriesReply {
                term: 0,
                commit_index: 0,
                outcome: AppendOutcome::Accepted { last_new_index: 0 },
            },
        ))
    }

    async fn send_append_entries_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _reply: AppendEntriesReply,
    ) -> Result<(), MessagingError> {
        self.record(
            MessageKind::AppendEntriesReply,
            addr,
            deadline,
            group,
            from,
            dest,
        );
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_vote_request(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _request: VoteRequest,
    ) -> Result<(), MessagingError> {
        self.record(MessageKind::VoteRequest, addr, deadline, group, from, dest);
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_vote_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _reply: VoteReply,
    ) -> Result<(), MessagingError> {
        self.record(MessageKind::VoteReply, addr, deadline, group, from, dest);
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_timeout_now(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _request: TimeoutNow,
    ) -> Result<(), MessagingError> {
        self.record(MessageKind::TimeoutNow, addr, deadline, group, from, dest);
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_read_quorum(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _request: ReadQuorum,
    ) -> Result<(), MessagingError> {
        self.record(MessageKind::ReadQuorum, addr, deadline, group, from, dest);
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_read_quorum_reply(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _reply: ReadQuorumReply,
    ) -> Result<(), MessagingError> {
        self.record(
            MessageKind::ReadQuorumReply,
            addr,
            deadline,
            group,
            from,
            dest,
        );
        self.hold_point().await;
        self.unit_outcome()
    }

    async fn send_snapshot(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
        _snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, MessagingError> {
        self.record(MessageKind::Snapshot, addr, deadline, group, from, dest);
        self.hold_point().await;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(locked(&self.snapshot_replies)
            .pop_front()
            .unwrap_or(SnapshotReply {
                term: 0,
                success: true,
            }))
    }

    async fn execute_read_barrier_on_leader(
        &self,
        addr: SocketAddr,
        deadline: Option<Duration>,
        group: GroupId,
        from: ServerId,
        dest: ServerId,
    ) -> Result<ReadBarrierReply, MessagingError> {
        self.record(MessageKind::ReadBarrier, addr, deadline, group, from, dest);
        self.hold_point().await;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(locked(&self.read_barrier_replies)
            .pop_front()
            .unwrap_or(ReadBarrierReply::Acknowledged { index: 0 }))
    }
}

// ============================================================================
// FailingMessaging
// ============================================================================

/// Messaging double that fails every operation with a fixed error.
pub struct FailingMessaging {
    error: MessagingError,
}

impl FailingMessaging {
    /// Create a double failing every send with `error`.
    pub fn new(error: MessagingError) -> Arc<Self> {
        Arc::new(Self { error })
    }

    fn fail<T>(&self) -> Result<T, MessagingError> {
        Err(self.error.clone())
    }
}

#[async_trait]
impl ClusterMessaging for FailingMessaging {
    async fn send_append_entries(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _request: AppendEntriesRequest,
    ) -> Result<AppendEntriesReply, MessagingError> {
        self.fail()
    }

    async fn send_append_entries_reply(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _reply: AppendEntriesReply,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_vote_request(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _request: VoteRequest,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_vote_reply(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _reply: VoteReply,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_timeout_now(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _request: TimeoutNow,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_read_quorum(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _request: ReadQuorum,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_read_quorum_reply(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _reply: ReadQuorumReply,
    ) -> Result<(), MessagingError> {
        self.fail()
    }

    async fn send_snapshot(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
        _snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, MessagingError> {
        self.fail()
    }

    async fn execute_read_barrier_on_leader(
        &self,
        _addr: SocketAddr,
        _deadline: Option<Duration>,
        _group: GroupId,
        _from: ServerId,
        _dest: ServerId,
    ) -> Result<ReadBarrierReply, MessagingError> {
        self.fail()
    }
}

// ============================================================================
// RecordingEngine
// ============================================================================

/// One inbound dispatch observed by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    AppendEntries(ServerId, AppendEntriesRequest),
    AppendEntriesReply(ServerId, AppendEntriesReply),
    RequestVote(ServerId, VoteRequest),
    RequestVoteReply(ServerId, VoteReply),
    TimeoutNow(ServerId, TimeoutNow),
    ReadQuorum(ServerId, ReadQuorum),
    ReadQuorumReply(ServerId, ReadQuorumReply),
    ExecuteReadBarrier(ServerId),
    ApplySnapshot(ServerId, InstallSnapshot),
}

/// Engine double that records every inbound dispatch and answers the
/// request/response ones from scripts.
#[derive(Default)]
pub struct RecordingEngine {
    events: Mutex<Vec<EngineEvent>>,
    read_barrier_results: Mutex<VecDeque<Result<ReadBarrierReply, EngineError>>>,
    snapshot_results: Mutex<VecDeque<Result<SnapshotReply, EngineError>>>,
}

impl RecordingEngine {
    /// Create a recording double behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the next `execute_read_barrier` result.
    pub fn script_read_barrier(&self, result: Result<ReadBarrierReply, EngineError>) {
        locked(&self.read_barrier_results).push_back(result);
    }

    /// Script the next `apply_snapshot` result.
    pub fn script_snapshot(&self, result: Result<SnapshotReply, EngineError>) {
        locked(&self.snapshot_results).push_back(result);
    }

    /// All dispatches observed so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        locked(&self.events).clone()
    }

    fn record(&self, event: EngineEvent) {
        locked(&self.events).push(event);
    }
}

#[async_trait]
impl RaftEngineHandler for RecordingEngine {
    fn append_entries(&self, from: ServerId, request: AppendEntriesRequest) {
        self.record(EngineEvent::AppendEntries(from, request));
    }

    fn append_entries_reply(&self, from: ServerId, reply: AppendEntriesReply) {
        self.record(EngineEvent::AppendEntriesReply(from, reply));
    }

    fn request_vote(&self, from: ServerId, request: VoteRequest) {
        self.record(EngineEvent::RequestVote(from, request));
    }

    fn request_vote_reply(&self, from: ServerId, reply: VoteReply) {
        self.record(EngineEvent::RequestVoteReply(from, reply));
    }

    fn timeout_now(&self, from: ServerId, request: TimeoutNow) {
        self.record(EngineEvent::TimeoutNow(from, request));
    }

    fn read_quorum(&self, from: ServerId, request: ReadQuorum) {
        self.record(EngineEvent::ReadQuorum(from, request));
    }

    fn read_quorum_reply(&self, from: ServerId, reply: ReadQuorumReply) {
        self.record(EngineEvent::ReadQuorumReply(from, reply));
    }

    async fn execute_read_barrier(&self, from: ServerId) -> Result<ReadBarrierReply, EngineError> {
        self.record(EngineEvent::ExecuteReadBarrier(from));
        locked(&self.read_barrier_results)
            .pop_front()
            .unwrap_or(Ok(ReadBarrierReply::Acknowledged { index: 0 }))
    }

    async fn apply_snapshot(
        &self,
        from: ServerId,
        snapshot: InstallSnapshot,
    ) -> Result<SnapshotReply, EngineError> {
        self.record(EngineEvent::ApplySnapshot(from, snapshot));
        locked(&self.snapshot_results)
            .pop_front()
            .unwrap_or(Ok(SnapshotReply {
                term: 0,
                success: true,
            }))
    }
}

// ============================================================================
// CapturedLogs
// ============================================================================

/// One event captured by [`CapturedLogs`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub message: String,
    pub fields: String,
}

impl CapturedEvent {
    /// True when either the message or a field value mentions `text`.
    pub fn mentions(&self, text: &str) -> bool {
        self.message.contains(text) || self.fields.contains(text)
    }
}

/// A `tracing` subscriber that stores every event it sees.
///
/// Install with `tracing::subscriber::set_default` inside a
/// single-threaded test so detached sends log through it.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    next_span: Arc<AtomicU64>,
}

impl CapturedLogs {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        locked(&self.events).clone()
    }

    /// Captured events at ERROR level.
    pub fn errors(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == tracing::Level::ERROR)
            .collect()
    }
}

#[derive(Default)]
struct RenderVisitor {
    message: String,
    fields: String,
}

impl tracing::field::Visit for RenderVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, "{}={:?} ", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, "{}={} ", field.name(), value);
        }
    }
}

impl tracing::Subscriber for CapturedLogs {
    fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
        true
    }

    fn new_span(&self, _attrs: &tracing::span::Attributes<'_>) -> tracing::span::Id {
        let id = self.next_span.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::span::Id::from_u64(id)
    }

    fn record(&self, _id: &tracing::span::Id, _record: &tracing::span::Record<'_>) {}

    fn record_follows_from(&self, _id: &tracing::span::Id, _follows: &tracing::span::Id) {}

    fn event(&self, event: &tracing::Event<'_>) {
        let mut visitor = RenderVisitor::default();
        event.record(&mut visitor);
        locked(&self.events).push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields.trim_end().to_string(),
        });
    }

    fn enter(&self, _id: &tracing::span::Id) {}

    fn exit(&self, _id: &tracing::span::Id) {}
}
