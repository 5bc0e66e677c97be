//! RPC transport binding Alder's Raft consensus engine to the cluster
//! messaging layer.
//!
//! The consensus engine decides *what* to send; the messaging layer
//! knows *how* to move bytes between nodes. This crate is the seam
//! between them:
//!
//! - outbound, it resolves opaque server ids to network addresses and
//!   issues sends with the right waiting discipline — request/response
//!   calls the engine awaits, and bounded fire-and-forget sends the
//!   engine never looks back at;
//! - inbound, it is the dispatch surface the messaging layer invokes for
//!   each received message, forwarding to the engine handler bound at
//!   construction;
//! - at shutdown, [`RaftRpc::abort`] guarantees that no detached send
//!   outlives the transport.
//!
//! # Module Organization
//!
//! - [`rpc`]: the [`RaftRpc`] contract and its production implementation
//! - [`gate`]: tracked detached sends and the shutdown drain
//! - [`resolver`]: peer-address resolution and the expirable/administered
//!   distinction
//! - [`messaging`]: contract with the messaging substrate
//! - [`handler`]: contract with the consensus engine's inbound surface
//! - [`timeout`]: deadline policy for best-effort sends
//! - [`error`]: the transport error taxonomy
//! - [`test_support`]: deterministic doubles for tests

pub mod constants;
pub mod error;
pub mod gate;
pub mod handler;
pub mod messaging;
pub mod resolver;
pub mod rpc;
pub mod test_support;
pub mod timeout;

// ============================================================================
// Re-exports: Transport
// ============================================================================
pub use rpc::RaftRpc;
pub use rpc::RaftRpcService;
// ============================================================================
// Re-exports: Collaborator contracts
// ============================================================================
pub use handler::RaftEngineHandler;
pub use messaging::ClusterMessaging;
// ============================================================================
// Re-exports: Address resolution
// ============================================================================
pub use resolver::AddressRegistry;
pub use resolver::AddressResolver;
pub use resolver::InMemoryAddressRegistry;
// ============================================================================
// Re-exports: Errors
// ============================================================================
pub use error::EngineError;
pub use error::MessagingError;
pub use error::TransportError;
