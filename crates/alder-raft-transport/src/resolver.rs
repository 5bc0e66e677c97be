//! Peer-address resolution facade.
//!
//! The cluster keeps one registry of `ServerId` to network address
//! mappings. Entries differ in how they were learned: addresses supplied
//! through explicit administration must survive until explicitly
//! removed, while addresses picked up from a received message's origin
//! metadata may be evicted under the registry's own expiry policy. The
//! facade here is the only place that decides which flag an insertion
//! carries.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use alder_raft_types::ServerId;
use alder_raft_types::ServerInfo;
use snafu::OptionExt;
use snafu::ResultExt;

use crate::error::MalformedServerInfoSnafu;
use crate::error::TransportError;
use crate::error::UnknownServerSnafu;

/// External peer-address registry contract.
///
/// Storage and eviction are the registry's own business; the transport
/// relies only on lookup, insert-or-replace and idempotent removal.
/// Entries inserted with `expirable: true` may be evicted under the
/// registry's expiry policy; entries inserted with `expirable: false`
/// stay until removed.
pub trait AddressRegistry: Send + Sync {
    /// Current address for `id`, if one is known.
    fn lookup(&self, id: ServerId) -> Option<SocketAddr>;

    /// Insert or replace the mapping for `id`. Last write wins.
    fn insert(&self, id: ServerId, addr: SocketAddr, expirable: bool);

    /// Remove any mapping for `id`, however it was installed. Removing
    /// an unknown id is a no-op.
    fn remove(&self, id: ServerId);
}

/// Thin facade the transport uses to talk to the registry.
#[derive(Clone)]
pub struct AddressResolver {
    registry: Arc<dyn AddressRegistry>,
}

impl AddressResolver {
    /// Wrap a registry.
    pub fn new(registry: Arc<dyn AddressRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve a peer id for sending.
    pub fn resolve(&self, id: ServerId) -> Result<SocketAddr, TransportError> {
        self.registry.lookup(id).context(UnknownServerSnafu { id })
    }

    /// Record an administratively supplied address. Never expires.
    pub fn set_administered(&self, id: ServerId, addr: SocketAddr) {
        self.registry.insert(id, addr, false);
    }

    /// Record an address learned from a received message's origin
    /// metadata. The registry may expire it.
    pub fn learn(&self, id: ServerId, addr: SocketAddr) {
        self.registry.insert(id, addr, true);
    }

    /// Drop any mapping for `id`, administered or learned.
    pub fn forget(&self, id: ServerId) {
        self.registry.remove(id);
    }
}

/// Encode a network address into the JSON payload format
/// [`decode_server_info`] understands.
pub fn encode_server_info(addr: SocketAddr) -> Result<ServerInfo, serde_json::Error> {
    Ok(ServerInfo::from_bytes(serde_json::to_vec(&addr)?))
}

/// Decode an administrative payload into a network address.
///
/// Fails without side effects on a payload that is not a JSON-encoded
/// socket address.
pub fn decode_server_info(id: ServerId, info: &ServerInfo) -> Result<SocketAddr, TransportError> {
    serde_json::from_slice(info.as_bytes()).context(MalformedServerInfoSnafu { id })
}

// ============================================================================
// InMemoryAddressRegistry
// ============================================================================

/// A registry entry together with its expiry eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressEntry {
    /// The mapped network address.
    pub addr: SocketAddr,
    /// Whether the registry may evict this entry on its own.
    pub expirable: bool,
}

/// Deterministic in-memory registry.
///
/// Retains each entry's expirable flag but never evicts on its own,
/// which makes it suitable for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryAddressRegistry {
    entries: RwLock<HashMap<ServerId, AddressEntry>>,
}

impl InMemoryAddressRegistry {
    /// Create an empty registry behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Full entry for `id`, including the expiry flag.
    pub fn entry(&self, id: ServerId) -> Option<AddressEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    /// Number of mappings currently held.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no mappings are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AddressRegistry for InMemoryAddressRegistry {
    fn lookup(&self, id: ServerId) -> Option<SocketAddr> {
        self.entry(id).map(|entry| entry.addr)
    }

    fn insert(&self, id: ServerId, addr: SocketAddr, expirable: bool) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, AddressEntry { addr, expirable });
    }

    fn remove(&self, id: ServerId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> SocketAddr {
        text.parse().unwrap()
    }

    // =========================================================================
    // ServerInfo codec
    // =========================================================================

    #[test]
    fn server_info_round_trips_an_address() {
        let original = addr("10.0.0.7:7000");
        let info = encode_server_info(original).unwrap();
        let decoded = decode_server_info(ServerId::new(7), &info).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_rejects_payloads_that_are_not_json() {
        let info = ServerInfo::from_bytes(vec![0xff, 0xfe, 0xfd]);
        let err = decode_server_info(ServerId::new(1), &info).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MalformedServerInfo { id, .. } if id == ServerId::new(1)
        ));
    }

    #[test]
    fn decode_rejects_json_that_is_not_an_address() {
        let info = ServerInfo::from_bytes(br#""not-an-address""#.to_vec());
        let err = decode_server_info(ServerId::new(2), &info).unwrap_err();
        assert!(matches!(err, TransportError::MalformedServerInfo { .. }));
    }

    // =========================================================================
    // Resolver facade
    // =========================================================================

    #[test]
    fn administered_entries_are_not_expirable() {
        let registry = InMemoryAddressRegistry::new();
        let resolver = AddressResolver::new(registry.clone());

        resolver.set_administered(ServerId::new(1), addr("10.0.0.1:7000"));

        let entry = registry.entry(ServerId::new(1)).unwrap();
        assert!(!entry.expirable);
        assert_eq!(entry.addr, addr("10.0.0.1:7000"));
    }

    #[test]
    fn learned_entries_are_expirable() {
        let registry = InMemoryAddressRegistry::new();
        let resolver = AddressResolver::new(registry.clone());

        resolver.learn(ServerId::new(2), addr("10.0.0.2:7000"));

        assert!(registry.entry(ServerId::new(2)).unwrap().expirable);
    }

    #[test]
    fn resolve_fails_for_unknown_ids() {
        let resolver = AddressResolver::new(InMemoryAddressRegistry::new());
        let err = resolver.resolve(ServerId::new(9)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnknownServer { id } if id == ServerId::new(9)
        ));
    }

    #[test]
    fn last_write_wins_across_entry_kinds() {
        let registry = InMemoryAddressRegistry::new();
        let resolver = AddressResolver::new(registry.clone());
        let id = ServerId::new(3);

        resolver.learn(id, addr("10.0.0.3:7000"));
        resolver.set_administered(id, addr("10.0.0.3:8000"));

        let entry = registry.entry(id).unwrap();
        assert_eq!(entry.addr, addr("10.0.0.3:8000"));
        assert!(!entry.expirable);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn forget_removes_any_entry_and_is_idempotent() {
        let registry = InMemoryAddressRegistry::new();
        let resolver = AddressResolver::new(registry.clone());
        let id = ServerId::new(4);

        resolver.set_administered(id, addr("10.0.0.4:7000"));
        resolver.forget(id);
        assert!(registry.is_empty());

        // Unknown id: still a no-op.
        resolver.forget(id);
        assert!(registry.is_empty());
    }
}
