//! Deadline policy for best-effort sends.

use std::time::Duration;

use crate::constants::ELECTION_TIMEOUT_TICKS;
use crate::constants::RAFT_TICK_INTERVAL;

/// Deadline applied to every fire-and-forget send: half the election
/// timeout, scaled by the tick interval.
pub fn one_way_rpc_timeout() -> Duration {
    RAFT_TICK_INTERVAL * (ELECTION_TIMEOUT_TICKS / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_way_timeout_is_half_the_election_timeout() {
        let election_timeout = RAFT_TICK_INTERVAL * ELECTION_TIMEOUT_TICKS;
        assert_eq!(one_way_rpc_timeout() * 2, election_timeout);
    }

    #[test]
    fn one_way_timeout_is_nonzero() {
        assert!(one_way_rpc_timeout() > Duration::ZERO);
    }
}
