//! Fixed timing constants for the Raft transport.
//!
//! These mirror the consensus engine's own clock: the engine advances on
//! a logical ticker and expresses its election timeout in ticks, so the
//! transport derives its wall-clock deadlines from the same two numbers.

use std::time::Duration;

/// Wall-clock granularity of the consensus engine's logical ticker.
pub const RAFT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Election timeout expressed in ticks of [`RAFT_TICK_INTERVAL`].
pub const ELECTION_TIMEOUT_TICKS: u32 = 10;
