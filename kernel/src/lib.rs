// OpenQ Kernel
//
// In-memory message repository: append-only, per-table message logs with
// optimistic concurrency on writes and type-filtered, paginated reads.

pub mod config;
pub mod inbox;
pub mod invariants;
pub mod log;
pub mod registry;
pub mod replay;
pub mod state;
