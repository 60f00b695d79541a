//! replog is the consensus log a replica group is built on.
//!
//! A group only needs three things from it: propose an entry, read committed entries in
//! order, and know whether the local replica is the leader. `ConsensusLog` is that seam;
//! `MemLog` is an in-process implementation with knobs to change leaders, crash replicas
//! and hold back commits.

#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate slog_global;

mod errors;
pub use errors::*;

mod log;
pub use log::*;

mod memlog;
pub use memlog::*;
