//! Moving a group from one config to the next: the poller proposes the next config, the
//! migrator pulls the shards it brings and confirms hand-offs so the old owners can drop
//! their copies.

mod backoff;
pub use backoff::*;

mod migrator;
mod poller;
