//! shardkv is a sharded key-value store.
//!
//! Keys are split into `N_SHARDS` shards. Each shard is served by one replica group; a group
//! keeps its replicas consistent through a replicated log of `Command`s. The shard controller
//! decides which group serves which shard and changes it over time; groups then hand shards to
//! each other without losing data or executing a client request twice.

#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate slog_global;

mod errors;
pub use errors::*;

mod command;
pub use command::*;

mod rpc;
pub use rpc::*;

pub mod clerk;
pub mod conf;
pub mod migration;
pub mod network;
pub mod replica;
pub mod setup;

mod server;
pub use server::*;

pub use shardctrler::key2shard;
pub use shardctrler::N_SHARDS;

#[cfg(test)]
mod testutil;
