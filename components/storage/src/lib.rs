#[macro_use]
extern crate quick_error;

mod errors;
pub use errors::*;

mod traits;
pub use traits::*;

mod mem_engine;
pub use mem_engine::*;

mod dedup;
pub use dedup::*;

mod shard;
pub use shard::*;

mod transfer;
pub use transfer::*;

mod group_state;
pub use group_state::*;

pub mod codec;



#[cfg(test)]
mod test_group_state;
