mod waiters;
pub use waiters::*;

mod replica;
pub use replica::*;

mod dispatcher;
mod exec;
