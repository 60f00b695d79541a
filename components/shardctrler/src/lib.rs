#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate slog_global;

mod errors;
pub use errors::*;

mod config;
pub use config::*;

mod ctrler;
pub use ctrler::*;


#[cfg(test)]
mod test_ctrler;
