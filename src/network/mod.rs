mod errors;
pub use errors::*;

mod network;
pub use self::network::*;

mod local;
pub use local::*;
