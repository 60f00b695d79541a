use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

mod memdb;
pub use memdb::*;

/// MemEngine is an in-memory `Base`. It keeps one ordered map per column family.
pub struct MemEngine {
    _db: Mutex<HashMap<&'static str, BTreeMap<Vec<u8>, Vec<u8>>>>,
}
