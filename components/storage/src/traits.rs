use std::sync::Arc;

use crate::StorageError;

/// DBColumnFamily defines several `table`:
/// Snapshot stores the latest serialized group state of a replica.
/// Status stores small bookkeeping values, such as the log index a snapshot reflects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DBColumnFamily {
    Snapshot,
    Status,
}

impl From<&DBColumnFamily> for &str {
    fn from(cf: &DBColumnFamily) -> Self {
        match cf {
            DBColumnFamily::Snapshot => "snapshot",
            DBColumnFamily::Status => "status",
        }
    }
}

impl From<DBColumnFamily> for &str {
    fn from(cf: DBColumnFamily) -> Self {
        (&cf).into()
    }
}

pub enum WriteEntry {
    Set(DBColumnFamily, Vec<u8>, Vec<u8>),
}

/// NameSpace wraps a key into another key with namespace.
/// E.g.: key: "abc" -> key with namespace "my_namespace/abc";
///
/// It must guarantee that different namespace never generate identical output.
pub trait NameSpace {
    fn wrap_ns(&self, key: &[u8]) -> Vec<u8>;
}

/// impl NameSpace for types with ToString:
/// E.g. for ns = "100-1", it wraps key "foo" to "100-1/foo"
impl<T: ToString> NameSpace for T {
    fn wrap_ns(&self, key: &[u8]) -> Vec<u8> {
        let mut pref = self.to_string().into_bytes();
        let mut k: Vec<u8> = Vec::with_capacity(pref.len() + 1 + key.len());
        k.append(&mut pref);
        k.push(b'/');
        k.extend_from_slice(key);
        k
    }
}

/// Base offer basic key-value access
pub trait Base: Send + Sync {
    /// set a new key-value
    fn set(&self, cf: DBColumnFamily, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// get an existing value with key
    fn get(&self, cf: DBColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// write_batch applies all entries atomically.
    fn write_batch(&self, entrys: &[WriteEntry]) -> Result<(), StorageError>;
}

/// WithNs is a namespace storage based on a shared storage `Base`.
/// Write and read operations are wrapped with a namespace.
///
/// Replicas living in one process share one engine, each with its own namespace.
pub struct WithNs<B, NS>
where
    NS: NameSpace,
    B: Base + ?Sized,
{
    namespace: NS,
    shared_sto: Arc<B>,
}

impl<B, NS> WithNs<B, NS>
where
    NS: NameSpace,
    B: Base + ?Sized,
{
    /// new creates a Storage WithNs with `namespace` and a shared underlying storage `shared_sto`.
    pub fn new(namespace: NS, shared_sto: Arc<B>) -> Self {
        Self {
            namespace,
            shared_sto,
        }
    }
}

impl<B, NS> Base for WithNs<B, NS>
where
    B: Base + ?Sized,
    NS: NameSpace + Send + Sync,
{
    fn set(&self, cf: DBColumnFamily, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.shared_sto.set(cf, &self.namespace.wrap_ns(key), value)
    }

    fn get(&self, cf: DBColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.shared_sto.get(cf, &self.namespace.wrap_ns(key))
    }

    fn write_batch(&self, entrys: &[WriteEntry]) -> Result<(), StorageError> {
        let mut es = Vec::with_capacity(entrys.len());

        for en in entrys {
            let e = match en {
                WriteEntry::Set(cf, k, v) => {
                    WriteEntry::Set(*cf, self.namespace.wrap_ns(k), v.to_vec())
                }
            };
            es.push(e);
        }

        self.shared_sto.write_batch(&es)
    }
}

const SNAPSHOT_KEY: &[u8] = b"group_state";
const SNAPSHOT_INDEX_KEY: &[u8] = b"snapshot_index";

/// SnapshotEngine persists the latest snapshot of a replica together with the log index it
/// reflects.
pub trait SnapshotEngine: Base {
    fn save_snapshot(&self, index: u64, data: &[u8]) -> Result<(), StorageError> {
        self.write_batch(&[
            WriteEntry::Set(DBColumnFamily::Snapshot, SNAPSHOT_KEY.to_vec(), data.to_vec()),
            WriteEntry::Set(
                DBColumnFamily::Status,
                SNAPSHOT_INDEX_KEY.to_vec(),
                index.to_be_bytes().to_vec(),
            ),
        ])
    }

    fn load_snapshot(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(DBColumnFamily::Snapshot, SNAPSHOT_KEY)
    }

    /// snapshot_index returns the log index of the saved snapshot, 0 if there is none.
    fn snapshot_index(&self) -> Result<u64, StorageError> {
        let v = self.get(DBColumnFamily::Status, SNAPSHOT_INDEX_KEY)?;
        let v = match v {
            Some(v) => v,
            None => return Ok(0),
        };

        if v.len() != 8 {
            return Err(StorageError::DBError(format!(
                "bad snapshot index length: {}",
                v.len()
            )));
        }
        let mut b = [0u8; 8];
        b.copy_from_slice(&v);
        Ok(u64::from_be_bytes(b))
    }
}

impl<T> SnapshotEngine for T where T: Base + ?Sized {}

/// Storage is the engine handle a replica owns.
pub type Storage = Arc<dyn Base>;
