use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::{Base, DBColumnFamily, MemEngine, StorageError, WriteEntry};

impl MemEngine {
    pub fn new() -> Result<MemEngine, StorageError> {
        let db = HashMap::new();
        Ok(MemEngine {
            _db: Mutex::new(db),
        })
    }

    /// len returns the number of keys stored in a column family.
    pub fn len(&self, cf: DBColumnFamily) -> usize {
        let name: &'static str = cf.into();
        let cfs = self._db.lock();
        cfs.get(&name).map(|bt| bt.len()).unwrap_or(0)
    }
}

impl Base for MemEngine {
    fn set(&self, cf: DBColumnFamily, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut cfs = self._db.lock();
        let bt = cfs.entry(cf.into()).or_insert_with(BTreeMap::new);
        bt.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, cf: DBColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let name: &'static str = cf.into();
        let cfs = self._db.lock();
        let bt = match cfs.get(&name) {
            Some(bt) => bt,
            None => return Ok(None),
        };
        Ok(bt.get(key).cloned())
    }

    /// write_batch holds the lock for the whole batch, so that readers never see half of it.
    fn write_batch(&self, entrys: &[WriteEntry]) -> Result<(), StorageError> {
        let mut cfs = self._db.lock();
        for en in entrys {
            match en {
                WriteEntry::Set(cf, k, v) => {
                    let bt = cfs.entry((*cf).into()).or_insert_with(BTreeMap::new);
                    bt.insert(k.clone(), v.clone());
                }
            }
        }

        Ok(())
    }
}
