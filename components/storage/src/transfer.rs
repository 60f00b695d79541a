use prost::Message;

use shardctrler::key2shard;
use shardctrler::ConfigNum;
use shardctrler::ShardId;
use shardctrler::N_SHARDS;

use crate::codec::ShardPb;
use crate::ShardData;
use crate::StorageError;

/// ShardTransfer is a shard handed from its owner in config `config_num - 1` to its owner in
/// config `config_num`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTransfer {
    pub shard: ShardId,
    pub config_num: ConfigNum,
    pub data: ShardData,
}

impl ShardTransfer {
    /// validate checks a received transfer is the one asked for: the expected shard, the
    /// expected config, and only keys that belong to that shard.
    pub fn validate(&self, shard: ShardId, config_num: ConfigNum) -> Result<(), StorageError> {
        if self.shard >= N_SHARDS {
            return Err(StorageError::InvalidTransfer(format!(
                "no such shard: {}",
                self.shard
            )));
        }

        if self.shard != shard || self.config_num != config_num {
            return Err(StorageError::InvalidTransfer(format!(
                "want shard {} of config {}, got shard {} of config {}",
                shard, config_num, self.shard, self.config_num
            )));
        }

        for k in self.data.kv.keys() {
            if key2shard(k) != shard {
                return Err(StorageError::InvalidTransfer(format!(
                    "key {:?} does not belong to shard {}",
                    k, shard
                )));
            }
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        let pb = ShardPb::from_transfer(self);
        let mut byts = Vec::with_capacity(pb.encoded_len());
        pb.encode(&mut byts)?;
        Ok(byts)
    }

    pub fn from_bytes(byts: &[u8]) -> Result<ShardTransfer, StorageError> {
        let pb = ShardPb::decode(byts)?;
        pb.into_transfer()
    }
}
