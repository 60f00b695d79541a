use std::collections::BTreeMap;

use shardctrler::ConfigNum;
use shardctrler::Gid;

use crate::ClientId;
use crate::DedupTable;
use crate::OpReply;
use crate::SeqNum;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Get,
    Put,
    Append,
}

/// Op is a client operation. `value` is empty for Get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub kind: OpKind,
    pub key: String,
    pub value: String,
    pub client_id: ClientId,
    pub seq: SeqNum,
}

impl Op {
    pub fn get(key: &str, client_id: ClientId, seq: SeqNum) -> Op {
        Op {
            kind: OpKind::Get,
            key: key.to_string(),
            value: String::new(),
            client_id,
            seq,
        }
    }

    pub fn put(key: &str, value: &str, client_id: ClientId, seq: SeqNum) -> Op {
        Op {
            kind: OpKind::Put,
            key: key.to_string(),
            value: value.to_string(),
            client_id,
            seq,
        }
    }

    pub fn append(key: &str, value: &str, client_id: ClientId, seq: SeqNum) -> Op {
        Op {
            kind: OpKind::Append,
            key: key.to_string(),
            value: value.to_string(),
            client_id,
            seq,
        }
    }
}

/// ShardStatus is the state of one shard in one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    NotOwned,

    /// Assigned here by the current config, data still to be pulled from group `from`, which
    /// keeps it in its outbox under config `num`.
    Pulling { from: Gid, num: ConfigNum },

    Owned,
}

/// ShardData is everything that moves with a shard: its records and the dedup entries of
/// clients that touched it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardData {
    pub kv: BTreeMap<String, String>,
    pub dedup: DedupTable,
}

impl ShardData {
    /// execute runs `op` unless it is a retry, in which case the cached reply is returned and
    /// nothing changes.
    pub fn execute(&mut self, op: &Op) -> OpReply {
        if let Some(reply) = self.dedup.lookup(op.client_id, op.seq) {
            return reply.clone();
        }

        let reply = match op.kind {
            OpKind::Get => match self.kv.get(&op.key) {
                Some(v) => OpReply::Value(v.clone()),
                None => OpReply::NoKey,
            },
            OpKind::Put => {
                self.kv.insert(op.key.clone(), op.value.clone());
                OpReply::Ok
            }
            OpKind::Append => {
                self.kv
                    .entry(op.key.clone())
                    .or_insert_with(String::new)
                    .push_str(&op.value);
                OpReply::Ok
            }
        };

        self.dedup.record(op.client_id, op.seq, reply.clone());
        reply
    }
}

/// Shard is the slot of one shard in the group state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub status: ShardStatus,
    pub data: ShardData,
}

impl Default for Shard {
    fn default() -> Self {
        Shard {
            status: ShardStatus::NotOwned,
            data: ShardData::default(),
        }
    }
}
