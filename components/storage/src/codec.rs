//! Wire and snapshot representation of the group state.
//!
//! Maps are encoded as repeated pairs in key order so that equal states encode to equal bytes.

use std::collections::BTreeMap;

use prost::Message;

use shardctrler::Config;
use shardctrler::N_SHARDS;

use crate::DedupEntry;
use crate::DedupTable;
use crate::GroupState;
use crate::OpReply;
use crate::Shard;
use crate::ShardData;
use crate::ShardStatus;
use crate::ShardTransfer;
use crate::StorageError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ReplyCode {
    Ok = 0,
    Value = 1,
    NoKey = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum StatusCode {
    NotOwned = 0,
    Pulling = 1,
    Owned = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct KvPair {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DedupRecord {
    #[prost(int64, tag = "1")]
    pub client_id: i64,
    #[prost(uint64, tag = "2")]
    pub seq: u64,
    #[prost(enumeration = "ReplyCode", tag = "3")]
    pub code: i32,
    #[prost(string, tag = "4")]
    pub value: String,
}

/// ShardPb is a shard slot in a snapshot, an outbox entry, or a transfer on the wire.
#[derive(Clone, PartialEq, Message)]
pub struct ShardPb {
    #[prost(uint64, tag = "1")]
    pub shard: u64,
    #[prost(uint64, tag = "2")]
    pub config_num: u64,
    #[prost(enumeration = "StatusCode", tag = "3")]
    pub status: i32,
    #[prost(uint64, tag = "4")]
    pub from: u64,
    #[prost(message, repeated, tag = "5")]
    pub kvs: Vec<KvPair>,
    #[prost(message, repeated, tag = "6")]
    pub dedup: Vec<DedupRecord>,
    /// config that moved a pulled shard away from `from`.
    #[prost(uint64, tag = "7")]
    pub pull_num: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GcPendingPb {
    #[prost(uint64, tag = "1")]
    pub config_num: u64,
    #[prost(uint64, tag = "2")]
    pub shard: u64,
    #[prost(uint64, tag = "3")]
    pub from: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct OrphanPb {
    #[prost(uint64, tag = "1")]
    pub shard: u64,
    #[prost(uint64, tag = "2")]
    pub from: u64,
    #[prost(uint64, tag = "3")]
    pub config_num: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GroupSnapshot {
    #[prost(uint64, tag = "1")]
    pub gid: u64,
    #[prost(uint64, tag = "2")]
    pub applied_index: u64,
    #[prost(message, optional, tag = "3")]
    pub config: Option<Config>,
    #[prost(message, optional, tag = "4")]
    pub prev_config: Option<Config>,
    #[prost(message, repeated, tag = "5")]
    pub shards: Vec<ShardPb>,
    #[prost(message, repeated, tag = "6")]
    pub outbox: Vec<ShardPb>,
    #[prost(message, repeated, tag = "7")]
    pub gc_pending: Vec<GcPendingPb>,
    #[prost(message, repeated, tag = "8")]
    pub orphans: Vec<OrphanPb>,
}

fn dedup_to_pb(t: &DedupTable) -> Vec<DedupRecord> {
    t.iter()
        .map(|(client, e)| {
            let (code, value) = match &e.reply {
                OpReply::Ok => (ReplyCode::Ok, String::new()),
                OpReply::Value(v) => (ReplyCode::Value, v.clone()),
                OpReply::NoKey => (ReplyCode::NoKey, String::new()),
            };
            DedupRecord {
                client_id: *client,
                seq: e.seq,
                code: code as i32,
                value,
            }
        })
        .collect()
}

fn dedup_from_pb(recs: Vec<DedupRecord>) -> Result<DedupTable, StorageError> {
    let mut entries = Vec::with_capacity(recs.len());
    for r in recs.into_iter() {
        let reply = match ReplyCode::from_i32(r.code) {
            Some(ReplyCode::Ok) => OpReply::Ok,
            Some(ReplyCode::Value) => OpReply::Value(r.value),
            Some(ReplyCode::NoKey) => OpReply::NoKey,
            None => {
                return Err(StorageError::ProstError(format!(
                    "unknown reply code: {}",
                    r.code
                )))
            }
        };
        entries.push((r.client_id, DedupEntry { seq: r.seq, reply }));
    }
    Ok(entries.into_iter().collect())
}

impl ShardPb {
    fn from_data(shard: usize, config_num: u64, status: ShardStatus, d: &ShardData) -> ShardPb {
        let (status, from, pull_num) = match status {
            ShardStatus::NotOwned => (StatusCode::NotOwned, 0, 0),
            ShardStatus::Pulling { from, num } => (StatusCode::Pulling, from, num),
            ShardStatus::Owned => (StatusCode::Owned, 0, 0),
        };

        ShardPb {
            shard: shard as u64,
            config_num,
            status: status as i32,
            from,
            kvs: d
                .kv
                .iter()
                .map(|(k, v)| KvPair {
                    key: k.clone(),
                    value: v.clone(),
                })
                .collect(),
            dedup: dedup_to_pb(&d.dedup),
            pull_num,
        }
    }

    pub fn from_transfer(t: &ShardTransfer) -> ShardPb {
        ShardPb::from_data(t.shard, t.config_num, ShardStatus::NotOwned, &t.data)
    }

    pub fn into_transfer(self) -> Result<ShardTransfer, StorageError> {
        let shard = self.shard as usize;
        let config_num = self.config_num;
        let (_, data) = self.into_parts()?;
        Ok(ShardTransfer {
            shard,
            config_num,
            data,
        })
    }

    fn into_parts(self) -> Result<(ShardStatus, ShardData), StorageError> {
        let status = match StatusCode::from_i32(self.status) {
            Some(StatusCode::NotOwned) => ShardStatus::NotOwned,
            Some(StatusCode::Pulling) => ShardStatus::Pulling {
                from: self.from,
                num: self.pull_num,
            },
            Some(StatusCode::Owned) => ShardStatus::Owned,
            None => {
                return Err(StorageError::ProstError(format!(
                    "unknown shard status: {}",
                    self.status
                )))
            }
        };

        let kv: BTreeMap<String, String> =
            self.kvs.into_iter().map(|p| (p.key, p.value)).collect();
        let dedup = dedup_from_pb(self.dedup)?;

        Ok((status, ShardData { kv, dedup }))
    }
}

impl GroupSnapshot {
    pub fn from_state(st: &GroupState) -> GroupSnapshot {
        GroupSnapshot {
            gid: st.gid,
            applied_index: st.applied_index,
            config: Some(st.config.clone()),
            prev_config: Some(st.prev_config.clone()),
            shards: st
                .shards
                .iter()
                .enumerate()
                .map(|(i, s)| ShardPb::from_data(i, st.config.num, s.status, &s.data))
                .collect(),
            outbox: st
                .outbox
                .iter()
                .map(|((num, shard), d)| ShardPb::from_data(*shard, *num, ShardStatus::NotOwned, d))
                .collect(),
            gc_pending: st
                .gc_pending
                .iter()
                .map(|((num, shard), from)| GcPendingPb {
                    config_num: *num,
                    shard: *shard as u64,
                    from: *from,
                })
                .collect(),
            orphans: st
                .orphans
                .iter()
                .map(|(shard, (from, num))| OrphanPb {
                    shard: *shard as u64,
                    from: *from,
                    config_num: *num,
                })
                .collect(),
        }
    }

    pub fn into_state(self) -> Result<GroupState, StorageError> {
        let mut st = GroupState::new(self.gid);
        st.applied_index = self.applied_index;
        st.config = self.config.unwrap_or_else(Config::initial);
        st.prev_config = self.prev_config.unwrap_or_else(Config::initial);

        for pb in self.shards.into_iter() {
            let i = pb.shard as usize;
            if i >= N_SHARDS {
                return Err(StorageError::ProstError(format!("no such shard: {}", i)));
            }
            let (status, data) = pb.into_parts()?;
            st.shards[i] = Shard { status, data };
        }

        for pb in self.outbox.into_iter() {
            let key = (pb.config_num, pb.shard as usize);
            let (_, data) = pb.into_parts()?;
            st.outbox.insert(key, data);
        }

        for g in self.gc_pending.into_iter() {
            st.gc_pending.insert((g.config_num, g.shard as usize), g.from);
        }

        for o in self.orphans.into_iter() {
            st.orphans.insert(o.shard as usize, (o.from, o.config_num));
        }

        Ok(st)
    }
}
