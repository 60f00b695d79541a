use std::collections::BTreeMap;
use std::mem;

use prost::Message;

use shardctrler::key2shard;
use shardctrler::Config;
use shardctrler::ConfigNum;
use shardctrler::Gid;
use shardctrler::ShardId;
use shardctrler::N_SHARDS;

use crate::codec::GroupSnapshot;
use crate::Op;
use crate::OpReply;
use crate::Shard;
use crate::ShardData;
use crate::ShardStatus;
use crate::ShardTransfer;
use crate::StorageError;

/// GroupState is the replicated state of one replica group.
///
/// It is changed only by applying committed log entries, one at a time and in log order, so
/// every replica of a group that applied the same entries holds an identical GroupState.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupState {
    pub gid: Gid,

    /// index of the last log entry applied.
    pub applied_index: u64,

    pub config: Config,
    pub prev_config: Config,

    /// One slot per shard, indexed by shard id.
    pub shards: Vec<Shard>,

    /// Shards handed off to another group and not yet confirmed pulled.
    /// Keyed by (config that moved the shard away, shard).
    pub outbox: BTreeMap<(ConfigNum, ShardId), ShardData>,

    /// Shards installed here whose previous owner still keeps a copy.
    /// Keyed by (config that moved the shard here, shard), valued by the previous owner.
    pub gc_pending: BTreeMap<(ConfigNum, ShardId), Gid>,

    /// Shards assigned to no group, with the last group that owned one and the config that
    /// took it away. That group keeps the data in its outbox until a later owner pulls it.
    pub orphans: BTreeMap<ShardId, (Gid, ConfigNum)>,
}

impl GroupState {
    /// new creates the state of a group at config 0: it owns nothing.
    pub fn new(gid: Gid) -> GroupState {
        GroupState {
            gid,
            applied_index: 0,
            config: Config::initial(),
            prev_config: Config::initial(),
            shards: vec![Shard::default(); N_SHARDS],
            outbox: BTreeMap::new(),
            gc_pending: BTreeMap::new(),
            orphans: BTreeMap::new(),
        }
    }

    pub fn status(&self, shard: ShardId) -> ShardStatus {
        self.shards
            .get(shard)
            .map(|s| s.status)
            .unwrap_or(ShardStatus::NotOwned)
    }

    /// serves returns true if the shard of `key` is owned and can be read or written.
    pub fn serves(&self, key: &str) -> bool {
        self.status(key2shard(key)) == ShardStatus::Owned
    }

    /// pulling lists shards still waiting for their data, with the group to pull from and the
    /// config that moved the shard away from that group.
    pub fn pulling(&self) -> Vec<(ShardId, Gid, ConfigNum)> {
        self.shards
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s.status {
                ShardStatus::Pulling { from, num } => Some((i, from, num)),
                _ => None,
            })
            .collect()
    }

    /// settled returns true if every shard assigned by the current config is served.
    pub fn settled(&self) -> bool {
        self.pulling().is_empty()
    }

    pub fn owned(&self) -> Vec<ShardId> {
        (0..N_SHARDS)
            .filter(|s| self.status(*s) == ShardStatus::Owned)
            .collect()
    }

    /// execute applies a client operation to the shard of its key.
    ///
    /// A duplicate is answered from the dedup entries of the shard. A new op on a shard not
    /// owned here is rejected and recorded nowhere: the dedup entries live with the shard data,
    /// and a slot that is not `Owned` holds none.
    pub fn execute(&mut self, op: &Op) -> Result<OpReply, StorageError> {
        let shard = key2shard(&op.key);
        let slot = &mut self.shards[shard];

        if let Some(reply) = slot.data.dedup.lookup(op.client_id, op.seq) {
            return Ok(reply.clone());
        }

        if slot.status != ShardStatus::Owned {
            return Err(StorageError::NotOwned(shard));
        }

        Ok(slot.data.execute(op))
    }

    /// apply_config moves to the next config.
    ///
    /// A shard that arrives here becomes `Pulling` from its previous owner. A shard that comes
    /// back from no owner is pulled from the last group that owned it, or is `Owned` and empty
    /// if no group ever owned it. A shard that leaves is frozen into the outbox.
    pub fn apply_config(&mut self, next: &Config) -> Result<(), StorageError> {
        if next.num != self.config.num + 1 {
            return Err(StorageError::ConfigOutOfOrder(self.config.num, next.num));
        }

        if !self.settled() {
            return Err(StorageError::MigrationUnsettled(self.config.num));
        }

        for shard in 0..N_SHARDS {
            let old = self.config.owner(shard);
            let new = next.owner(shard);

            if old == new {
                continue;
            }

            // (last owner, config that moved the shard away from it)
            let source = if old != 0 {
                Some((old, next.num))
            } else {
                self.orphans.remove(&shard)
            };

            if new == 0 {
                if let Some(src) = source {
                    self.orphans.insert(shard, src);
                }
            }

            if new == self.gid {
                let slot = &mut self.shards[shard];
                match source {
                    Some((from, num)) if from == self.gid => {
                        slot.data = self.outbox.remove(&(num, shard)).unwrap_or_default();
                        slot.status = ShardStatus::Owned;
                    }
                    Some((from, num)) => {
                        slot.data = ShardData::default();
                        slot.status = ShardStatus::Pulling { from, num };
                    }
                    None => {
                        slot.data = ShardData::default();
                        slot.status = ShardStatus::Owned;
                    }
                }
            } else if old == self.gid {
                let slot = &mut self.shards[shard];
                let data = mem::take(&mut slot.data);
                slot.status = ShardStatus::NotOwned;
                self.outbox.insert((next.num, shard), data);
            }
        }

        self.prev_config = mem::replace(&mut self.config, next.clone());
        Ok(())
    }

    /// export returns the data of `shard` handed off by config `num`.
    pub fn export(&self, shard: ShardId, num: ConfigNum) -> Result<ShardTransfer, StorageError> {
        if num > self.config.num {
            return Err(StorageError::NotReady(self.config.num, num));
        }

        let data = self
            .outbox
            .get(&(num, shard))
            .ok_or(StorageError::NotOwner(shard, num))?;

        Ok(ShardTransfer {
            shard,
            config_num: num,
            data: data.clone(),
        })
    }

    /// install makes a pulled shard servable.
    /// Only the transfer of a shard being pulled, handed off by the config it is pulled for, is
    /// accepted.
    pub fn install(&mut self, t: ShardTransfer) -> Result<(), StorageError> {
        let (from, num) = match self.shards.get(t.shard).map(|s| s.status) {
            Some(ShardStatus::Pulling { from, num }) if num == t.config_num => (from, num),
            _ => return Err(StorageError::StaleTransfer(t.shard, t.config_num)),
        };

        t.validate(t.shard, num)?;

        let mut data = ShardData::default();
        data.kv = t.data.kv;
        data.dedup.merge(t.data.dedup);

        let slot = &mut self.shards[t.shard];
        slot.data = data;
        slot.status = ShardStatus::Owned;
        self.gc_pending.insert((num, t.shard), from);

        Ok(())
    }

    /// gc drops the copy of a shard handed off by config `num`. It returns false if there is
    /// nothing to drop.
    pub fn gc(&mut self, shard: ShardId, num: ConfigNum) -> bool {
        self.outbox.remove(&(num, shard)).is_some()
    }

    /// gc_ack records that the previous owner of a shard installed by config `num` dropped its
    /// copy.
    pub fn gc_ack(&mut self, shard: ShardId, num: ConfigNum) -> bool {
        self.gc_pending.remove(&(num, shard)).is_some()
    }

    pub fn encode_snapshot(&self) -> Result<Vec<u8>, StorageError> {
        let pb = GroupSnapshot::from_state(self);
        let mut byts = Vec::with_capacity(pb.encoded_len());
        pb.encode(&mut byts)?;
        Ok(byts)
    }

    pub fn decode_snapshot(byts: &[u8]) -> Result<GroupState, StorageError> {
        let pb = GroupSnapshot::decode(byts)?;
        pb.into_state()
    }
}
