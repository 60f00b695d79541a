use std::fmt;

use shardctrler::Config;
use shardctrler::ConfigNum;
use shardctrler::ShardId;
use storage::ClientId;
use storage::Op;
use storage::SeqNum;
use storage::ShardTransfer;

/// Command is an entry of the replicated log of a group.
///
/// Every change to the group state is a committed Command, so replicas that apply the same
/// commands end up in the same state.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A client Get, Put or Append.
    Op(Op),

    /// Move to the next config.
    Config(Config),

    /// Install a shard pulled from its previous owner.
    Install(ShardTransfer),

    /// Drop the copy of a shard handed off by `config_num`; the new owner has it.
    Gc { shard: ShardId, config_num: ConfigNum },

    /// The previous owner of a shard dropped its copy.
    GcAck { shard: ShardId, config_num: ConfigNum },
}

/// EntryId tells whether the entry committed at an index is the one that was proposed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryId {
    Op { client_id: ClientId, seq: SeqNum },
    Config(ConfigNum),
    Install { shard: ShardId, config_num: ConfigNum },
    Gc { shard: ShardId, config_num: ConfigNum },
    GcAck { shard: ShardId, config_num: ConfigNum },
}

impl Command {
    pub fn id(&self) -> EntryId {
        match self {
            Command::Op(op) => EntryId::Op {
                client_id: op.client_id,
                seq: op.seq,
            },
            Command::Config(c) => EntryId::Config(c.num),
            Command::Install(t) => EntryId::Install {
                shard: t.shard,
                config_num: t.config_num,
            },
            Command::Gc { shard, config_num } => EntryId::Gc {
                shard: *shard,
                config_num: *config_num,
            },
            Command::GcAck { shard, config_num } => EntryId::GcAck {
                shard: *shard,
                config_num: *config_num,
            },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Op(op) => write!(
                f,
                "{:?}({}) client:{} seq:{}",
                op.kind, op.key, op.client_id, op.seq
            ),
            Command::Config(c) => write!(f, "Config({}) shards:{:?}", c.num, c.shards),
            Command::Install(t) => write!(
                f,
                "Install(shard:{}, config:{}) keys:{}",
                t.shard,
                t.config_num,
                t.data.kv.len()
            ),
            Command::Gc { shard, config_num } => {
                write!(f, "Gc(shard:{}, config:{})", shard, config_num)
            }
            Command::GcAck { shard, config_num } => {
                write!(f, "GcAck(shard:{}, config:{})", shard, config_num)
            }
        }
    }
}
