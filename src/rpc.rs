//! Request and reply types of the client and peer RPCs.

use std::fmt;

use shardctrler::ConfigNum;
use shardctrler::ShardId;
use storage::ClientId;
use storage::SeqNum;

/// ErrCode is the outcome carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
    Ok,
    NoKey,
    WrongGroup,
    WrongLeader,

    /// The peer has not reached the config the request is about.
    NotReady,

    /// The peer has no data for the requested shard at that config.
    NotOwner,
}

impl ErrCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrCode::Ok => "OK",
            ErrCode::NoKey => "ErrNoKey",
            ErrCode::WrongGroup => "ErrWrongGroup",
            ErrCode::WrongLeader => "ErrWrongLeader",
            ErrCode::NotReady => "ErrNotReady",
            ErrCode::NotOwner => "ErrNotOwner",
        }
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub key: String,
    pub client_id: ClientId,
    pub seq: SeqNum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReply {
    pub err: ErrCode,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutAppendOp {
    Put,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAppendArgs {
    pub key: String,
    pub value: String,
    pub op: PutAppendOp,
    pub client_id: ClientId,
    pub seq: SeqNum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAppendReply {
    pub err: ErrCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullShardArgs {
    pub shard: ShardId,
    pub config_num: ConfigNum,
}

/// PullShardReply carries the encoded `ShardTransfer` when `err` is `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullShardReply {
    pub err: ErrCode,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteShardArgs {
    pub shard: ShardId,
    pub config_num: ConfigNum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteShardReply {
    pub err: ErrCode,
}
