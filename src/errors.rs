use replog::LogError;
use replog::LogIndex;
use shardctrler::CtrlerError;
use shardctrler::ShardId;
use storage::StorageError;

use crate::conf::ConfError;
use crate::network::NetError;
use crate::ErrCode;

quick_error! {
    /// Errors a replica returns for a request it could not complete.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum KvError {
        /// The local replica is not the leader, or lost leadership before the proposal was
        /// applied.
        WrongLeader {
            display("wrong leader")
        }

        /// The shard is not served by this group under its current config.
        WrongGroup(shard: ShardId) {
            display("shard {} is not served here", shard)
        }

        /// No result before the request timeout. The proposal may still be applied later.
        Timeout(index: LogIndex) {
            display("timeout waiting for index {}", index)
        }

        Storage(e: StorageError) {
            from(e: StorageError) -> (e)
            display("storage error: {}", e)
        }

        Log(e: LogError) {
            from(e: LogError) -> (e)
            display("log error: {}", e)
        }

        Ctrler(e: CtrlerError) {
            from(e: CtrlerError) -> (e)
            display("controller error: {:?}", e)
        }

        Net(e: NetError) {
            from(e: NetError) -> (e)
            display("network error: {}", e)
        }

        /// A peer group refused a shard pull or a hand-off confirmation.
        Peer(server: String, code: ErrCode) {
            display("{} replied {}", server, code)
        }

        Shutdown {
            display("replica is shutting down")
        }
    }
}

impl KvError {
    /// code maps an error to what a client sees. Every failure that is not about the shard
    /// tells the client to try another server.
    pub fn code(&self) -> ErrCode {
        match self {
            KvError::WrongGroup(_) => ErrCode::WrongGroup,
            _ => ErrCode::WrongLeader,
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ServerError {
        NotStarted {
            display("server not started")
        }

        RxClosed {
            display("stop signal receiver closed")
        }

        NoSuchReplica(gid: u64, rid: u64) {
            display("no replica {} in group {}", rid, gid)
        }

        UnknownReplica(name: String) {
            display("no replica named {}", name)
        }

        Kv(e: KvError) {
            from(e: KvError) -> (e)
            display("replica error: {}", e)
        }

        Ctrler(e: CtrlerError) {
            from(e: CtrlerError) -> (e)
            display("controller error: {:?}", e)
        }

        Conf(e: ConfError) {
            from(e: ConfError) -> (e)
            display("conf error: {}", e)
        }

        Storage(e: StorageError) {
            from(e: StorageError) -> (e)
            display("storage error: {}", e)
        }
    }
}
