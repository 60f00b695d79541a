use async_trait::async_trait;
use tokio::time::timeout;

use shardctrler::key2shard;
use storage::Op;
use storage::OpReply;
use storage::ShardStatus;
use storage::StorageError;

use super::ShardKv;
use crate::network::KvService;
use crate::Command;
use crate::DeleteShardArgs;
use crate::DeleteShardReply;
use crate::ErrCode;
use crate::GetArgs;
use crate::GetReply;
use crate::KvError;
use crate::PullShardArgs;
use crate::PullShardReply;
use crate::PutAppendArgs;
use crate::PutAppendOp;
use crate::PutAppendReply;

impl ShardKv {
    /// handle runs a client operation through the log and returns its result.
    ///
    /// A request for a shard not served here is rejected before anything is proposed. After
    /// `Timeout` the operation may still be applied; retrying it with the same seq is safe.
    pub async fn handle(&self, op: Op) -> Result<OpReply, KvError> {
        if !self.log.is_leader() {
            return Err(KvError::WrongLeader);
        }

        let shard = key2shard(&op.key);
        if self.state.read().status(shard) != ShardStatus::Owned {
            return Err(KvError::WrongGroup(shard));
        }

        self.propose_and_wait(Command::Op(op)).await
    }

    /// propose_and_wait proposes `cmd` and waits until the entry at its index is applied.
    pub(crate) async fn propose_and_wait(&self, cmd: Command) -> Result<OpReply, KvError> {
        let id = cmd.id();
        let (p, rx) = self.waiters.propose(&*self.log, cmd)?;

        match timeout(self.conf.timeouts.request(), rx).await {
            Ok(Ok(r)) => r,
            Ok(Err(_)) => Err(KvError::WrongLeader),
            Err(_) => {
                self.waiters.cancel(p.index, p.term, id);
                debug!("request timeout"; "name" => &self.name, "index" => p.index, "term" => p.term);
                Err(KvError::Timeout(p.index))
            }
        }
    }
}

#[async_trait]
impl KvService for ShardKv {
    async fn get(&self, args: GetArgs) -> GetReply {
        let op = Op::get(&args.key, args.client_id, args.seq);

        let (err, value) = match self.handle(op).await {
            Ok(OpReply::Value(v)) => (ErrCode::Ok, v),
            Ok(OpReply::Ok) => (ErrCode::Ok, String::new()),
            Ok(OpReply::NoKey) => (ErrCode::NoKey, String::new()),
            Err(e) => (e.code(), String::new()),
        };

        GetReply { err, value }
    }

    async fn put_append(&self, args: PutAppendArgs) -> PutAppendReply {
        let op = match args.op {
            PutAppendOp::Put => Op::put(&args.key, &args.value, args.client_id, args.seq),
            PutAppendOp::Append => Op::append(&args.key, &args.value, args.client_id, args.seq),
        };

        let err = match self.handle(op).await {
            Ok(_) => ErrCode::Ok,
            Err(e) => e.code(),
        };

        PutAppendReply { err }
    }

    /// Any replica can answer a pull: handed-off data never changes once it is in the outbox.
    async fn pull_shard(&self, args: PullShardArgs) -> PullShardReply {
        let exported = self.state.read().export(args.shard, args.config_num);

        let (err, data) = match exported {
            Ok(t) => match t.to_bytes() {
                Ok(byts) => (ErrCode::Ok, byts),
                Err(e) => {
                    error!("fail to encode shard"; "name" => &self.name, "shard" => args.shard, "err" => ?e);
                    (ErrCode::WrongLeader, vec![])
                }
            },
            Err(StorageError::NotReady(_, _)) => (ErrCode::NotReady, vec![]),
            Err(_) => (ErrCode::NotOwner, vec![]),
        };

        debug!("pull shard served";
            "name" => &self.name,
            "shard" => args.shard,
            "config" => args.config_num,
            "err" => err.as_str());

        PullShardReply { err, data }
    }

    async fn delete_shard(&self, args: DeleteShardArgs) -> DeleteShardReply {
        if !self.log.is_leader() {
            return DeleteShardReply {
                err: ErrCode::WrongLeader,
            };
        }

        {
            let st = self.state.read();
            if st.config.num < args.config_num {
                return DeleteShardReply {
                    err: ErrCode::NotReady,
                };
            }
            if !st.outbox.contains_key(&(args.config_num, args.shard)) {
                return DeleteShardReply { err: ErrCode::Ok };
            }
        }

        let cmd = Command::Gc {
            shard: args.shard,
            config_num: args.config_num,
        };

        let err = match self.propose_and_wait(cmd).await {
            Ok(_) => ErrCode::Ok,
            Err(e) => e.code(),
        };

        DeleteShardReply { err }
    }
}
