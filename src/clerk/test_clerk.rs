use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use shardctrler::key2shard;
use shardctrler::MemCoordinator;

use super::Clerk;
use crate::conf::Timeouts;
use crate::network::NetError;
use crate::network::Network;
use crate::DeleteShardArgs;
use crate::DeleteShardReply;
use crate::ErrCode;
use crate::GetArgs;
use crate::GetReply;
use crate::PullShardArgs;
use crate::PullShardReply;
use crate::PutAppendArgs;
use crate::PutAppendOp;
use crate::PutAppendReply;

/// FakeNet serves a single map from the servers in `serving`. Other servers in `leaders`
/// are not serving the key; the rest are followers.
#[derive(Default)]
struct FakeNet {
    serving: Mutex<BTreeSet<String>>,
    wrong_group: Mutex<BTreeSet<String>>,
    kv: Mutex<BTreeMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeNet {
    fn code(&self, server: &str) -> ErrCode {
        self.calls.lock().push(server.to_string());
        if self.wrong_group.lock().contains(server) {
            ErrCode::WrongGroup
        } else if self.serving.lock().contains(server) {
            ErrCode::Ok
        } else {
            ErrCode::WrongLeader
        }
    }
}

#[async_trait]
impl Network for FakeNet {
    async fn get(&self, server: &str, args: GetArgs) -> Result<GetReply, NetError> {
        let err = self.code(server);
        if err != ErrCode::Ok {
            return Ok(GetReply {
                err,
                value: String::new(),
            });
        }

        let r = match self.kv.lock().get(&args.key) {
            Some(v) => GetReply {
                err: ErrCode::Ok,
                value: v.clone(),
            },
            None => GetReply {
                err: ErrCode::NoKey,
                value: String::new(),
            },
        };
        Ok(r)
    }

    async fn put_append(
        &self,
        server: &str,
        args: PutAppendArgs,
    ) -> Result<PutAppendReply, NetError> {
        let err = self.code(server);
        if err == ErrCode::Ok {
            let mut kv = self.kv.lock();
            match args.op {
                PutAppendOp::Put => {
                    kv.insert(args.key, args.value);
                }
                PutAppendOp::Append => {
                    kv.entry(args.key).or_default().push_str(&args.value);
                }
            }
        }
        Ok(PutAppendReply { err })
    }

    async fn pull_shard(
        &self,
        server: &str,
        _args: PullShardArgs,
    ) -> Result<PullShardReply, NetError> {
        Err(NetError::Unreachable(server.to_string()))
    }

    async fn delete_shard(
        &self,
        server: &str,
        _args: DeleteShardArgs,
    ) -> Result<DeleteShardReply, NetError> {
        Err(NetError::Unreachable(server.to_string()))
    }
}

fn timeouts() -> Timeouts {
    Timeouts {
        request_ms: 100,
        poll_ms: 5,
        ..Timeouts::default()
    }
}

fn group(gid: u64, servers: &[&str]) -> BTreeMap<u64, Vec<String>> {
    let mut m = BTreeMap::new();
    m.insert(gid, servers.iter().map(|s| s.to_string()).collect());
    m
}

#[tokio::test]
async fn test_clerk_finds_leader() {
    let ctrler = Arc::new(MemCoordinator::new());
    ctrler.join(group(1, &["a0", "a1", "a2"])).unwrap();

    let net = Arc::new(FakeNet::default());
    net.serving.lock().insert("a1".to_string());

    let mut ck = Clerk::new(ctrler.clone(), net.clone(), &timeouts());
    assert!(ck.client_id() > 0);

    ck.put("k", "v").await;
    ck.append("k", "w").await;
    assert_eq!(Some("vw".to_string()), ck.get("k").await);
    assert_eq!(None, ck.get("missing").await);

    // the leader is remembered after the first call
    assert_eq!(vec!["a0", "a1", "a1", "a1", "a1"], net.calls.lock().clone());
    assert_eq!(4, ck.seq());
    assert_eq!(1, ck.config().num);
}

#[tokio::test]
async fn test_clerk_wrong_group() {
    let ctrler = Arc::new(MemCoordinator::new());
    ctrler.join(group(1, &["a0"])).unwrap();

    let net = Arc::new(FakeNet::default());
    net.serving.lock().insert("a0".to_string());

    let mut ck = Clerk::with_client_id(7, ctrler.clone(), net.clone(), &timeouts());
    ck.put("k", "1").await;
    assert_eq!(1, ck.config().num);

    // the shard of "k" moves to group 2; group 1 stops serving it
    ctrler.join(group(2, &["b0"])).unwrap();
    ctrler.move_shard(key2shard("k"), 2).unwrap();
    net.wrong_group.lock().insert("a0".to_string());
    net.serving.lock().insert("b0".to_string());

    assert_eq!(Some("1".to_string()), ck.get("k").await);
    assert_eq!(3, ck.config().num);

    let calls = net.calls.lock().clone();
    assert_eq!(vec!["a0", "a0", "b0"], calls);
}
