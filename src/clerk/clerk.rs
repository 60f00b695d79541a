use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;

use shardctrler::key2shard;
use shardctrler::Config;
use shardctrler::Coordinator;
use shardctrler::Gid;
use storage::ClientId;
use storage::SeqNum;

use crate::conf::Timeouts;
use crate::network::NetError;
use crate::network::Network;
use crate::ErrCode;
use crate::GetArgs;
use crate::PutAppendArgs;
use crate::PutAppendOp;

enum Request {
    Get(GetArgs),
    PutAppend(PutAppendArgs),
}

/// Clerk is a client of the whole store.
///
/// It routes a key to the group serving its shard under the latest config it knows, and
/// retries until the request succeeds: another server of the group on a wrong leader or a
/// lost reply, a fresh config on a wrong group. Every call gets a new seq and keeps it across
/// retries, so a retried request is executed at most once.
pub struct Clerk {
    client_id: ClientId,
    seq: SeqNum,
    config: Config,

    ctrler: Arc<dyn Coordinator>,
    net: Arc<dyn Network>,

    /// position of the server that answered last, per group.
    leaders: BTreeMap<Gid, usize>,

    rpc_timeout: Duration,
    retry_interval: Duration,
}

impl Clerk {
    pub fn new(ctrler: Arc<dyn Coordinator>, net: Arc<dyn Network>, timeouts: &Timeouts) -> Clerk {
        let client_id = rand::thread_rng().gen_range(1, ClientId::MAX);
        Clerk::with_client_id(client_id, ctrler, net, timeouts)
    }

    pub fn with_client_id(
        client_id: ClientId,
        ctrler: Arc<dyn Coordinator>,
        net: Arc<dyn Network>,
        timeouts: &Timeouts,
    ) -> Clerk {
        Clerk {
            client_id,
            seq: 0,
            config: Config::initial(),
            ctrler,
            net,
            leaders: BTreeMap::new(),
            // longer than a server waits for its log, so that a server timeout is seen as a reply
            rpc_timeout: timeouts.request() * 2,
            retry_interval: timeouts.poll(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// seq returns the seq of the last request.
    pub fn seq(&self) -> SeqNum {
        self.seq
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// get returns the value of `key`, None if it does not exist.
    pub async fn get(&mut self, key: &str) -> Option<String> {
        self.seq += 1;
        let req = Request::Get(GetArgs {
            key: key.to_string(),
            client_id: self.client_id,
            seq: self.seq,
        });

        let (err, value) = self.call(key, req).await;
        match err {
            ErrCode::Ok => Some(value),
            _ => None,
        }
    }

    pub async fn put(&mut self, key: &str, value: &str) {
        self.put_append(key, value, PutAppendOp::Put).await
    }

    pub async fn append(&mut self, key: &str, value: &str) {
        self.put_append(key, value, PutAppendOp::Append).await
    }

    async fn put_append(&mut self, key: &str, value: &str, op: PutAppendOp) {
        self.seq += 1;
        let req = Request::PutAppend(PutAppendArgs {
            key: key.to_string(),
            value: value.to_string(),
            op,
            client_id: self.client_id,
            seq: self.seq,
        });

        self.call(key, req).await;
    }

    /// call sends `req` until a group answers `Ok` or `NoKey`.
    async fn call(&mut self, key: &str, req: Request) -> (ErrCode, String) {
        let shard = key2shard(key);

        if self.config.num == 0 {
            self.refresh_config().await;
        }

        loop {
            let gid = self.config.owner(shard);
            let servers = self
                .config
                .servers(gid)
                .map(|s| s.to_vec())
                .unwrap_or_default();

            let start = self.leaders.get(&gid).copied().unwrap_or(0);

            for i in 0..servers.len() {
                let si = (start + i) % servers.len();
                let server = &servers[si];

                let rst = match timeout(self.rpc_timeout, self.send(server, &req)).await {
                    Ok(r) => r,
                    Err(_) => Err(NetError::ReplyLost(server.clone())),
                };

                let (err, value) = match rst {
                    Ok(r) => r,
                    Err(e) => {
                        debug!("request failed"; "client" => self.client_id, "server" => server, "err" => %e);
                        continue;
                    }
                };

                match err {
                    ErrCode::Ok | ErrCode::NoKey => {
                        self.leaders.insert(gid, si);
                        return (err, value);
                    }
                    ErrCode::WrongGroup => break,
                    _ => continue,
                }
            }

            sleep(self.retry_interval).await;
            self.refresh_config().await;
        }
    }

    async fn send(&self, server: &str, req: &Request) -> Result<(ErrCode, String), NetError> {
        match req {
            Request::Get(args) => {
                let r = self.net.get(server, args.clone()).await?;
                Ok((r.err, r.value))
            }
            Request::PutAppend(args) => {
                let r = self.net.put_append(server, args.clone()).await?;
                Ok((r.err, String::new()))
            }
        }
    }

    async fn refresh_config(&mut self) {
        match self.ctrler.query_latest().await {
            Ok(c) => {
                if c.num != self.config.num {
                    debug!("clerk config updated"; "client" => self.client_id, "num" => c.num);
                }
                self.config = c;
            }
            Err(e) => {
                debug!("fail to query config"; "client" => self.client_id, "err" => ?e);
            }
        }
    }
}
