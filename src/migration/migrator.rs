use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;

use shardctrler::ConfigNum;
use shardctrler::Gid;
use shardctrler::ShardId;
use storage::ShardTransfer;

use super::Backoff;
use crate::network::NetError;
use crate::replica::ShardKv;
use crate::Command;
use crate::DeleteShardArgs;
use crate::ErrCode;
use crate::KvError;
use crate::PullShardArgs;

impl ShardKv {
    /// pull_once pulls every shard still being pulled from the group that handed it off and
    /// proposes what it got as `Install` entries. It returns the number of shards proposed, or the
    /// last error if any pull failed.
    pub async fn pull_once(&self) -> Result<usize, KvError> {
        if !self.log.is_leader() {
            return Ok(0);
        }

        let pulling = self.state.read().pulling();

        if pulling.is_empty() {
            return Ok(0);
        }

        let pulls = pulling.into_iter().map(|(shard, from, num)| async move {
            // the previous owner is a group of the config before the hand-off
            let servers = self.servers_of(from, num - 1).await?;
            self.pull_shard_from(shard, num, from, servers).await
        });

        let mut n = 0;
        let mut last_err = None;
        for r in join_all(pulls).await.into_iter() {
            match r {
                Ok(()) => n += 1,
                Err(e) => last_err = Some(e),
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(n),
        }
    }

    /// pull_shard_from asks each server of group `from` in turn for `shard` of config `num`.
    async fn pull_shard_from(
        &self,
        shard: ShardId,
        num: ConfigNum,
        from: Gid,
        servers: Vec<String>,
    ) -> Result<(), KvError> {
        let mut last = KvError::Net(NetError::NoSuchServer(format!("group {}", from)));

        for server in servers.iter() {
            let args = PullShardArgs {
                shard,
                config_num: num,
            };

            let reply = match timeout(
                self.conf.timeouts.request(),
                self.net.pull_shard(server, args),
            )
            .await
            {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => {
                    last = e.into();
                    continue;
                }
                Err(_) => {
                    last = KvError::Peer(server.clone(), ErrCode::WrongLeader);
                    continue;
                }
            };

            if reply.err != ErrCode::Ok {
                last = KvError::Peer(server.clone(), reply.err);
                continue;
            }

            let t = match ShardTransfer::from_bytes(&reply.data)
                .and_then(|t| t.validate(shard, num).map(|_| t))
            {
                Ok(t) => t,
                Err(e) => {
                    warn!("bad shard transfer"; "name" => &self.name, "from" => server, "err" => %e);
                    last = e.into();
                    continue;
                }
            };

            let keys = t.data.kv.len();
            let p = self.log.propose(Command::Install(t))?;

            info!("shard pulled";
                "name" => &self.name,
                "shard" => shard,
                "config" => num,
                "from" => server,
                "keys" => keys,
                "index" => p.index);

            return Ok(());
        }

        Err(last)
    }

    /// confirm_once tells the previous owners of installed shards to drop their copies, and
    /// proposes a `GcAck` for every confirmed one.
    pub async fn confirm_once(&self) -> Result<usize, KvError> {
        if !self.log.is_leader() {
            return Ok(0);
        }

        let pending: Vec<_> = {
            let st = self.state.read();
            st.gc_pending
                .iter()
                .map(|((num, shard), from)| (*num, *shard, *from))
                .collect()
        };

        let mut n = 0;
        for (num, shard, from) in pending.into_iter() {
            let servers = match self.servers_of(from, num - 1).await {
                Ok(s) => s,
                Err(e) => {
                    debug!("previous owner unknown";
                        "name" => &self.name,
                        "shard" => shard,
                        "config" => num,
                        "from" => from,
                        "err" => %e);
                    continue;
                }
            };

            for server in servers.iter() {
                let args = DeleteShardArgs {
                    shard,
                    config_num: num,
                };

                let r = timeout(
                    self.conf.timeouts.request(),
                    self.net.delete_shard(server, args),
                )
                .await;

                if let Ok(Ok(reply)) = r {
                    if reply.err == ErrCode::Ok {
                        self.log.propose(Command::GcAck {
                            shard,
                            config_num: num,
                        })?;
                        debug!("hand-off confirmed"; "name" => &self.name, "shard" => shard, "config" => num);
                        n += 1;
                        break;
                    }
                }
            }
        }

        Ok(n)
    }

    /// servers_of returns the servers of group `gid` in config `num`.
    async fn servers_of(&self, gid: Gid, num: ConfigNum) -> Result<Vec<String>, KvError> {
        {
            let st = self.state.read();
            for c in [&st.prev_config, &st.config].iter() {
                if c.num == num {
                    return Ok(c.servers(gid).map(|s| s.to_vec()).unwrap_or_default());
                }
            }
        }

        let c = self.ctrler.query_config(num).await?;
        Ok(c.servers(gid).map(|s| s.to_vec()).unwrap_or_default())
    }

    /// run_migrator pulls missing shards and confirms hand-offs until stopped. Failed pulls
    /// are retried with backoff.
    pub async fn run_migrator(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let t = &self.conf.timeouts;
        let mut backoff = Backoff::new(t.backoff_base(), t.backoff_max());

        loop {
            let delay = match self.pull_once().await {
                Ok(_) => {
                    backoff.reset();
                    self.conf.timeouts.migrate()
                }
                Err(e) => {
                    let d = backoff.next_delay();
                    debug!("pull failed"; "name" => &self.name, "err" => %e, "retry_in" => ?d);
                    d
                }
            };

            if let Err(e) = self.confirm_once().await {
                debug!("confirm failed"; "name" => &self.name, "err" => %e);
            }

            tokio::select! {
                _ = sleep(delay) => {},
                _ = stop.changed() => break,
            }
        }
    }
}
