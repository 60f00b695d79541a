use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::DeleteShardArgs;
use crate::DeleteShardReply;
use crate::GetArgs;
use crate::GetReply;
use crate::PullShardArgs;
use crate::PullShardReply;
use crate::PutAppendArgs;
use crate::PutAppendReply;

use super::KvService;
use super::NetError;
use super::Network;

/// LocalNetwork connects services living in one process.
///
/// Shard data crosses it only as encoded bytes. A server can be made unreachable, or lossy:
/// a lossy server executes requests but its replies never arrive.
#[derive(Default)]
pub struct LocalNetwork {
    servers: RwLock<BTreeMap<String, Arc<dyn KvService>>>,
    unreachable: RwLock<BTreeSet<String>>,
    lossy: RwLock<BTreeSet<String>>,
}

impl LocalNetwork {
    pub fn new() -> LocalNetwork {
        Self::default()
    }

    pub fn register(&self, name: &str, svc: Arc<dyn KvService>) {
        self.servers.write().insert(name.to_string(), svc);
        debug!("server registered"; "server" => name);
    }

    pub fn unregister(&self, name: &str) {
        self.servers.write().remove(name);
        debug!("server unregistered"; "server" => name);
    }

    pub fn clear(&self) {
        self.servers.write().clear();
    }

    pub fn set_reachable(&self, name: &str, reachable: bool) {
        let mut u = self.unreachable.write();
        if reachable {
            u.remove(name);
        } else {
            u.insert(name.to_string());
        }
        info!("server reachability changed"; "server" => name, "reachable" => reachable);
    }

    pub fn set_lossy(&self, name: &str, lossy: bool) {
        let mut l = self.lossy.write();
        if lossy {
            l.insert(name.to_string());
        } else {
            l.remove(name);
        }
        info!("server lossiness changed"; "server" => name, "lossy" => lossy);
    }

    fn connect(&self, name: &str) -> Result<Arc<dyn KvService>, NetError> {
        if self.unreachable.read().contains(name) {
            return Err(NetError::Unreachable(name.to_string()));
        }

        let servers = self.servers.read();
        let svc = servers
            .get(name)
            .ok_or_else(|| NetError::NoSuchServer(name.to_string()))?;
        Ok(svc.clone())
    }

    fn deliver<T>(&self, name: &str, reply: T) -> Result<T, NetError> {
        if self.lossy.read().contains(name) || self.unreachable.read().contains(name) {
            return Err(NetError::ReplyLost(name.to_string()));
        }
        Ok(reply)
    }
}

#[async_trait]
impl Network for LocalNetwork {
    async fn get(&self, server: &str, args: GetArgs) -> Result<GetReply, NetError> {
        let svc = self.connect(server)?;
        let reply = svc.get(args).await;
        self.deliver(server, reply)
    }

    async fn put_append(
        &self,
        server: &str,
        args: PutAppendArgs,
    ) -> Result<PutAppendReply, NetError> {
        let svc = self.connect(server)?;
        let reply = svc.put_append(args).await;
        self.deliver(server, reply)
    }

    async fn pull_shard(
        &self,
        server: &str,
        args: PullShardArgs,
    ) -> Result<PullShardReply, NetError> {
        let svc = self.connect(server)?;
        let reply = svc.pull_shard(args).await;
        self.deliver(server, reply)
    }

    async fn delete_shard(
        &self,
        server: &str,
        args: DeleteShardArgs,
    ) -> Result<DeleteShardReply, NetError> {
        let svc = self.connect(server)?;
        let reply = svc.delete_shard(args).await;
        self.deliver(server, reply)
    }
}
