use std::collections::BTreeMap;
use std::mem::replace;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::sync::oneshot::Sender;
use tokio::task::JoinHandle;

use replog::MemLog;
use replog::ReplicaId;
use shardctrler::Config;
use shardctrler::Gid;
use shardctrler::MemCoordinator;
use shardctrler::ShardId;
use storage::MemEngine;
use storage::Storage;
use storage::WithNs;

use crate::clerk::Clerk;
use crate::conf::ClusterConf;
use crate::network::LocalNetwork;
use crate::replica::Env;
use crate::replica::ShardKv;
use crate::Command;
use crate::ServerError;

/// Server runs every replica group of a `ClusterConf` in one process.
///
/// The groups share one controller, one network and one storage engine. Each group gets an
/// in-memory consensus log; each replica its own namespace in the engine, which survives a
/// crash of the replica.
pub struct Server {
    conf: Arc<ClusterConf>,
    ctrler: Arc<MemCoordinator>,
    net: Arc<LocalNetwork>,
    engine: Arc<MemEngine>,

    logs: BTreeMap<Gid, MemLog<Command>>,

    replicas: BTreeMap<String, Arc<ShardKv>>,
    stop_txs: Vec<(String, Sender<()>)>,
    join_handles: Vec<(String, JoinHandle<()>)>,
}

impl Server {
    pub fn new(conf: ClusterConf) -> Result<Server, ServerError> {
        conf.check()?;

        let logs = conf
            .groups
            .keys()
            .map(|gid| (*gid, MemLog::new(0)))
            .collect();

        Ok(Server {
            conf: Arc::new(conf),
            ctrler: Arc::new(MemCoordinator::new()),
            net: Arc::new(LocalNetwork::new()),
            engine: Arc::new(MemEngine::new()?),
            logs,
            replicas: BTreeMap::new(),
            stop_txs: Vec::new(),
            join_handles: Vec::new(),
        })
    }

    pub fn conf(&self) -> &ClusterConf {
        &self.conf
    }

    pub fn ctrler(&self) -> Arc<MemCoordinator> {
        self.ctrler.clone()
    }

    pub fn net(&self) -> Arc<LocalNetwork> {
        self.net.clone()
    }

    pub fn log(&self, gid: Gid) -> Option<&MemLog<Command>> {
        self.logs.get(&gid)
    }

    /// replica returns a running replica by name.
    pub fn replica(&self, name: &str) -> Option<Arc<ShardKv>> {
        self.replicas.get(name).cloned()
    }

    /// leader returns the running replica that leads group `gid`.
    pub fn leader(&self, gid: Gid) -> Option<Arc<ShardKv>> {
        let rid = self.log(gid)?.leader()?;
        let name = self.conf.groups.get(&gid)?.get(rid as usize)?;
        self.replica(name)
    }

    fn env(&self) -> Env {
        Env {
            conf: self.conf.clone(),
            ctrler: self.ctrler.clone(),
            net: self.net.clone(),
        }
    }

    fn name_of(&self, gid: Gid, rid: ReplicaId) -> Result<String, ServerError> {
        self.conf
            .groups
            .get(&gid)
            .and_then(|names| names.get(rid as usize))
            .cloned()
            .ok_or(ServerError::NoSuchReplica(gid, rid))
    }

    /// Starts every replica of every group.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let names: Vec<String> = self.conf.groups.values().flatten().cloned().collect();
        for name in names.iter() {
            self.start_replica(name)?;
        }
        Ok(())
    }

    /// start_replica opens a replica from what its namespace holds and registers it to the
    /// network. A running replica is left alone.
    pub fn start_replica(&mut self, name: &str) -> Result<(), ServerError> {
        if self.replicas.contains_key(name) {
            return Ok(());
        }

        let (gid, rid) = self
            .conf
            .find_replica(name)
            .ok_or_else(|| ServerError::UnknownReplica(name.to_string()))?;

        let log = self
            .logs
            .get(&gid)
            .ok_or(ServerError::NoSuchReplica(gid, rid))?
            .replica(rid);

        let sto: Storage = Arc::new(WithNs::new(name.to_string(), self.engine.clone()));

        let kv = Arc::new(ShardKv::open(gid, rid, name, log, sto, &self.env())?);

        let (tx, rx) = oneshot::channel::<()>();
        let j = kv.spawn(rx);

        self.net.register(name, kv.clone());
        self.replicas.insert(name.to_string(), kv);
        self.stop_txs.push((name.to_string(), tx));
        self.join_handles.push((name.to_string(), j));

        info!("replica started"; "gid" => gid, "rid" => rid, "name" => name);
        Ok(())
    }

    /// stop_replica stops one replica and waits for its tasks to quit.
    pub async fn stop_replica(&mut self, name: &str) -> Result<(), ServerError> {
        if self.replicas.remove(name).is_none() {
            return Err(ServerError::UnknownReplica(name.to_string()));
        }
        self.net.unregister(name);

        if let Some(i) = self.stop_txs.iter().position(|(n, _)| n == name) {
            let (_, tx) = self.stop_txs.remove(i);
            tx.send(()).or(Err(ServerError::RxClosed))?;
        }

        if let Some(i) = self.join_handles.iter().position(|(n, _)| n == name) {
            let (_, j) = self.join_handles.remove(i);
            if let Err(e) = j.await {
                error!("replica task failed"; "name" => name, "err" => ?e);
            }
        }

        info!("replica stopped"; "name" => name);
        Ok(())
    }

    /// crash takes a replica down: it stops, and the log forgets it until `restart`.
    /// Its snapshot survives.
    pub async fn crash(&mut self, gid: Gid, rid: ReplicaId) -> Result<(), ServerError> {
        let name = self.name_of(gid, rid)?;
        let log = self.logs.get(&gid).ok_or(ServerError::NoSuchReplica(gid, rid))?;

        log.crash(rid);
        self.stop_replica(&name).await
    }

    /// restart brings a crashed replica back from its snapshot.
    pub fn restart(&mut self, gid: Gid, rid: ReplicaId) -> Result<(), ServerError> {
        let name = self.name_of(gid, rid)?;
        let log = self.logs.get(&gid).ok_or(ServerError::NoSuchReplica(gid, rid))?;

        log.restart(rid);
        self.start_replica(&name)
    }

    /// elect makes replica `rid` the leader of its group. Uncommitted entries of the old leader
    /// are kept if `keep_pending`.
    pub fn elect(&self, gid: Gid, rid: ReplicaId, keep_pending: bool) -> Result<(), ServerError> {
        self.name_of(gid, rid)?;
        let log = self.logs.get(&gid).ok_or(ServerError::NoSuchReplica(gid, rid))?;
        log.elect(rid, keep_pending);
        Ok(())
    }

    /// join_groups asks the controller to add groups of the conf.
    pub fn join_groups(&self, gids: &[Gid]) -> Result<Config, ServerError> {
        let mut groups = BTreeMap::new();
        for gid in gids.iter() {
            let names = self
                .conf
                .groups
                .get(gid)
                .ok_or(ServerError::NoSuchReplica(*gid, 0))?;
            groups.insert(*gid, names.clone());
        }

        let c = self.ctrler.join(groups)?;
        Ok(c)
    }

    pub fn leave_groups(&self, gids: &[Gid]) -> Result<Config, ServerError> {
        let c = self.ctrler.leave(gids)?;
        Ok(c)
    }

    pub fn move_shard(&self, shard: ShardId, gid: Gid) -> Result<Config, ServerError> {
        let c = self.ctrler.move_shard(shard, gid)?;
        Ok(c)
    }

    /// clerk returns a new client of this cluster.
    pub fn clerk(&self) -> Clerk {
        Clerk::new(self.ctrler.clone(), self.net.clone(), &self.conf.timeouts)
    }

    /// Sends stop signal to every replica.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        while let Some((name, tx)) = self.stop_txs.pop() {
            tx.send(()).or(Err(ServerError::RxClosed))?;
            debug!("stop signal sent"; "name" => name);
        }
        Ok(())
    }

    /// Waits for every replica to quit after `stop`.
    pub async fn join(&mut self) -> Result<(), ServerError> {
        let handles = replace(&mut self.join_handles, Vec::new());
        if handles.is_empty() {
            return Err(ServerError::NotStarted);
        }

        for (name, j) in handles.into_iter() {
            if let Err(e) = j.await {
                error!("replica task failed"; "name" => &name, "err" => ?e);
            }
        }

        self.net.clear();
        self.replicas.clear();
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
