use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::Config;
use crate::ConfigNum;
use crate::CtrlerError;
use crate::Gid;
use crate::ShardId;
use crate::N_SHARDS;

/// Coordinator is the read side of the shard controller, the only part a replica group
/// depends on.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// query_config returns config `num`. A number beyond the latest returns the latest.
    async fn query_config(&self, num: ConfigNum) -> Result<Config, CtrlerError>;

    /// query_latest returns the latest config.
    async fn query_latest(&self) -> Result<Config, CtrlerError>;
}

/// MemCoordinator keeps the whole config history in memory.
///
/// Every join/leave/move appends a new config; configs are never rewritten.
pub struct MemCoordinator {
    configs: RwLock<Vec<Config>>,
    reachable: AtomicBool,
}

impl Default for MemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemCoordinator {
    pub fn new() -> MemCoordinator {
        MemCoordinator {
            configs: RwLock::new(vec![Config::initial()]),
            reachable: AtomicBool::new(true),
        }
    }

    /// set_reachable simulates the controller going away or coming back.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), CtrlerError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CtrlerError::Unavailable)
        }
    }

    pub fn latest(&self) -> Config {
        let configs = self.configs.read();
        configs[configs.len() - 1].clone()
    }

    pub fn get(&self, num: ConfigNum) -> Config {
        let configs = self.configs.read();
        let i = std::cmp::min(num as usize, configs.len() - 1);
        configs[i].clone()
    }

    /// join adds new groups and rebalances.
    pub fn join(&self, groups: BTreeMap<Gid, Vec<String>>) -> Result<Config, CtrlerError> {
        self.check_reachable()?;

        let mut configs = self.configs.write();
        let mut next = configs[configs.len() - 1].next();

        let mut all = next.group_map();
        for (gid, servers) in groups.into_iter() {
            if gid == 0 {
                return Err(CtrlerError::InvalidGid(gid));
            }
            if all.contains_key(&gid) {
                return Err(CtrlerError::DupGroup(gid));
            }
            all.insert(gid, servers);
        }
        next.set_groups(all);
        next.rebalance();

        info!("groups joined"; "num" => next.num, "shards" => ?next.shards);

        configs.push(next.clone());
        Ok(next)
    }

    /// leave removes groups and hands their shards to the remaining ones.
    pub fn leave(&self, gids: &[Gid]) -> Result<Config, CtrlerError> {
        self.check_reachable()?;

        let mut configs = self.configs.write();
        let mut next = configs[configs.len() - 1].next();

        let mut all = next.group_map();
        for gid in gids.iter() {
            if all.remove(gid).is_none() {
                return Err(CtrlerError::UnknownGroup(*gid));
            }
        }
        next.set_groups(all);
        next.rebalance();

        info!("groups left"; "num" => next.num, "gids" => ?gids, "shards" => ?next.shards);

        configs.push(next.clone());
        Ok(next)
    }

    /// move_shard assigns one shard to a group without rebalancing.
    pub fn move_shard(&self, shard: ShardId, gid: Gid) -> Result<Config, CtrlerError> {
        self.check_reachable()?;

        if shard >= N_SHARDS {
            return Err(CtrlerError::BadShard(shard));
        }

        let mut configs = self.configs.write();
        let mut next = configs[configs.len() - 1].next();

        if !next.has_group(gid) {
            return Err(CtrlerError::UnknownGroup(gid));
        }
        next.shards[shard] = gid;

        info!("shard moved"; "num" => next.num, "shard" => shard, "gid" => gid);

        configs.push(next.clone());
        Ok(next)
    }
}

#[async_trait]
impl Coordinator for MemCoordinator {
    async fn query_config(&self, num: ConfigNum) -> Result<Config, CtrlerError> {
        self.check_reachable()?;
        Ok(self.get(num))
    }

    async fn query_latest(&self) -> Result<Config, CtrlerError> {
        self.check_reachable()?;
        Ok(self.latest())
    }
}
