//! Replica groups driven by hand: only the appliers run, the poller and the migrator are
//! called step by step from tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use replog::MemLog;
use shardctrler::key2shard;
use shardctrler::Gid;
use shardctrler::MemCoordinator;
use shardctrler::ShardId;
use storage::MemEngine;
use storage::Storage;
use storage::WithNs;

use crate::conf::ClusterConf;
use crate::conf::LogConf;
use crate::conf::Timeouts;
use crate::network::LocalNetwork;
use crate::replica::Env;
use crate::replica::ShardKv;
use crate::Command;

pub const N_REPLICAS: usize = 3;

/// key_of returns a key that falls into `shard`.
pub fn key_of(shard: ShardId) -> String {
    (0..)
        .map(|i| format!("k{}", i))
        .find(|k| key2shard(k) == shard)
        .unwrap()
}

pub fn replica_name(gid: Gid, rid: usize) -> String {
    format!("g{}-{}", gid, rid)
}

pub fn group_servers(gid: Gid) -> BTreeMap<Gid, Vec<String>> {
    let mut m = BTreeMap::new();
    m.insert(gid, (0..N_REPLICAS).map(|i| replica_name(gid, i)).collect());
    m
}

pub struct TestEnv {
    pub env: Env,
    pub ctrler: Arc<MemCoordinator>,
    pub net: Arc<LocalNetwork>,
    pub engine: Arc<MemEngine>,
}

impl TestEnv {
    pub fn new(gids: &[Gid], snapshot_threshold: u64) -> TestEnv {
        let mut groups = BTreeMap::new();
        for gid in gids.iter() {
            groups.extend(group_servers(*gid));
        }

        let conf = ClusterConf {
            groups,
            timeouts: Timeouts {
                request_ms: 200,
                ..Timeouts::default()
            },
            snapshot_threshold,
            log: LogConf::default(),
        };

        let ctrler = Arc::new(MemCoordinator::new());
        let net = Arc::new(LocalNetwork::new());

        TestEnv {
            env: Env {
                conf: Arc::new(conf),
                ctrler: ctrler.clone(),
                net: net.clone(),
            },
            ctrler,
            net,
            engine: Arc::new(MemEngine::new().unwrap()),
        }
    }

    pub fn storage(&self, name: &str) -> Storage {
        Arc::new(WithNs::new(name.to_string(), self.engine.clone()))
    }

    /// open_group opens every replica of `gid`, registers them and starts their appliers.
    /// Replica 0 leads.
    pub fn open_group(&self, gid: Gid) -> TestGroup {
        let log = MemLog::new(0);
        let (stop, rx) = watch::channel(false);

        let mut g = TestGroup {
            gid,
            log,
            replicas: vec![],
            stop,
            rx,
        };

        for rid in 0..N_REPLICAS {
            let kv = self.open_replica(&g, rid, &replica_name(gid, rid));
            g.replicas.push(kv);
        }
        g
    }

    /// open_replica opens replica `rid` of a group on the storage namespace `ns`.
    pub fn open_replica(&self, g: &TestGroup, rid: usize, ns: &str) -> Arc<ShardKv> {
        let name = replica_name(g.gid, rid);
        let kv = ShardKv::open(
            g.gid,
            rid as u64,
            &name,
            g.log.replica(rid as u64),
            self.storage(ns),
            &self.env,
        )
        .unwrap();
        let kv = Arc::new(kv);

        self.net.register(&name, kv.clone());
        tokio::spawn(kv.clone().run_applier(g.rx.clone()));
        kv
    }
}

pub struct TestGroup {
    pub gid: Gid,
    pub log: MemLog<Command>,
    pub replicas: Vec<Arc<ShardKv>>,
    pub stop: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl TestGroup {
    pub fn leader(&self) -> Arc<ShardKv> {
        self.replicas[0].clone()
    }

    /// wait_applied waits until every replica applied all committed entries.
    pub async fn wait_applied(&self) {
        let want = self.log.last_committed();
        for kv in self.replicas.iter() {
            wait_until(|| kv.applied_index() >= want).await;
        }
    }

    /// poll proposes the next config on the leader and waits for it to be applied.
    pub async fn poll(&self) -> bool {
        let proposed = self.leader().poll_once().await.unwrap();
        self.wait_applied().await;
        proposed
    }
}

/// wait_until polls `cond` for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
