use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use replog::ConsensusLog;
use replog::ReplicaId;
use shardctrler::Coordinator;
use shardctrler::Gid;
use storage::GroupState;
use storage::SnapshotEngine;
use storage::Storage;
use storage::StorageError;

use super::Waiters;
use crate::conf::ClusterConf;
use crate::network::Network;
use crate::Command;
use crate::KvError;

/// Env is what all replicas of a process share: the config, the controller and the network.
#[derive(Clone)]
pub struct Env {
    pub conf: Arc<ClusterConf>,
    pub ctrler: Arc<dyn Coordinator>,
    pub net: Arc<dyn Network>,
}

/// ShardKv is one replica of a replica group.
///
/// The group state is written only by the applier task, in log order. Client requests,
/// shard pulls and hand-off confirmations all go through the log.
pub struct ShardKv {
    pub gid: Gid,
    pub rid: ReplicaId,
    pub name: String,

    pub(crate) conf: Arc<ClusterConf>,
    pub(crate) log: Arc<dyn ConsensusLog<Command>>,
    pub(crate) ctrler: Arc<dyn Coordinator>,
    pub(crate) net: Arc<dyn Network>,
    pub(crate) storage: Storage,

    pub(crate) state: RwLock<GroupState>,
    pub(crate) waiters: Waiters,

    /// index of the last snapshot taken or installed.
    pub(crate) snapshot_index: AtomicU64,
}

impl ShardKv {
    /// open creates a replica from the latest snapshot in `storage`, or from scratch if there
    /// is none. It applies the log from the entry after the snapshot once spawned.
    pub fn open(
        gid: Gid,
        rid: ReplicaId,
        name: &str,
        log: Arc<dyn ConsensusLog<Command>>,
        storage: Storage,
        env: &Env,
    ) -> Result<ShardKv, KvError> {
        let (state, snapshot_index) = match storage.load_snapshot()? {
            Some(byts) => {
                let index = storage.snapshot_index()?;
                let mut st = GroupState::decode_snapshot(&byts)?;
                if st.gid != gid {
                    return Err(StorageError::DBError(format!(
                        "snapshot of group {} loaded by group {}",
                        st.gid, gid
                    ))
                    .into());
                }
                st.applied_index = index;
                (st, index)
            }
            None => (GroupState::new(gid), 0),
        };

        info!("replica opened";
            "gid" => gid,
            "rid" => rid,
            "name" => name,
            "config" => state.config.num,
            "snapshot_index" => snapshot_index);

        Ok(ShardKv {
            gid,
            rid,
            name: name.to_string(),
            conf: env.conf.clone(),
            log,
            ctrler: env.ctrler.clone(),
            net: env.net.clone(),
            storage,
            state: RwLock::new(state),
            waiters: Waiters::new(),
            snapshot_index: AtomicU64::new(snapshot_index),
        })
    }

    /// state returns a read guard of the group state. Do not hold it across an await.
    pub fn state(&self) -> RwLockReadGuard<'_, GroupState> {
        self.state.read()
    }

    pub fn is_leader(&self) -> bool {
        self.log.is_leader()
    }

    pub fn applied_index(&self) -> u64 {
        self.state.read().applied_index
    }

    pub fn config_num(&self) -> u64 {
        self.state.read().config.num
    }

    pub fn snapshot_index(&self) -> u64 {
        self.snapshot_index.load(Ordering::SeqCst)
    }

    /// spawn starts the applier and, on the leader, the poller and the migrator. They all
    /// stop when `stop` fires or its sender is dropped.
    pub fn spawn(self: &Arc<Self>, stop: oneshot::Receiver<()>) -> JoinHandle<()> {
        let me = self.clone();

        tokio::spawn(async move {
            let (tx, rx) = watch::channel(false);

            let handles = vec![
                tokio::spawn(me.clone().run_applier(rx.clone())),
                tokio::spawn(me.clone().run_poller(rx.clone())),
                tokio::spawn(me.clone().run_migrator(rx)),
            ];

            let _ = stop.await;
            let _ = tx.send(true);

            for h in handles.into_iter() {
                if let Err(e) = h.await {
                    error!("replica task failed"; "name" => &me.name, "err" => ?e);
                }
            }

            me.waiters.clear();
            info!("replica stopped"; "gid" => me.gid, "name" => &me.name);
        })
    }
}
