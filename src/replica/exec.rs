use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;

use replog::Committed;
use replog::CommittedStream;
use replog::Delivery;
use replog::LogError;
use replog::LogIndex;
use storage::GroupState;
use storage::OpReply;
use storage::SnapshotEngine;
use storage::StorageError;

use super::ApplyResult;
use super::ShardKv;
use crate::Command;
use crate::KvError;

impl ShardKv {
    /// run_applier applies committed entries in log order until stopped.
    pub async fn run_applier(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let from = self.applied_index() + 1;
        let mut stream = CommittedStream::new(self.log.clone(), from);

        info!("applier started"; "name" => &self.name, "from" => from);

        loop {
            let d = tokio::select! {
                d = stream.next() => d,
                _ = stop.changed() => break,
            };

            match d {
                Ok(Delivery::Entry(c)) => self.apply(c),
                Ok(Delivery::Snapshot { index, data }) => {
                    if let Err(e) = self.install_snapshot(index, &data) {
                        error!("fail to install snapshot"; "name" => &self.name, "index" => index, "err" => ?e);
                    }
                }
                Err(LogError::Closed) => break,
                Err(e) => {
                    // replica is down; wait for a restart
                    debug!("log unavailable"; "name" => &self.name, "err" => ?e);
                    tokio::select! {
                        _ = sleep(self.conf.timeouts.backoff_base()) => {},
                        _ = stop.changed() => break,
                    }
                    continue;
                }
            }

            if let Err(e) = self.maybe_snapshot() {
                warn!("fail to take snapshot"; "name" => &self.name, "err" => ?e);
            }
        }

        info!("applier stopped"; "name" => &self.name, "applied" => self.applied_index());
    }

    /// apply applies one committed entry and hands the result to whoever proposed it here.
    pub fn apply(&self, c: Committed<Command>) {
        let id = c.entry.id();

        let result = {
            let mut st = self.state.write();
            if c.index <= st.applied_index {
                return;
            }
            st.applied_index = c.index;
            apply_command(&mut st, c.entry)
        };

        if let Err(e) = &result {
            debug!("entry not applied"; "name" => &self.name, "index" => c.index, "err" => %e);
        }

        self.waiters.notify(c.index, c.term, id, result);
    }

    /// install_snapshot replaces the group state with a snapshot taken at `index`.
    pub fn install_snapshot(&self, index: LogIndex, data: &[u8]) -> Result<(), KvError> {
        if index <= self.applied_index() {
            return Ok(());
        }

        let mut st = GroupState::decode_snapshot(data)?;
        if st.gid != self.gid {
            return Err(StorageError::DBError(format!(
                "snapshot of group {} installed on group {}",
                st.gid, self.gid
            ))
            .into());
        }
        st.applied_index = index;

        self.storage.save_snapshot(index, data)?;
        *self.state.write() = st;
        self.snapshot_index.store(index, Ordering::SeqCst);
        self.waiters.skip_to(index);

        info!("snapshot installed"; "name" => &self.name, "index" => index);
        Ok(())
    }

    /// maybe_snapshot saves the group state and compacts the log once `snapshot_threshold`
    /// entries were applied since the last snapshot.
    pub fn maybe_snapshot(&self) -> Result<(), KvError> {
        let threshold = self.conf.snapshot_threshold;
        if threshold == 0 {
            return Ok(());
        }

        let (index, data) = {
            let st = self.state.read();
            if st.applied_index < self.snapshot_index() + threshold {
                return Ok(());
            }
            (st.applied_index, st.encode_snapshot()?)
        };

        self.storage.save_snapshot(index, &data)?;
        self.log.compact(index, data)?;
        self.snapshot_index.store(index, Ordering::SeqCst);

        info!("snapshot taken"; "name" => &self.name, "index" => index);
        Ok(())
    }
}

/// apply_command changes the group state by one command. Rejected commands change nothing.
fn apply_command(st: &mut GroupState, cmd: Command) -> ApplyResult {
    match cmd {
        Command::Op(op) => st.execute(&op).map_err(|e| match e {
            StorageError::NotOwned(shard) => KvError::WrongGroup(shard),
            e => KvError::Storage(e),
        }),

        Command::Config(next) => {
            st.apply_config(&next)?;
            info!("config applied";
                "gid" => st.gid,
                "num" => next.num,
                "shards" => ?next.shards,
                "pulling" => ?st.pulling());
            Ok(OpReply::Ok)
        }

        Command::Install(t) => {
            let (shard, num) = (t.shard, t.config_num);
            st.install(t)?;
            info!("shard installed"; "gid" => st.gid, "shard" => shard, "config" => num);
            Ok(OpReply::Ok)
        }

        Command::Gc { shard, config_num } => {
            if st.gc(shard, config_num) {
                info!("shard dropped"; "gid" => st.gid, "shard" => shard, "config" => config_num);
            }
            Ok(OpReply::Ok)
        }

        Command::GcAck { shard, config_num } => {
            st.gc_ack(shard, config_num);
            Ok(OpReply::Ok)
        }
    }
}
