use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::replica::ShardKv;
use crate::Command;
use crate::KvError;

impl ShardKv {
    /// poll_once proposes the config after the current one, if the controller has it.
    ///
    /// Only the leader polls, and only once every shard of the current config is served, so a
    /// group is never more than one config ahead of its data. It returns true if a config was
    /// proposed.
    pub async fn poll_once(&self) -> Result<bool, KvError> {
        if !self.log.is_leader() {
            return Ok(false);
        }

        let (num, settled) = {
            let st = self.state.read();
            (st.config.num, st.settled())
        };

        if !settled {
            return Ok(false);
        }

        let next = self.ctrler.query_config(num + 1).await?;
        if next.num != num + 1 {
            return Ok(false);
        }

        let p = self.log.propose(Command::Config(next))?;
        info!("config proposed"; "name" => &self.name, "num" => num + 1, "index" => p.index);

        Ok(true)
    }

    pub async fn run_poller(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = sleep(self.conf.timeouts.poll()) => {},
                _ = stop.changed() => break,
            }

            if let Err(e) = self.poll_once().await {
                debug!("poll failed"; "name" => &self.name, "err" => %e);
            }
        }
    }
}
