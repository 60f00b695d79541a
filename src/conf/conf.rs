use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use shardctrler::Gid;

use super::errors::ConfError;

/// Timeouts of a replica and a client, in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    /// How long a dispatcher waits for its proposal to be applied.
    pub request_ms: u64,

    /// How often the leader asks the controller for the next config.
    pub poll_ms: u64,

    /// How often the leader pulls missing shards and confirms hand-offs.
    pub migrate_ms: u64,

    /// First and largest delay between retries of a failed pull.
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            request_ms: 1000,
            poll_ms: 100,
            migrate_ms: 50,
            backoff_base_ms: 10,
            backoff_max_ms: 1000,
        }
    }
}

impl Timeouts {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn migrate(&self) -> Duration {
        Duration::from_millis(self.migrate_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LogConf {
    /// Log file to append to. Logs go to stderr if absent.
    pub path: Option<String>,

    /// One of trace, debug, info, warn, error, critical.
    pub level: String,
}

impl Default for LogConf {
    fn default() -> Self {
        LogConf {
            path: None,
            level: "info".to_string(),
        }
    }
}

/// ClusterConf describes the replica groups run by one process and how they behave.
///
/// ```yaml
/// groups:
///     100: [g100-0, g100-1, g100-2]
///     101: [g101-0, g101-1, g101-2]
/// timeouts:
///     request_ms: 500
/// snapshot_threshold: 1000
/// log:
///     path: /tmp/shardkv.log
///     level: debug
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClusterConf {
    /// Replica names of every group. The position of a name is its replica id in the group.
    pub groups: BTreeMap<Gid, Vec<String>>,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Take a snapshot and compact the log every this many applied entries. 0 disables it.
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: u64,

    #[serde(default)]
    pub log: LogConf,
}

fn default_snapshot_threshold() -> u64 {
    1000
}

impl ClusterConf {
    /// from_file read cluster conf yaml from a local file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ClusterConf, ConfError> {
        let content = fs::read_to_string(path)?;
        ClusterConf::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<ClusterConf, ConfError> {
        let conf: ClusterConf = serde_yaml::from_str(content)?;
        conf.check()?;
        Ok(conf)
    }

    /// check rejects gid 0, empty groups, a replica name used twice and zero intervals.
    pub fn check(&self) -> Result<(), ConfError> {
        let mut names = BTreeSet::new();

        for (gid, servers) in self.groups.iter() {
            if *gid == 0 {
                return Err(ConfError::InvalidGid(*gid));
            }
            if servers.is_empty() {
                return Err(ConfError::EmptyGroup(*gid));
            }
            for s in servers.iter() {
                if !names.insert(s.clone()) {
                    return Err(ConfError::DupReplica(s.clone()));
                }
            }
        }

        let t = &self.timeouts;
        if t.request_ms == 0 {
            return Err(ConfError::BadValue("timeouts.request_ms"));
        }
        if t.poll_ms == 0 {
            return Err(ConfError::BadValue("timeouts.poll_ms"));
        }
        if t.migrate_ms == 0 {
            return Err(ConfError::BadValue("timeouts.migrate_ms"));
        }
        if t.backoff_base_ms == 0 || t.backoff_max_ms < t.backoff_base_ms {
            return Err(ConfError::BadValue("timeouts.backoff_max_ms"));
        }

        Ok(())
    }

    /// find_replica returns the gid and replica id of a replica name.
    pub fn find_replica(&self, name: &str) -> Option<(Gid, u64)> {
        for (gid, servers) in self.groups.iter() {
            if let Some(i) = servers.iter().position(|s| s == name) {
                return Some((*gid, i as u64));
            }
        }
        None
    }
}
