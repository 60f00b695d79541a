use std::collections::BTreeMap;

use prost::Message;

/// Number of shards the key space is split into. It never changes.
pub const N_SHARDS: usize = 10;

/// Gid identifies a replica group. Gid 0 is reserved for "no group".
pub type Gid = u64;

pub type ShardId = usize;

pub type ConfigNum = u64;

/// key2shard maps a key to its shard with a 32-bit FNV-1a hash.
pub fn key2shard(key: &str) -> ShardId {
    let mut h: u32 = 0x811c_9dc5;
    for b in key.as_bytes() {
        h ^= *b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    (h as usize) % N_SHARDS
}

/// Group lists the servers of one replica group.
#[derive(Clone, PartialEq, Message)]
pub struct Group {
    #[prost(uint64, tag = "1")]
    pub gid: u64,
    #[prost(string, repeated, tag = "2")]
    pub servers: Vec<String>,
}

/// Config is a numbered assignment of every shard to a group.
///
/// `shards[i]` is the gid serving shard `i`, or 0 if the shard is unassigned.
/// `groups` is kept sorted by gid so that two equal configs encode to identical bytes.
#[derive(Clone, PartialEq, Message)]
pub struct Config {
    #[prost(uint64, tag = "1")]
    pub num: u64,
    #[prost(uint64, repeated, tag = "2")]
    pub shards: Vec<u64>,
    #[prost(message, repeated, tag = "3")]
    pub groups: Vec<Group>,
}

impl Config {
    /// initial returns config 0: no groups and every shard unassigned.
    pub fn initial() -> Config {
        Config {
            num: 0,
            shards: vec![0; N_SHARDS],
            groups: vec![],
        }
    }

    /// owner returns the gid serving `shard`, 0 if none.
    pub fn owner(&self, shard: ShardId) -> Gid {
        self.shards.get(shard).copied().unwrap_or(0)
    }

    pub fn servers(&self, gid: Gid) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.gid == gid)
            .map(|g| g.servers.as_slice())
    }

    pub fn gids(&self) -> Vec<Gid> {
        self.groups.iter().map(|g| g.gid).collect()
    }

    pub fn has_group(&self, gid: Gid) -> bool {
        self.groups.iter().any(|g| g.gid == gid)
    }

    /// shards_of returns shards assigned to `gid`, in ascending order.
    pub fn shards_of(&self, gid: Gid) -> Vec<ShardId> {
        (0..N_SHARDS).filter(|s| self.owner(*s) == gid).collect()
    }

    /// group_map returns groups as a gid → servers map.
    pub fn group_map(&self) -> BTreeMap<Gid, Vec<String>> {
        self.groups
            .iter()
            .map(|g| (g.gid, g.servers.clone()))
            .collect()
    }

    /// set_groups replaces all groups, keeping them sorted by gid.
    pub fn set_groups(&mut self, groups: BTreeMap<Gid, Vec<String>>) {
        self.groups = groups
            .into_iter()
            .map(|(gid, servers)| Group { gid, servers })
            .collect();
    }

    /// next returns a copy of this config numbered `num + 1`.
    pub fn next(&self) -> Config {
        let mut c = self.clone();
        c.num += 1;
        if c.shards.len() != N_SHARDS {
            c.shards.resize(N_SHARDS, 0);
        }
        c
    }

    /// rebalance spreads shards over the current groups as evenly as possible while moving as
    /// few shards as possible.
    ///
    /// Shards of groups that are gone are freed first. Then groups are ranked by their load,
    /// heaviest first and ties broken by gid; the first `N_SHARDS % n` groups may keep one
    /// extra shard. Shards above a group's quota are freed and handed, in shard order, to the
    /// groups below quota in rank order.
    pub fn rebalance(&mut self) {
        self.shards.resize(N_SHARDS, 0);

        let gids = self.gids();
        if gids.is_empty() {
            for s in self.shards.iter_mut() {
                *s = 0;
            }
            return;
        }

        let mut load: BTreeMap<Gid, Vec<ShardId>> = gids.iter().map(|g| (*g, vec![])).collect();
        let mut free = vec![];

        for (shard, gid) in self.shards.iter().enumerate() {
            match load.get_mut(gid) {
                Some(owned) => owned.push(shard),
                None => free.push(shard),
            }
        }

        let mut ranked: Vec<Gid> = gids.clone();
        ranked.sort_by(|a, b| load[b].len().cmp(&load[a].len()).then(a.cmp(b)));

        let n = ranked.len();
        let base = N_SHARDS / n;
        let extra = N_SHARDS % n;
        let quota = |rank: usize| if rank < extra { base + 1 } else { base };

        for (rank, gid) in ranked.iter().enumerate() {
            if let Some(owned) = load.get_mut(gid) {
                while owned.len() > quota(rank) {
                    if let Some(s) = owned.pop() {
                        free.push(s);
                    }
                }
            }
        }

        free.sort();
        let mut free = free.into_iter();

        for (rank, gid) in ranked.iter().enumerate() {
            if let Some(owned) = load.get_mut(gid) {
                while owned.len() < quota(rank) {
                    match free.next() {
                        Some(s) => owned.push(s),
                        None => break,
                    }
                }
            }
        }

        for (gid, owned) in load.iter() {
            for s in owned.iter() {
                self.shards[*s] = *gid;
            }
        }
    }
}
