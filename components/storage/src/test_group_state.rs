use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use shardctrler::key2shard;
use shardctrler::Config;
use shardctrler::Gid;
use shardctrler::ShardId;
use shardctrler::N_SHARDS;

use crate::GroupState;
use crate::Op;
use crate::OpReply;
use crate::ShardData;
use crate::ShardStatus;
use crate::ShardTransfer;
use crate::StorageError;

/// key_of finds a key that hashes to `shard`.
fn key_of(shard: ShardId) -> String {
    (0..)
        .map(|i| format!("k{}", i))
        .find(|k| key2shard(k) == shard)
        .unwrap()
}

/// config builds config `num` with groups named by `owners`.
fn config(num: u64, owners: [Gid; N_SHARDS]) -> Config {
    let mut groups = BTreeMap::new();
    for g in owners.iter() {
        if *g != 0 {
            groups.insert(*g, vec![format!("g{}-0", g)]);
        }
    }

    let mut c = Config::initial();
    c.num = num;
    c.shards = owners.to_vec();
    c.set_groups(groups);
    c
}

#[test]
fn test_group_state_new() {
    let st = GroupState::new(100);
    assert_eq!(0, st.config.num);
    assert_eq!(N_SHARDS, st.shards.len());
    assert!(st.settled());
    assert!(st.owned().is_empty());

    for s in 0..N_SHARDS {
        assert_eq!(ShardStatus::NotOwned, st.status(s));
    }
    assert_eq!(ShardStatus::NotOwned, st.status(N_SHARDS));
}

#[test]
fn test_group_state_execute_not_owned() {
    let mut st = GroupState::new(1);

    let op = Op::put("a", "1", 1, 1);
    let r = st.execute(&op);
    assert_eq!(Err(StorageError::NotOwned(key2shard("a"))), r);

    // nothing is recorded for a rejected op
    for s in st.shards.iter() {
        assert!(s.data.dedup.is_empty());
        assert!(s.data.kv.is_empty());
    }
}

#[test]
fn test_group_state_first_config() {
    let mut st = GroupState::new(1);
    st.apply_config(&config(1, [1, 1, 1, 1, 1, 2, 2, 2, 2, 2]))
        .unwrap();

    // shards owned by nobody before are served right away
    assert_eq!(vec![0, 1, 2, 3, 4], st.owned());
    assert!(st.settled());

    let k = key_of(0);
    assert!(st.serves(&k));
    assert_eq!(OpReply::Ok, st.execute(&Op::put(&k, "v", 1, 1)).unwrap());
    assert_eq!(
        OpReply::Value("v".to_string()),
        st.execute(&Op::get(&k, 1, 2)).unwrap()
    );

    let k5 = key_of(5);
    assert!(!st.serves(&k5));
    assert_eq!(
        Err(StorageError::NotOwned(5)),
        st.execute(&Op::get(&k5, 1, 3))
    );
}

#[test]
fn test_group_state_config_order() {
    let mut st = GroupState::new(1);

    let r = st.apply_config(&config(2, [1; N_SHARDS]));
    assert_eq!(Err(StorageError::ConfigOutOfOrder(0, 2)), r);

    st.apply_config(&config(1, [1; N_SHARDS])).unwrap();

    let r = st.apply_config(&config(1, [1; N_SHARDS]));
    assert_eq!(Err(StorageError::ConfigOutOfOrder(1, 1)), r);
    assert_eq!(1, st.config.num);
}

#[test]
fn test_group_state_hand_off() {
    let c1 = config(1, [1; N_SHARDS]);
    let c2 = config(2, [1, 1, 1, 1, 1, 2, 2, 2, 2, 2]);

    let mut g1 = GroupState::new(1);
    let mut g2 = GroupState::new(2);

    g1.apply_config(&c1).unwrap();
    g2.apply_config(&c1).unwrap();

    let k7 = key_of(7);
    g1.execute(&Op::put(&k7, "x", 9, 1)).unwrap();
    g1.execute(&Op::append(&k7, "y", 9, 2)).unwrap();

    // g2 asks too early
    assert_eq!(Err(StorageError::NotReady(1, 2)), g1.export(7, 2));

    g1.apply_config(&c2).unwrap();
    g2.apply_config(&c2).unwrap();

    assert_eq!(ShardStatus::NotOwned, g1.status(7));
    assert_eq!(ShardStatus::Pulling { from: 1, num: 2 }, g2.status(7));
    assert_eq!(
        vec![(5, 1, 2), (6, 1, 2), (7, 1, 2), (8, 1, 2), (9, 1, 2)],
        g2.pulling()
    );
    assert!(!g2.settled());

    // g1 stops serving the shard as soon as the config is applied
    assert_eq!(
        Err(StorageError::NotOwned(7)),
        g1.execute(&Op::get(&k7, 9, 3))
    );

    // g2 can not serve it until it is installed
    assert_eq!(
        Err(StorageError::NotOwned(7)),
        g2.execute(&Op::get(&k7, 9, 3))
    );

    // g2 can not move on either
    let c3 = config(3, [2; N_SHARDS]);
    assert_eq!(
        Err(StorageError::MigrationUnsettled(2)),
        g2.apply_config(&c3)
    );

    assert_eq!(Err(StorageError::NotOwner(0, 2)), g1.export(0, 2));

    for s in 5..N_SHARDS {
        let t = g1.export(s, 2).unwrap();
        g2.install(t).unwrap();
    }

    assert!(g2.settled());
    assert_eq!(
        OpReply::Value("xy".to_string()),
        g2.execute(&Op::get(&k7, 9, 3)).unwrap()
    );

    // the dedup entries moved with the shard: a retried append is not applied twice
    g2.execute(&Op::append(&k7, "y", 9, 2)).unwrap();
    assert_eq!(Some(&"xy".to_string()), g2.shards[7].data.kv.get(&k7));

    // installing again is rejected
    let t = g1.export(7, 2).unwrap();
    assert_eq!(Err(StorageError::StaleTransfer(7, 2)), g2.install(t));

    assert_eq!(5, g2.gc_pending.len());
    assert_eq!(Some(&1), g2.gc_pending.get(&(2, 7)));

    // gc on the old owner, then ack on the new one
    assert!(g1.gc(7, 2));
    assert!(!g1.gc(7, 2));
    assert_eq!(Err(StorageError::NotOwner(7, 2)), g1.export(7, 2));

    assert!(g2.gc_ack(7, 2));
    assert!(!g2.gc_ack(7, 2));
    assert_eq!(4, g2.gc_pending.len());

    g2.apply_config(&c3).unwrap();
    assert_eq!(3, g2.config.num);
    assert_eq!(2, g2.prev_config.num);
}

#[test]
fn test_group_state_install_rejects() {
    let mut g2 = GroupState::new(2);
    g2.apply_config(&config(1, [1; N_SHARDS])).unwrap();
    g2.apply_config(&config(2, [1, 1, 1, 1, 1, 2, 2, 2, 2, 2]))
        .unwrap();

    // stale config
    let t = ShardTransfer {
        shard: 5,
        config_num: 1,
        data: ShardData::default(),
    };
    assert_eq!(Err(StorageError::StaleTransfer(5, 1)), g2.install(t));

    // shard not being pulled
    let t = ShardTransfer {
        shard: 0,
        config_num: 2,
        data: ShardData::default(),
    };
    assert_eq!(Err(StorageError::StaleTransfer(0, 2)), g2.install(t));

    // a key of another shard
    let mut data = ShardData::default();
    data.kv.insert(key_of(3), "v".to_string());
    let t = ShardTransfer {
        shard: 5,
        config_num: 2,
        data,
    };
    match g2.install(t) {
        Err(StorageError::InvalidTransfer(_)) => {}
        other => panic!("expect InvalidTransfer but: {:?}", other),
    }

    assert_eq!(ShardStatus::Pulling { from: 1, num: 2 }, g2.status(5));
}

#[test]
fn test_group_state_leave_all() {
    let mut g1 = GroupState::new(1);
    g1.apply_config(&config(1, [1; N_SHARDS])).unwrap();

    let k = key_of(4);
    g1.execute(&Op::put(&k, "v", 1, 1)).unwrap();

    // no group left: the data is kept in the outbox
    g1.apply_config(&config(2, [0; N_SHARDS])).unwrap();
    assert!(g1.owned().is_empty());
    assert_eq!(N_SHARDS, g1.outbox.len());

    let t = g1.export(4, 2).unwrap();
    assert_eq!(Some(&"v".to_string()), t.data.kv.get(&k));
}

#[test]
fn test_group_state_rejoin_after_leave_all() {
    let mut g1 = GroupState::new(1);
    let mut g2 = GroupState::new(2);

    let k = key_of(4);
    let configs = vec![
        config(1, [1; N_SHARDS]),
        config(2, [0; N_SHARDS]),
        config(3, [2; N_SHARDS]),
    ];

    g1.apply_config(&configs[0]).unwrap();
    g1.execute(&Op::put(&k, "1", 7, 1)).unwrap();

    for c in configs.iter() {
        if c.num > 1 {
            g1.apply_config(c).unwrap();
        }
        g2.apply_config(c).unwrap();
    }

    // config 3 assigns every shard again, no orphan is left
    assert!(g1.orphans.is_empty());
    assert!(g2.orphans.is_empty());

    // the new owner pulls from the group that held the data before config 2
    assert_eq!(ShardStatus::Pulling { from: 1, num: 2 }, g2.status(4));
    assert_eq!(N_SHARDS, g2.pulling().len());
    assert_eq!(
        Err(StorageError::NotOwned(4)),
        g2.execute(&Op::get(&k, 8, 1))
    );

    // a transfer tagged with the config of the assignment is not the one asked for
    let t = ShardTransfer {
        shard: 4,
        config_num: 3,
        data: ShardData::default(),
    };
    assert_eq!(Err(StorageError::StaleTransfer(4, 3)), g2.install(t));

    for s in 0..N_SHARDS {
        g2.install(g1.export(s, 2).unwrap()).unwrap();
    }

    assert!(g2.settled());
    assert_eq!(
        OpReply::Value("1".to_string()),
        g2.execute(&Op::get(&k, 8, 1)).unwrap()
    );
    assert_eq!(Some(&1), g2.gc_pending.get(&(2, 4)));

    assert!(g1.gc(4, 2));
    assert!(g2.gc_ack(4, 2));
}

#[test]
fn test_group_state_orphans() {
    let mut g1 = GroupState::new(1);

    let k = key_of(0);
    g1.apply_config(&config(1, [1; N_SHARDS])).unwrap();
    g1.execute(&Op::put(&k, "v", 7, 1)).unwrap();

    g1.apply_config(&config(2, [0; N_SHARDS])).unwrap();
    assert_eq!(N_SHARDS, g1.orphans.len());
    assert_eq!(Some(&(1, 2)), g1.orphans.get(&0));

    // still unowned: the last holder does not change
    g1.apply_config(&config(3, [0; N_SHARDS])).unwrap();
    assert_eq!(Some(&(1, 2)), g1.orphans.get(&0));

    // shard 0 comes back to its last holder: served from the outbox at once
    g1.apply_config(&config(4, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0]))
        .unwrap();
    assert_eq!(ShardStatus::Owned, g1.status(0));
    assert!(g1.settled());
    assert!(!g1.orphans.contains_key(&0));
    assert!(!g1.outbox.contains_key(&(2, 0)));
    assert_eq!(N_SHARDS - 1, g1.outbox.len());

    assert_eq!(
        OpReply::Value("v".to_string()),
        g1.execute(&Op::get(&k, 8, 1)).unwrap()
    );
    // the dedup entry came back with it
    assert_eq!(OpReply::Ok, g1.execute(&Op::put(&k, "again", 7, 1)).unwrap());
    assert_eq!(Some(&"v".to_string()), g1.shards[0].data.kv.get(&k));

    // a shard no group ever owned starts empty
    let mut g3 = GroupState::new(3);
    g3.apply_config(&config(1, [0; N_SHARDS])).unwrap();
    assert!(g3.orphans.is_empty());
    g3.apply_config(&config(2, [3; N_SHARDS])).unwrap();
    assert_eq!(N_SHARDS, g3.owned().len());
}

#[test]
fn test_group_state_duplicate_after_hand_off() {
    let c1 = config(1, [1; N_SHARDS]);
    let c2 = config(2, [2; N_SHARDS]);

    let mut g1 = GroupState::new(1);
    let mut g2 = GroupState::new(2);
    g1.apply_config(&c1).unwrap();
    g2.apply_config(&c1).unwrap();

    let k = key_of(3);
    assert_eq!(OpReply::NoKey, g1.execute(&Op::get(&k, 5, 1)).unwrap());
    g1.execute(&Op::append(&k, "x", 5, 2)).unwrap();

    g1.apply_config(&c2).unwrap();
    g2.apply_config(&c2).unwrap();

    // the old owner rejects the retry and records nothing
    assert_eq!(
        Err(StorageError::NotOwned(3)),
        g1.execute(&Op::append(&k, "x", 5, 2))
    );
    assert!(g1.shards[3].data.dedup.is_empty());

    g2.install(g1.export(3, 2).unwrap()).unwrap();

    // the new owner answers the retry from the cached reply without applying it again
    assert_eq!(OpReply::Ok, g2.execute(&Op::append(&k, "x", 5, 2)).unwrap());
    assert_eq!(Some(&"x".to_string()), g2.shards[3].data.kv.get(&k));

    // an older request of the same client gets the latest cached reply
    assert_eq!(OpReply::Ok, g2.execute(&Op::get(&k, 5, 1)).unwrap());

    assert_eq!(OpReply::Ok, g2.execute(&Op::append(&k, "y", 5, 3)).unwrap());
    assert_eq!(Some(&"xy".to_string()), g2.shards[3].data.kv.get(&k));
}

#[test]
fn test_group_state_snapshot() {
    let mut g1 = GroupState::new(1);
    g1.apply_config(&config(1, [1; N_SHARDS])).unwrap();

    for s in 0..N_SHARDS {
        let k = key_of(s);
        g1.execute(&Op::put(&k, &format!("v{}", s), 3, s as u64 + 1))
            .unwrap();
    }

    g1.apply_config(&config(2, [1, 1, 1, 1, 1, 2, 2, 2, 2, 2]))
        .unwrap();
    g1.applied_index = 42;

    let mut g2 = GroupState::new(2);
    g2.apply_config(&config(1, [1; N_SHARDS])).unwrap();
    g2.apply_config(&config(2, [1, 1, 1, 1, 1, 2, 2, 2, 2, 2]))
        .unwrap();
    g2.install(g1.export(6, 2).unwrap()).unwrap();

    let mut g3 = GroupState::new(3);
    g3.apply_config(&config(1, [1; N_SHARDS])).unwrap();
    g3.apply_config(&config(2, [0, 0, 0, 0, 0, 1, 1, 1, 1, 1]))
        .unwrap();
    assert_eq!(5, g3.orphans.len());

    for st in vec![g1, g2, g3].into_iter() {
        let byts = st.encode_snapshot().unwrap();
        let got = GroupState::decode_snapshot(&byts).unwrap();
        assert_eq!(st, got);

        // encoding is deterministic
        assert_eq!(byts, got.encode_snapshot().unwrap());
    }

    assert!(GroupState::decode_snapshot(b"\xff\xff\xff").is_err());
}

#[test]
fn test_transfer_bytes() {
    let k = key_of(2);
    let mut data = ShardData::default();
    data.execute(&Op::put(&k, "v", 5, 1));
    data.execute(&Op::get(&k, 6, 3));

    let t = ShardTransfer {
        shard: 2,
        config_num: 4,
        data,
    };

    let byts = t.to_bytes().unwrap();
    let got = ShardTransfer::from_bytes(&byts).unwrap();
    assert_eq!(t, got);
    got.validate(2, 4).unwrap();

    assert!(got.validate(3, 4).is_err());
    assert!(got.validate(2, 5).is_err());
}
