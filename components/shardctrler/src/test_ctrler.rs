use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use crate::*;

fn one(gid: Gid) -> BTreeMap<Gid, Vec<String>> {
    let mut m = BTreeMap::new();
    m.insert(gid, vec![format!("g{}-0", gid)]);
    m
}

#[tokio::test]
async fn test_ctrler_join_leave() {
    let c = MemCoordinator::new();

    let c1 = c.join(one(1)).unwrap();
    assert_eq!(1, c1.num);
    assert_eq!(vec![1; N_SHARDS], c1.shards);

    let c2 = c.join(one(2)).unwrap();
    assert_eq!(2, c2.num);
    assert_eq!(5, c2.shards_of(1).len());
    assert_eq!(5, c2.shards_of(2).len());

    assert_eq!(Err(CtrlerError::DupGroup(2)), c.join(one(2)));
    assert_eq!(Err(CtrlerError::InvalidGid(0)), c.join(one(0)));

    let c3 = c.leave(&[1]).unwrap();
    assert_eq!(3, c3.num);
    assert_eq!(vec![2; N_SHARDS], c3.shards);
    assert!(!c3.has_group(1));

    assert_eq!(Err(CtrlerError::UnknownGroup(1)), c.leave(&[1]));

    // history is kept
    assert_eq!(c1, c.query_config(1).await.unwrap());
    assert_eq!(c2, c.query_config(2).await.unwrap());
    assert_eq!(c3, c.query_latest().await.unwrap());

    // beyond latest returns latest
    assert_eq!(c3, c.query_config(100).await.unwrap());
}

#[tokio::test]
async fn test_ctrler_move() {
    let c = MemCoordinator::new();
    c.join(one(1)).unwrap();
    c.join(one(2)).unwrap();

    let before = c.latest();
    let mv = c.move_shard(0, 2).unwrap();
    assert_eq!(before.num + 1, mv.num);
    assert_eq!(2, mv.owner(0));
    for s in 1..N_SHARDS {
        assert_eq!(before.owner(s), mv.owner(s));
    }

    assert_eq!(Err(CtrlerError::BadShard(N_SHARDS)), c.move_shard(N_SHARDS, 1));
    assert_eq!(Err(CtrlerError::UnknownGroup(9)), c.move_shard(0, 9));
}

#[tokio::test]
async fn test_ctrler_unreachable() {
    let c = MemCoordinator::new();
    c.set_reachable(false);

    assert_eq!(Err(CtrlerError::Unavailable), c.query_latest().await);
    assert_eq!(Err(CtrlerError::Unavailable), c.join(one(1)));

    c.set_reachable(true);
    assert_eq!(0, c.query_latest().await.unwrap().num);
}
