use std::io::Write;

use pretty_assertions::assert_eq;

use super::*;

fn load_conf(cont: &str) -> Result<(tempfile::NamedTempFile, ClusterConf), ConfError> {
    let mut f = tempfile::NamedTempFile::new()?;
    f.write_all(cont.as_bytes()).unwrap();
    f.as_file().sync_all().unwrap();

    let c = ClusterConf::from_file(f.path())?;
    Ok((f, c))
}

#[test]
fn test_conf_serde_yaml() {
    let cont = "
groups:
    100: [g100-0, g100-1, g100-2]
    101:
    -   g101-0
timeouts:
    request_ms: 300
    poll_ms: 20
snapshot_threshold: 50
log:
    path: /tmp/shardkv.log
    level: debug
";

    let (_tmpf, c) = load_conf(cont).unwrap();

    assert_eq!(2, c.groups.len());
    assert_eq!(
        vec!["g100-0", "g100-1", "g100-2"],
        c.groups.get(&100).unwrap().clone()
    );
    assert_eq!(vec!["g101-0"], c.groups.get(&101).unwrap().clone());

    assert_eq!(300, c.timeouts.request_ms);
    assert_eq!(20, c.timeouts.poll_ms);
    // unset fields keep defaults
    assert_eq!(Timeouts::default().migrate_ms, c.timeouts.migrate_ms);

    assert_eq!(50, c.snapshot_threshold);
    assert_eq!(Some("/tmp/shardkv.log".to_string()), c.log.path);
    assert_eq!("debug", c.log.level);

    assert_eq!(Some((100, 1)), c.find_replica("g100-1"));
    assert_eq!(Some((101, 0)), c.find_replica("g101-0"));
    assert_eq!(None, c.find_replica("g102-0"));
}

#[test]
fn test_conf_defaults() {
    let c = ClusterConf::from_str("groups: {1: [a]}").unwrap();
    assert_eq!(Timeouts::default(), c.timeouts);
    assert_eq!(LogConf::default(), c.log);
    assert_eq!(1000, c.snapshot_threshold);
}

#[test]
fn test_conf_invalid() {
    let cases = vec![
        ("groups: {0: [a]}", ConfError::InvalidGid(0)),
        ("groups: {3: []}", ConfError::EmptyGroup(3)),
        (
            "groups: {1: [a, b], 2: [c, b]}",
            ConfError::DupReplica("b".to_string()),
        ),
        (
            "groups: {1: [a]}\ntimeouts: {request_ms: 0}",
            ConfError::BadValue("timeouts.request_ms"),
        ),
        (
            "groups: {1: [a]}\ntimeouts: {backoff_base_ms: 100, backoff_max_ms: 10}",
            ConfError::BadValue("timeouts.backoff_max_ms"),
        ),
    ];

    for (cont, want) in cases.into_iter() {
        let rst = ClusterConf::from_str(cont);
        assert_eq!(want, rst.err().unwrap(), "conf: {}", cont);
    }
}

#[test]
fn test_conf_bad_yaml() {
    let rst = ClusterConf::from_str("groups: [1, 2");
    match rst {
        Err(ConfError::BadYaml(_)) => {}
        other => panic!("expect BadYaml but: {:?}", other),
    }

    let rst = load_conf("");
    assert!(rst.is_err());

    let rst = ClusterConf::from_file("/no/such/file.yaml");
    assert_eq!(
        ConfError::IOError(std::io::Error::from(std::io::ErrorKind::NotFound)),
        rst.err().unwrap()
    );
}
