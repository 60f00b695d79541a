use clap::{App, Arg};

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use shardkv::clerk::Clerk;
use shardkv::conf::ClusterConf;
use shardkv::setup::init_logger;
use shardkv::Server;
use shardkv::ServerError;

#[macro_use]
extern crate slog_global;

const HELP: &str = "commands:
    get <key>
    put <key> <value>
    append <key> <value>
    join <gid>...
    leave <gid>...
    move <shard> <gid>
    query
    crash <gid> <rid>
    restart <gid> <rid>
    elect <gid> <rid>
    quit";

fn parse_nums(args: &[&str]) -> Result<Vec<u64>, String> {
    args.iter()
        .map(|a| a.parse::<u64>().map_err(|e| format!("bad number {}: {}", a, e)))
        .collect()
}

fn two_nums(args: &[&str]) -> Result<(u64, u64), String> {
    match parse_nums(args)?.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err("expect 2 numbers".to_string()),
    }
}

/// exec runs one command line and returns what to print.
async fn exec(srv: &mut Server, ck: &mut Clerk, line: &str) -> Result<String, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (cmd, args) = match words.split_first() {
        Some((c, a)) => (*c, a),
        None => return Ok(String::new()),
    };

    let e2s = |e: ServerError| e.to_string();

    let out = match (cmd, args) {
        ("get", [k]) => match ck.get(k).await {
            Some(v) => v,
            None => "(nil)".to_string(),
        },
        ("put", [k, v]) => {
            ck.put(k, v).await;
            "OK".to_string()
        }
        ("append", [k, v]) => {
            ck.append(k, v).await;
            "OK".to_string()
        }
        ("join", gids) if !gids.is_empty() => {
            let c = srv.join_groups(&parse_nums(gids)?).map_err(e2s)?;
            format!("config {}: {:?}", c.num, c.shards)
        }
        ("leave", gids) if !gids.is_empty() => {
            let c = srv.leave_groups(&parse_nums(gids)?).map_err(e2s)?;
            format!("config {}: {:?}", c.num, c.shards)
        }
        ("move", a) => {
            let (shard, gid) = two_nums(a)?;
            let c = srv.move_shard(shard as usize, gid).map_err(e2s)?;
            format!("config {}: {:?}", c.num, c.shards)
        }
        ("query", []) => {
            let c = srv.ctrler().latest();
            format!("config {}: {:?}", c.num, c.shards)
        }
        ("crash", a) => {
            let (gid, rid) = two_nums(a)?;
            srv.crash(gid, rid).await.map_err(e2s)?;
            "OK".to_string()
        }
        ("restart", a) => {
            let (gid, rid) = two_nums(a)?;
            srv.restart(gid, rid).map_err(e2s)?;
            "OK".to_string()
        }
        ("elect", a) => {
            let (gid, rid) = two_nums(a)?;
            srv.elect(gid, rid, true).map_err(e2s)?;
            "OK".to_string()
        }
        _ => return Err(HELP.to_string()),
    };

    Ok(out)
}

#[tokio::main]
async fn main() {
    let matches = App::new("shardkv")
        .version("0.1.0")
        .author("openacid")
        .about("sharded key-value store")
        .arg(
            Arg::with_name("conf")
                .long("conf")
                .takes_value(true)
                .required(true)
                .help("cluster conf in yaml"),
        )
        .get_matches();

    // required by clap
    let conffn = matches.value_of("conf").unwrap_or_default();

    let conf = match ClusterConf::from_file(conffn) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fail to load {}: {}", conffn, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logger(&conf.log) {
        eprintln!("fail to init logger: {}", e);
        std::process::exit(1);
    }

    let mut srv = match Server::new(conf) {
        Ok(s) => s,
        Err(e) => {
            error!("fail to create server"; "err" => %e);
            std::process::exit(1);
        }
    };

    if let Err(e) = srv.start() {
        error!("fail to start server"; "err" => %e);
        std::process::exit(1);
    }

    let mut ck = srv.clerk();
    info!("shardkv started"; "client" => ck.client_id());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                error!("fail to read stdin"; "err" => %e);
                break;
            }
        };

        if line.trim() == "quit" {
            break;
        }

        match exec(&mut srv, &mut ck, &line).await {
            Ok(out) => println!("{}", out),
            Err(msg) => println!("{}", msg),
        }
    }

    if let Err(e) = srv.stop() {
        warn!("fail to stop server"; "err" => %e);
    }
    if let Err(e) = srv.join().await {
        warn!("fail to join server"; "err" => %e);
    }
}
