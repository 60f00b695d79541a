use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use slog::Drain;
use slog::Level;

use super::log_format::KvFormat;
use crate::conf::ConfError;
use crate::conf::LogConf;

/// parse_level accepts full and short level names, case-insensitive.
pub fn parse_level(s: &str) -> Result<Level, ConfError> {
    let l = match s.to_lowercase().as_str() {
        "trace" | "trce" => Level::Trace,
        "debug" | "debg" => Level::Debug,
        "info" => Level::Info,
        "warn" | "warning" => Level::Warning,
        "error" | "erro" => Level::Error,
        "critical" | "crit" => Level::Critical,
        _ => return Err(ConfError::BadLevel(s.to_string())),
    };
    Ok(l)
}

/// init_logger installs the global logger: to the file in `conf.path`, or to stderr.
pub fn init_logger(conf: &LogConf) -> Result<(), ConfError> {
    let level = parse_level(&conf.level)?;

    let logger = match &conf.path {
        Some(p) => {
            let file = open_log_file(p)?;
            let decorator = slog_term::PlainDecorator::new(file);
            build_logger(KvFormat::new(decorator), level)
        }
        None => {
            let decorator = slog_term::PlainDecorator::new(io::stderr());
            build_logger(KvFormat::new(decorator), level)
        }
    };

    slog_global::set_global(logger);

    info!("logger ready"; "level" => level.as_str(), "path" => ?conf.path);
    Ok(())
}

fn build_logger<D>(drain: D, level: Level) -> slog::Logger
where
    D: Drain<Ok = (), Err = io::Error> + Send + 'static,
{
    let drain = drain.fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    slog::Logger::root(drain, slog::o!())
}

/// Opens log file with append mode. Creates a new log file if it doesn't exist.
fn open_log_file<P: AsRef<Path>>(path: P) -> io::Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent)?
        }
    }
    OpenOptions::new().append(true).create(true).open(path)
}
