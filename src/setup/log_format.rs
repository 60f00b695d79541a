use std::io;

use slog::{Drain, OwnedKVList, Record, KV};
use slog_term::{Decorator, RecordDecorator, Serializer};

pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f %:z";

/// KvFormat writes one line per record:
/// `[time] [level] [file:line] message, key: value, key: value`.
pub struct KvFormat<D>
where
    D: Decorator,
{
    decorator: D,
}

impl<D> KvFormat<D>
where
    D: Decorator,
{
    pub fn new(decorator: D) -> KvFormat<D> {
        KvFormat { decorator }
    }
}

impl<D> Drain for KvFormat<D>
where
    D: Decorator,
{
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record, values: &OwnedKVList) -> io::Result<()> {
        self.decorator.with_record(record, values, |rd| {
            write_head(rd, record)?;

            rd.start_whitespace()?;
            write!(rd, " ")?;
            rd.start_msg()?;
            write!(rd, "{}", record.msg())?;

            // record fields first, then the fields of the logger
            let mut ser = Serializer::new(rd, true, true);
            record.kv().serialize(record, &mut ser)?;
            values.serialize(record, &mut ser)?;
            ser.finish()?;

            rd.start_whitespace()?;
            writeln!(rd)?;
            rd.flush()
        })
    }
}

fn write_head(rd: &mut dyn RecordDecorator, record: &Record) -> io::Result<()> {
    rd.start_timestamp()?;
    write!(rd, "[{}]", chrono::Local::now().format(TIMESTAMP_FORMAT))?;

    rd.start_whitespace()?;
    write!(rd, " ")?;
    rd.start_level()?;
    write!(rd, "[{}]", record.level().as_short_str())?;

    rd.start_whitespace()?;
    write!(rd, " ")?;
    // no start_location() in RecordDecorator
    rd.start_msg()?;
    write!(rd, "[{}:{}]", record.file(), record.line())
}
