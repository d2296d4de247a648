use crate::config::Config;
use crate::record::MetricRecord;
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};

/// Where finished metric records go. Fire-and-forget: the sink owns any
/// buffering or transport concerns.
pub trait Sink: Send + Sync {
    fn emit(&self, record: &MetricRecord);
}

pub fn from_config(config: &Config) -> Arc<dyn Sink> {
    if let Some(path) = config.sink().file() {
        Arc::new(File::open(path))
    } else {
        Arc::new(Stdout)
    }
}

/// Writes one timestamped line per record to stdout.
pub struct Stdout;

impl Sink for Stdout {
    fn emit(&self, record: &MetricRecord) {
        crate::output!("{record}");
    }
}

/// Appends one timestamped line per record to a file.
pub struct File {
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl File {
    pub fn open(path: &str) -> Self {
        let file = match std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
        {
            Ok(file) => file,
            Err(error) => {
                eprintln!("failed to open sink file: {path}\n{error}");
                std::process::exit(1);
            }
        };

        Self {
            writer: Mutex::new(BufWriter::new(file)),
        }
    }
}

impl Sink for File {
    fn emit(&self, record: &MetricRecord) {
        if let Ok(mut writer) = self.writer.lock() {
            let now = chrono::Utc::now();
            let _ = writeln!(
                writer,
                "{} {record}",
                now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
            );
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Collects records in memory so tests can assert on what a cycle
    /// emitted.
    #[derive(Default)]
    pub struct Memory {
        records: Mutex<Vec<MetricRecord>>,
    }

    impl Memory {
        pub fn records(&self) -> Vec<MetricRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    impl Sink for Memory {
        fn emit(&self, record: &MetricRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    #[test]
    fn file_sink_appends_records() {
        use crate::record::{MetricType, Values};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.out");
        let sink = File::open(path.to_str().unwrap());

        sink.emit(&MetricRecord::new(
            MetricType::CacheOps,
            Some("hits"),
            Values::Counter(7),
            "local",
        ));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("memcached-local/memcached_ops-hits 7\n"));
    }
}
