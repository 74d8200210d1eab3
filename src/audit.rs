//! Append-only CSV audit log of discovered credentials.
//!
//! The file is created once per run with a header row. Each successful
//! attempt becomes one row, written and flushed under a single lock so a
//! crash after [`AuditLog::record`] returns cannot lose it.
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::credential::{Credential, Target};
use crate::probe::Outcome;

pub const HEADER: [&str; 7] = [
    "IP Address",
    "Username",
    "Password",
    "Port",
    "Service",
    "Status",
    "Timestamp",
];

const ROW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One attempt and its result. Only successes reach the file.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub target: Target,
    pub credential: Credential,
    pub protocol_name: &'static str,
    pub outcome: Outcome,
    pub timestamp: DateTime<Local>,
}

impl AttemptRecord {
    pub fn new(
        target: &Target,
        credential: &Credential,
        protocol_name: &'static str,
        outcome: Outcome,
    ) -> Self {
        Self {
            target: target.clone(),
            credential: credential.clone(),
            protocol_name,
            outcome,
            timestamp: Local::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    host: &'a str,
    username: &'a str,
    password: &'a str,
    port: u16,
    service: &'a str,
    status: &'a str,
    timestamp: String,
}

impl<'a> From<&'a AttemptRecord> for AuditRow<'a> {
    fn from(r: &'a AttemptRecord) -> Self {
        Self {
            host: &r.target.host,
            username: &r.credential.username,
            password: &r.credential.password,
            port: r.target.port,
            service: r.protocol_name,
            status: "OK",
            timestamp: r.timestamp.format(ROW_TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<Writer<File>>,
}

impl AuditLog {
    /// Create `mikrotik_creds_<host>_<timestamp>.csv` in `dir` and write the
    /// header.
    pub fn create<P: AsRef<Path>>(dir: P, host: &str) -> Result<Self> {
        let path = dir.as_ref().join(file_name(host, Local::now()));
        Self::create_at(path)
    }

    /// Create the log at an explicit path.
    pub fn create_at<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .with_context(|| format!("create {}", path.display()))?;
        wtr.write_record(HEADER)?;
        wtr.flush()?;
        Ok(Self {
            path,
            writer: Mutex::new(wtr),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` if it is a success. Returns whether a row was written.
    pub fn record(&self, record: &AttemptRecord) -> Result<bool> {
        if !record.outcome.is_success() {
            return Ok(false);
        }
        let mut wtr = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        wtr.serialize(AuditRow::from(record))
            .with_context(|| format!("write {}", self.path.display()))?;
        wtr.flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(true)
    }
}

/// Audit file name for `host` at `at`. Path separators and `:` in the host
/// are replaced so IPv6 literals yield a valid name.
pub fn file_name(host: &str, at: DateTime<Local>) -> String {
    let safe: String = host
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("mikrotik_creds_{}_{}.csv", safe, at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FailureReason;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(outcome: Outcome) -> AttemptRecord {
        AttemptRecord::new(
            &Target::new("10.0.0.1", 8291),
            &Credential::new("admin", "secret"),
            "handshake",
            outcome,
        )
    }

    #[test]
    fn header_is_flushed_on_create() {
        let dir = tempdir().unwrap();
        let log = AuditLog::create(dir.path(), "10.0.0.1").unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "IP Address,Username,Password,Port,Service,Status,Timestamp\n"
        );
    }

    #[test]
    fn only_successes_are_written() {
        let dir = tempdir().unwrap();
        let log = AuditLog::create_at(dir.path().join("audit.csv")).unwrap();
        assert!(!log.record(&record(Outcome::Failure(FailureReason::Rejected))).unwrap());
        assert!(log.record(&record(Outcome::Success)).unwrap());

        let mut rdr = csv::Reader::from_path(log.path()).unwrap();
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "10.0.0.1");
        assert_eq!(&rows[0][1], "admin");
        assert_eq!(&rows[0][2], "secret");
        assert_eq!(&rows[0][3], "8291");
        assert_eq!(&rows[0][4], "handshake");
        assert_eq!(&rows[0][5], "OK");
        assert_eq!(rows[0][6].len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn concurrent_records_are_whole_rows() {
        let dir = tempdir().unwrap();
        let log = AuditLog::create_at(dir.path().join("audit.csv")).unwrap();
        let writers = 16;
        std::thread::scope(|scope| {
            for i in 0..writers {
                let log = &log;
                scope.spawn(move || {
                    let record = AttemptRecord::new(
                        &Target::new("10.0.0.1", 8291),
                        &Credential::new(format!("user{i}"), "p,with \"quotes\"".repeat(200)),
                        "handshake",
                        Outcome::Success,
                    );
                    assert!(log.record(&record).unwrap());
                });
            }
        });

        let mut rdr = csv::Reader::from_path(log.path()).unwrap();
        assert_eq!(rdr.headers().unwrap(), &csv::StringRecord::from(HEADER.to_vec()));
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), writers);
        let mut users: Vec<&str> = rows.iter().map(|r| r.get(1).unwrap()).collect();
        users.sort_unstable();
        users.dedup();
        assert_eq!(users.len(), writers);
        for row in &rows {
            assert_eq!(row.len(), 7);
            assert_eq!(&row[5], "OK");
        }
    }

    #[test]
    fn file_name_embeds_host_and_time() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            file_name("192.168.88.1", at),
            "mikrotik_creds_192.168.88.1_20240309_140507.csv"
        );
        assert_eq!(file_name("fe80::1", at), "mikrotik_creds_fe80__1_20240309_140507.csv");
    }
}
