use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Ok,
    Rejected,
    Failed,
}

/// One JSONL row per handled command.
#[derive(Serialize, Deserialize, Debug)]
pub struct RequestLogEntry {
    pub timestamp: String,
    pub conn: u64,
    pub peer: String,
    pub command: String,
    pub status: RequestStatus,
    pub bytes_sent: u64,
    pub error: Option<String>,
}

impl RequestLogEntry {
    pub fn new(conn: u64, peer: &str, command: &str, status: RequestStatus) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            conn,
            peer: peer.to_string(),
            command: command.to_string(),
            status,
            bytes_sent: 0,
            error: None,
        }
    }
}

/// Append-only request log written when the daemon runs with --log-file.
pub struct RequestLog {
    log_file_path: PathBuf,
}

impl RequestLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Ok(RequestLog {
            log_file_path: path.as_ref().to_path_buf(),
        })
    }

    pub fn add_entry(&self, entry: RequestLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open request log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<RequestLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open request log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: RequestLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn entries_round_trip_through_jsonl() {
        let dir = TempDir::new().unwrap();
        let log = RequestLog::new(dir.path().join("requests.jsonl")).unwrap();

        let mut ok = RequestLogEntry::new(1, "127.0.0.1:9999", "w24ft txt", RequestStatus::Ok);
        ok.bytes_sent = 1234;
        log.add_entry(ok).unwrap();

        let mut rejected =
            RequestLogEntry::new(1, "127.0.0.1:9999", "w24fz abc 10", RequestStatus::Rejected);
        rejected.error = Some("Invalid format for w24fz. Use 'w24fz <size1> <size2>'.".into());
        log.add_entry(rejected).unwrap();

        let entries = log.read_log().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, RequestStatus::Ok);
        assert_eq!(entries[0].bytes_sent, 1234);
        assert_eq!(entries[1].status, RequestStatus::Rejected);
        assert!(entries[1].error.as_deref().unwrap().contains("w24fz"));
    }
}
