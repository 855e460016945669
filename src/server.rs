//! Accept loop and per-connection command processing.
//!
//! One detached thread per accepted connection; the accept loop never
//! does per-connection work and never joins handlers, so a slow or
//! crashed client cannot stall new acceptances. Within a connection,
//! commands are strictly request/response: one completes fully before
//! the next line is read.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::archive::ArchiveJob;
use crate::framer::{self, Framing};
use crate::listing;
use crate::logger::{RequestLog, RequestLogEntry, RequestStatus};
use crate::matcher::SearchCriterion;
use crate::protocol::{Command, MAX_LINE_BYTES};
use crate::walker;

static CONN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Bind and serve forever.
pub fn serve(bind: &str, root: &Path, framing: Framing, log: Option<RequestLog>) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("bind {bind}"))?;
    eprintln!("ferryd listening on {} root={}", bind, root.display());
    let log = log.map(Arc::new);
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let id = CONN_SEQ.fetch_add(1, Ordering::Relaxed);
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                eprintln!("conn #{id} from {peer}");
                let root = root.to_path_buf();
                let log = log.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_conn(stream, &root, framing, id, &peer, log.as_deref())
                    {
                        eprintln!("conn #{id} ({peer}) error: {e:#}");
                    }
                });
            }
            Err(e) => {
                eprintln!("accept error: {e}");
            }
        }
    }
    Ok(())
}

fn handle_conn(
    stream: TcpStream,
    root: &Path,
    framing: Framing,
    id: u64,
    peer: &str,
    log: Option<&RequestLog>,
) -> Result<()> {
    stream.set_nodelay(true).ok();
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
    let mut writer = stream;
    let mut line = String::new();

    let record = |entry: RequestLogEntry| {
        if let Some(log) = log {
            if let Err(e) = log.add_entry(entry) {
                eprintln!("request log write failed: {e}");
            }
        }
    };

    loop {
        line.clear();
        let n = match (&mut reader).take(MAX_LINE_BYTES as u64).read_line(&mut line) {
            Ok(0) => {
                eprintln!("conn #{id} ({peer}) disconnected");
                return Ok(());
            }
            Ok(n) => n,
            Err(e) if is_disconnect(e.kind()) => {
                eprintln!("conn #{id} ({peer}) disconnected: {e}");
                return Ok(());
            }
            Err(e) => return Err(e).context("read command line"),
        };
        if n >= MAX_LINE_BYTES && !line.ends_with('\n') {
            anyhow::bail!("conn #{id}: command line exceeds {MAX_LINE_BYTES} bytes");
        }

        let raw = line.trim_end_matches(['\r', '\n']).trim().to_string();
        let cmd = match Command::parse(&raw) {
            Ok(cmd) => cmd,
            Err(e) => {
                let mut entry = RequestLogEntry::new(id, peer, &raw, RequestStatus::Rejected);
                entry.error = Some(e.to_string());
                record(entry);
                if let Err(werr) = framer::write_text(&mut writer, &format!("{e}\n")) {
                    return write_failed(werr, id, peer);
                }
                continue;
            }
        };

        eprintln!("conn #{id} ({peer}) {}", cmd.verb());
        if cmd == Command::Quit {
            eprintln!("conn #{id} ({peer}) quit");
            record(RequestLogEntry::new(id, peer, &raw, RequestStatus::Ok));
            return Ok(());
        }

        let (reply, error) = execute(&cmd, root);
        let status = if error.is_some() {
            RequestStatus::Failed
        } else {
            RequestStatus::Ok
        };
        let write_result = match &reply {
            Reply::Text(text) => framer::write_text(&mut writer, text),
            Reply::Archive(bytes) => framer::write_binary(&mut writer, bytes, framing),
        };

        let mut entry = RequestLogEntry::new(id, peer, &raw, status);
        entry.bytes_sent = match &reply {
            Reply::Text(text) => text.len() as u64,
            Reply::Archive(bytes) => bytes.len() as u64,
        };
        entry.error = error;
        record(entry);

        if let Err(e) = write_result {
            return write_failed(e, id, peer);
        }
    }
}

// A client that vanished mid-reply is a per-connection event, not a
// server failure.
fn write_failed(e: std::io::Error, id: u64, peer: &str) -> Result<()> {
    if is_disconnect(e.kind()) {
        eprintln!("conn #{id} ({peer}) went away before the reply completed: {e}");
        return Ok(());
    }
    Err(e).with_context(|| format!("write reply to {peer}"))
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}

enum Reply {
    Text(String),
    Archive(Vec<u8>),
}

/// Run one validated command against the served root. Returns the reply
/// plus an error detail when the reply is itself an error report.
fn execute(cmd: &Command, root: &Path) -> (Reply, Option<String>) {
    match cmd {
        Command::DirList(order) => match listing::list_directories(root, *order) {
            Ok(text) => (Reply::Text(text), None),
            Err(e) => (Reply::Text(format!("{e:#}\n")), Some(format!("{e:#}"))),
        },
        Command::FindByName(name) => match walker::find_first(root, name) {
            Some(path) => match walker::file_details(&path) {
                Ok(text) => (Reply::Text(text), None),
                Err(e) => (
                    Reply::Text("Error accessing file details.\n".to_string()),
                    Some(format!("{e:#}")),
                ),
            },
            None => (Reply::Text("File not found\n".to_string()), None),
        },
        Command::FindBySize { min, max } => {
            archive_reply(root, SearchCriterion::SizeRange { min: *min, max: *max })
        }
        Command::FindByType(exts) => archive_reply(root, SearchCriterion::Extensions(exts.clone())),
        Command::FindByDate { boundary, before } => {
            let criterion = if *before {
                SearchCriterion::ModifiedBefore(*boundary)
            } else {
                SearchCriterion::ModifiedAfter(*boundary)
            };
            archive_reply(root, criterion)
        }
        // quit never reaches execution; the connection loop filters it
        Command::Quit => (Reply::Text(String::new()), None),
    }
}

fn archive_reply(root: &Path, criterion: SearchCriterion) -> (Reply, Option<String>) {
    let matches = walker::collect_matches(root, &criterion);
    if matches.is_empty() {
        return (Reply::Text("No file found\n".to_string()), None);
    }
    let job = match ArchiveJob::new() {
        Ok(job) => job,
        Err(e) => {
            return (
                Reply::Text("Error: unable to stage archive\n".to_string()),
                Some(e.to_string()),
            )
        }
    };
    if let Err(e) = job.create(&matches) {
        return (Reply::Text(format!("Error: {e}\n")), Some(e.to_string()));
    }
    match job.read_bytes() {
        Ok(bytes) => (Reply::Archive(bytes), None),
        Err(e) => (
            Reply::Text("Error: unable to read archive\n".to_string()),
            Some(e.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn root_fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/x.txt"), vec![1u8; 50]).unwrap();
        fs::write(dir.path().join("a/y.txt"), vec![2u8; 200]).unwrap();
        dir
    }

    #[test]
    fn empty_match_set_short_circuits_to_text() {
        let root = root_fixture();
        let cmd = Command::parse("w24fz 5000000 6000000").unwrap();
        let (reply, error) = execute(&cmd, root.path());
        match reply {
            Reply::Text(text) => assert_eq!(text, "No file found\n"),
            Reply::Archive(_) => panic!("empty match set must not build an archive"),
        }
        assert!(error.is_none());
    }

    #[test]
    fn size_query_returns_an_archive() {
        let root = root_fixture();
        let cmd = Command::parse("w24fz 0 100").unwrap();
        let (reply, error) = execute(&cmd, root.path());
        assert!(error.is_none());
        match reply {
            Reply::Archive(bytes) => {
                assert!(bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b)
            }
            Reply::Text(text) => panic!("expected archive, got text: {text}"),
        }
    }

    #[test]
    fn name_query_reports_details_or_not_found() {
        let root = root_fixture();
        let (reply, _) = execute(&Command::parse("w24fn y.txt").unwrap(), root.path());
        match reply {
            Reply::Text(text) => {
                assert!(text.contains("File: y.txt"));
                assert!(text.contains("Size: 200 bytes"));
            }
            Reply::Archive(_) => panic!("w24fn replies are text"),
        }

        let (reply, _) = execute(&Command::parse("w24fn ghost.txt").unwrap(), root.path());
        match reply {
            Reply::Text(text) => assert_eq!(text, "File not found\n"),
            Reply::Archive(_) => panic!("w24fn replies are text"),
        }
    }
}
