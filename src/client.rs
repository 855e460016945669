//! Interactive client session.
//!
//! Commands are validated locally with the same grammar the server
//! enforces, so obviously malformed input never crosses the wire. Binary
//! replies are persisted under the fixed project directory in the user's
//! home area.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crate::cli::home_dir;
use crate::framer::{self, Framing, ServerReply};
use crate::protocol::Command;

const CONNECT_RETRIES: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory under $HOME where binary replies land.
const PROJECT_DIR: &str = "w24project";
const ARCHIVE_FILE: &str = "received_files.tar.gz";

pub struct Session {
    host: String,
    port: u16,
    framing: Framing,
    stream: TcpStream,
}

impl Session {
    pub fn connect(host: &str, port: u16, framing: Framing) -> Result<Self> {
        let stream = connect_with_retry(host, port)?;
        Ok(Self {
            host: host.to_string(),
            port,
            framing,
            stream,
        })
    }

    /// Prompt loop until `quitc` or stdin EOF.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = String::new();
        loop {
            print!("ferry> ");
            io::stdout().flush().ok();
            input.clear();
            if stdin.read_line(&mut input).context("read stdin")? == 0 {
                break;
            }
            let line = input.trim();
            if line.is_empty() {
                continue;
            }
            let cmd = match Command::parse(line) {
                Ok(cmd) => cmd,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };
            if cmd == Command::Quit {
                let _ = self.send_line(line);
                break;
            }
            match self.request(line)? {
                Some(ServerReply::Text(text)) => {
                    print!("{text}");
                    if !text.ends_with('\n') {
                        println!();
                    }
                }
                Some(ServerReply::Binary(bytes)) => self.save_archive(&bytes)?,
                None => {} // timeout, already reported
            }
        }
        Ok(())
    }

    /// One request/response exchange; transient network errors get a
    /// single reconnect before the session gives up.
    fn request(&mut self, line: &str) -> Result<Option<ServerReply>> {
        match self.exchange(line) {
            Ok(reply) => Ok(Some(reply)),
            Err(e) if is_timeout(&e) => {
                println!("Timeout reached, no more data received from server.");
                Ok(None)
            }
            Err(e) if is_transient(&e) => {
                eprintln!("Connection error ({e}). Attempting to reconnect...");
                self.stream = connect_with_retry(&self.host, self.port)
                    .context("Failed to reconnect")?;
                match self.exchange(line) {
                    Ok(reply) => Ok(Some(reply)),
                    Err(e) if is_timeout(&e) => {
                        println!("Timeout reached, no more data received from server.");
                        Ok(None)
                    }
                    Err(e) => Err(e).context("request failed after reconnect"),
                }
            }
            Err(e) => Err(e).context("request failed"),
        }
    }

    fn exchange(&mut self, line: &str) -> io::Result<ServerReply> {
        self.send_line(line)?;
        framer::read_reply(&mut self.stream, self.framing)
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.stream.write_all(line.as_bytes())?;
        self.stream.write_all(b"\n")?;
        self.stream.flush()
    }

    fn save_archive(&self, bytes: &[u8]) -> Result<()> {
        let dir = home_dir().join(PROJECT_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(ARCHIVE_FILE);
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        println!(
            "Received binary data ({} bytes), saved to {}",
            bytes.len(),
            path.display()
        );
        Ok(())
    }
}

fn connect_with_retry(host: &str, port: u16) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    let mut last_err = None;
    for attempt in 1..=CONNECT_RETRIES {
        print!("Connecting {addr} (attempt {attempt}/{CONNECT_RETRIES})... ");
        io::stdout().flush().ok();
        match TcpStream::connect(&addr) {
            Ok(stream) => {
                println!("ok");
                stream.set_read_timeout(Some(READ_TIMEOUT)).ok();
                stream.set_nodelay(true).ok();
                return Ok(stream);
            }
            Err(e) => {
                println!("failed: {e}");
                last_err = Some(e);
                if attempt < CONNECT_RETRIES {
                    thread::sleep(CONNECT_BACKOFF);
                }
            }
        }
    }
    Err(anyhow!(
        "unable to connect to {addr} after {CONNECT_RETRIES} attempts: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_transient_errors_are_classified_separately() {
        let timeout = io::Error::new(ErrorKind::WouldBlock, "t");
        assert!(is_timeout(&timeout));
        assert!(!is_transient(&timeout));

        let reset = io::Error::new(ErrorKind::ConnectionReset, "r");
        assert!(is_transient(&reset));
        assert!(!is_timeout(&reset));

        let fatal = io::Error::new(ErrorKind::PermissionDenied, "p");
        assert!(!is_transient(&fatal));
        assert!(!is_timeout(&fatal));
    }
}
