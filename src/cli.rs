//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::env;
use std::path::PathBuf;

use crate::protocol::DEFAULT_PORT;

/// Daemon options for ferryd
#[derive(Clone, Debug, Parser)]
#[command(name = "ferryd", about = "Ferry daemon - serves home-directory search and retrieval")]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:12347")]
    pub bind: String,

    /// Root directory to serve (defaults to $HOME)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Frame binary replies with the legacy trailing EOF marker instead
    /// of a length prefix
    #[arg(long)]
    pub legacy_framing: bool,

    /// Write JSONL request log entries to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

/// Client options for ferry
#[derive(Clone, Debug, Parser)]
#[command(name = "ferry", about = "Ferry client - query a ferryd server interactively")]
pub struct ClientOpts {
    /// Server hostname
    pub host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Expect legacy EOF-marker framing from the server
    #[arg(long)]
    pub legacy_framing: bool,
}

/// The user's home directory, falling back to the current directory.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
