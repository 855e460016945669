use anyhow::{Context, Result};
use clap::Parser;

use ferry::cli::{home_dir, DaemonOpts};
use ferry::framer::Framing;
use ferry::logger::RequestLog;
use ferry::server;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    let root = opts.root.unwrap_or_else(home_dir);
    if !root.exists() {
        anyhow::bail!("Error: Root directory does not exist: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Error: Root path is not a directory: {}", root.display());
    }

    // Canonicalize the path for better logging
    let canonical_root = std::fs::canonicalize(&root)
        .with_context(|| format!("Failed to canonicalize root path: {}", root.display()))?;

    let framing = if opts.legacy_framing {
        Framing::EofMarker
    } else {
        Framing::LengthPrefixed
    };

    println!("Starting ferry daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);
    println!(
        "  Framing: {}",
        match framing {
            Framing::LengthPrefixed => "length-prefixed",
            Framing::EofMarker => "legacy EOF marker",
        }
    );

    if opts.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: binding to 0.0.0.0 exposes the daemon to all network interfaces");
        eprintln!("   This protocol is unauthenticated - only use on trusted networks");
    }

    let log = opts
        .log_file
        .map(RequestLog::new)
        .transpose()
        .context("Failed to open request log")?;

    server::serve(&opts.bind, &canonical_root, framing, log)
}
