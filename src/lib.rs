//! Ferry - remote home-directory search and retrieval
//!
//! A small TCP service: the daemon walks a served root under search
//! predicates, packages matches with the external tar tool, and streams
//! the archive back; the client validates, sends, classifies and
//! persists replies.

pub mod archive;
pub mod cli;
pub mod client;
pub mod error;
pub mod framer;
pub mod listing;
pub mod logger;
pub mod matcher;
pub mod protocol;
pub mod server;
pub mod walker;
