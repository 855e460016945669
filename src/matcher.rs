//! Search predicates evaluated against directory entries during a walk.
//!
//! Pure checks over a file's basename and stat metadata; the walker owns
//! all traversal concerns.

use chrono::{Local, NaiveDate, TimeZone};
use std::fs::Metadata;
use std::time::SystemTime;

/// One validated search criterion. Exact-name lookups short-circuit the
/// walk and live in `walker::find_first` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriterion {
    /// `min <= size <= max`, in bytes
    SizeRange { min: u64, max: u64 },
    /// Case-sensitive match on the suffix after the last `.`
    Extensions(Vec<String>),
    /// `mtime <= midnight(date)` in local time
    ModifiedBefore(NaiveDate),
    /// `mtime >= midnight(date)` in local time
    ModifiedAfter(NaiveDate),
}

impl SearchCriterion {
    /// Does a regular file with this basename and metadata match?
    pub fn matches(&self, file_name: &str, meta: &Metadata) -> bool {
        match self {
            SearchCriterion::SizeRange { min, max } => {
                let size = meta.len();
                *min <= size && size <= *max
            }
            SearchCriterion::Extensions(exts) => extension_matches(file_name, exts),
            SearchCriterion::ModifiedBefore(date) => match mtime_secs(meta) {
                Some(mtime) => mtime <= local_midnight(*date),
                None => false,
            },
            SearchCriterion::ModifiedAfter(date) => match mtime_secs(meta) {
                Some(mtime) => mtime >= local_midnight(*date),
                None => false,
            },
        }
    }
}

/// Suffix after the last `.` equals one of the requested extensions,
/// case-sensitively. Files without a `.` never match.
pub fn extension_matches(file_name: &str, extensions: &[String]) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, suffix)) => extensions.iter().any(|e| e == suffix),
        None => false,
    }
}

/// Unix timestamp of local midnight at the start of `date`. Over a DST
/// gap the earliest valid instant of the day is used.
pub fn local_midnight(date: NaiveDate) -> i64 {
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return 0;
    };
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

fn mtime_secs(meta: &Metadata) -> Option<i64> {
    meta.modified().ok().map(system_time_secs)
}

/// Seconds since the Unix epoch, negative for pre-epoch times.
pub fn system_time_secs(t: SystemTime) -> i64 {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
