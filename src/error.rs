//! Typed errors for the two seams that need them: command validation and
//! the external archiver. Everything else flows through anyhow.

use thiserror::Error;

/// A command line that failed verb or argument validation. The Display
/// text is what goes back to the client, verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command")]
    UnknownVerb,

    #[error("Unrecognized sorting option. Use '-a' for alphabetical or '-t' for time-based sorting.")]
    BadSortOrder,

    #[error("Filename cannot be empty. Use 'w24fn <filename>'.")]
    EmptyFilename,

    #[error("Invalid format for w24fz. Use 'w24fz <size1> <size2>'.")]
    BadSizeFormat,

    #[error("Size range is invalid. Ensure that 0 <= size1 <= size2.")]
    BadSizeRange,

    #[error("Invalid or too many file extensions. Use 'w24ft <ext1> [ext2] [ext3]', up to 3 extensions.")]
    BadExtensions,

    #[error("Invalid date format. Use 'YYYY-MM-DD'.")]
    BadDate,
}

/// Failures while staging or building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The match set was empty. Callers are expected to short-circuit to a
    /// "no files found" reply before invoking the archiver; this is the
    /// backstop.
    #[error("no files to archive")]
    EmptyInput,

    /// The external tar process exited non-zero or was killed.
    #[error("{0}")]
    ToolFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
