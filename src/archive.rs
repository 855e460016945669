//! Archive staging for search replies.
//!
//! Each request gets its own scratch directory holding the manifest and
//! the archive, so concurrent connections can never collide on temp
//! paths. Dropping the job removes the directory on every exit path.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use crate::error::ArchiveError;

const MANIFEST_NAME: &str = "file_list.txt";
const ARCHIVE_NAME: &str = "files.tar.gz";

/// One search request's archive lifecycle: stage manifest, run tar, read
/// the result back.
pub struct ArchiveJob {
    scratch: TempDir,
    manifest: PathBuf,
    archive: PathBuf,
}

impl ArchiveJob {
    pub fn new() -> io::Result<Self> {
        let scratch = tempfile::Builder::new().prefix("ferry-req-").tempdir()?;
        let manifest = scratch.path().join(MANIFEST_NAME);
        let archive = scratch.path().join(ARCHIVE_NAME);
        Ok(Self {
            scratch,
            manifest,
            archive,
        })
    }

    /// Build a compressed archive of `paths` via the external tar tool.
    pub fn create(&self, paths: &[PathBuf]) -> Result<(), ArchiveError> {
        if paths.is_empty() {
            return Err(ArchiveError::EmptyInput);
        }

        let mut manifest = BufWriter::new(File::create(&self.manifest)?);
        for path in paths {
            manifest.write_all(path.as_os_str().as_encoded_bytes())?;
            manifest.write_all(b"\n")?;
        }
        manifest.flush()?;

        let status = Command::new("tar")
            .arg("-czf")
            .arg(&self.archive)
            .arg("-T")
            .arg(&self.manifest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if !status.success() {
            // never leave a partial archive behind for read_bytes to find
            let _ = fs::remove_file(&self.archive);
            return Err(ArchiveError::ToolFailure(describe_status(status)));
        }
        Ok(())
    }

    /// Full bytes of the built archive. Only valid after a successful
    /// `create`.
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.archive)
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

fn describe_status(status: std::process::ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("tar exited with status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return format!("tar killed by signal {sig}");
        }
    }
    "tar terminated abnormally".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use tempfile::TempDir;

    #[test]
    fn empty_input_never_runs_the_tool() {
        let job = ArchiveJob::new().unwrap();
        match job.create(&[]) {
            Err(ArchiveError::EmptyInput) => {}
            other => panic!("expected EmptyInput, got {other:?}"),
        }
        assert!(!job.archive_path().exists());
    }

    #[test]
    fn archives_listed_files_and_reads_them_back() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, b"alpha").unwrap();
        fs::write(&b, b"bravo").unwrap();

        let job = ArchiveJob::new().unwrap();
        job.create(&[a, b]).unwrap();
        let bytes = job.read_bytes().unwrap();
        // gzip magic
        assert!(bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b);
    }

    #[test]
    fn missing_input_file_is_a_tool_failure() {
        let job = ArchiveJob::new().unwrap();
        let bogus = PathBuf::from("/nonexistent/definitely/not/here.txt");
        match job.create(&[bogus]) {
            Err(ArchiveError::ToolFailure(msg)) => {
                assert!(msg.contains("tar"), "unexpected message: {msg}")
            }
            other => panic!("expected ToolFailure, got {other:?}"),
        }
        assert!(!job.archive_path().exists());
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let scratch;
        {
            let job = ArchiveJob::new().unwrap();
            scratch = job.scratch_path().to_path_buf();
            assert!(scratch.exists());
        }
        assert!(!scratch.exists());
    }

    #[test]
    fn concurrent_jobs_use_distinct_scratch_dirs() {
        let a = ArchiveJob::new().unwrap();
        let b = ArchiveJob::new().unwrap();
        assert_ne!(a.scratch_path(), b.scratch_path());
    }
}
