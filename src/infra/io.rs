//! Durable file I/O primitives for the transaction pipeline.
//!
//! The write path is temp-file-then-rename: content goes to a hidden,
//! randomly-suffixed file in the target's own directory, is fsynced, and
//! only then renamed onto the target. The rename is the single operation
//! that makes new content visible; a reader can never observe a
//! partially-written target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::Builder;
use tracing::debug;

/// Temp files are created as `.<name>.pup-<random>`; a crashed process may
/// leave one behind (no startup sweep is performed).
const TMP_INFIX: &str = ".pup-";

/// Closed set of causes mapped from the underlying OS error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsCause {
    NotFound,
    PermissionDenied,
    DiskFull,
    ReadOnlyFilesystem,
    SymlinkLoop,
    Other,
}

impl FsCause {
    pub fn classify(err: &io::Error) -> Self {
        use io::ErrorKind::*;
        if err.raw_os_error() == Some(libc::ELOOP) {
            return Self::SymlinkLoop;
        }
        match err.kind() {
            NotFound => Self::NotFound,
            PermissionDenied => Self::PermissionDenied,
            StorageFull | QuotaExceeded => Self::DiskFull,
            ReadOnlyFilesystem => Self::ReadOnlyFilesystem,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FsCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "file not found",
            Self::PermissionDenied => "permission denied",
            Self::DiskFull => "disk full",
            Self::ReadOnlyFilesystem => "read-only filesystem",
            Self::SymlinkLoop => "symlink loop",
            Self::Other => "filesystem error",
        };
        f.write_str(s)
    }
}

/// Why a strict text read failed.
#[derive(Debug)]
pub enum ReadTextError {
    Io(io::Error),
    /// The bytes are not valid UTF-8. A hard stop, not a best-effort decode.
    InvalidUtf8,
}

/// Read a file as UTF-8 text. Invalid encoding is rejected outright so no
/// lossy decode can ever round-trip back to disk.
pub fn read_text(path: &Path) -> Result<String, ReadTextError> {
    let bytes = fs::read(path).map_err(ReadTextError::Io)?;
    String::from_utf8(bytes).map_err(|_| ReadTextError::InvalidUtf8)
}

/// Atomically replace `path` with `data`.
///
/// The temp file lives in the same directory as the target: the final
/// rename must stay on one filesystem, since a cross-device rename is not
/// atomic and can fail outright. On any failure before the rename the
/// temp file is removed best-effort and the target is untouched.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Preserve the target's permission bits when it already exists.
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = Builder::new()
        .prefix(&format!(".{name}{TMP_INFIX}"))
        .tempfile_in(dir)?;
    debug!(target = %path.display(), tmp = %tmp.path().display(), "atomic write");

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms)?;
    }

    // `persist` renames onto the target; dropping the returned error's
    // temp file unlinks the artifact.
    tmp.persist(path).map_err(|e| e.error)?;

    // Durably record the rename.
    let _ = sync_dir(dir);
    Ok(())
}

/// Write `data` to `backup_path` and copy `original`'s permission bits
/// onto it. Not atomic: the backup is a fresh snapshot, not a publish.
pub fn write_backup(original: &Path, backup_path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(backup_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    let perms = fs::metadata(original)?.permissions();
    fs::set_permissions(backup_path, perms)?;
    debug!(backup = %backup_path.display(), "backup written");
    Ok(())
}

/// Cross-platform directory fsync helper.
#[cfg(unix)]
fn sync_dir(p: &Path) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let f = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY)
        .open(p)?;
    f.sync_all()
}

#[cfg(windows)]
fn sync_dir(_p: &Path) -> io::Result<()> {
    // Windows does not expose a reliable directory fsync; best-effort no-op.
    Ok(())
}

/// `<path>.bak`, the single backup slot for a file. Overwritten by the
/// next operation on the same path, never auto-deleted.
pub fn backup_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    std::path::PathBuf::from(name)
}

/// Open for reading, just to prove the file is readable.
pub fn probe_readable(path: &Path) -> io::Result<()> {
    File::open(path).map(|_| ())
}
