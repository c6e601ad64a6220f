//! Single-file transaction: read, backup, simulate, atomic write.
//!
//! The lifecycle is a straight line with no branching back:
//!
//! ```text
//! READ -> (if backup) BACKUP -> SIMULATE -> [dry run? STOP] -> WRITE
//! ```
//!
//! Any failure before WRITE returns a failure report with the target file
//! untouched on disk. Nothing here panics or propagates an unstructured
//! error; every outcome is materialized as a [`FileReport`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::core::simulate::{self, EditOp, EditOutcome, MatchFailure};
use crate::infra::io::{self, FsCause, ReadTextError};

/// Flags for one file's transaction.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Simulate and report without writing the target.
    pub dry_run: bool,
    /// Snapshot the original to `<path>.bak` before doing anything else.
    pub backup: bool,
    /// Materialize the final content in the report.
    pub include_content: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            include_content: false,
        }
    }
}

/// Typed failure detail for one file. Closed set so callers can match
/// exhaustively instead of parsing strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditFailure {
    /// `old_string` of the edit at `position` (1-based) has no match.
    #[error("edit {position} of {total}: old_string not found")]
    NotFound { position: usize, total: usize },

    /// Multiple matches without `replace_all`.
    #[error(
        "edit {position} of {total}: old_string matches {} times (lines {}); set replace_all to change every occurrence",
        .lines.len(),
        format_lines(.lines)
    )]
    Ambiguous {
        position: usize,
        total: usize,
        /// 1-based line number of every match.
        lines: Vec<usize>,
    },

    /// The file is not valid UTF-8 text.
    #[error("{}: invalid encoding, expected UTF-8 text", .path.display())]
    Encoding { path: PathBuf },

    /// An underlying filesystem operation failed.
    #[error("{}: {cause}: {detail}", .path.display())]
    Filesystem {
        path: PathBuf,
        cause: FsCause,
        detail: String,
    },

    /// Backup creation failed; no edit proceeds without a safety net.
    #[error("backup {} could not be created: {cause}: {detail}", .backup_path.display())]
    Backup {
        backup_path: PathBuf,
        cause: FsCause,
        detail: String,
    },
}

fn format_lines(lines: &[usize]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl EditFailure {
    /// Whether a corrected request could succeed on retry.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Ambiguous { .. })
    }
}

/// Outcome of one file's full lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub success: bool,
    /// Number of edits applied (on success, the full batch).
    pub edits_applied: usize,
    /// Per-edit outcomes, in batch order, up to the first failure.
    pub edits: Vec<EditOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// Final content; only materialized on request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<EditFailure>,
    /// Content state immediately before the failing edit, kept out of the
    /// serialized report; the renderer uses it for diagnostic snippets.
    #[serde(skip)]
    pub content_at_failure: Option<String>,
}

impl FileReport {
    fn failed(path: &Path, backup_path: Option<PathBuf>, failure: EditFailure) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            edits_applied: 0,
            edits: Vec::new(),
            backup_path,
            content: None,
            failure: Some(failure),
            content_at_failure: None,
        }
    }
}

/// Apply an ordered batch of edits to one file with all-or-nothing
/// semantics. On any failure the target file is byte-identical to its
/// pre-call state; only a fully validated batch reaches the atomic write.
pub fn apply_edits(path: &Path, edits: &[EditOp], opts: &ApplyOptions) -> FileReport {
    debug!(path = %path.display(), edits = edits.len(), dry_run = opts.dry_run, "apply");

    // READ: strict UTF-8, no partial reads acted upon.
    let content = match io::read_text(path) {
        Ok(content) => content,
        Err(ReadTextError::InvalidUtf8) => {
            return FileReport::failed(
                path,
                None,
                EditFailure::Encoding {
                    path: path.to_path_buf(),
                },
            );
        }
        Err(ReadTextError::Io(err)) => {
            return FileReport::failed(
                path,
                None,
                EditFailure::Filesystem {
                    path: path.to_path_buf(),
                    cause: FsCause::classify(&err),
                    detail: err.to_string(),
                },
            );
        }
    };

    // BACKUP: unconditionally before any edit is simulated, dry run
    // included. A failed backup aborts the whole operation.
    let backup_path = if opts.backup {
        let backup_path = io::backup_path_for(path);
        if let Err(err) = io::write_backup(path, &backup_path, content.as_bytes()) {
            return FileReport::failed(
                path,
                None,
                EditFailure::Backup {
                    backup_path,
                    cause: FsCause::classify(&err),
                    detail: err.to_string(),
                },
            );
        }
        Some(backup_path)
    } else {
        None
    };

    // SIMULATE: the batch must be known-good before any write is attempted.
    let simulated = match simulate::simulate(&content, edits) {
        Ok(simulated) => simulated,
        Err(rejection) => {
            let total = edits.len();
            let position = rejection.index + 1;
            let failure = match rejection.failure {
                MatchFailure::NotFound => EditFailure::NotFound { position, total },
                MatchFailure::Ambiguous { lines } => EditFailure::Ambiguous {
                    position,
                    total,
                    lines,
                },
            };
            return FileReport {
                path: path.to_path_buf(),
                success: false,
                edits_applied: 0,
                edits: rejection.outcomes,
                backup_path,
                content: None,
                failure: Some(failure),
                content_at_failure: Some(rejection.content),
            };
        }
    };

    let edits_applied = simulated.outcomes.len();

    // Dry-run short-circuit: simulation succeeded, target stays untouched.
    if opts.dry_run {
        return FileReport {
            path: path.to_path_buf(),
            success: true,
            edits_applied,
            edits: simulated.outcomes,
            backup_path,
            content: opts.include_content.then_some(simulated.content),
            failure: None,
            content_at_failure: None,
        };
    }

    // WRITE: durable temp-then-rename; a failure here leaves the original
    // in place because only the rename publishes new content.
    if let Err(err) = io::write_atomic(path, simulated.content.as_bytes()) {
        return FileReport {
            path: path.to_path_buf(),
            success: false,
            edits_applied: 0,
            edits: simulated.outcomes,
            backup_path,
            content: None,
            failure: Some(EditFailure::Filesystem {
                path: path.to_path_buf(),
                cause: FsCause::classify(&err),
                detail: err.to_string(),
            }),
            content_at_failure: None,
        };
    }

    info!(path = %path.display(), edits = edits_applied, "written");
    FileReport {
        path: path.to_path_buf(),
        success: true,
        edits_applied,
        edits: simulated.outcomes,
        backup_path,
        content: opts.include_content.then_some(simulated.content),
        failure: None,
        content_at_failure: None,
    }
}
