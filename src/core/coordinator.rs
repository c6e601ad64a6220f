//! Multi-file transaction coordinator.
//!
//! Three phases: validate everything, commit everything in order, roll
//! back on failure. Files are processed strictly sequentially; the given
//! order is part of the contract, so outcomes stay deterministic and
//! explainable. Backups are mandatory here because the backup *is* the
//! rollback mechanism.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::simulate::EditOp;
use crate::core::transaction::{self, ApplyOptions, FileReport};

/// One file's slice of the batch.
#[derive(Debug, Clone)]
pub struct FileEdits {
    pub path: PathBuf,
    pub edits: Vec<EditOp>,
}

/// A Phase A violation. The whole batch is refused if any exist; every
/// violation across every file is collected before reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("{}: no such file", .path.display())]
    MissingFile { path: PathBuf },

    #[error("{}: not a regular file", .path.display())]
    NotAFile { path: PathBuf },

    #[error("{}: not readable: {detail}", .path.display())]
    Unreadable { path: PathBuf, detail: String },

    /// Two batch entries resolve to the same underlying file. Detected on
    /// canonicalized paths so symlink aliases are caught too.
    #[error("{}: duplicate of {}", .path.display(), .first.display())]
    DuplicatePath { path: PathBuf, first: PathBuf },

    /// The same `old_string` appears twice in one file's edit list
    /// (1-based edit positions).
    #[error("{}: edits {first_edit} and {edit} search for the same old_string", .path.display())]
    DuplicateOldString {
        path: PathBuf,
        first_edit: usize,
        edit: usize,
    },
}

/// Restoration outcome for one rolled-back file.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackEntry {
    pub path: PathBuf,
    /// Retained on disk regardless of outcome, as the last line of defense.
    pub backup_path: PathBuf,
    pub restored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch-level tallies.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchSummary {
    pub files_attempted: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub edits_applied: usize,
}

/// Outcome of an N-file atomic batch. Per-file reports share the
/// single-file shape so callers can treat both uniformly.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub success: bool,
    /// Phase A violations; non-empty means nothing was touched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    pub files: Vec<FileReport>,
    /// 1-based index of the failing file, if Phase B stopped early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_file: Option<usize>,
    pub summary: BatchSummary,
    /// Reverse-commit-order restoration report, present when rollback ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Vec<RollbackEntry>>,
}

impl BatchReport {
    fn invalid(violations: Vec<Violation>) -> Self {
        Self {
            success: false,
            violations,
            files: Vec::new(),
            failed_file: None,
            summary: BatchSummary {
                files_attempted: 0,
                files_succeeded: 0,
                files_failed: 0,
                edits_applied: 0,
            },
            rollback: None,
        }
    }
}

/// A file whose atomic write has durably succeeded. The backup path is
/// non-optional by construction: a commit without a backup cannot enter
/// the rollback set.
#[derive(Debug)]
struct CommittedFile {
    path: PathBuf,
    backup_path: PathBuf,
}

/// Apply edits across `files` as one all-or-nothing unit.
pub fn apply_across_files(files: &[FileEdits], dry_run: bool, include_content: bool) -> BatchReport {
    // Phase A: validate all, collecting every violation in one shot.
    let violations = validate_batch(files);
    if !violations.is_empty() {
        debug!(count = violations.len(), "batch refused by validation");
        return BatchReport::invalid(violations);
    }

    // Phase B: backup + commit, in the order given, fail-fast. The backup
    // flag exposed by single-file operations is not honored here; without
    // a backup rollback would be impossible.
    let opts = ApplyOptions {
        dry_run,
        backup: true,
        include_content,
    };

    let mut reports: Vec<FileReport> = Vec::with_capacity(files.len());
    let mut written: Vec<CommittedFile> = Vec::new();
    let mut failed_file = None;

    for (idx, file) in files.iter().enumerate() {
        let report = transaction::apply_edits(&file.path, &file.edits, &opts);

        if report.success {
            if !dry_run {
                // Backups are forced on above, so a committed file always
                // carries one.
                if let Some(backup_path) = report.backup_path.clone() {
                    written.push(CommittedFile {
                        path: file.path.clone(),
                        backup_path,
                    });
                }
            }
            reports.push(report);
        } else {
            reports.push(report);
            failed_file = Some(idx + 1);
            break;
        }
    }

    let files_attempted = reports.len();
    let files_succeeded = reports.iter().filter(|r| r.success).count();
    let files_failed = files_attempted - files_succeeded;
    let edits_applied = reports
        .iter()
        .filter(|r| r.success)
        .map(|r| r.edits_applied)
        .sum();

    // Phase C: reverse-order rollback of everything already committed.
    let rollback = failed_file.map(|_| roll_back(&written));

    let success = failed_file.is_none();
    if success {
        info!(files = files_attempted, edits = edits_applied, dry_run, "batch complete");
    }

    BatchReport {
        success,
        violations: Vec::new(),
        files: reports,
        failed_file,
        summary: BatchSummary {
            files_attempted,
            files_succeeded,
            files_failed,
            edits_applied,
        },
        rollback,
    }
}

/// Phase A checks, in order: paths exist and are readable, no duplicate
/// resolved paths, no duplicate `old_string` per file.
fn validate_batch(files: &[FileEdits]) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Canonical path -> first path given for it.
    let mut seen: IndexMap<PathBuf, PathBuf> = IndexMap::new();

    for file in files {
        let path = &file.path;

        match fs::metadata(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                violations.push(Violation::MissingFile { path: path.clone() });
                continue;
            }
            Err(err) => {
                violations.push(Violation::Unreadable {
                    path: path.clone(),
                    detail: err.to_string(),
                });
                continue;
            }
            Ok(meta) if !meta.is_file() => {
                violations.push(Violation::NotAFile { path: path.clone() });
                continue;
            }
            Ok(_) => {}
        }

        if let Err(err) = crate::infra::io::probe_readable(path) {
            violations.push(Violation::Unreadable {
                path: path.clone(),
                detail: err.to_string(),
            });
            continue;
        }

        // Resolve symlink aliases before duplicate detection.
        let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
        if let Some(first) = seen.get(&canonical) {
            violations.push(Violation::DuplicatePath {
                path: path.clone(),
                first: first.clone(),
            });
        } else {
            seen.insert(canonical, path.clone());
        }

        violations.extend(duplicate_old_strings(path, &file.edits));
    }

    violations
}

fn duplicate_old_strings(path: &Path, edits: &[EditOp]) -> Vec<Violation> {
    let mut first_seen: IndexMap<&str, usize> = IndexMap::new();
    let mut violations = Vec::new();

    for (idx, edit) in edits.iter().enumerate() {
        match first_seen.get(edit.old_string.as_str()) {
            Some(&first) => violations.push(Violation::DuplicateOldString {
                path: path.to_path_buf(),
                first_edit: first + 1,
                edit: idx + 1,
            }),
            None => {
                first_seen.insert(edit.old_string.as_str(), idx);
            }
        }
    }

    violations
}

/// Restore committed files from their backups, most recent first. A
/// restoration failure does not stop the rest; everything restorable is
/// restored and the rest reported with surviving backup paths.
fn roll_back(written: &[CommittedFile]) -> Vec<RollbackEntry> {
    let mut entries = Vec::with_capacity(written.len());

    for committed in written.iter().rev() {
        match fs::copy(&committed.backup_path, &committed.path) {
            Ok(_) => {
                debug!(path = %committed.path.display(), "restored from backup");
                entries.push(RollbackEntry {
                    path: committed.path.clone(),
                    backup_path: committed.backup_path.clone(),
                    restored: true,
                    error: None,
                });
            }
            Err(err) => {
                warn!(
                    path = %committed.path.display(),
                    backup = %committed.backup_path.display(),
                    %err,
                    "rollback failed; backup retained for manual recovery"
                );
                entries.push(RollbackEntry {
                    path: committed.path.clone(),
                    backup_path: committed.backup_path.clone(),
                    restored: false,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    entries
}
