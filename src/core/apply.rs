//! `pup apply`: parse and validate a request document, drive the engine,
//! render structured or human reports.
//!
//! This is the outer boundary of the crate. Requests arrive as JSON,
//! are schema-checked and path-resolved here, and everything below this
//! module works with already-validated, strongly-typed batches.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::Deserialize;
use similar::TextDiff;
use tracing::debug;

use crate::cli::{AppContext, ApplyArgs};
use crate::core::coordinator::{self, BatchReport, FileEdits};
use crate::core::simulate::EditOp;
use crate::core::transaction::{self, ApplyOptions, EditFailure, FileReport};
use crate::infra::config::load_config;

/// The request document, as received. Tri-state flags distinguish
/// "omitted" from "explicitly false" so config defaults can fill gaps.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditRequest {
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub backup: Option<bool>,
    #[serde(default)]
    pub include_content: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub path: String,
    pub edits: Vec<EditOp>,
}

/// Domain error taxonomy for exit-code mapping.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Malformed or self-contradictory request. Retryable with fixed input.
    #[error("invalid request: {}", .problems.join("; "))]
    InvalidRequest { problems: Vec<String> },

    /// Edits were refused by matching (not found / ambiguous).
    #[error("conflicts: {0}")]
    Conflicts(String),

    /// Encoding, backup, or filesystem failure.
    #[error("file error: {0}")]
    File(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// 0=success, 2=conflict, 3=invalid request, 4=file error, 5=internal.
pub fn exit_code_for(e: &CliError) -> i32 {
    match e {
        CliError::Conflicts(_) => 2,
        CliError::InvalidRequest { .. } => 3,
        CliError::File(_) => 4,
        CliError::Internal(_) => 5,
    }
}

/// Apply a request document to disk.
pub fn run(args: ApplyArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config().map_err(|e| CliError::Internal(format!("config: {e:#}")))?;

    let text = read_request_text(&args.request)?;
    let request: EditRequest = serde_json::from_str(&text).map_err(|e| CliError::InvalidRequest {
        problems: vec![format!("request is not valid JSON: {e}")],
    })?;

    let files = resolve_request(&request.files)
        .map_err(|problems| CliError::InvalidRequest { problems })?;

    // Precedence: CLI flag, then request document, then config.
    let dry_run = ctx.dry_run || request.dry_run.unwrap_or(false);
    let backup = if args.no_backup {
        false
    } else {
        request.backup.unwrap_or(config.backup)
    };
    let include_content = args.include_content || request.include_content.unwrap_or(config.include_content);
    let json = args.json || config.json;
    let context_lines = args.context_lines.unwrap_or(config.context_lines);

    // The human dry-run preview needs the final content for its diff.
    let materialize = include_content || (dry_run && !json);

    debug!(files = files.len(), dry_run, backup, "request accepted");

    if let [file] = files.as_slice() {
        let opts = ApplyOptions {
            dry_run,
            backup,
            include_content: materialize,
        };
        let report = transaction::apply_edits(&file.path, &file.edits, &opts);

        if json {
            println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
        } else {
            render_file_report(&report, dry_run, context_lines, ctx);
        }

        return match &report.failure {
            None => Ok(()),
            Some(failure) => Err(failure_to_error(failure).into()),
        };
    }

    if args.no_backup && !ctx.quiet && !json {
        eprintln!("note: backups are mandatory for multi-file batches; --no-backup ignored");
    }

    let report = coordinator::apply_across_files(&files, dry_run, materialize);

    if json {
        println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
    } else {
        render_batch_report(&report, dry_run, context_lines, ctx);
    }

    if report.success {
        return Ok(());
    }
    if !report.violations.is_empty() {
        return Err(CliError::InvalidRequest {
            problems: report.violations.iter().map(ToString::to_string).collect(),
        }
        .into());
    }
    let failure = report
        .files
        .iter()
        .find_map(|f| f.failure.as_ref())
        .ok_or_else(|| CliError::Internal("batch failed without a failing file".into()))?;
    Err(failure_to_error(failure).into())
}

fn failure_to_error(failure: &EditFailure) -> CliError {
    if failure.retryable() {
        CliError::Conflicts(failure.to_string())
    } else {
        CliError::File(failure.to_string())
    }
}

fn read_request_text(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read request from stdin")?;
        return Ok(buf);
    }
    let expanded = shellexpand::tilde(arg);
    fs::read_to_string(expanded.as_ref())
        .with_context(|| format!("read request file: {expanded}"))
}

/// Schema-level validation: collect every problem across the whole
/// document rather than stopping at the first, so a caller can fix all of
/// them in one retry.
fn resolve_request(entries: &[FileEntry]) -> Result<Vec<FileEdits>, Vec<String>> {
    let mut problems = Vec::new();

    if entries.is_empty() {
        problems.push("files: at least one entry is required".to_string());
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut resolved = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        if entry.edits.is_empty() {
            problems.push(format!("files[{i}].edits: at least one edit is required"));
        }
        for (j, edit) in entry.edits.iter().enumerate() {
            if edit.old_string.is_empty() {
                problems.push(format!("files[{i}].edits[{j}].old_string: must be non-empty"));
            }
        }
        match resolve_path(&entry.path, &cwd) {
            Ok(path) => resolved.push(FileEdits {
                path,
                edits: entry.edits.clone(),
            }),
            Err(msg) => problems.push(format!("files[{i}].path: {msg}")),
        }
    }

    if problems.is_empty() {
        Ok(resolved)
    } else {
        Err(problems)
    }
}

/// Expand `~`/`$VAR`, anchor relative paths at the current directory, and
/// refuse traversal segments.
fn resolve_path(raw: &str, cwd: &Path) -> Result<PathBuf, String> {
    if raw.is_empty() {
        return Err("must be non-empty".to_string());
    }
    let expanded = shellexpand::tilde(raw);
    let mut path = PathBuf::from(expanded.as_ref());
    if path.is_relative() {
        path = cwd.join(path);
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err("path traversal segments are not allowed".to_string());
    }
    Ok(path)
}

fn render_file_report(report: &FileReport, dry_run: bool, context_lines: usize, ctx: &AppContext) {
    let color = !ctx.no_color;

    match &report.failure {
        None => {
            if !ctx.quiet {
                let verb = if dry_run { "would edit" } else { "edited" };
                let tag = if color {
                    "ok".green().bold().to_string()
                } else {
                    "ok".to_string()
                };
                let counts = report
                    .edits
                    .iter()
                    .map(|e| format!("{}/{}", e.replaced, e.matches))
                    .join(", ");
                println!(
                    "{tag} {verb} {} ({} edit(s): {counts})",
                    report.path.display(),
                    report.edits_applied
                );
                if let Some(bak) = &report.backup_path {
                    println!("   backup: {}", bak.display());
                }
            }
            if dry_run {
                render_diff(report, context_lines, ctx);
            }
        }
        Some(failure) => {
            let tag = if color {
                "failed".red().bold().to_string()
            } else {
                "failed".to_string()
            };
            eprintln!("{tag} {}: {failure}", report.path.display());
            if let Some(bak) = &report.backup_path {
                eprintln!("   pristine copy: {}", bak.display());
            }
            render_failure_snippet(report, failure, ctx);
        }
    }
}

/// For ambiguous matches, show the offending lines out of the content
/// state at failure so the caller can pick a longer old_string.
fn render_failure_snippet(report: &FileReport, failure: &EditFailure, ctx: &AppContext) {
    if ctx.quiet {
        return;
    }
    let (EditFailure::Ambiguous { lines, .. }, Some(content)) =
        (failure, &report.content_at_failure)
    else {
        return;
    };
    let all: Vec<&str> = content.lines().collect();
    for &n in lines.iter().unique() {
        if let Some(text) = all.get(n - 1) {
            eprintln!("   line {n}: {text}");
        }
    }
}

fn render_diff(report: &FileReport, context_lines: usize, ctx: &AppContext) {
    let Some(new) = &report.content else { return };
    // A dry run leaves the target untouched, so disk still holds the old
    // content.
    let Ok(old) = fs::read_to_string(&report.path) else {
        return;
    };
    if old == *new {
        return;
    }

    let name = report.path.display().to_string();
    let diff = TextDiff::from_lines(old.as_str(), new.as_str());
    let unified = diff
        .unified_diff()
        .context_radius(context_lines)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string();

    if ctx.no_color {
        print!("{unified}");
        return;
    }
    for line in unified.lines() {
        if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}

fn render_batch_report(report: &BatchReport, dry_run: bool, context_lines: usize, ctx: &AppContext) {
    if !report.violations.is_empty() {
        eprintln!("request refused; nothing was touched:");
        for violation in &report.violations {
            eprintln!("  - {violation}");
        }
        return;
    }

    for file in &report.files {
        render_file_report(file, dry_run, context_lines, ctx);
    }

    if !ctx.quiet {
        let s = &report.summary;
        println!(
            "{} file(s) attempted, {} succeeded, {} failed, {} edit(s) {}",
            s.files_attempted,
            s.files_succeeded,
            s.files_failed,
            s.edits_applied,
            if dry_run { "simulated" } else { "applied" }
        );
    }

    if let Some(rollback) = &report.rollback {
        for entry in rollback {
            if entry.restored {
                eprintln!(
                    "rolled back {} (backup kept at {})",
                    entry.path.display(),
                    entry.backup_path.display()
                );
            } else {
                eprintln!(
                    "FAILED to roll back {}: {}; recover manually from {}",
                    entry.path.display(),
                    entry.error.as_deref().unwrap_or("unknown error"),
                    entry.backup_path.display()
                );
            }
        }
    }
}
