//! Integration tests for the single-file transaction lifecycle.

use std::fs;
use std::path::{Path, PathBuf};

use patchup::core::simulate::EditOp;
use patchup::core::transaction::{ApplyOptions, EditFailure, apply_edits};
use patchup::infra::io::FsCause;
use tempfile::tempdir;

fn edit(old: &str, new: &str) -> EditOp {
    EditOp {
        old_string: old.to_string(),
        new_string: new.to_string(),
        replace_all: false,
        case_insensitive: false,
    }
}

fn edit_all(old: &str, new: &str) -> EditOp {
    EditOp {
        replace_all: true,
        ..edit(old, new)
    }
}

/// Create a file with the given body and return its path.
fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body.as_bytes()).unwrap();
    path
}

fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn bak(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

#[test]
fn replaces_a_unique_match() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "hello world");

    let report = apply_edits(&path, &[edit("hello", "goodbye")], &ApplyOptions::default());

    assert!(report.success);
    assert_eq!(report.edits_applied, 1);
    assert_eq!(report.edits[0].matches, 1);
    assert_eq!(report.edits[0].replaced, 1);
    assert_eq!(read_file(&path), "goodbye world");
}

#[test]
fn ambiguous_match_fails_and_leaves_file_untouched() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "foo foo foo");

    let report = apply_edits(&path, &[edit("foo", "bar")], &ApplyOptions::default());

    assert!(!report.success);
    match report.failure {
        Some(EditFailure::Ambiguous {
            position,
            total,
            ref lines,
        }) => {
            assert_eq!(position, 1);
            assert_eq!(total, 1);
            assert_eq!(lines, &vec![1, 1, 1]);
        }
        other => panic!("expected ambiguous failure, got {other:?}"),
    }
    assert_eq!(read_file(&path), "foo foo foo");
}

#[test]
fn replace_all_changes_every_occurrence() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "foo foo foo");

    let report = apply_edits(&path, &[edit_all("foo", "bar")], &ApplyOptions::default());

    assert!(report.success);
    assert_eq!(report.edits[0].matches, 3);
    assert_eq!(report.edits[0].replaced, 3);
    assert_eq!(read_file(&path), "bar bar bar");
}

#[test]
fn not_found_fails_but_backup_was_taken() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "a");

    let report = apply_edits(&path, &[edit("x", "y")], &ApplyOptions::default());

    assert!(!report.success);
    assert!(matches!(
        report.failure,
        Some(EditFailure::NotFound {
            position: 1,
            total: 1
        })
    ));
    assert_eq!(read_file(&path), "a");

    // The safety snapshot exists and holds the pristine content.
    let backup = report.backup_path.expect("backup path in failure report");
    assert_eq!(backup, bak(&path));
    assert_eq!(read_file(&backup), "a");
}

#[test]
fn dry_run_reports_but_does_not_write() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "x");

    let opts = ApplyOptions {
        dry_run: true,
        include_content: true,
        ..ApplyOptions::default()
    };
    let report = apply_edits(&path, &[edit("x", "y")], &opts);

    assert!(report.success);
    assert_eq!(report.content.as_deref(), Some("y"));
    assert_eq!(read_file(&path), "x");
    // The backup is still created: the user may want the snapshot before
    // deciding whether to commit.
    assert_eq!(read_file(&bak(&path)), "x");
}

#[test]
fn backup_can_be_disabled_for_single_files() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "hello");

    let opts = ApplyOptions {
        backup: false,
        ..ApplyOptions::default()
    };
    let report = apply_edits(&path, &[edit("hello", "hi")], &opts);

    assert!(report.success);
    assert!(report.backup_path.is_none());
    assert!(!bak(&path).exists());
}

#[test]
fn invalid_utf8_is_an_encoding_failure() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("binary.bin");
    fs::write(&path, [0x68, 0x69, 0xff, 0xfe]).unwrap();

    let report = apply_edits(&path, &[edit("hi", "ho")], &ApplyOptions::default());

    assert!(!report.success);
    assert!(matches!(report.failure, Some(EditFailure::Encoding { .. })));
    // Bytes on disk are untouched.
    assert_eq!(fs::read(&path).unwrap(), vec![0x68, 0x69, 0xff, 0xfe]);
}

#[test]
fn missing_file_maps_to_a_filesystem_cause() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nope.txt");

    let report = apply_edits(&path, &[edit("a", "b")], &ApplyOptions::default());

    assert!(!report.success);
    match report.failure {
        Some(EditFailure::Filesystem { cause, .. }) => assert_eq!(cause, FsCause::NotFound),
        other => panic!("expected filesystem failure, got {other:?}"),
    }
}

#[test]
fn edits_apply_in_order_on_each_others_output() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "one two three");

    let edits = [edit("one", "1"), edit("two", "2"), edit("three", "3")];
    let report = apply_edits(&path, &edits, &ApplyOptions::default());

    assert!(report.success);
    assert_eq!(report.edits_applied, 3);
    assert_eq!(read_file(&path), "1 2 3");
}

#[test]
fn mid_batch_failure_persists_nothing() {
    let tmp = tempdir().unwrap();
    let body = "alpha beta";
    let path = write_file(tmp.path(), "demo.txt", body);

    let edits = [edit("alpha", "gamma"), edit("missing", "x")];
    let report = apply_edits(&path, &edits, &ApplyOptions::default());

    assert!(!report.success);
    assert!(matches!(
        report.failure,
        Some(EditFailure::NotFound {
            position: 2,
            total: 2
        })
    ));
    // The first edit succeeded in memory only; disk is byte-identical.
    assert_eq!(read_file(&path), body);
    // One outcome was recorded for the edit that did succeed.
    assert_eq!(report.edits.len(), 1);
}

#[test]
fn noop_edit_is_inert_and_successful() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "abc");

    let report = apply_edits(&path, &[edit("zzz", "zzz")], &ApplyOptions::default());

    assert!(report.success);
    assert_eq!(report.edits[0].replaced, 0);
    assert_eq!(read_file(&path), "abc");
}

#[test]
fn content_is_omitted_unless_requested() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "hello");

    let report = apply_edits(&path, &[edit("hello", "hi")], &ApplyOptions::default());
    assert!(report.success);
    assert!(report.content.is_none());

    let path2 = write_file(tmp.path(), "demo2.txt", "hello");
    let opts = ApplyOptions {
        include_content: true,
        ..ApplyOptions::default()
    };
    let report = apply_edits(&path2, &[edit("hello", "hi")], &opts);
    assert_eq!(report.content.as_deref(), Some("hi"));
}

#[test]
fn restoring_from_backup_reproduces_the_original() {
    let tmp = tempdir().unwrap();
    let body = "line one\nline two\n";
    let path = write_file(tmp.path(), "demo.txt", body);

    let report = apply_edits(&path, &[edit("one", "1")], &ApplyOptions::default());
    assert!(report.success);
    assert_eq!(read_file(&path), "line 1\nline two\n");

    // Manual recovery from the snapshot round-trips exactly.
    fs::copy(bak(&path), &path).unwrap();
    assert_eq!(read_file(&path), body);
}

#[cfg(unix)]
#[test]
fn backup_and_target_keep_permission_bits() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "run.sh", "#!/bin/sh\necho hello\n");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

    let report = apply_edits(&path, &[edit("hello", "hi")], &ApplyOptions::default());
    assert!(report.success);

    let target_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    let backup_mode = fs::metadata(bak(&path)).unwrap().permissions().mode() & 0o777;
    assert_eq!(target_mode, 0o750);
    assert_eq!(backup_mode, 0o750);
}

#[test]
fn crlf_content_round_trips_byte_exact() {
    let tmp = tempdir().unwrap();
    let path = write_file(tmp.path(), "demo.txt", "a\r\nb\r\n");

    let report = apply_edits(&path, &[edit("b", "c")], &ApplyOptions::default());

    assert!(report.success);
    assert_eq!(read_file(&path), "a\r\nc\r\n");
}
