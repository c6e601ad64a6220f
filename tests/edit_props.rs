//! Property tests for the simulator and the single-file transaction.
//!
//! Content and needle alphabets are kept disjoint where a property needs
//! a guaranteed absent (or guaranteed clean) needle.

use std::fs;

use patchup::core::simulate::{EditOp, simulate};
use patchup::core::transaction::{ApplyOptions, apply_edits};
use proptest::prelude::*;

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

proptest! {
    /// old == new never changes content and never errors, even when the
    /// text does not occur at all.
    #[test]
    fn noop_edits_are_always_inert(content in ".*", s in ".*") {
        let noop = edit(&s, &s);
        let sim = simulate(&content, &[noop]).unwrap();
        prop_assert_eq!(sim.content, content);
        prop_assert_eq!(sim.outcomes[0].replaced, 0);
    }

    /// An absent needle is rejected at its index with the input threaded
    /// through unmodified.
    #[test]
    fn absent_needle_is_rejected_unchanged(content in "[a-m \n]*", needle in "[n-z]{1,8}") {
        let err = simulate(&content, &[edit(&needle, "X")]).unwrap_err();
        prop_assert_eq!(err.index, 0);
        prop_assert_eq!(err.content, content);
    }

    /// replace_all eliminates every occurrence and counts them all.
    #[test]
    fn replace_all_is_exhaustive(pieces in prop::collection::vec("[a-y]{0,6}", 2..6)) {
        let content = pieces.join("z");
        let occurrences = pieces.len() - 1;

        let sim = simulate(&content, &[edit_all("z", "q")]).unwrap();
        prop_assert_eq!(sim.outcomes[0].matches, occurrences);
        prop_assert_eq!(sim.outcomes[0].replaced, occurrences);
        prop_assert!(!sim.content.contains('z'));
        prop_assert_eq!(sim.content, pieces.join("q"));
    }

    /// Applying [e1, e2] as one batch equals applying e1, then e2 to its
    /// output: no edit sees anything but its predecessor's result.
    #[test]
    fn batches_compose_sequentially(body in "[a-f]{0,12}") {
        let content = format!("<one>{body}<two>");
        let e1 = edit("<one>", "[1]");
        let e2 = edit("<two>", "[2]");

        let batch = simulate(&content, &[e1.clone(), e2.clone()]).unwrap();
        let first = simulate(&content, &[e1]).unwrap();
        let second = simulate(&first.content, &[e2]).unwrap();
        prop_assert_eq!(batch.content, second.content);
    }

    /// A single unique match replaces exactly that occurrence.
    #[test]
    fn unique_match_is_spliced_in_place(
        prefix in "[a-m]{0,10}",
        suffix in "[a-m]{0,10}",
        replacement in "[a-z]{0,6}",
    ) {
        let content = format!("{prefix}XYZ{suffix}");
        let sim = simulate(&content, &[edit("XYZ", &replacement)]).unwrap();
        prop_assert_eq!(sim.content, format!("{prefix}{replacement}{suffix}"));
    }
}

proptest! {
    // Filesystem-backed cases are slower; keep the sample small.
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A failed batch leaves the file byte-identical to its pre-call
    /// state, no matter what succeeded in memory before the failure.
    #[test]
    fn failed_batches_never_mutate_disk(
        body in "[a-m \n]{0,64}",
        needle in "[n-z]{1,6}",
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("target.txt");
        fs::write(&path, body.as_bytes()).unwrap();

        let edits = [edit(&needle, "replacement")];
        let report = apply_edits(&path, &edits, &ApplyOptions::default());

        prop_assert!(!report.success);
        prop_assert_eq!(fs::read_to_string(&path).unwrap(), body);
    }

    /// The backup snapshot is byte-identical to the original content.
    #[test]
    fn backups_are_faithful(body in "[a-m \n]{1,64}") {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("target.txt");
        fs::write(&path, body.as_bytes()).unwrap();

        let report = apply_edits(&path, &[edit("a", "a")], &ApplyOptions::default());
        prop_assert!(report.success);

        let backup = report.backup_path.unwrap();
        prop_assert_eq!(fs::read_to_string(backup).unwrap(), body);
    }
}
