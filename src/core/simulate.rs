//! Sequential in-memory simulation of an edit batch.
//!
//! The whole atomicity story rests on this module: a batch is applied to a
//! copy of the content, edit by edit, and only a fully successful
//! simulation is ever allowed to reach disk. Pure, no I/O.

use serde::{Deserialize, Serialize};

use crate::core::matcher;

/// One requested replacement. `old_string` must be non-empty; the request
/// layer enforces that before a batch reaches the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditOp {
    /// Literal text to find.
    pub old_string: String,
    /// Literal replacement (may be empty, may equal `old_string`).
    pub new_string: String,
    /// Replace every match instead of requiring exactly one.
    #[serde(default)]
    pub replace_all: bool,
    /// Lowercase only the comparison; the original-case text is replaced.
    #[serde(default)]
    pub case_insensitive: bool,
}

/// Per-edit outcome recorded by a successful simulation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// The searched string, echoed back for reporting.
    pub old_string: String,
    /// How many matches were found.
    pub matches: usize,
    /// How many of them were replaced.
    pub replaced: usize,
}

/// Why a single edit step was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MatchFailure {
    /// Zero matches. Always an error, even with `replace_all`: a
    /// replace-all that matches nothing is still a mistake worth surfacing.
    NotFound,
    /// More than one match without `replace_all`. Carries the 1-based line
    /// number of every match so the caller can disambiguate.
    Ambiguous { lines: Vec<usize> },
}

/// A fully successful simulation: the final content plus one outcome per
/// edit, in batch order.
#[derive(Debug, Clone)]
pub struct Simulated {
    pub content: String,
    pub outcomes: Vec<EditOutcome>,
}

/// The first failing edit of a rejected batch.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// 0-based index of the failing edit.
    pub index: usize,
    pub failure: MatchFailure,
    /// Content state immediately before the failing edit, for diagnostics.
    pub content: String,
    /// Outcomes of the edits that succeeded before the failure.
    pub outcomes: Vec<EditOutcome>,
}

/// Run `edits` against `content` without touching disk. Edit *i* operates
/// on the content produced by edits `0..i`. The input string is never
/// mutated; an updated copy is threaded between steps.
pub fn simulate(content: &str, edits: &[EditOp]) -> Result<Simulated, Rejection> {
    let mut current = content.to_string();
    let mut outcomes = Vec::with_capacity(edits.len());

    for (index, edit) in edits.iter().enumerate() {
        // Intentionally inert edit: record a no-op and move on.
        if edit.old_string == edit.new_string {
            outcomes.push(EditOutcome {
                old_string: edit.old_string.clone(),
                matches: 0,
                replaced: 0,
            });
            continue;
        }

        let positions =
            matcher::find_positions(&current, &edit.old_string, edit.case_insensitive);

        if positions.is_empty() {
            return Err(Rejection {
                index,
                failure: MatchFailure::NotFound,
                content: current,
                outcomes,
            });
        }

        if positions.len() > 1 && !edit.replace_all {
            // Silently picking "the first match" risks editing the wrong
            // occurrence; an explicit replace_all is required instead.
            let lines = positions
                .iter()
                .map(|&p| matcher::line_number_at(&current, p))
                .collect();
            return Err(Rejection {
                index,
                failure: MatchFailure::Ambiguous { lines },
                content: current,
                outcomes,
            });
        }

        let matches = positions.len();
        let (next, replaced) = matcher::replace(
            &current,
            &edit.old_string,
            &edit.new_string,
            edit.replace_all,
            edit.case_insensitive,
        );
        current = next;
        outcomes.push(EditOutcome {
            old_string: edit.old_string.clone(),
            matches,
            replaced,
        });
    }

    Ok(Simulated {
        content: current,
        outcomes,
    })
}
