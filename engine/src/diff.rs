// diff.rs - Line diff statistics and the changed-flag validation pass
//
// `diff` only measures how much a pass changed; whether it changed anything
// always comes from the record's `changed` flag. `validate` cross-checks the
// two and reports contradictions as diagnostics without touching the flag.
//
// Preconditions: none for `diff`; `validate` needs a fresh cache.
// Postconditions: `lines_changed == 0` iff the inputs are equal.
// Failure modes: resolution errors propagate from `validate`.
// Side effects: fills the session cache.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::error::ResolutionError;
use crate::id::RecordIndex;
use crate::ir::{clean, CleanOptions};
use crate::record::{IrPayload, Origin, PassRecord, ScopeType, Timeline};
use crate::resolve::{self, SessionCache};

/// Passes that may report a change the textual IR does not show once
/// attributes and metadata are stripped.
pub const ATTRIBUTE_ONLY_PASSES: &[&str] = &[
    "Annotation2MetadataPass",
    "AnnotationRemarksPass",
    "ForceFunctionAttrsPass",
    "InferFunctionAttrsPass",
    "PostOrderFunctionAttrsPass",
    "ReversePostOrderFunctionAttrsPass",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub lines_before: usize,
    pub lines_after: usize,
    pub lines_changed: usize,
}

impl DiffStats {
    pub fn is_empty(&self) -> bool {
        self.lines_changed == 0
    }

    /// Signed growth in line count.
    pub fn delta(&self) -> isize {
        self.lines_after as isize - self.lines_before as isize
    }
}

/// Index-wise comparison: the length difference plus every differing line
/// in the overlapping prefix.
pub fn diff(before: &[String], after: &[String]) -> DiffStats {
    let overlap = before
        .iter()
        .zip(after)
        .filter(|(b, a)| b != a)
        .count();
    DiffStats {
        lines_before: before.len(),
        lines_after: after.len(),
        lines_changed: before.len().abs_diff(after.len()) + overlap,
    }
}

/// Diff statistics for one record, memoized in the session cache.
pub fn diff_stats(
    timeline: &Timeline,
    cache: &mut SessionCache,
    index: RecordIndex,
) -> Result<DiffStats, ResolutionError> {
    cache.ensure_fresh(timeline)?;
    if let Some(stats) = cache.diffs.get(&index) {
        return Ok(*stats);
    }
    let before = resolve::before(timeline, cache, index)?;
    let after = resolve::after(timeline, cache, index)?;
    let stats = diff(&before, &after);
    cache.diffs.insert(index, stats);
    Ok(stats)
}

/// Records whose `changed` flag may legitimately disagree with the visible
/// text: attribute/metadata-only passes and loop passes, which only expose
/// the enclosing function.
pub fn is_exempt(record: &PassRecord) -> bool {
    record.scope_type() == ScopeType::Loop || ATTRIBUTE_ONLY_PASSES.contains(&record.pass.as_str())
}

// ── Validation ─────────────────────────────────────────────────────────────

/// Compare every record's `changed` flag with its resolved snapshots.
///
/// - `W0100`: flagged changed, but before and after agree once cleaned.
/// - `E0101`: flagged unchanged, yet the record carries a body that would
///   alter its input.
pub fn validate(timeline: &Timeline, cache: &mut SessionCache) -> Result<Vec<Diagnostic>, ResolutionError> {
    let opts = CleanOptions::default();
    let mut diags = Vec::new();

    for index in timeline.indices() {
        let record = timeline.record(index)?;
        let before = resolve::before(timeline, cache, index)?;

        if record.changed {
            if is_exempt(record) {
                continue;
            }
            // The first record stands in for the missing initial dump.
            if index == RecordIndex::FIRST && timeline.initial_is_partial() {
                continue;
            }
            let after = resolve::after(timeline, cache, index)?;
            if clean(&before, opts) == clean(&after, opts) {
                let mut d = Diagnostic::new(
                    DiagLevel::Warning,
                    Some(index),
                    format!("{} is marked changed but its IR is identical", record.display_name()),
                )
                .with_code(codes::W0100)
                .with_hint("run with --reclassify to demote passes without a visible change");
                if let IrPayload::SameAs(Origin::Record(origin)) = record.payload {
                    d = d.with_related(origin, "dumped body repeats this record");
                }
                diags.push(d);
            }
        } else if record.payload.has_content() {
            let dumped = resolve::apply_dump(timeline, index, &before)?;
            if dumped != before {
                diags.push(
                    Diagnostic::new(
                        DiagLevel::Error,
                        Some(index),
                        format!(
                            "{} is marked unchanged but its dumped IR differs from its input",
                            record.display_name()
                        ),
                    )
                    .with_code(codes::E0101)
                    .with_hint("the record's changed flag contradicts its body; check how the timeline was produced"),
                );
            }
        }
    }
    debug!("validation produced {} diagnostics", diags.len());
    Ok(diags)
}

// ── Tests ──────────────────────────────────────────────────────────────────
