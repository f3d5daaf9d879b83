// resolve.rs - Lazy before/after IR resolution
//
// Reconstructs the full module snapshot on either side of any pass record:
//
//   after(i)  = before(i)                      if record i is unchanged
//             = body                           if record i is module-scoped
//             = splice(after(i-1), body)       otherwise
//   before(i) = after(i-1), before(1) = Initial IR
//
// Bodies stored as back-references are followed to their inline text first.
// Resolution walks forward from the nearest cached snapshot, so a query
// touches only records 1..i and never materializes the whole timeline.
//
// Results are memoized in a caller-owned `SessionCache`, stamped with the
// timeline generation it was built for. Any mutation of `changed` flags
// bumps the generation; a stale cache refuses to answer until `invalidate`.
//
// Preconditions: the timeline was produced by `trace::parse_trace` or
//   validated by `Timeline::from_parts`.
// Postconditions: before(i+1) == after(i); unchanged records resolve to
//   before == after; repeated queries return the same snapshot.
// Failure modes: index out of range, splice target missing, stale cache.
// Side effects: fills the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::diff::DiffStats;
use crate::error::ResolutionError;
use crate::group::{self, TimelineEntry};
use crate::id::RecordIndex;
use crate::ir::{self, IrModule, SpliceError, SpliceMode};
use crate::record::{IrPayload, Origin, Scope, Snapshot, Timeline};

/// Every this-many records along a walk, the snapshot is kept in the cache
/// even if nobody asked for it.
pub const CHECKPOINT_INTERVAL: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Before,
    After,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Before => f.write_str("before"),
            Edge::After => f.write_str("after"),
        }
    }
}

// ── Session cache ──────────────────────────────────────────────────────────

/// Memoized results for one resolution session over one timeline.
#[derive(Debug, Default)]
pub struct SessionCache {
    generation: u64,
    snapshots: HashMap<(RecordIndex, Edge), Snapshot>,
    pub(crate) diffs: HashMap<RecordIndex, DiffStats>,
    groups: Option<Vec<TimelineEntry>>,
}

impl SessionCache {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            generation: timeline.generation(),
            ..Self::default()
        }
    }

    /// Drop everything and adopt the timeline's current generation. Must be
    /// called after any bulk recomputation of `changed` flags.
    pub fn invalidate(&mut self, timeline: &Timeline) {
        self.snapshots.clear();
        self.diffs.clear();
        self.groups = None;
        self.generation = timeline.generation();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cached_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    pub(crate) fn ensure_fresh(&self, timeline: &Timeline) -> Result<(), ResolutionError> {
        if self.generation != timeline.generation() {
            return Err(ResolutionError::StaleCache {
                cache: self.generation,
                timeline: timeline.generation(),
            });
        }
        Ok(())
    }

    /// Grouped view of the timeline, built once per generation.
    pub fn groups(&mut self, timeline: &Timeline) -> Result<&[TimelineEntry], ResolutionError> {
        self.ensure_fresh(timeline)?;
        let groups = self
            .groups
            .get_or_insert_with(|| group::group(timeline.records()));
        Ok(groups.as_slice())
    }
}

// ── Queries ────────────────────────────────────────────────────────────────

pub fn resolve(
    timeline: &Timeline,
    cache: &mut SessionCache,
    index: RecordIndex,
    edge: Edge,
) -> Result<Snapshot, ResolutionError> {
    match edge {
        Edge::Before => before(timeline, cache, index),
        Edge::After => after(timeline, cache, index),
    }
}

pub fn before(
    timeline: &Timeline,
    cache: &mut SessionCache,
    index: RecordIndex,
) -> Result<Snapshot, ResolutionError> {
    cache.ensure_fresh(timeline)?;
    timeline.check(index)?;
    if let Some(hit) = cache.snapshots.get(&(index, Edge::Before)) {
        return Ok(hit.clone());
    }
    let snapshot = match index.prev() {
        None => timeline.initial_ir().clone(),
        Some(prev) => after(timeline, cache, prev)?,
    };
    cache.snapshots.insert((index, Edge::Before), snapshot.clone());
    Ok(snapshot)
}

pub fn after(
    timeline: &Timeline,
    cache: &mut SessionCache,
    index: RecordIndex,
) -> Result<Snapshot, ResolutionError> {
    cache.ensure_fresh(timeline)?;
    timeline.check(index)?;
    if let Some(hit) = cache.snapshots.get(&(index, Edge::After)) {
        return Ok(hit.clone());
    }

    // Nearest earlier snapshot we already have.
    let mut start = index.0 - 1;
    let mut state = timeline.initial_ir().clone();
    while start > 0 {
        if let Some(hit) = cache.snapshots.get(&(RecordIndex(start), Edge::After)) {
            state = hit.clone();
            break;
        }
        start -= 1;
    }
    trace!("resolving {} starting from #{}", index, start);

    for n in start + 1..=index.0 {
        let current = RecordIndex(n);
        state = step(timeline, current, &state)?;
        if n == index.0 || n % CHECKPOINT_INTERVAL == 0 {
            cache.snapshots.insert((current, Edge::After), state.clone());
        }
    }
    Ok(state)
}

/// Resolved snapshot narrowed to the record's scope: the whole module for
/// module passes, otherwise the target functions plus the declarations they
/// use.
pub fn focused(
    timeline: &Timeline,
    cache: &mut SessionCache,
    index: RecordIndex,
    edge: Edge,
) -> Result<Vec<String>, ResolutionError> {
    let snapshot = resolve(timeline, cache, index, edge)?;
    let record = timeline.record(index)?;
    Ok(match &record.scope {
        Scope::Module => snapshot.as_ref().clone(),
        scope => ir::focus(&snapshot, &scope.functions()),
    })
}

// ── Reclassification ───────────────────────────────────────────────────────

/// Bulk post-parse classification: demote every `changed` record whose
/// resolved before and after are identical (print-after-all traces report
/// every dumped pass as changed). Returns the demoted records.
///
/// Bumps the timeline generation when anything is demoted; existing caches
/// must be invalidated afterwards.
pub fn reclassify_unchanged(timeline: &mut Timeline) -> Result<Vec<RecordIndex>, ResolutionError> {
    let mut demoted = Vec::new();
    let mut state = timeline.initial_ir().clone();
    for index in timeline.indices() {
        let next = step(timeline, index, &state)?;
        let record = &timeline.records()[index.position()];
        if record.changed && (Arc::ptr_eq(&next, &state) || next == state) {
            demoted.push(index);
        }
        state = next;
    }
    if !demoted.is_empty() {
        debug!("reclassified {} records as unchanged", demoted.len());
    }
    timeline.demote(&demoted);
    Ok(demoted)
}

// ── Resolution step ────────────────────────────────────────────────────────

/// Compute after(index) from after(index - 1).
fn step(timeline: &Timeline, index: RecordIndex, prev: &Snapshot) -> Result<Snapshot, ResolutionError> {
    if !timeline.record(index)?.changed {
        return Ok(prev.clone());
    }
    apply_dump(timeline, index, prev)
}

/// What the record's dumped body makes of `prev`, whatever its `changed`
/// flag says. Records without a body leave `prev` as is.
pub(crate) fn apply_dump(
    timeline: &Timeline,
    index: RecordIndex,
    prev: &Snapshot,
) -> Result<Snapshot, ResolutionError> {
    let record = timeline.record(index)?;
    let body = match content(timeline, index)? {
        Some(body) => body,
        None => return Ok(prev.clone()),
    };

    match &record.scope {
        Scope::Module => Ok(body),
        _ if ir::is_full_module(&body) => Ok(body),
        Scope::Loop { function, .. } if !IrModule::parse(&body).has_definitions() => {
            trace!("{}: loop-only dump for {}, keeping function text", index, function);
            Ok(prev.clone())
        }
        scope => {
            let mode = if timeline.initial_is_partial() {
                SpliceMode::Partial
            } else {
                SpliceMode::Strict
            };
            let targets = scope.functions();
            if mode == SpliceMode::Partial {
                let base = IrModule::parse(prev);
                for t in targets.iter().filter(|t| !base.defines(t)) {
                    warn!("{}: '{}' not in partial context, appending", index, t);
                }
            }
            ir::splice(prev, &body, &targets, mode)
                .map(Arc::new)
                .map_err(|e| match e {
                    SpliceError::MissingTarget(function) => {
                        ResolutionError::SpliceTargetMissing { index, function }
                    }
                })
        }
    }
}

/// The body a record stands for, following back-references. `None` when
/// the record carries no IR.
fn content(timeline: &Timeline, index: RecordIndex) -> Result<Option<Snapshot>, ResolutionError> {
    let records = timeline.records();
    let mut pos = index.position();
    for _ in 0..=records.len() {
        match &records[pos].payload {
            IrPayload::Omitted => return Ok(None),
            IrPayload::Inline(lines) => return Ok(Some(lines.clone())),
            IrPayload::SameAs(Origin::Initial) => return Ok(Some(timeline.initial_ir().clone())),
            IrPayload::SameAs(Origin::Record(target)) => {
                if target.0 == 0 || target.position() >= records.len() {
                    return Err(ResolutionError::ReferenceCycle { index });
                }
                pos = target.position();
            }
        }
    }
    Err(ResolutionError::ReferenceCycle { index })
}

// ── Tests ──────────────────────────────────────────────────────────────────
