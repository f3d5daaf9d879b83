// record.rs - Pass records and the timeline that owns them
//
// A Timeline is the immutable-after-construction product of the log parser:
// the Initial IR plus every pass record in emission order. IR bodies are
// stored lazily: a record either carries its dump inline, points back at an
// earlier identical dump, or carries nothing because the pass reported no
// change.
//
// The only mutation a timeline admits after construction is demoting
// `changed` flags (see `resolve::reclassify_unchanged`), which bumps the
// generation counter so caches built earlier refuse to answer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ResolutionError};
use crate::frontend::Invocation;
use crate::id::RecordIndex;

/// A full or partial IR text, one entry per line. Shared, never copied.
pub type Snapshot = Arc<Vec<String>>;

/// Target literal used by module-scoped dumps.
pub const MODULE_SENTINEL: &str = "[module]";

// ── Scope ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeType {
    Module,
    Function,
    Cgscc,
    Loop,
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScopeType::Module => "module",
            ScopeType::Function => "function",
            ScopeType::Cgscc => "cgscc",
            ScopeType::Loop => "loop",
        };
        f.write_str(s)
    }
}

/// What a pass ran over, with its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Module,
    Function(String),
    /// Members of one call-graph strongly-connected component.
    Cgscc(Vec<String>),
    Loop { header: String, function: String },
}

impl Scope {
    pub fn scope_type(&self) -> ScopeType {
        match self {
            Scope::Module => ScopeType::Module,
            Scope::Function(_) => ScopeType::Function,
            Scope::Cgscc(_) => ScopeType::Cgscc,
            Scope::Loop { .. } => ScopeType::Loop,
        }
    }

    /// Target as printed after `on` in the dump header (parentheses of a
    /// CGSCC stripped).
    pub fn target(&self) -> String {
        match self {
            Scope::Module => MODULE_SENTINEL.to_string(),
            Scope::Function(name) => name.clone(),
            Scope::Cgscc(members) => members.join(", "),
            Scope::Loop { header, function } => format!("loop {} in function {}", header, function),
        }
    }

    /// Functions whose definitions a dump of this scope replaces.
    pub fn functions(&self) -> Vec<&str> {
        match self {
            Scope::Module => Vec::new(),
            Scope::Function(name) => vec![name.as_str()],
            Scope::Cgscc(members) => members.iter().map(String::as_str).collect(),
            Scope::Loop { function, .. } => vec![function.as_str()],
        }
    }
}

// ── IR payload ─────────────────────────────────────────────────────────────

/// Where a back-referenced body lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Initial,
    Record(RecordIndex),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrPayload {
    /// No body was dumped.
    Omitted,
    Inline(Snapshot),
    /// Textually identical to an earlier body.
    SameAs(Origin),
}

impl IrPayload {
    pub fn has_content(&self) -> bool {
        !matches!(self, IrPayload::Omitted)
    }
}

// ── Pass record ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    /// Bare pass name, e.g. `SROAPass`.
    pub pass: String,
    pub scope: Scope,
    /// Taken from the trace; only ever demoted by reclassification.
    pub changed: bool,
    pub payload: IrPayload,
    /// 1-based line of the dump header in the trace (0 when synthesized).
    pub line: usize,
}

impl PassRecord {
    pub fn new(pass: impl Into<String>, scope: Scope, changed: bool, payload: IrPayload) -> Self {
        Self {
            pass: pass.into(),
            scope,
            changed,
            payload,
            line: 0,
        }
    }

    /// Pass name with its target embedded, e.g. `SROAPass on foo`.
    pub fn display_name(&self) -> String {
        format!("{} on {}", self.pass, self.scope.target())
    }

    pub fn scope_type(&self) -> ScopeType {
        self.scope.scope_type()
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Identifies the trace a timeline was built from, so a stored session can
/// be checked against its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// SHA-256 of the raw trace text.
    pub trace_hash: [u8; 32],
    pub engine_version: String,
}

impl Provenance {
    pub fn for_trace(text: &str) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let mut trace_hash = [0u8; 32];
        trace_hash.copy_from_slice(&hasher.finalize());

        Provenance {
            trace_hash,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Hex string of the trace hash (64 characters).
    pub fn trace_hash_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.trace_hash {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }

    pub fn matches(&self, text: &str) -> bool {
        Provenance::for_trace(text).trace_hash == self.trace_hash
    }
}

// ── Timeline ───────────────────────────────────────────────────────────────

/// Serialized form of a timeline; deserialization re-validates it.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineParts {
    pub invocation: Invocation,
    pub initial_ir: Snapshot,
    pub initial_is_partial: bool,
    pub records: Vec<PassRecord>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimelineParts")]
pub struct Timeline {
    invocation: Invocation,
    initial_ir: Snapshot,
    initial_is_partial: bool,
    records: Vec<PassRecord>,
    provenance: Provenance,
    #[serde(skip)]
    generation: u64,
}

impl TryFrom<TimelineParts> for Timeline {
    type Error = ParseError;

    fn try_from(parts: TimelineParts) -> Result<Self, Self::Error> {
        Timeline::from_parts(parts)
    }
}

impl Timeline {
    /// Assemble a timeline, checking that every back-reference points at an
    /// earlier record that carries IR. Since references only point backward,
    /// a validated timeline has no reference cycles.
    pub fn from_parts(parts: TimelineParts) -> Result<Self, ParseError> {
        for (pos, record) in parts.records.iter().enumerate() {
            let index = RecordIndex::from_position(pos);
            if let IrPayload::SameAs(Origin::Record(target)) = record.payload {
                let valid = target.0 >= 1
                    && target < index
                    && parts.records[target.position()].payload.has_content();
                if !valid {
                    return Err(ParseError::InvalidBackReference {
                        index,
                        target: target.0,
                    });
                }
            }
        }
        Ok(Timeline {
            invocation: parts.invocation,
            initial_ir: parts.initial_ir,
            initial_is_partial: parts.initial_is_partial,
            records: parts.records,
            provenance: parts.provenance,
            generation: 0,
        })
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn initial_ir(&self) -> &Snapshot {
        &self.initial_ir
    }

    /// True when the trace carried no initial dump and the first record's
    /// body stands in for it.
    pub fn initial_is_partial(&self) -> bool {
        self.initial_is_partial
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn records(&self) -> &[PassRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Incremented by every mutation of `changed` flags.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn record(&self, index: RecordIndex) -> Result<&PassRecord, ResolutionError> {
        self.check(index)?;
        Ok(&self.records[index.position()])
    }

    pub fn check(&self, index: RecordIndex) -> Result<(), ResolutionError> {
        if index.0 == 0 || index.position() >= self.records.len() {
            return Err(ResolutionError::OutOfRange {
                index,
                len: self.records.len(),
            });
        }
        Ok(())
    }

    pub fn indices(&self) -> impl Iterator<Item = RecordIndex> {
        (0..self.records.len()).map(RecordIndex::from_position)
    }

    /// Set `changed = false` on the given records and bump the generation.
    pub(crate) fn demote(&mut self, indices: &[RecordIndex]) {
        if indices.is_empty() {
            return;
        }
        for index in indices {
            if let Some(record) = self.records.get_mut(index.position()) {
                record.changed = false;
            }
        }
        self.generation += 1;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
