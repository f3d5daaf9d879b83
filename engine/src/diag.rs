// diag.rs - Validation diagnostics
//
// Findings of the optional validation pass (see `diff::validate`). A
// diagnostic points at a pass record instead of a source span; the related
// list names other records that explain it.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::id::RecordIndex;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `W0100`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// The trace says the pass changed the IR; resolved before/after agree.
    pub const W0100: DiagCode = DiagCode("W0100");
    /// The trace says nothing changed; resolved before/after differ.
    pub const E0101: DiagCode = DiagCode("E0101");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related record ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedRecord {
    pub record: RecordIndex,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub record: Option<RecordIndex>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or related records.
    pub fn new(level: DiagLevel, record: Option<RecordIndex>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            record,
            message: message.into(),
            hint: None,
            related: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, record: RecordIndex, label: impl Into<String>) -> Self {
        self.related.push(RelatedRecord {
            record,
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        match &self.code {
            Some(code) => write!(f, "{}[{}]", level, code)?,
            None => write!(f, "{}", level)?,
        }
        match self.record {
            Some(record) => write!(f, ": {}: {}", record, self.message)?,
            None => write!(f, ": {}", self.message)?,
        }
        for rel in &self.related {
            write!(f, "\n  note: {}: {}", rel.record, rel.label)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, None, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_record() {
        let d = Diagnostic::new(DiagLevel::Warning, Some(RecordIndex(7)), "no visible change")
            .with_code(codes::W0100);
        assert_eq!(format!("{d}"), "warning[W0100]: #7: no visible change");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new(DiagLevel::Error, Some(RecordIndex(3)), "omitted pass differs")
            .with_code(codes::E0101)
            .with_hint("check the scope of the preceding dump")
            .with_related(RecordIndex(2), "last dump before this pass");

        assert_eq!(d.code, Some(codes::E0101));
        assert!(d.is_error());
        assert_eq!(d.related.len(), 1);
        assert_eq!(
            format!("{d}"),
            "error[E0101]: #3: omitted pass differs\n  note: #2: last dump before this pass\n  hint: check the scope of the preceding dump"
        );
    }
}
