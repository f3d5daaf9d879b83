// trace.rs - Log parser: raw optimizer trace → Timeline
//
// Splits the trace on dump-header lines, classifies every header, and turns
// each `IR Dump After` section into a pass record. The `changed` flag is
// taken from the header as printed (`omitted because no change` → false,
// a dumped body → true) and never re-derived here.
//
// Bodies are stored once: a body textually identical to the most recent
// stored body, or to the Initial IR, becomes a back-reference.
//
// Preconditions: `invocation` describes how the trace was produced.
// Postconditions: records are numbered 1..N in emission order; every
//   back-reference points strictly backward.
// Failure modes: empty trace, no dumps, any unclassifiable header,
//   misplaced initial dump, a changed dump with no body, pass list on a
//   level-only frontend.
// Side effects: none (logging only).

use std::sync::Arc;

use log::debug;

use crate::error::ParseError;
use crate::frontend::Invocation;
use crate::header::{classify, is_header_line, Header};
use crate::id::RecordIndex;
use crate::record::{
    IrPayload, Origin, PassRecord, Provenance, Snapshot, Timeline, TimelineParts,
};

/// One header and the lines up to the next header.
struct Section<'t> {
    header: Header,
    /// 1-based line number of the header.
    line: usize,
    body: Vec<&'t str>,
}

/// Parse a complete trace.
pub fn parse_trace(text: &str, invocation: &Invocation) -> Result<Timeline, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyTrace);
    }
    invocation.validate()?;

    let sections = split_sections(text)?;

    let mut initial: Option<Snapshot> = None;
    let mut records: Vec<PassRecord> = Vec::new();
    for section in sections {
        match section.header {
            Header::Start => {
                if initial.is_some() || !records.is_empty() {
                    return Err(ParseError::MisplacedStart { line: section.line });
                }
                initial = Some(Arc::new(to_lines(&section.body)));
            }
            Header::After {
                pass,
                scope,
                omitted,
            } => {
                let index = RecordIndex::from_position(records.len());
                let (changed, payload) = if omitted {
                    if !trimmed(&section.body).is_empty() {
                        debug!("record {}: ignoring body after omitted dump", index);
                    }
                    (false, IrPayload::Omitted)
                } else {
                    let body = to_lines(&section.body);
                    if body.is_empty() {
                        return Err(ParseError::MissingBody {
                            line: section.line,
                            pass,
                        });
                    }
                    (true, store_body(index, body, &records, initial.as_ref()))
                };
                records.push(PassRecord {
                    pass,
                    scope,
                    changed,
                    payload,
                    line: section.line,
                });
            }
            Header::Before { pass, .. } => {
                debug!("line {}: skipping dump before {}", section.line, pass);
            }
            Header::Skipped { pass, reason } => {
                debug!("line {}: {} {:?}", section.line, pass, reason);
            }
        }
    }

    if records.is_empty() {
        return Err(ParseError::NoPasses);
    }

    let (initial_ir, initial_is_partial) = match initial {
        Some(ir) => (ir, false),
        None => {
            debug!("no initial dump; first stored body stands in for the initial IR");
            let first = records
                .iter()
                .find_map(|r| match &r.payload {
                    IrPayload::Inline(lines) => Some(lines.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            (first, true)
        }
    };

    Timeline::from_parts(TimelineParts {
        invocation: invocation.clone(),
        initial_ir,
        initial_is_partial,
        records,
        provenance: Provenance::for_trace(text),
    })
}

fn split_sections(text: &str) -> Result<Vec<Section<'_>>, ParseError> {
    let mut sections: Vec<Section<'_>> = Vec::new();
    let mut preamble = 0usize;

    for (n, line) in text.lines().enumerate() {
        if is_header_line(line) {
            let header = classify(line).map_err(|source| ParseError::Classification {
                line: n + 1,
                source,
            })?;
            sections.push(Section {
                header,
                line: n + 1,
                body: Vec::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.body.push(line);
        } else {
            preamble += 1;
        }
    }

    if sections.is_empty() {
        return Err(ParseError::NoPasses);
    }
    if preamble > 0 {
        debug!("skipped {} lines before the first dump", preamble);
    }
    Ok(sections)
}

/// Store a dumped body, or a back-reference when it repeats the most recent
/// stored body or the Initial IR. A back-reference always names the record
/// that holds the text inline (or the Initial IR), never another reference.
fn store_body(
    index: RecordIndex,
    body: Vec<String>,
    records: &[PassRecord],
    initial: Option<&Snapshot>,
) -> IrPayload {
    let previous = records
        .iter()
        .enumerate()
        .rev()
        .find(|(_, r)| r.payload.has_content());
    if let Some((pos, _)) = previous {
        if let Some(content) = stored_content(records, initial, pos) {
            if **content == body {
                let origin = match records[pos].payload {
                    IrPayload::SameAs(origin) => origin,
                    _ => Origin::Record(RecordIndex::from_position(pos)),
                };
                debug!("record {}: IR identical to {:?}", index, origin);
                return IrPayload::SameAs(origin);
            }
        }
    }
    if let Some(initial) = initial {
        if **initial == body {
            debug!("record {}: IR identical to the initial dump", index);
            return IrPayload::SameAs(Origin::Initial);
        }
    }
    IrPayload::Inline(Arc::new(body))
}

/// The body a stored record stands for. References are one hop deep while
/// parsing.
fn stored_content<'r>(
    records: &'r [PassRecord],
    initial: Option<&'r Snapshot>,
    pos: usize,
) -> Option<&'r Snapshot> {
    match &records[pos].payload {
        IrPayload::Inline(lines) => Some(lines),
        IrPayload::SameAs(Origin::Initial) => initial,
        IrPayload::SameAs(Origin::Record(target)) => match &records.get(target.position())?.payload {
            IrPayload::Inline(lines) => Some(lines),
            _ => None,
        },
        IrPayload::Omitted => None,
    }
}

fn trimmed<'a, 't>(body: &'a [&'t str]) -> &'a [&'t str] {
    let start = body.iter().position(|l| !l.trim().is_empty());
    let end = body.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => &body[s..=e],
        _ => &[],
    }
}

fn to_lines(body: &[&str]) -> Vec<String> {
    trimmed(body).iter().map(|l| l.to_string()).collect()
}

// ── Tests ──────────────────────────────────────────────────────────────────
