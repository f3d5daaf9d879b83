// header.rs - Scope classifier for optimizer dump headers
//
// Tokenizes one header line with `logos` and matches the token sequence
// against a fixed, ordered set of header shapes:
//
//   *** IR Dump At Start ***
//   *** IR Dump After <pass> on <target>[ omitted because no change] ***
//   *** IR Dump Before <pass> on <target> ***
//   *** IR Pass <pass> on <target> ignored|filtered out ***
//   *** IR Pass <pass> invalidated ***
//
// A leading `; ` (print-after-all dialect) is accepted on every shape.
// Targets are matched in precedence order Module → CGSCC → Function → Loop.
//
// Preconditions: `line` is a single line without its terminator.
// Postconditions: returns a typed `Header` or a `ClassificationError`.
// Failure modes: unknown header shapes and unknown target shapes.
// Side effects: none.

use std::ops::Range;

use logos::Logos;

use crate::error::ClassificationError;
use crate::record::{Scope, MODULE_SENTINEL};

/// Tokens of a dump-header line. Words carry no value; the span indexes
/// back into the line.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
enum HeaderToken {
    #[token(";")]
    Semi,
    #[token("***")]
    Stars,
    #[token("IR")]
    Ir,
    #[token("Dump")]
    Dump,
    #[token("Pass")]
    Pass,
    #[token("After")]
    After,
    #[token("Before")]
    Before,
    #[token("At")]
    At,
    #[token("Start")]
    Start,
    #[token("on")]
    On,

    /// Any other run of non-blank characters. Fixed tokens of the same
    /// length win over this regex.
    #[regex(r"[^ \t\r\n]+", priority = 1)]
    Word,
}

type Spanned = (HeaderToken, Range<usize>);

/// Why a `*** IR Pass ... ***` line produced no dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Ignored,
    FilteredOut,
    Invalidated,
}

/// A classified dump header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// The module before the first pass.
    Start,
    After {
        pass: String,
        scope: Scope,
        omitted: bool,
    },
    Before {
        pass: String,
        scope: Scope,
    },
    Skipped {
        pass: String,
        reason: SkipReason,
    },
}

const OMITTED_SUFFIX: [&str; 4] = ["omitted", "because", "no", "change"];

/// Cheap prefix test used by the log parser to find dump boundaries.
pub fn is_header_line(line: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix(';').map(str::trim_start).unwrap_or(line);
    line.starts_with("*** IR ")
}

/// Classify one header line.
pub fn classify(line: &str) -> Result<Header, ClassificationError> {
    let tokens = lex(line)?;
    let mut toks = tokens.as_slice();
    if let [(HeaderToken::Semi, _), rest @ ..] = toks {
        toks = rest;
    }
    let unrecognized = || ClassificationError::UnrecognizedHeader(line.trim().to_string());

    let inner = match toks {
        [(HeaderToken::Stars, _), inner @ .., (HeaderToken::Stars, _)] => inner,
        _ => return Err(unrecognized()),
    };

    use HeaderToken::*;
    match inner {
        [(Ir, _), (Dump, _), (At, _), (Start, _)] => Ok(Header::Start),
        [(Ir, _), (Dump, _), (After, _), rest @ ..] => {
            let (pass, target) = split_on(line, rest)?;
            let target = target.ok_or_else(|| ClassificationError::MissingTarget(pass.clone()))?;
            let (target, omitted) = strip_suffix(line, target, &OMITTED_SUFFIX);
            let scope = classify_target(line, target)?;
            Ok(Header::After {
                pass,
                scope,
                omitted,
            })
        }
        [(Ir, _), (Dump, _), (Before, _), rest @ ..] => {
            let (pass, target) = split_on(line, rest)?;
            let target = target.ok_or_else(|| ClassificationError::MissingTarget(pass.clone()))?;
            let scope = classify_target(line, target)?;
            Ok(Header::Before { pass, scope })
        }
        [(Ir, _), (Pass, _), rest @ ..] => classify_skipped(line, rest).ok_or_else(unrecognized),
        _ => Err(unrecognized()),
    }
}

fn lex(line: &str) -> Result<Vec<Spanned>, ClassificationError> {
    let mut out = Vec::new();
    for (tok, span) in HeaderToken::lexer(line).spanned() {
        match tok {
            Ok(tok) => out.push((tok, span)),
            Err(()) => return Err(ClassificationError::InvalidToken { column: span.start + 1 }),
        }
    }
    Ok(out)
}

/// Split `<pass> on <target...>` at the first `on` outside template brackets.
/// Returns the pass text and the target tokens, if any.
fn split_on<'t>(
    line: &str,
    toks: &'t [Spanned],
) -> Result<(String, Option<&'t [Spanned]>), ClassificationError> {
    let mut depth: i32 = 0;
    for (i, (tok, span)) in toks.iter().enumerate() {
        if *tok == HeaderToken::On && depth == 0 && i > 0 {
            let pass = text_of(line, &toks[..i]).to_string();
            return Ok((pass, Some(&toks[i + 1..])));
        }
        for c in line[span.clone()].chars() {
            match c {
                '<' => depth += 1,
                '>' => depth -= 1,
                _ => {}
            }
        }
    }
    if toks.is_empty() {
        return Err(ClassificationError::UnrecognizedHeader(line.trim().to_string()));
    }
    Ok((text_of(line, toks).to_string(), None))
}

fn classify_skipped(line: &str, rest: &[Spanned]) -> Option<Header> {
    let (pass, target) = split_on(line, rest).ok()?;
    match target {
        None => {
            // `<pass> invalidated` with no target.
            let words = words(line, rest);
            if words.last() != Some(&"invalidated") || words.len() < 2 {
                return None;
            }
            let pass = text_of(line, &rest[..rest.len() - 1]).to_string();
            Some(Header::Skipped {
                pass,
                reason: SkipReason::Invalidated,
            })
        }
        Some(target) => {
            let reason = if strip_suffix(line, target, &["ignored"]).1 {
                SkipReason::Ignored
            } else if strip_suffix(line, target, &["filtered", "out"]).1 {
                SkipReason::FilteredOut
            } else {
                return None;
            };
            Some(Header::Skipped { pass, reason })
        }
    }
}

/// Ordered target matchers: Module → CGSCC → Function → Loop.
fn classify_target(line: &str, toks: &[Spanned]) -> Result<Scope, ClassificationError> {
    if toks.is_empty() {
        return Err(ClassificationError::UnrecognizedTarget(String::new()));
    }
    let text = text_of(line, toks);
    let words = words(line, toks);

    if words == [MODULE_SENTINEL] {
        return Ok(Scope::Module);
    }

    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let members: Vec<String> = inner
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        if members.is_empty() {
            return Err(ClassificationError::UnrecognizedTarget(text.to_string()));
        }
        return Ok(Scope::Cgscc(members));
    }

    if let [name] = words.as_slice() {
        if !is_decorated(name) {
            return Ok(Scope::Function(name.to_string()));
        }
    }

    if let ["loop", header, "in", "function", function] = words.as_slice() {
        if header.starts_with('%') && !is_decorated(function) {
            return Ok(Scope::Loop {
                header: header.to_string(),
                function: function.to_string(),
            });
        }
    }

    Err(ClassificationError::UnrecognizedTarget(text.to_string()))
}

fn is_decorated(name: &str) -> bool {
    name.starts_with(['[', '(', '<']) || name.ends_with([']', ')', '>'])
}

/// Drop a trailing word sequence (e.g. `omitted because no change`).
fn strip_suffix<'t>(line: &str, toks: &'t [Spanned], suffix: &[&str]) -> (&'t [Spanned], bool) {
    if toks.len() < suffix.len() {
        return (toks, false);
    }
    let split = toks.len() - suffix.len();
    let tail = &toks[split..];
    let matches = tail
        .iter()
        .zip(suffix)
        .all(|((_, span), word)| &line[span.clone()] == *word);
    if matches {
        (&toks[..split], true)
    } else {
        (toks, false)
    }
}

fn words<'l>(line: &'l str, toks: &[Spanned]) -> Vec<&'l str> {
    toks.iter().map(|(_, span)| &line[span.clone()]).collect()
}

/// Raw text covered by a token run, preserving internal spacing.
fn text_of<'l>(line: &'l str, toks: &[Spanned]) -> &'l str {
    match (toks.first(), toks.last()) {
        (Some((_, first)), Some((_, last))) => &line[first.start..last.end],
        _ => "",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
