// ir.rs - Line-level model of a textual IR module
//
// Splits a module into top-level items (function definitions, declarations,
// everything else) without parsing instructions. This is enough to splice a
// function-scoped dump into a full module, to project a module onto a few
// functions, and to strip attributes/metadata for display.
//
// Preconditions: lines come from printed IR (definitions close with a line
//   that is exactly `}`).
// Postconditions: item ranges tile the input; splicing preserves every line
//   of the base that is not replaced.
// Failure modes: splice targets missing from the base.
// Side effects: none.

use std::collections::HashSet;
use std::ops::Range;

// ── Items ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Define(String),
    Declare(String),
    Other,
}

/// A top-level item and the lines it spans. Leading `; Function Attrs:`
/// comments belong to the function they annotate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub lines: Range<usize>,
}

impl Item {
    pub fn defined_name(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Define(name) => Some(name),
            _ => None,
        }
    }
}

/// A module view over borrowed lines.
#[derive(Debug)]
pub struct IrModule<'a> {
    lines: &'a [String],
    items: Vec<Item>,
}

impl<'a> IrModule<'a> {
    pub fn parse(lines: &'a [String]) -> Self {
        let mut items = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let start = i;
            let mut head = i;
            while head < lines.len() && is_attr_comment(&lines[head]) {
                head += 1;
            }
            let line = lines.get(head).map(String::as_str).unwrap_or("");

            if line.starts_with("define ") {
                let name = function_name(line).unwrap_or_default();
                let mut end = head;
                if !line.trim_end().ends_with('}') {
                    while end < lines.len() && lines[end] != "}" {
                        end += 1;
                    }
                }
                let end = (end + 1).min(lines.len());
                items.push(Item {
                    kind: ItemKind::Define(name),
                    lines: start..end,
                });
                i = end;
            } else if line.starts_with("declare ") {
                let name = function_name(line).unwrap_or_default();
                items.push(Item {
                    kind: ItemKind::Declare(name),
                    lines: start..head + 1,
                });
                i = head + 1;
            } else {
                items.push(Item {
                    kind: ItemKind::Other,
                    lines: start..start + 1,
                });
                i = start + 1;
            }
        }
        IrModule { lines, items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_lines(&self, item: &Item) -> &'a [String] {
        &self.lines[item.lines.clone()]
    }

    pub fn definition(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|it| it.defined_name() == Some(name))
    }

    pub fn defines(&self, name: &str) -> bool {
        self.definition(name).is_some()
    }

    pub fn defined_names(&self) -> Vec<&str> {
        self.items.iter().filter_map(Item::defined_name).collect()
    }

    pub fn has_definitions(&self) -> bool {
        self.items.iter().any(|it| it.defined_name().is_some())
    }
}

fn is_attr_comment(line: &str) -> bool {
    line.starts_with("; Function Attrs:")
}

/// Extract the global name from a `define`/`declare` line: the first `@`
/// identifier, unquoted.
pub fn function_name(line: &str) -> Option<String> {
    let at = line.find('@')? + 1;
    let rest = &line[at..];
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some(quoted[..end].to_string());
    }
    let end = rest.find('(')?;
    Some(rest[..end].to_string())
}

/// Whether a dump body is itself a complete module rather than a
/// function-only fragment.
pub fn is_full_module(lines: &[String]) -> bool {
    lines.iter().any(|l| {
        l.starts_with("; ModuleID")
            || l.starts_with("source_filename")
            || l.starts_with("target datalayout")
            || l.starts_with("target triple")
    })
}

// ── Splice ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    MissingTarget(String),
}

/// How to treat definitions the base snapshot does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceMode {
    /// Every target must already be defined in the base.
    Strict,
    /// The base may be incomplete; unknown definitions are appended.
    Partial,
}

/// Replace the definitions of `targets` (and of any other function the body
/// defines) inside `base` with the body's definitions.
///
/// Definitions present in the body but unknown to the base are inserted
/// after the base's last definition. A body that omits a target leaves the
/// base definition in place.
pub fn splice(
    base: &[String],
    body: &[String],
    targets: &[&str],
    mode: SpliceMode,
) -> Result<Vec<String>, SpliceError> {
    let base_mod = IrModule::parse(base);
    let body_mod = IrModule::parse(body);

    if mode == SpliceMode::Strict {
        if let Some(missing) = targets.iter().find(|t| !base_mod.defines(t)) {
            return Err(SpliceError::MissingTarget(missing.to_string()));
        }
    }

    let replacements: Vec<(&str, &[String])> = body_mod
        .items()
        .iter()
        .filter_map(|it| it.defined_name().map(|n| (n, body_mod.item_lines(it))))
        .collect();
    let replacement = |name: &str| {
        replacements
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, lines)| *lines)
    };

    let mut used: HashSet<&str> = HashSet::new();
    let last_def = base_mod
        .items()
        .iter()
        .rposition(|it| it.defined_name().is_some());

    let mut out = Vec::with_capacity(base.len() + body.len());
    let mut appended = false;
    for (pos, item) in base_mod.items().iter().enumerate() {
        let name = match &item.kind {
            ItemKind::Define(name) | ItemKind::Declare(name) => Some(name.as_str()),
            ItemKind::Other => None,
        };
        match name.and_then(|n| replacement(n).map(|lines| (n, lines))) {
            Some((n, lines)) if used.insert(n) => out.extend_from_slice(lines),
            _ => out.extend_from_slice(base_mod.item_lines(item)),
        }
        if Some(pos) == last_def {
            append_unused(&mut out, &replacements, &mut used);
            appended = true;
        }
    }
    if !appended {
        append_unused(&mut out, &replacements, &mut used);
    }
    Ok(out)
}

fn append_unused<'n>(
    out: &mut Vec<String>,
    replacements: &[(&'n str, &[String])],
    used: &mut HashSet<&'n str>,
) {
    for (name, lines) in replacements {
        if used.insert(*name) {
            if out.last().is_some_and(|l| !l.is_empty()) {
                out.push(String::new());
            }
            out.extend_from_slice(lines);
        }
    }
}

// ── Focus ──────────────────────────────────────────────────────────────────

/// Project a module onto `functions`: their definitions plus the
/// declarations of anything they reference that is declared but not
/// defined. Items keep module order.
pub fn focus(lines: &[String], functions: &[&str]) -> Vec<String> {
    let module = IrModule::parse(lines);
    let wanted: HashSet<&str> = functions.iter().copied().collect();

    let mut referenced: HashSet<String> = HashSet::new();
    for item in module.items() {
        if item.defined_name().is_some_and(|n| wanted.contains(n)) {
            for line in module.item_lines(item) {
                referenced.extend(global_refs(line));
            }
        }
    }

    let mut out = Vec::new();
    for item in module.items() {
        let keep = match &item.kind {
            ItemKind::Define(name) => wanted.contains(name.as_str()),
            ItemKind::Declare(name) => referenced.contains(name),
            ItemKind::Other => false,
        };
        if keep {
            out.extend_from_slice(module.item_lines(item));
        }
    }
    out
}

/// Names referenced as `@name` or `@"name"` on one line.
fn global_refs(line: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut rest = line;
    while let Some(at) = rest.find('@') {
        rest = &rest[at + 1..];
        if let Some(quoted) = rest.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                refs.push(quoted[..end].to_string());
                rest = &quoted[end + 1..];
            }
            continue;
        }
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '-')))
            .unwrap_or(rest.len());
        if end > 0 {
            refs.push(rest[..end].to_string());
        }
        rest = &rest[end..];
    }
    refs
}

// ── Display cleaning ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    /// Drop `attributes #N = {...}` groups, `#N` references and
    /// `; Function Attrs:` comments.
    pub strip_attributes: bool,
    /// Drop `!N = ...` definitions and `!name !N` attachments.
    pub strip_metadata: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            strip_attributes: true,
            strip_metadata: true,
        }
    }
}

pub fn clean(lines: &[String], opts: CleanOptions) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if opts.strip_attributes && (line.starts_with("attributes #") || is_attr_comment(line)) {
            continue;
        }
        if opts.strip_metadata && line.starts_with('!') {
            continue;
        }
        out.push(clean_line(line, opts));
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out
}

fn clean_line(line: &str, opts: CleanOptions) -> String {
    if line.trim_start().starts_with(';') {
        return line.trim_end().to_string();
    }
    let indent_len = line.len() - line.trim_start().len();
    let (indent, body) = line.split_at(indent_len);

    let words: Vec<&str> = body.split_whitespace().collect();
    let mut kept: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let w = words[i];
        if opts.strip_metadata && is_metadata_name(w) && words.get(i + 1).is_some_and(|n| n.starts_with('!')) {
            if let Some(prev) = kept.last_mut() {
                if prev.ends_with(',') {
                    prev.pop();
                }
            }
            i += 2;
            continue;
        }
        if opts.strip_attributes && is_attr_ref(w) {
            i += 1;
            continue;
        }
        kept.push(w.to_string());
        i += 1;
    }
    format!("{}{}", indent, kept.join(" "))
}

fn is_metadata_name(word: &str) -> bool {
    word.len() > 1
        && word.starts_with('!')
        && word[1..].starts_with(|c: char| c.is_ascii_alphabetic())
}

fn is_attr_ref(word: &str) -> bool {
    let w = word.trim_end_matches(',');
    w.len() > 1 && w.starts_with('#') && w[1..].chars().all(|c| c.is_ascii_digit())
}

// ── Tests ──────────────────────────────────────────────────────────────────
