// End-to-end tests: trace text → timeline → resolution, grouping, diff.
//
// Covers the three worked examples of the engine contract plus a realistic
// change-printing trace captured from `fixtures/qs.c`.

use std::path::{Path, PathBuf};

use passview::diff::{self, diff_stats};
use passview::error::ParseError;
use passview::frontend::{Frontend, Invocation, OptLevel, PipelineRequest};
use passview::group::{Group, TimelineEntry};
use passview::id::RecordIndex;
use passview::record::{Scope, ScopeType, Timeline};
use passview::resolve::{self, Edge, SessionCache};
use passview::trace::parse_trace;

// ── Test helpers ────────────────────────────────────────────────────────────

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load(name: &str) -> String {
    let path = fixture(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

fn o2() -> Invocation {
    Invocation::level(Frontend::LlvmIr, OptLevel::O2)
}

fn passes(list: &str) -> Invocation {
    Invocation::new(Frontend::LlvmIr, PipelineRequest::parse(list).unwrap())
}

fn groups(entries: &[TimelineEntry]) -> Vec<&Group> {
    entries
        .iter()
        .filter_map(|e| match e {
            TimelineEntry::Group(g) => Some(g),
            TimelineEntry::Standalone(_) => None,
        })
        .collect()
}

/// Instructions in a function: indented lines of its definition.
fn instruction_count(lines: &[String]) -> usize {
    lines.iter().filter(|l| l.starts_with("  ")).count()
}

fn assert_chained(t: &Timeline) {
    let mut cache = SessionCache::new(t);
    for i in 1..t.len() as u32 {
        let a = resolve::after(t, &mut cache, RecordIndex(i)).unwrap();
        let b = resolve::before(t, &mut cache, RecordIndex(i + 1)).unwrap();
        assert_eq!(a, b, "after(#{}) != before(#{})", i, i + 1);
    }
}

// ── Example 1: module, function splice, omitted module pass ─────────────────

const EXAMPLE_1: &str = "\
*** IR Dump After ModOpt on [module] ***
; ModuleID = 'example'
source_filename = \"example.c\"

define void @foo() {
entry:
  %x = alloca i32, align 4
  store i32 1, ptr %x, align 4
  ret void
}

define void @bar() {
entry:
  ret void
}
*** IR Dump After SROAPass on foo ***
define void @foo() {
entry:
  ret void
}
*** IR Dump After GlobalDCEPass on [module] omitted because no change ***
";

#[test]
fn example_1_function_dump_spliced_into_module_context() {
    let t = parse_trace(EXAMPLE_1, &o2()).unwrap();
    assert_eq!(t.len(), 3);
    assert_eq!(t.records()[0].scope, Scope::Module);
    assert_eq!(t.records()[1].scope, Scope::Function("foo".into()));
    assert!(!t.records()[2].changed);

    let mut cache = SessionCache::new(&t);
    let a2 = resolve::after(&t, &mut cache, RecordIndex(2)).unwrap();
    let a3 = resolve::after(&t, &mut cache, RecordIndex(3)).unwrap();
    assert_eq!(a3, a2);

    // module context from record 1, foo from record 2
    assert_eq!(a3[0], "; ModuleID = 'example'");
    assert!(a3.iter().any(|l| l == "define void @bar() {"));
    assert!(!a3.iter().any(|l| l.contains("alloca")));
    let foo = a3.iter().position(|l| l == "define void @foo() {").unwrap();
    assert_eq!(a3[foo + 2], "  ret void");
}

// ── Example 2: single function, sroa then instcombine ───────────────────────

const EXAMPLE_2: &str = "\
*** IR Dump At Start ***
; ModuleID = 'pair.ll'
%struct.pair = type { i32, i32 }

define i32 @sum(i32 %a, i32 %b) {
entry:
  %p = alloca %struct.pair, align 4
  %x = getelementptr inbounds %struct.pair, ptr %p, i32 0, i32 0
  store i32 %a, ptr %x, align 4
  %y = getelementptr inbounds %struct.pair, ptr %p, i32 0, i32 1
  store i32 %b, ptr %y, align 4
  %0 = load i32, ptr %x, align 4
  %1 = load i32, ptr %y, align 4
  %add = add nsw i32 %0, %1
  ret i32 %add
}
*** IR Dump After SROAPass on sum ***
define i32 @sum(i32 %a, i32 %b) {
entry:
  %add = add nsw i32 %a, %b
  ret i32 %add
}
*** IR Dump After InstCombinePass on sum omitted because no change ***
";

#[test]
fn example_2_instruction_count_never_grows() {
    let t = parse_trace(EXAMPLE_2, &passes("sroa,instcombine")).unwrap();
    assert_eq!(t.len(), 2);
    for r in t.records() {
        assert_eq!(r.scope, Scope::Function("sum".into()));
    }

    let mut cache = SessionCache::new(&t);
    let mut counts = vec![instruction_count(&resolve::focused(&t, &mut cache, RecordIndex(1), Edge::Before).unwrap())];
    for i in 1..=2 {
        let after = resolve::focused(&t, &mut cache, RecordIndex(i), Edge::After).unwrap();
        counts.push(instruction_count(&after));
    }
    assert_eq!(counts, vec![9, 2, 2]);
    assert!(counts.windows(2).all(|w| w[1] <= w[0]));

    let stats = diff_stats(&t, &mut cache, RecordIndex(1)).unwrap();
    assert!(stats.delta() < 0);
    assert!(diff_stats(&t, &mut cache, RecordIndex(2)).unwrap().is_empty());
}

#[test]
fn example_2_pass_list_rejected_for_c_sources() {
    let inv = Invocation::new(Frontend::C, PipelineRequest::parse("sroa,instcombine").unwrap());
    assert!(matches!(
        parse_trace(EXAMPLE_2, &inv),
        Err(ParseError::CustomPassesUnsupported { .. })
    ));
}

// ── Example 3: two functions, two passes each ───────────────────────────────

const EXAMPLE_3: &str = "\
*** IR Dump At Start ***
define void @f1() {
  ret void
}

define void @f2() {
  ret void
}
*** IR Dump After SROAPass on f1 omitted because no change ***
*** IR Dump After InstCombinePass on f1 omitted because no change ***
*** IR Dump After SROAPass on f2 omitted because no change ***
*** IR Dump After InstCombinePass on f2 omitted because no change ***
";

#[test]
fn example_3_two_groups_of_two() {
    let t = parse_trace(EXAMPLE_3, &passes("sroa,instcombine")).unwrap();
    let names: Vec<String> = t.records().iter().map(|r| r.display_name()).collect();
    assert_eq!(
        names,
        vec![
            "SROAPass on f1",
            "InstCombinePass on f1",
            "SROAPass on f2",
            "InstCombinePass on f2"
        ]
    );

    let mut cache = SessionCache::new(&t);
    let entries = cache.groups(&t).unwrap();
    assert_eq!(entries.len(), 2);
    let gs = groups(entries);
    assert_eq!(gs[0].pass_name, "SROAPass");
    assert_eq!(gs[1].pass_name, "InstCombinePass");
    for g in gs {
        let targets: Vec<&str> = g.members.iter().map(|m| m.display_name.rsplit(' ').next().unwrap_or("")).collect();
        assert_eq!(targets, vec!["f1", "f2"]);
        assert!(!g.has_changes);
        assert!(g.collapsed);
    }
}

// ── qs.c fixture ────────────────────────────────────────────────────────────

#[test]
fn qs_trace_records() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    assert_eq!(t.len(), 13);
    assert!(!t.initial_is_partial());

    let changed: Vec<u32> = t
        .indices()
        .filter(|i| t.records()[i.position()].changed)
        .map(|i| i.0)
        .collect();
    assert_eq!(changed, vec![3, 4, 9, 11, 12]);

    assert_eq!(t.records()[7].scope, Scope::Cgscc(vec!["quicksort".into()]));
    assert_eq!(t.records()[10].scope_type(), ScopeType::Loop);
    assert_eq!(t.records()[3].line, 100);
    assert!(t.provenance().matches(&load("qs_O2.trace")));
}

#[test]
fn qs_trace_resolution_chains() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    assert_chained(&t);

    let mut cache = SessionCache::new(&t);
    for index in t.indices() {
        if !t.records()[index.position()].changed {
            assert_eq!(
                resolve::before(&t, &mut cache, index).unwrap(),
                resolve::after(&t, &mut cache, index).unwrap(),
                "unchanged {} resolved to different IR",
                index
            );
        }
    }

    // the module pass changed the printf declaration
    let b3 = resolve::before(&t, &mut cache, RecordIndex(3)).unwrap();
    let a3 = resolve::after(&t, &mut cache, RecordIndex(3)).unwrap();
    assert_ne!(b3, a3);

    let last = resolve::after(&t, &mut cache, RecordIndex(13)).unwrap();
    assert!(last.iter().any(|l| l.contains("#3 {")));
    assert!(last.iter().any(|l| l.contains("dereferenceable(24)")));
    assert!(!last.iter().any(|l| l.contains("%arr.addr")));
}

#[test]
fn qs_trace_focused_view() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    let mut cache = SessionCache::new(&t);
    let main = resolve::focused(&t, &mut cache, RecordIndex(12), Edge::After).unwrap();
    assert_eq!(main[0], "define dso_local i32 @main() #0 {");
    assert!(main.iter().any(|l| l.starts_with("declare void @llvm.memcpy")));
    assert!(main.iter().any(|l| l.starts_with("declare noundef i32 @printf")));
    assert!(!main.iter().any(|l| l.contains("define dso_local void @quicksort")));

    let module = resolve::focused(&t, &mut cache, RecordIndex(3), Edge::After).unwrap();
    assert_eq!(module, *resolve::after(&t, &mut cache, RecordIndex(3)).unwrap());
}

#[test]
fn qs_trace_groups() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    let mut cache = SessionCache::new(&t);
    let entries = cache.groups(&t).unwrap();
    assert_eq!(entries.len(), 10);

    let gs = groups(entries);
    let summary: Vec<(&str, usize, usize)> = gs
        .iter()
        .map(|g| (g.pass_name.as_str(), g.len(), g.changed_count()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("SROAPass", 2, 1),
            ("EarlyCSEPass", 2, 0),
            ("InlinerPass", 2, 0),
            ("PostOrderFunctionAttrsPass", 1, 1),
            ("InstCombinePass", 1, 1),
        ]
    );
    assert_eq!(gs[0].members[0].index, RecordIndex(4));
    assert_eq!(gs[2].scope_type, ScopeType::Cgscc);
}

#[test]
fn qs_trace_validates_clean() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    let mut cache = SessionCache::new(&t);
    let diags = diff::validate(&t, &mut cache).unwrap();
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
}

#[test]
fn qs_trace_reclassify_demotes_loop_only_dump() {
    let mut t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    let mut cache = SessionCache::new(&t);
    let before = resolve::after(&t, &mut cache, RecordIndex(13)).unwrap();

    let demoted = resolve::reclassify_unchanged(&mut t).unwrap();
    assert_eq!(demoted, vec![RecordIndex(11)]);
    assert!(resolve::after(&t, &mut cache, RecordIndex(13)).is_err());

    cache.invalidate(&t);
    assert_eq!(resolve::after(&t, &mut cache, RecordIndex(13)).unwrap(), before);
    assert_chained(&t);
}

#[test]
fn qs_timeline_survives_json() {
    let t = parse_trace(&load("qs_O2.trace"), &o2()).unwrap();
    let json = serde_json::to_string(&t).unwrap();
    let back: Timeline = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);

    let mut cache = SessionCache::new(&back);
    let mut original = SessionCache::new(&t);
    assert_eq!(
        resolve::after(&back, &mut cache, RecordIndex(13)).unwrap(),
        resolve::after(&t, &mut original, RecordIndex(13)).unwrap()
    );
}
