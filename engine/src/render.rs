// render.rs - Plain-text listings of a timeline
//
// Text views for a terminal: the flat record list and the grouped view
// with collapsed groups shown as a single summary line.
//
// Preconditions: `entries` were grouped from `timeline`'s records.
// Postconditions: output is deterministic for a given timeline.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt;

use crate::group::{Group, TimelineEntry};
use crate::id::RecordIndex;
use crate::record::{PassRecord, Timeline};

fn marker(changed: bool) -> char {
    if changed {
        '*'
    } else {
        ' '
    }
}

/// Flat listing: one line per record with its scope and trace line.
pub struct RecordList<'t> {
    pub timeline: &'t Timeline,
}

impl fmt::Display for RecordList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, record) in self.timeline.indices().zip(self.timeline.records()) {
            write_record(f, index, record, "")?;
            if record.line > 0 {
                write!(f, "  (line {})", record.line)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Grouped listing. Groups honor their `collapsed` flag unless
/// `expand_all` is set.
pub struct GroupedList<'t> {
    pub timeline: &'t Timeline,
    pub entries: &'t [TimelineEntry],
    pub expand_all: bool,
}

impl fmt::Display for GroupedList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = self.timeline.records();
        for entry in self.entries {
            match entry {
                TimelineEntry::Standalone(index) => {
                    if let Some(record) = records.get(index.position()) {
                        write_record(f, *index, record, "")?;
                        writeln!(f)?;
                    }
                }
                TimelineEntry::Group(group) => {
                    let expanded = self.expand_all || !group.collapsed;
                    write_group_header(f, group, expanded)?;
                    if expanded {
                        for m in &group.members {
                            if let Some(record) = records.get(m.index.position()) {
                                write_record(f, m.index, record, "    ")?;
                                writeln!(f)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_record(
    f: &mut fmt::Formatter<'_>,
    index: RecordIndex,
    record: &PassRecord,
    indent: &str,
) -> fmt::Result {
    write!(
        f,
        "{}{} {:>6}  {:<8} {}",
        indent,
        marker(record.changed),
        index.to_string(),
        record.scope_type().to_string(),
        record.display_name()
    )
}

fn write_group_header(f: &mut fmt::Formatter<'_>, group: &Group, expanded: bool) -> fmt::Result {
    let fold = if expanded { "[-]" } else { "[+]" };
    let noun = if group.len() == 1 { "pass" } else { "passes" };
    writeln!(
        f,
        "{} {:>6}  {:<8} {} ({} {}, {} changed)",
        marker(group.has_changes),
        fold,
        group.scope_type.to_string(),
        group.pass_name,
        group.len(),
        noun,
        group.changed_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Frontend, Invocation, OptLevel};
    use crate::group::group;
    use crate::trace::parse_trace;

    const TRACE: &str = "\
*** IR Dump At Start ***
define void @f1() {
  ret void
}
*** IR Dump After SROAPass on f1 omitted because no change ***
*** IR Dump After GlobalOptPass on [module] omitted because no change ***
";

    #[test]
    fn record_list_shows_scope_and_line() {
        let t = parse_trace(TRACE, &Invocation::level(Frontend::LlvmIr, OptLevel::O2)).unwrap();
        let out = RecordList { timeline: &t }.to_string();
        assert_eq!(
            out,
            "      #1  function SROAPass on f1  (line 5)\n      #2  module   GlobalOptPass on [module]  (line 6)\n"
        );
    }

    #[test]
    fn collapsed_group_is_one_line() {
        let t = parse_trace(TRACE, &Invocation::level(Frontend::LlvmIr, OptLevel::O2)).unwrap();
        let entries = group(t.records());
        let out = GroupedList {
            timeline: &t,
            entries: &entries,
            expand_all: false,
        }
        .to_string();
        assert_eq!(
            out,
            "     [+]  function SROAPass (1 pass, 0 changed)\n      #2  module   GlobalOptPass on [module]\n"
        );
    }
}
