// group.rs - Fold same-named passes into collapsible groups
//
// Scans records in order keeping one open group per pass name for function
// and CGSCC passes. A module pass closes every open group and is emitted on
// its own; the next function pass of a closed name opens a fresh group.
// Loop passes are emitted on their own and leave open groups untouched.
//
// Entries keep the order in which they were first seen: a group sits where
// its first member was. Inside a group, changed members come first; both
// halves keep trace order.
//
// Preconditions: none.
// Postconditions: every record appears in exactly one entry.
// Failure modes: none.
// Side effects: none.

use std::collections::HashMap;

use serde::Serialize;

use crate::id::RecordIndex;
use crate::record::{PassRecord, ScopeType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMember {
    /// Pass name with its target, e.g. `SROAPass on foo`.
    pub display_name: String,
    pub index: RecordIndex,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub pass_name: String,
    pub scope_type: ScopeType,
    pub members: Vec<GroupMember>,
    /// True iff any member changed.
    pub has_changes: bool,
    /// Display state; groups start collapsed whatever their size.
    pub collapsed: bool,
}

impl Group {
    fn open(record: &PassRecord) -> Self {
        Group {
            pass_name: record.pass.clone(),
            scope_type: record.scope_type(),
            members: Vec::new(),
            has_changes: false,
            collapsed: true,
        }
    }

    pub fn changed_count(&self) -> usize {
        self.members.iter().filter(|m| m.changed).count()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Stable partition: changed members first.
    fn finalize(&mut self) {
        self.members.sort_by_key(|m| !m.changed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TimelineEntry {
    Group(Group),
    Standalone(RecordIndex),
}

impl TimelineEntry {
    /// Records covered by this entry, in display order.
    pub fn indices(&self) -> Vec<RecordIndex> {
        match self {
            TimelineEntry::Group(g) => g.members.iter().map(|m| m.index).collect(),
            TimelineEntry::Standalone(i) => vec![*i],
        }
    }
}

/// Fold a record list into groups and standalone entries.
pub fn group(records: &[PassRecord]) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = Vec::new();
    // (pass name, scope type) → position of the open group in `entries`
    let mut open: HashMap<(&str, ScopeType), usize> = HashMap::new();

    for (pos, record) in records.iter().enumerate() {
        let index = RecordIndex::from_position(pos);
        match record.scope_type() {
            ScopeType::Module => {
                open.clear();
                entries.push(TimelineEntry::Standalone(index));
            }
            ScopeType::Loop => entries.push(TimelineEntry::Standalone(index)),
            scope_type @ (ScopeType::Function | ScopeType::Cgscc) => {
                let slot = *open.entry((record.pass.as_str(), scope_type)).or_insert_with(|| {
                    entries.push(TimelineEntry::Group(Group::open(record)));
                    entries.len() - 1
                });
                if let TimelineEntry::Group(g) = &mut entries[slot] {
                    g.has_changes |= record.changed;
                    g.members.push(GroupMember {
                        display_name: record.display_name(),
                        index,
                        changed: record.changed,
                    });
                }
            }
        }
    }

    for entry in &mut entries {
        if let TimelineEntry::Group(g) = entry {
            g.finalize();
        }
    }
    entries
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{IrPayload, Scope};

    fn func(pass: &str, f: &str, changed: bool) -> PassRecord {
        PassRecord::new(pass, Scope::Function(f.into()), changed, IrPayload::Omitted)
    }

    fn module(pass: &str) -> PassRecord {
        PassRecord::new(pass, Scope::Module, false, IrPayload::Omitted)
    }

    fn group_of(entry: &TimelineEntry) -> &Group {
        match entry {
            TimelineEntry::Group(g) => g,
            other => panic!("expected group, got {:?}", other),
        }
    }

    fn members(g: &Group) -> Vec<&str> {
        g.members.iter().map(|m| m.display_name.as_str()).collect()
    }

    #[test]
    fn interleaved_passes_merge_by_name() {
        let entries = group(&[func("A", "f1", false), func("B", "f1", false), func("A", "f2", false)]);
        assert_eq!(entries.len(), 2);
        let a = group_of(&entries[0]);
        let b = group_of(&entries[1]);
        assert_eq!(a.pass_name, "A");
        assert_eq!(members(a), vec!["A on f1", "A on f2"]);
        assert_eq!(members(b), vec!["B on f1"]);
    }

    #[test]
    fn module_pass_closes_open_groups() {
        let entries = group(&[func("A", "f1", false), module("M"), func("A", "f2", false)]);
        assert_eq!(entries.len(), 3);
        assert_eq!(members(group_of(&entries[0])), vec!["A on f1"]);
        assert_eq!(entries[1], TimelineEntry::Standalone(RecordIndex(2)));
        assert_eq!(members(group_of(&entries[2])), vec!["A on f2"]);
    }

    #[test]
    fn changed_members_sort_first_stably() {
        let entries = group(&[
            func("A", "f1", false),
            func("A", "f2", true),
            func("A", "f3", false),
            func("A", "f4", true),
        ]);
        let g = group_of(&entries[0]);
        assert_eq!(members(g), vec!["A on f2", "A on f4", "A on f1", "A on f3"]);
        assert_eq!(g.changed_count(), 2);
        assert!(g.has_changes);
    }

    #[test]
    fn unchanged_group_is_still_a_group() {
        let entries = group(&[func("A", "f1", false)]);
        let g = group_of(&entries[0]);
        assert!(!g.has_changes);
        assert!(g.collapsed);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn loop_passes_stand_alone_without_closing_groups() {
        let lp = PassRecord::new(
            "LICMPass",
            Scope::Loop {
                header: "%for.body".into(),
                function: "f1".into(),
            },
            true,
            IrPayload::Omitted,
        );
        let entries = group(&[func("A", "f1", false), lp, func("A", "f2", true)]);
        assert_eq!(entries.len(), 2);
        assert_eq!(members(group_of(&entries[0])), vec!["A on f2", "A on f1"]);
        assert_eq!(entries[1], TimelineEntry::Standalone(RecordIndex(2)));
    }

    #[test]
    fn cgscc_and_function_groups_stay_apart() {
        let scc = PassRecord::new(
            "A",
            Scope::Cgscc(vec!["f1".into(), "f2".into()]),
            false,
            IrPayload::Omitted,
        );
        let entries = group(&[func("A", "f1", false), scc]);
        assert_eq!(entries.len(), 2);
        assert_eq!(group_of(&entries[1]).scope_type, ScopeType::Cgscc);
        assert_eq!(members(group_of(&entries[1])), vec!["A on f1, f2"]);
    }

    #[test]
    fn every_record_appears_once() {
        let records = vec![
            module("M0"),
            func("A", "f1", true),
            func("B", "f1", false),
            func("A", "f2", false),
            module("M1"),
            func("B", "f2", true),
        ];
        let mut seen: Vec<RecordIndex> = group(&records).iter().flat_map(|e| e.indices()).collect();
        seen.sort();
        let expected: Vec<RecordIndex> = (1..=6).map(RecordIndex).collect();
        assert_eq!(seen, expected);
    }
}
