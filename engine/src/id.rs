// id.rs - Stable identifiers for pass records
//
// Records are numbered in emission order starting at 1. Index 0 never names
// a record; back-references to the Initial IR use `Origin::Initial` instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 1-based position of a pass record in its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordIndex(pub u32);

impl RecordIndex {
    pub const FIRST: RecordIndex = RecordIndex(1);

    /// Index for the record stored at `pos` in a 0-based vector.
    pub fn from_position(pos: usize) -> Self {
        RecordIndex(pos as u32 + 1)
    }

    /// 0-based vector position. Callers must have checked `self.0 >= 1`.
    pub fn position(self) -> usize {
        self.0 as usize - 1
    }

    pub fn prev(self) -> Option<RecordIndex> {
        if self.0 > 1 {
            Some(RecordIndex(self.0 - 1))
        } else {
            None
        }
    }

    pub fn next(self) -> RecordIndex {
        RecordIndex(self.0 + 1)
    }
}

impl fmt::Display for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
