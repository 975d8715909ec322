//! Idle categories.
//!
//! Each category is timed independently: BothIdle watches the later of the
//! last read and last write, ReaderIdle only reads, WriterIdle only writes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleStatus {
    BothIdle,
    ReaderIdle,
    WriterIdle,
}

impl IdleStatus {
    /// Every category, in the order the detector evaluates them.
    pub const ALL: [IdleStatus; 3] = [
        IdleStatus::BothIdle,
        IdleStatus::ReaderIdle,
        IdleStatus::WriterIdle,
    ];

    /// Stable slot index, for per-category arrays.
    pub const fn index(self) -> usize {
        match self {
            IdleStatus::BothIdle => 0,
            IdleStatus::ReaderIdle => 1,
            IdleStatus::WriterIdle => 2,
        }
    }

    /// True if read activity resets this category.
    pub const fn tracks_reads(self) -> bool {
        matches!(self, IdleStatus::BothIdle | IdleStatus::ReaderIdle)
    }

    /// True if write activity resets this category.
    pub const fn tracks_writes(self) -> bool {
        matches!(self, IdleStatus::BothIdle | IdleStatus::WriterIdle)
    }
}

impl fmt::Display for IdleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdleStatus::BothIdle => "both idle",
            IdleStatus::ReaderIdle => "reader idle",
            IdleStatus::WriterIdle => "writer idle",
        };
        f.write_str(name)
    }
}
