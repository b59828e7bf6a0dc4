//! Orchestration, access-mode and edge-kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// How completion of one stage leads to the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orchestration {
    /// Each stage's work unit directly signals its successors on success.
    #[default]
    Push,
    /// An external workflow engine holds the full plan and advances it.
    ScheduledSequence,
}

impl fmt::Display for Orchestration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::ScheduledSequence => write!(f, "scheduled-sequence"),
        }
    }
}

/// Storage access requested by a stage on a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Read objects.
    Read,
    /// Write objects.
    Write,
    /// Both.
    ReadWrite,
}

impl AccessMode {
    /// Returns true if the mode includes reading.
    #[must_use]
    pub fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Returns true if the mode includes writing.
    #[must_use]
    pub fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl BitOr for AccessMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        match (self.reads() || rhs.reads(), self.writes() || rhs.writes()) {
            (true, true) => Self::ReadWrite,
            (false, true) => Self::Write,
            _ => Self::Read,
        }
    }
}

impl BitOrAssign for AccessMode {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// The permission a grant confers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantMode {
    /// Read a location.
    Read,
    /// Write a location.
    Write,
    /// Read and write a location.
    ReadWrite,
    /// Invoke another work unit.
    Invoke,
}

impl From<AccessMode> for GrantMode {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Read => Self::Read,
            AccessMode::Write => Self::Write,
            AccessMode::ReadWrite => Self::ReadWrite,
        }
    }
}

impl fmt::Display for GrantMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read-write"),
            Self::Invoke => write!(f, "invoke"),
        }
    }
}

/// How an edge between two stages is realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// The source work unit signals the target on success.
    Push,
    /// The workflow engine advances from source to target.
    ScheduledSequence,
}

impl From<Orchestration> for EdgeKind {
    fn from(orchestration: Orchestration) -> Self {
        match orchestration {
            Orchestration::Push => Self::Push,
            Orchestration::ScheduledSequence => Self::ScheduledSequence,
        }
    }
}
