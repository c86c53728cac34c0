//! Reel sizes and machine identifiers.
//!
//! Reel size is an ordered enum rather than a raw string so that the
//! "nominal size or any larger one" rule is a plain comparison and cannot
//! be confused by numeric-versus-string forms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tape-width class a feeder slot accepts, in millimetres.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReelSize {
    R8,
    R12,
    R16,
    R20,
}

impl ReelSize {
    /// All sizes in ascending order.
    pub const ALL: [ReelSize; 4] = [ReelSize::R8, ReelSize::R12, ReelSize::R16, ReelSize::R20];

    pub fn millimeters(self) -> u32 {
        match self {
            ReelSize::R8 => 8,
            ReelSize::R12 => 12,
            ReelSize::R16 => 16,
            ReelSize::R20 => 20,
        }
    }

    pub fn smallest() -> ReelSize {
        ReelSize::R8
    }

    /// Sizes usable by a component of this nominal size: itself and every
    /// larger size, ascending. Never yields a smaller size.
    pub fn progression(self) -> impl Iterator<Item = ReelSize> {
        Self::ALL.into_iter().filter(move |s| *s >= self)
    }
}

impl fmt::Display for ReelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.millimeters())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown reel size {0:?} (expected 8, 12, 16, or 20)")]
pub struct ReelSizeParseError(String);

impl FromStr for ReelSize {
    type Err = ReelSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "8" => Ok(ReelSize::R8),
            "12" => Ok(ReelSize::R12),
            "16" => Ok(ReelSize::R16),
            "20" => Ok(ReelSize::R20),
            other => Err(ReelSizeParseError(other.to_owned())),
        }
    }
}

impl TryFrom<String> for ReelSize {
    type Error = ReelSizeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ReelSize> for String {
    fn from(r: ReelSize) -> String {
        r.to_string()
    }
}

/// Physical feeder-slot identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The exception-cased slot: nominally the smallest reel size but tracked
/// as a standalone availability flag, usable only by low-count groups.
pub const RESERVED_SLOT: SlotId = SlotId(20);

/// Slots at or above this id belong to the large-reel mounting class and
/// get the 180-degree rotation correction.
pub const LARGE_REEL_SLOT_MIN: u32 = 20;
