//! Nozzle compatibility and per-feeder nozzle selection.
//!
//! Each nozzle declares the rotation angles it can physically pick at. A
//! placement's rotation selects the compatible subset; intersecting that
//! with a feeder's declared nozzles gives the valid choices, and the least
//! used nozzle on that feeder wins.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::reel::SlotId;
use pickprep_core::normalize_angle;

/// Angular slack when matching a rotation against a declared angle.
const ANGLE_TOLERANCE: f64 = 0.1;

/// Single pick-nozzle identity (one decimal digit on the machine).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NozzleId(pub u8);

impl fmt::Display for NozzleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("invalid nozzle digit {0:?} in ganged nozzle string")]
pub struct NozzleParseError(char);

/// Parse a ganged nozzle column: one digit per physically ganged nozzle,
/// so "1" is one nozzle and "134" is three.
pub fn parse_ganged(s: &str) -> Result<Vec<NozzleId>, NozzleParseError> {
    s.trim()
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| NozzleId(d as u8))
                .ok_or(NozzleParseError(c))
        })
        .collect()
}

/// Declared rotation capabilities per nozzle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NozzleLibrary {
    rotations: BTreeMap<NozzleId, Vec<f64>>,
}

impl NozzleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, nozzle: NozzleId, allowed: Vec<f64>) {
        self.rotations.insert(nozzle, allowed);
    }

    /// Nozzles whose declared angles reach the target rotation. Each
    /// declared angle is normalized independently before comparison.
    pub fn compatible(&self, rotation: f64) -> Vec<NozzleId> {
        let target = normalize_angle(rotation);
        let ids: Vec<NozzleId> = self
            .rotations
            .iter()
            .filter(|(_, allowed)| {
                allowed
                    .iter()
                    .any(|a| (target - normalize_angle(*a)).abs() < ANGLE_TOLERANCE)
            })
            .map(|(id, _)| *id)
            .collect();
        debug!("compatible nozzles for rotation {rotation}: {ids:?}");
        ids
    }
}

/// Per-feeder nozzle usage counters for least-used tie-breaking.
#[derive(Clone, Debug, Default)]
pub struct NozzleUsage {
    counts: HashMap<(SlotId, NozzleId), usize>,
}

impl NozzleUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the least used valid nozzle on this feeder, ties broken by
    /// first-encountered order, and record the assignment. `None` when no
    /// nozzle is valid; the caller reports the placement unmatched.
    pub fn choose(&mut self, slot: SlotId, valid: &[NozzleId]) -> Option<NozzleId> {
        let chosen = valid
            .iter()
            .copied()
            .enumerate()
            .min_by_key(|(i, n)| (self.counts.get(&(slot, *n)).copied().unwrap_or(0), *i))
            .map(|(_, n)| n)?;
        *self.counts.entry((slot, chosen)).or_insert(0) += 1;
        Some(chosen)
    }
}

/// Intersect a feeder's declared nozzles with the rotation-compatible set
/// and pick the least used one.
pub fn resolve_nozzle(
    library: &NozzleLibrary,
    usage: &mut NozzleUsage,
    slot: SlotId,
    declared: &[NozzleId],
    rotation: f64,
) -> Option<NozzleId> {
    let compatible = library.compatible(rotation);
    let valid: Vec<NozzleId> = declared
        .iter()
        .copied()
        .filter(|n| compatible.contains(n))
        .collect();
    usage.choose(slot, &valid)
}
