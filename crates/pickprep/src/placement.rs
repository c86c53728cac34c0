//! Placement records and component grouping.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::nozzle::NozzleId;
use crate::reel::SlotId;
use crate::template::ComponentSpec;

/// One component placement parsed from the board report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Reference designator, unique per board.
    pub refdes: String,
    pub footprint: String,
    pub value: String,
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees; any real value, taken mod 360 downstream.
    pub rotation: f64,
    /// True for records on the reflected (bottom) side.
    pub mirrored: bool,
}

impl Placement {
    /// Fiducials carry the reserved refdes prefix (case-insensitive).
    pub fn is_fiducial(&self, prefix: &str) -> bool {
        self.refdes
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }

    #[inline]
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Grouping identity: all placements sharing (footprint, value) are
/// allocated as one unit.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub footprint: String,
    pub value: String,
}

impl GroupKey {
    pub fn of(p: &Placement) -> Self {
        Self {
            footprint: p.footprint.trim().to_owned(),
            value: p.value.trim().to_owned(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.footprint, self.value)
    }
}

/// The unit of allocation: every member gets the same feeder assignment.
#[derive(Clone, Debug)]
pub struct ComponentGroup {
    pub key: GroupKey,
    /// Nominal reel size and process parameters from the component
    /// library; `None` when the footprint has no library entry.
    pub spec: Option<ComponentSpec>,
    pub members: Vec<Placement>,
}

impl ComponentGroup {
    pub fn count(&self) -> usize {
        self.members.len()
    }
}

/// A placement that received a feeder slot and pick nozzle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignedPlacement {
    pub slot: SlotId,
    pub nozzle: NozzleId,
    pub placement: Placement,
}

/// Group placements by (footprint, value), deterministically ordered by
/// key. The spec for each group comes from the component library.
pub fn build_groups(
    placements: &[Placement],
    lookup: impl Fn(&str) -> Option<ComponentSpec>,
) -> Vec<ComponentGroup> {
    let mut by_key: BTreeMap<GroupKey, Vec<Placement>> = BTreeMap::new();
    for p in placements {
        by_key.entry(GroupKey::of(p)).or_default().push(p.clone());
    }

    let groups: Vec<ComponentGroup> = by_key
        .into_iter()
        .map(|(key, members)| {
            let spec = lookup(&key.footprint);
            if spec.is_none() {
                debug!("no component-library entry for {key}");
            }
            ComponentGroup { key, spec, members }
        })
        .collect();

    for g in &groups {
        info!("component group {} count: {}", g.key, g.count());
    }
    groups
}

/// Drop placements whose refdes, footprint, or value contains any of the
/// ignore patterns (case-insensitive substring match). Test points,
/// mounting holes, do-not-place markers and the like never reach grouping.
pub fn filter_ignored(placements: Vec<Placement>, patterns: &[String]) -> Vec<Placement> {
    let lowered: Vec<String> = patterns.iter().map(|p| p.to_ascii_lowercase()).collect();
    let matches = |field: &str| {
        let f = field.to_ascii_lowercase();
        lowered.iter().any(|p| !p.is_empty() && f.contains(p))
    };

    let before = placements.len();
    let kept: Vec<Placement> = placements
        .into_iter()
        .filter(|p| !(matches(&p.refdes) || matches(&p.footprint) || matches(&p.value)))
        .collect();
    if kept.len() != before {
        info!("ignore-list filter removed {} of {} placements", before - kept.len(), before);
    }
    kept
}

/// Sort criteria for exported placement lists.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Refdes,
    /// Distance from the calibration origin (first board fiducial).
    Distance,
    Value,
    Footprint,
}

/// Stable multi-key sort of assigned placements.
pub fn sort_assigned(
    placements: &mut [AssignedPlacement],
    keys: &[SortKey],
    ascending: bool,
    origin: Point2<f64>,
) {
    if keys.is_empty() {
        return;
    }
    placements.sort_by(|a, b| {
        let mut ord = std::cmp::Ordering::Equal;
        for key in keys {
            ord = match key {
                SortKey::Refdes => a.placement.refdes.cmp(&b.placement.refdes),
                SortKey::Value => a.placement.value.cmp(&b.placement.value),
                SortKey::Footprint => a.placement.footprint.cmp(&b.placement.footprint),
                SortKey::Distance => {
                    let da = (a.placement.position() - origin).norm();
                    let db = (b.placement.position() - origin).norm();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                }
            };
            if ord != std::cmp::Ordering::Equal {
                break;
            }
        }
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}
