//! Board-side partitioning and bottom-side mirroring.

use log::info;
use serde::{Deserialize, Serialize};

use crate::placement::Placement;

/// Which side of the board a record set belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    /// Suffix used in exported file names.
    pub fn label(self) -> &'static str {
        match self {
            Side::Top => "Top",
            Side::Bottom => "Bot",
        }
    }
}

/// Partition placements by mirror flag: (top, bottom).
pub fn partition_sides(placements: Vec<Placement>) -> (Vec<Placement>, Vec<Placement>) {
    let (bottom, top): (Vec<Placement>, Vec<Placement>) =
        placements.into_iter().partition(|p| p.mirrored);
    info!("side Top has {} placements", top.len());
    info!("side Bot has {} placements", bottom.len());
    (top, bottom)
}

/// Mirror bottom-side records into the machine's frame: `x' = width - x`
/// and `r' = 180 - r`. The rotation is left unnormalized here; the final
/// wraparound happens after allocation.
pub fn mirror_bottom(placements: &mut [Placement], board_width: f64) {
    for p in placements.iter_mut() {
        p.x = board_width - p.x;
        p.rotation = 180.0 - p.rotation;
    }
}
