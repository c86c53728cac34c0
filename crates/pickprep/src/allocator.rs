//! Feeder/reel slot allocation.
//!
//! A slot pool is built from a template's stack rows: generic slots keyed
//! by reel size, and the reserved slot tracked as a standalone flag. A
//! group takes the first slot in its reel-size progression with a vacant
//! template row; assignment is exclusive, so the slot leaves the pool.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::placement::ComponentGroup;
use crate::reel::{ReelSize, SlotId, RESERVED_SLOT};
use crate::template::Template;

/// Result of one allocation attempt. Non-fatal by design: `NotPlaced`
/// degrades into the manual-placement list, never an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllocationOutcome {
    Placed { slot: SlotId, reel: ReelSize },
    /// The group already owns a slot in this template; nothing mutated.
    AlreadyPlaced { slot: SlotId },
    NotPlaced,
}

/// Available slots per reel size, in slot-number order, plus the reserved
/// slot's availability flag.
#[derive(Clone, Debug)]
pub struct SlotPool {
    by_size: BTreeMap<ReelSize, Vec<SlotId>>,
    reserved_available: bool,
}

impl SlotPool {
    /// Populate the pool from a template's stack rows. The reserved slot
    /// never enters the per-size lists.
    pub fn from_template(template: &Template) -> Self {
        let mut by_size: BTreeMap<ReelSize, Vec<SlotId>> = BTreeMap::new();
        let mut reserved_available = false;

        for row in template.stack_rows() {
            if row.slot == RESERVED_SLOT {
                reserved_available = true;
                continue;
            }
            by_size.entry(row.reel).or_default().push(row.slot);
        }
        for slots in by_size.values_mut() {
            slots.sort();
        }

        for (size, slots) in &by_size {
            debug!("reel {size}: {} slots available", slots.len());
        }
        debug!("reserved slot available: {reserved_available}");

        Self {
            by_size,
            reserved_available,
        }
    }

    pub fn reserved_available(&self) -> bool {
        self.reserved_available
    }

    #[cfg(test)]
    pub(crate) fn slots_for(&self, size: ReelSize) -> &[SlotId] {
        self.by_size.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Try to place a group into a template.
///
/// `ceiling` is the reserved slot's component-count limit;
/// `allow_reserved` gates both the reserved slot and the largest reel size
/// (false for the high-demand pass).
pub fn allocate(
    template: &mut Template,
    pool: &mut SlotPool,
    group: &ComponentGroup,
    ceiling: usize,
    allow_reserved: bool,
) -> AllocationOutcome {
    let key = &group.key;
    let count = group.count();

    let Some(spec) = group.spec else {
        warn!("no reel information for group {key}; not placed");
        return AllocationOutcome::NotPlaced;
    };

    // Idempotent re-entry: a group already in the template keeps its slot.
    if let Some(slot) = template.find_group(key) {
        info!("group {key} already placed on slot {slot}");
        return AllocationOutcome::AlreadyPlaced { slot };
    }

    debug!(
        "placing {key} (count {count}, nominal reel {}, allow_reserved={allow_reserved})",
        spec.reel
    );

    // Reserved-slot fast path for low-count smallest-reel groups.
    if spec.reel == ReelSize::smallest()
        && pool.reserved_available
        && allow_reserved
        && count <= ceiling
    {
        if let Some(index) = template.vacant_row_index(RESERVED_SLOT) {
            template.assign(index, key.clone(), spec.params);
            pool.reserved_available = false;
            info!("placed low-count group {key} on reserved slot {RESERVED_SLOT}");
            return AllocationOutcome::Placed {
                slot: RESERVED_SLOT,
                reel: ReelSize::smallest(),
            };
        }
    }

    for reel in spec.reel.progression() {
        // The reserved slot's size class is off limits to high-demand
        // groups and to any group over the ceiling.
        if reel == ReelSize::R20 && (!allow_reserved || count > ceiling) {
            debug!("skipping reel {reel} for {key} (count {count})");
            continue;
        }

        let Some(slots) = pool.by_size.get(&reel) else {
            continue;
        };
        let candidate = slots
            .iter()
            .enumerate()
            .find_map(|(i, slot)| template.vacant_row_index(*slot).map(|row| (i, *slot, row)));

        if let Some((i, slot, row)) = candidate {
            template.assign(row, key.clone(), spec.params);
            if let Some(slots) = pool.by_size.get_mut(&reel) {
                slots.remove(i);
            }
            info!("placed group {key} (count {count}) on slot {slot}, reel {reel}");
            return AllocationOutcome::Placed { slot, reel };
        }
    }

    warn!("no vacant slot for group {key} (count {count}) on any reel");
    AllocationOutcome::NotPlaced
}
