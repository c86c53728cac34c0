//! Feeder template model, component library, and template override merge.
//!
//! A template is one row per physical feeder slot plus the machine's
//! reference fiducial positions. The allocation engine fills vacant rows;
//! a row's declared reel size never changes.

use std::collections::BTreeMap;

use log::info;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::nozzle::NozzleId;
use crate::placement::GroupKey;
use crate::reel::{ReelSize, SlotId};

/// Pick/place process parameters carried from the component library into a
/// filled template row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessParams {
    pub pick_height: f64,
    pub pick_delay: f64,
    pub place_height: f64,
    pub place_delay: f64,
    pub vacuum_detection: f64,
    pub threshold: f64,
    pub vision_alignment: f64,
    pub speed: f64,
}

/// Row kind marker from the template table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// A feeder slot that can host a component reel.
    Stack,
    /// A machine fiducial reference row.
    Mark,
    Other(String),
}

/// Component identity and parameters written into a filled slot row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub key: GroupKey,
    pub params: ProcessParams,
}

/// One physical feeder slot. A vacant slot has no occupant; the reel size
/// and declared nozzle set are fixed machine properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateRow {
    pub kind: SlotKind,
    pub slot: SlotId,
    pub reel: ReelSize,
    /// Nozzle ids physically reachable from this slot.
    pub nozzles: Vec<NozzleId>,
    pub occupant: Option<SlotAssignment>,
}

impl TemplateRow {
    pub fn stack(slot: SlotId, reel: ReelSize, nozzles: Vec<NozzleId>) -> Self {
        Self {
            kind: SlotKind::Stack,
            slot,
            reel,
            nozzles,
            occupant: None,
        }
    }

    pub fn is_vacant_stack(&self) -> bool {
        self.kind == SlotKind::Stack && self.occupant.is_none()
    }
}

/// A feeder layout: slot rows plus the template-side fiducial coordinates
/// measured on the machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub rows: Vec<TemplateRow>,
    pub fiducials: Vec<Point2<f64>>,
}

impl Template {
    pub fn new(rows: Vec<TemplateRow>, fiducials: Vec<Point2<f64>>) -> Self {
        Self { rows, fiducials }
    }

    pub fn stack_rows(&self) -> impl Iterator<Item = &TemplateRow> {
        self.rows.iter().filter(|r| r.kind == SlotKind::Stack)
    }

    /// Slot already hosting this group identity, if any.
    pub fn find_group(&self, key: &GroupKey) -> Option<SlotId> {
        self.stack_rows()
            .find(|r| r.occupant.as_ref().is_some_and(|a| &a.key == key))
            .map(|r| r.slot)
    }

    /// Index of the vacant stack row for a slot, if the slot is vacant.
    pub fn vacant_row_index(&self, slot: SlotId) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.slot == slot && r.is_vacant_stack())
    }

    /// Write a group into a row. The row's reel size is left untouched.
    pub fn assign(&mut self, index: usize, key: GroupKey, params: ProcessParams) {
        let row = &mut self.rows[index];
        info!("filled slot {} ({} mm) with {key}", row.slot, row.reel);
        row.occupant = Some(SlotAssignment { key, params });
    }

    /// Declared nozzle set of a slot.
    pub fn slot_nozzles(&self, slot: SlotId) -> &[NozzleId] {
        self.rows
            .iter()
            .find(|r| r.slot == slot && r.kind == SlotKind::Stack)
            .map(|r| r.nozzles.as_slice())
            .unwrap_or(&[])
    }

    /// Template fiducials sorted by distance from the origin, so the
    /// correspondence with equally sorted board fiducials is
    /// order-independent.
    pub fn fiducials_sorted(&self) -> Vec<Point2<f64>> {
        let mut pts = self.fiducials.clone();
        pts.sort_by(|a, b| {
            a.coords
                .norm()
                .partial_cmp(&b.coords.norm())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pts
    }
}

/// Nominal reel size plus process parameters for one footprint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub reel: ReelSize,
    pub params: ProcessParams,
}

/// Footprint-keyed component table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComponentLibrary {
    by_footprint: BTreeMap<String, ComponentSpec>,
}

impl ComponentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, footprint: impl Into<String>, spec: ComponentSpec) {
        self.by_footprint.insert(footprint.into(), spec);
    }

    pub fn lookup(&self, footprint: &str) -> Option<ComponentSpec> {
        self.by_footprint.get(footprint.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_footprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_footprint.is_empty()
    }
}

/// Result of merging a machine-exported template back onto a base layout.
#[derive(Clone, Debug)]
pub struct TemplateMerge {
    pub merged: Template,
    /// Per stack row, the donor assignment written there (None for rows
    /// kept as-is). Exported as the replacement-tracking record set.
    pub replacements: Vec<Option<SlotAssignment>>,
    pub matched: usize,
    pub filled: usize,
}

/// Merge donor template contents onto a base template.
///
/// Occupied base rows whose identity matches an unused donor component keep
/// the base row and consume the donor entry. Every other stack row is
/// filled from the next unused donor component, in donor order, until the
/// donor runs out. Non-stack rows pass through unchanged.
pub fn override_template(base: &Template, donor: &Template) -> TemplateMerge {
    let donor_components: Vec<SlotAssignment> = donor
        .stack_rows()
        .filter_map(|r| r.occupant.clone())
        .collect();
    let mut used = vec![false; donor_components.len()];

    let mut merged = base.clone();
    let mut replacements = Vec::new();
    let mut matched = 0;
    let mut filled = 0;

    for row in merged.rows.iter_mut().filter(|r| r.kind == SlotKind::Stack) {
        let base_key = row.occupant.as_ref().map(|a| a.key.clone());

        if let Some(key) = &base_key {
            if let Some(i) = donor_components
                .iter()
                .enumerate()
                .position(|(i, c)| !used[i] && &c.key == key)
            {
                used[i] = true;
                matched += 1;
                info!("matched slot {}: {key}", row.slot);
                replacements.push(None);
                continue;
            }
        }

        match donor_components.iter().enumerate().find(|(i, _)| !used[*i]) {
            Some((i, component)) => {
                used[i] = true;
                filled += 1;
                info!("filled slot {} with {}", row.slot, component.key);
                row.occupant = Some(component.clone());
                replacements.push(Some(component.clone()));
            }
            None => replacements.push(None),
        }
    }

    info!("template override: {matched} matched, {filled} filled");
    TemplateMerge {
        merged,
        replacements,
        matched,
        filled,
    }
}
