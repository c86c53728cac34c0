//! End-to-end board processing.
//!
//! One run takes the parsed placement list through the ignore-list filter,
//! board-width resolution, side splitting, and per-side calibration and
//! feeder allocation, and returns a report per board side. The pipeline
//! owns ordering; the per-stage rules live in their own modules.

use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use pickprep_core::{
    fit_transform, infer_board_width, normalize_angle, verify_board_width, BoardTransform,
    CalibrationError,
};

use crate::allocator::{allocate, AllocationOutcome, SlotPool};
use crate::config::ProcessConfig;
use crate::error::ProcessError;
use crate::nozzle::{resolve_nozzle, NozzleLibrary, NozzleUsage};
use crate::placement::{
    build_groups, filter_ignored, sort_assigned, AssignedPlacement, ComponentGroup, Placement,
};
use crate::progress::{emit, ProgressSink};
use crate::reel::{SlotId, LARGE_REEL_SLOT_MIN};
use crate::split::{mirror_bottom, partition_sides, Side};
use crate::template::{ComponentLibrary, Template};

/// Everything produced for one board side: the two filled feeder
/// templates and the placement lists routed to them, plus the manual
/// fallout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SideReport {
    pub side: Side,
    pub template_a: Template,
    pub template_b: Template,
    pub placements_a: Vec<AssignedPlacement>,
    pub placements_b: Vec<AssignedPlacement>,
    /// Fiducial records, reprojected, copied into every side's output.
    pub fiducials: Vec<Placement>,
    /// Placements with no feeder slot or no usable nozzle.
    pub manual: Vec<Placement>,
    pub matched: usize,
    pub unmatched: usize,
}

/// Result of one full run. `matched + unmatched` over a side always
/// equals that side's component placement count.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardRun {
    pub width: f64,
    pub sides: Vec<SideReport>,
}

/// The run orchestrator. Holds the injected machine description and run
/// configuration; [`process`](Self::process) is otherwise stateless, so
/// one processor can serve many boards.
#[derive(Clone, Debug)]
pub struct BoardProcessor {
    pub config: ProcessConfig,
    pub nozzles: NozzleLibrary,
    pub library: ComponentLibrary,
    pub base_template: Template,
}

impl BoardProcessor {
    pub fn new(
        config: ProcessConfig,
        nozzles: NozzleLibrary,
        library: ComponentLibrary,
        base_template: Template,
    ) -> Self {
        Self {
            config,
            nozzles,
            library,
            base_template,
        }
    }

    /// Run the full pipeline over a parsed placement list.
    pub fn process(
        &self,
        placements: Vec<Placement>,
        sink: &mut dyn ProgressSink,
    ) -> Result<BoardRun, ProcessError> {
        if self.base_template.fiducials.len() < 2 {
            return Err(ProcessError::Configuration(
                "feeder template declares fewer than 2 fiducial references".to_owned(),
            ));
        }

        emit(sink, 5, 100, "filtering ignored features");
        let placements = filter_ignored(placements, &self.config.ignore_patterns());

        let prefix = &self.config.fiducial_prefix;
        let (fiducials, components): (Vec<Placement>, Vec<Placement>) = placements
            .into_iter()
            .partition(|p| p.is_fiducial(prefix));
        if fiducials.is_empty() {
            return Err(CalibrationError::NoFiducials.into());
        }
        let board_fiducials: Vec<Point2<f64>> =
            fiducials.iter().map(Placement::position).collect();

        emit(sink, 15, 100, "resolving board width");
        let has_bottom = components.iter().any(|p| p.mirrored);
        let width = match self.config.board_width {
            Some(w) => {
                info!("using configured board width {w:.3}");
                w
            }
            None => {
                let estimate = infer_board_width(&board_fiducials)?;
                if !estimate.confident {
                    // Mirroring with a guessed width would corrupt every
                    // bottom-side coordinate.
                    if has_bottom {
                        return Err(ProcessError::Configuration(
                            "bottom side present but the fiducial arrangement cannot \
                             constrain the board width; configure board_width"
                                .to_owned(),
                        ));
                    }
                    warn!("board width {:.3} is a guess; consider configuring it", estimate.width);
                }
                estimate.width
            }
        };
        let max_component_x = components
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        if max_component_x.is_finite() {
            verify_board_width(width, max_component_x)?;
        }

        // Width, mirror, and fiducials all stay in the board frame up to
        // this point; each side is then calibrated from fiducials mirrored
        // the same way as its records, so the transform and the
        // coordinates it applies to never mix frames.
        let (top, mut bottom) = partition_sides(components);
        if !bottom.is_empty() {
            mirror_bottom(&mut bottom, width);
        }

        let mut sides = Vec::new();
        let span = 35;
        for (i, (side, mut records)) in [(Side::Top, top), (Side::Bottom, bottom)]
            .into_iter()
            .enumerate()
        {
            let done = 20 + span * (i as u32 + 1);
            if records.is_empty() {
                info!("side {} is empty; skipped", side.label());
                emit(sink, done, 100, format!("side {} empty", side.label()));
                continue;
            }
            emit(sink, 20 + span * i as u32, 100, format!("processing side {}", side.label()));

            let mut side_fiducials = fiducials.clone();
            if side == Side::Bottom {
                mirror_bottom(&mut side_fiducials, width);
            }
            let positions: Vec<Point2<f64>> =
                side_fiducials.iter().map(Placement::position).collect();
            let transform = calibrate(&positions, &self.base_template)?;
            for p in records.iter_mut().chain(side_fiducials.iter_mut()) {
                let q = transform.apply(p.position());
                p.x = q.x;
                p.y = q.y;
            }

            // Exported lists are ordered by distance from the fiducial
            // nearest the machine origin, independent of input row order.
            let sort_origin = side_fiducials
                .iter()
                .map(Placement::position)
                .min_by(|a, b| {
                    a.coords
                        .norm()
                        .partial_cmp(&b.coords.norm())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or_else(Point2::origin);

            let report = self.process_side(side, records, side_fiducials, sort_origin);
            emit(sink, done, 100, format!("side {} done", side.label()));
            sides.push(report);
        }

        emit(sink, 100, 100, "done");
        Ok(BoardRun { width, sides })
    }

    /// Allocate one side's placements over the two feeder templates.
    fn process_side(
        &self,
        side: Side,
        records: Vec<Placement>,
        fiducials: Vec<Placement>,
        sort_origin: Point2<f64>,
    ) -> SideReport {
        let ceiling = self.config.reserved_slot_ceiling;
        let mut template_a = self.base_template.clone();
        let mut template_b = self.base_template.clone();
        let mut usage_a = NozzleUsage::new();
        let mut usage_b = NozzleUsage::new();
        let mut placements_a = Vec::new();
        let mut placements_b = Vec::new();
        let mut manual = Vec::new();
        let mut matched = 0;
        let mut unmatched = 0;

        let groups = build_groups(&records, |fp| self.library.lookup(fp));
        let (high, low): (Vec<ComponentGroup>, Vec<ComponentGroup>) =
            groups.into_iter().partition(|g| g.count() > ceiling);

        // High-demand groups go first with the reserved slot off the
        // table, then the low-count remainder may use it.
        for (groups, allow_reserved) in [(high, false), (low, true)] {
            let mut ordered = groups;
            ordered.sort_by(|a, b| b.count().cmp(&a.count()).then(a.key.cmp(&b.key)));

            for group in ordered {
                let targets = [
                    (&mut template_a, &mut usage_a, &mut placements_a),
                    (&mut template_b, &mut usage_b, &mut placements_b),
                ];
                let mut placed = false;

                for (template, usage, assigned) in targets {
                    // The pool rebuild is what lets a later group see
                    // slots the previous group declined; occupancy is
                    // enforced by the vacancy check, not the pool.
                    let mut pool = SlotPool::from_template(template);
                    let slot = match allocate(template, &mut pool, &group, ceiling, allow_reserved)
                    {
                        AllocationOutcome::Placed { slot, .. }
                        | AllocationOutcome::AlreadyPlaced { slot } => slot,
                        AllocationOutcome::NotPlaced => continue,
                    };

                    let declared = template.slot_nozzles(slot).to_vec();
                    for member in &group.members {
                        match resolve_nozzle(&self.nozzles, usage, slot, &declared, member.rotation)
                        {
                            Some(nozzle) => {
                                let mut placement = member.clone();
                                placement.rotation = finalize_rotation(slot, placement.rotation);
                                matched += 1;
                                assigned.push(AssignedPlacement {
                                    slot,
                                    nozzle,
                                    placement,
                                });
                            }
                            None => {
                                warn!(
                                    "no usable nozzle for {} at {:.1} deg on slot {slot}",
                                    member.refdes, member.rotation
                                );
                                unmatched += 1;
                                manual.push(member.clone());
                            }
                        }
                    }
                    placed = true;
                    break;
                }

                if !placed {
                    info!("group {} goes to manual placement", group.key);
                    unmatched += group.count();
                    manual.extend(group.members);
                }
            }
        }

        for list in [&mut placements_a, &mut placements_b] {
            sort_assigned(list, &self.config.sort_keys, self.config.sort_ascending, sort_origin);
        }

        info!(
            "side {}: {matched} matched, {unmatched} manual",
            side.label()
        );
        SideReport {
            side,
            template_a,
            template_b,
            placements_a,
            placements_b,
            fiducials,
            manual,
            matched,
            unmatched,
        }
    }
}

/// Fit the board-to-machine transform from distance-sorted fiducial
/// correspondences.
fn calibrate(
    board_fiducials: &[Point2<f64>],
    template: &Template,
) -> Result<BoardTransform, CalibrationError> {
    let mut board = board_fiducials.to_vec();
    board.sort_by(|a, b| {
        a.coords
            .norm()
            .partial_cmp(&b.coords.norm())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fit_transform(&board, &template.fiducials_sorted())
}

/// Final rotation: fold into one turn, apply the large-reel mounting
/// correction, then wrap into (-180, 180].
fn finalize_rotation(slot: SlotId, rotation: f64) -> f64 {
    let mut r = rotation % 360.0;
    if slot.0 >= LARGE_REEL_SLOT_MIN {
        r -= 180.0;
    }
    normalize_angle(r)
}
