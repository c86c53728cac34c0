//! Placement-data preparation for a pick-and-place machine.
//!
//! Takes a parsed board placement report and a machine feeder template and
//! produces, per board side, filled feeder templates plus the placement
//! lists routed to them. Geometry (calibration, width inference, angle
//! normalization) lives in `pickprep-core`; this crate adds the machine
//! model: reels, slots, nozzles, templates, allocation, and the run
//! pipeline.

pub mod allocator;
pub mod config;
pub mod error;
pub mod nozzle;
pub mod pipeline;
pub mod placement;
pub mod progress;
pub mod reel;
pub mod split;
pub mod template;

pub use allocator::{allocate, AllocationOutcome, SlotPool};
pub use config::{ConfigIoError, ProcessConfig, BUILTIN_IGNORED};
pub use error::ProcessError;
pub use nozzle::{parse_ganged, NozzleId, NozzleLibrary, NozzleParseError, NozzleUsage};
pub use pipeline::{BoardProcessor, BoardRun, SideReport};
pub use placement::{
    build_groups, filter_ignored, AssignedPlacement, ComponentGroup, GroupKey, Placement, SortKey,
};
pub use progress::{NoProgress, ProgressEvent, ProgressSink};
pub use reel::{ReelSize, ReelSizeParseError, SlotId, RESERVED_SLOT};
pub use split::{mirror_bottom, partition_sides, Side};
pub use template::{
    override_template, ComponentLibrary, ComponentSpec, ProcessParams, SlotAssignment, SlotKind,
    Template, TemplateMerge, TemplateRow,
};
