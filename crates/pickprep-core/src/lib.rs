//! Geometric core for placement-data preparation.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about feeders, templates, or machine formats: it fits a calibration
//! transform from fiducial correspondences, reprojects points through it,
//! infers a board width from fiducial positions, and normalizes rotation
//! angles.

mod angle;
mod logger;
mod transform;
mod width;

pub use angle::normalize_angle;
pub use logger::init_with_level;
pub use transform::{fit_transform, Affine2, BoardTransform, CalibrationError, Homography};
pub use width::{infer_board_width, verify_board_width, FiducialLayout, WidthError, WidthEstimate};
