//! Run-aborting error conditions.
//!
//! Structural and input problems abort the whole run; allocation and
//! nozzle failures are values ([`AllocationOutcome`], `Option<NozzleId>`)
//! that degrade into the manual-placement list instead.
//!
//! [`AllocationOutcome`]: crate::allocator::AllocationOutcome

use pickprep_core::{CalibrationError, WidthError};

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// Required configuration or input structure missing.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    /// A computed or supplied board width failed the component-bounds
    /// sanity check.
    #[error(transparent)]
    Validation(#[from] WidthError),
}
