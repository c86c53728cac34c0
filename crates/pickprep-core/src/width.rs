//! Board-width inference from fiducial positions.
//!
//! Used only when no explicit width is supplied. Two fiducials are
//! classified by arrangement; with more than two the rightmost fiducial
//! wins. The inferred (or supplied) width is then sanity-checked against
//! the component extents.

use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::transform::CalibrationError;

/// Coordinate-difference threshold for the same-line classification.
const LINE_EPSILON: f64 = 1e-3;

/// Margin added to the maximum component X when checking a width.
const WIDTH_MARGIN: f64 = 5.0;

/// How two fiducials sit relative to each other.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiducialLayout {
    /// Same X coordinate; the max-X fallback is a guess.
    Vertical,
    /// Same Y coordinate.
    Horizontal,
    /// Different X and Y.
    Diagonal,
    /// More than two fiducials; rightmost X taken.
    Rightmost,
}

/// Inferred board width with a confidence hint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidthEstimate {
    pub width: f64,
    pub layout: FiducialLayout,
    /// False when the fiducial arrangement cannot actually constrain the
    /// width (vertical pair); the caller should prefer a manual value.
    pub confident: bool,
}

/// A width that fails the component-bounds check.
#[derive(thiserror::Error, Debug)]
pub enum WidthError {
    #[error(
        "board width {width:.3} is smaller than max component x {max_x:.3} + {margin:.1} margin; \
         verify fiducial positions or provide the width manually"
    )]
    TooSmall { width: f64, max_x: f64, margin: f64 },
}

/// Infer the board width from fiducial positions.
///
/// More than two fiducials use the rightmost-fiducial rule only: sorted by
/// X descending then Y ascending, the first fiducial's X is the width. No
/// vertical/horizontal disambiguation is attempted for that case.
pub fn infer_board_width(fiducials: &[Point2<f64>]) -> Result<WidthEstimate, CalibrationError> {
    if fiducials.is_empty() {
        return Err(CalibrationError::NoFiducials);
    }

    if fiducials.len() == 2 {
        let (a, b) = (fiducials[0], fiducials[1]);
        let x_diff = (b.x - a.x).abs();
        let y_diff = (b.y - a.y).abs();
        let width = a.x.max(b.x);

        let (layout, confident) = if x_diff < LINE_EPSILON {
            warn!("fiducials share a vertical line; width {width:.3} may be inaccurate");
            (FiducialLayout::Vertical, false)
        } else if y_diff < LINE_EPSILON {
            (FiducialLayout::Horizontal, true)
        } else {
            (FiducialLayout::Diagonal, true)
        };

        info!("inferred board width {width:.3} from 2 fiducials ({layout:?})");
        return Ok(WidthEstimate {
            width,
            layout,
            confident,
        });
    }

    let mut sorted: Vec<Point2<f64>> = fiducials.to_vec();
    sorted.sort_by(|a, b| {
        b.x.partial_cmp(&a.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    let rightmost = sorted[0];
    info!(
        "inferred board width {:.3} from rightmost of {} fiducials",
        rightmost.x,
        fiducials.len()
    );
    Ok(WidthEstimate {
        width: rightmost.x,
        layout: FiducialLayout::Rightmost,
        confident: true,
    })
}

/// Reject a width that cannot contain the components.
pub fn verify_board_width(width: f64, max_component_x: f64) -> Result<(), WidthError> {
    if width < max_component_x + WIDTH_MARGIN {
        return Err(WidthError::TooSmall {
            width,
            max_x: max_component_x,
            margin: WIDTH_MARGIN,
        });
    }
    Ok(())
}
