//! Canonical crop geometry shared by both sidecar dialects.
//!
//! Every translation passes through the types in this module: the source
//! dialect is extracted into a [`CropRegion`], and the destination dialect is
//! projected back out of one. Neither dialect's conventions leak past its own
//! module; everything here is dialect-agnostic.
//!
//! # Coordinate System
//!
//! - (0.0, 0.0) = top-left corner of the oriented image
//! - (1.0, 1.0) = bottom-right corner
//! - Origin/extent are normalized fractions of the unrotated frame
//! - Rotation angles are in degrees, positive = clockwise on screen,
//!   normalized to the half-open range `(-180, 180]`

mod point;
mod region;

pub use point::Point;
pub use region::{CropRegion, FrameSize, Orientation, ParseFrameSizeError};

/// Tolerance for normalized-coordinate comparisons.
///
/// Matches the 6-decimal precision the destination dialect is written with:
/// values that differ by less than this are the same crop.
pub const COORD_EPSILON: f64 = 1e-6;

/// Normalize an angle in degrees into the canonical `(-180, 180]` range.
///
/// Whole turns are discarded and the remainder is folded into the half-open
/// range, so `270` becomes `-90` and `-540` becomes `180`. Non-finite input
/// passes through unchanged; callers reject it before building a region.
///
/// # Example
///
/// ```ignore
/// assert_eq!(normalize_degrees(270.0), -90.0);
/// assert_eq!(normalize_degrees(-270.0), 90.0);
/// assert_eq!(normalize_degrees(180.0), 180.0);
/// ```
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let mut d = degrees % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}
