//! Core value types: crop region, pixel frame, and EXIF orientation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{normalize_degrees, COORD_EPSILON};

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl Orientation {
    /// Returns true if this orientation swaps width and height dimensions.
    ///
    /// Rotations of 90° and 270° (and their flip variants Transpose/Transverse)
    /// swap the image dimensions.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Failure to parse a pixel-size string.
#[derive(Debug, Error)]
#[error("invalid frame size {0:?}: expected \"{{W, H}}\" or \"WxH\" with nonzero dimensions")]
pub struct ParseFrameSizeError(pub String);

/// Pixel dimensions of the image frame a crop is measured against.
///
/// Sidecars store this in two spellings: the vendor dialect's brace form
/// (`"{6960, 4640}"`) and the plain `"6960x4640"` form; [`FrameSize::from_str`]
/// accepts both. The stored size describes the unoriented sensor frame;
/// call [`FrameSize::oriented`] before normalizing crop pixels against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The frame as displayed: axes swapped for the four transposing
    /// orientations, unchanged otherwise.
    #[inline]
    pub fn oriented(self, orientation: Orientation) -> FrameSize {
        if orientation.swaps_dimensions() {
            FrameSize::new(self.height, self.width)
        } else {
            self
        }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FrameSize {
    type Err = ParseFrameSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFrameSizeError(s.to_string());
        let trimmed = s.trim();

        let (first, second) = if let Some(inner) =
            trimmed.strip_prefix('{').and_then(|r| r.strip_suffix('}'))
        {
            let mut parts = inner.splitn(2, ',');
            (parts.next(), parts.next())
        } else {
            let mut parts = trimmed.splitn(2, |c: char| c == 'x' || c == 'X');
            (parts.next(), parts.next())
        };

        let (first, second) = match (first, second) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(err()),
        };

        let width: u32 = first.trim().parse().map_err(|_| err())?;
        let height: u32 = second.trim().parse().map_err(|_| err())?;
        if width == 0 || height == 0 {
            return Err(err());
        }

        Ok(FrameSize::new(width, height))
    }
}

/// Canonical, dialect-agnostic crop description.
///
/// The rectangle is axis-aligned in the unrotated (but oriented) frame, with
/// `rotation_degrees` applied to it about its own center afterwards. All
/// coordinates are normalized fractions of the frame.
///
/// `has_crop` distinguishes "no crop metadata present" (pass through, write
/// nothing) from an explicit crop, which includes the explicit full-frame
/// identity crop some dialects still require to be written.
///
/// This is a value type: built once per document, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    /// Left edge, normalized (0.0 to 1.0) from the frame's left.
    pub origin_x: f64,
    /// Top edge, normalized (0.0 to 1.0) from the frame's top.
    pub origin_y: f64,
    /// Horizontal extent, normalized (0.0 to 1.0).
    pub width: f64,
    /// Vertical extent, normalized (0.0 to 1.0).
    pub height: f64,
    /// Rotation about the rectangle center, degrees in `(-180, 180]`,
    /// positive = clockwise on screen. Applied on top of any EXIF
    /// orientation already baked into the frame.
    pub rotation_degrees: f64,
    /// False when the source carries no effective crop.
    pub has_crop: bool,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self::no_crop()
    }
}

impl CropRegion {
    /// Create a crop region, normalizing the rotation into `(-180, 180]`.
    pub fn new(origin_x: f64, origin_y: f64, width: f64, height: f64, rotation_degrees: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
            rotation_degrees: normalize_degrees(rotation_degrees),
            has_crop: true,
        }
    }

    /// The "nothing to do" value: identity geometry with `has_crop` unset.
    pub fn no_crop() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width: 1.0,
            height: 1.0,
            rotation_degrees: 0.0,
            has_crop: false,
        }
    }

    /// An explicit whole-frame crop, optionally rotated.
    ///
    /// This is what a rotation-only edit becomes: the full frame with an
    /// angle on it.
    pub fn full_frame(rotation_degrees: f64) -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0, rotation_degrees)
    }

    /// Whether the rectangle covers the whole frame (rotation ignored).
    pub fn is_full_frame(&self) -> bool {
        self.origin_x.abs() < COORD_EPSILON
            && self.origin_y.abs() < COORD_EPSILON
            && (self.width - 1.0).abs() < COORD_EPSILON
            && (self.height - 1.0).abs() < COORD_EPSILON
    }

    /// First violated invariant, if any, described for diagnostics.
    ///
    /// A valid region has finite fields, origin and extent in `[0, 1]`, a
    /// strictly positive area, `origin + extent <= 1`, and a rotation inside
    /// the canonical range, all judged within [`COORD_EPSILON`].
    pub fn invariant_violation(&self) -> Option<String> {
        let fields = [
            ("origin_x", self.origin_x),
            ("origin_y", self.origin_y),
            ("width", self.width),
            ("height", self.height),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Some(format!("{} is not finite", name));
            }
            if !(-COORD_EPSILON..=1.0 + COORD_EPSILON).contains(&value) {
                return Some(format!("{} = {} outside [0, 1]", name, value));
            }
        }
        if self.width <= COORD_EPSILON {
            return Some(format!("width = {} is not positive", self.width));
        }
        if self.height <= COORD_EPSILON {
            return Some(format!("height = {} is not positive", self.height));
        }
        if self.origin_x + self.width > 1.0 + COORD_EPSILON {
            return Some(format!(
                "origin_x + width = {} exceeds the frame",
                self.origin_x + self.width
            ));
        }
        if self.origin_y + self.height > 1.0 + COORD_EPSILON {
            return Some(format!(
                "origin_y + height = {} exceeds the frame",
                self.origin_y + self.height
            ));
        }
        if !self.rotation_degrees.is_finite() {
            return Some("rotation_degrees is not finite".to_string());
        }
        if self.rotation_degrees <= -180.0 - COORD_EPSILON
            || self.rotation_degrees > 180.0 + COORD_EPSILON
        {
            return Some(format!(
                "rotation_degrees = {} outside (-180, 180]",
                self.rotation_degrees
            ));
        }
        None
    }

    /// Check all invariants at once.
    pub fn is_valid(&self) -> bool {
        self.invariant_violation().is_none()
    }

    /// Field-wise comparison within `tolerance` (the `has_crop` flags must
    /// match exactly).
    pub fn approx_eq(&self, other: &CropRegion, tolerance: f64) -> bool {
        self.has_crop == other.has_crop
            && (self.origin_x - other.origin_x).abs() <= tolerance
            && (self.origin_y - other.origin_y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
            && (self.rotation_degrees - other.rotation_degrees).abs() <= tolerance
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
