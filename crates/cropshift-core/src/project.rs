//! Projecting canonical geometry into the camera-raw attribute set.
//!
//! The destination dialect does not store "rectangle plus angle". It stores
//! the positions of the crop's top-left and bottom-right corners AFTER the
//! rotation has been applied, normalized to the frame, plus the angle and a
//! handful of fixed flags. This module owns that projection and its inverse.
//!
//! # Corner math
//!
//! Working in pixels on the oriented frame (top-left origin, y down):
//!
//! 1. Rotate the region's corners about its center by the crop angle.
//! 2. If any corner lands outside the frame, shrink the rectangle toward
//!    its center by the smallest factor that brings every corner back in.
//! 3. Emit the rotated top-left as `CropLeft`/`CropTop` and the rotated
//!    bottom-right as `CropRight`/`CropBottom`, normalized by the frame.
//!
//! After rotation `CropLeft` can exceed `CropRight`; that is the dialect's
//! convention for rotated crops, not an error.
//!
//! # Attribute set
//!
//! Eight attributes, emitted in this order:
//!
//! | Attribute                  | Value                      |
//! |----------------------------|----------------------------|
//! | `CropLeft`                 | rotated top-left x, 0..=1  |
//! | `CropTop`                  | rotated top-left y, 0..=1  |
//! | `CropRight`                | rotated bottom-right x     |
//! | `CropBottom`               | rotated bottom-right y     |
//! | `CropAngle`                | degrees, clockwise positive|
//! | `CropConstrainToWarp`      | always `0`                 |
//! | `CropConstrainToUnitSquare`| always `1`                 |
//! | `HasCrop`                  | always `True`              |
//!
//! Floats are fixed to six decimals, matching what the destination's own
//! writers produce.

use thiserror::Error;

use crate::extract::ExtractionError;
use crate::geometry::{CropRegion, FrameSize, Point, COORD_EPSILON};
use crate::{ns, AttributeSource};

/// Attribute names within the camera-raw namespace.
pub mod attr {
    pub const CROP_LEFT: &str = "CropLeft";
    pub const CROP_TOP: &str = "CropTop";
    pub const CROP_RIGHT: &str = "CropRight";
    pub const CROP_BOTTOM: &str = "CropBottom";
    pub const CROP_ANGLE: &str = "CropAngle";
    pub const CROP_CONSTRAIN_TO_WARP: &str = "CropConstrainToWarp";
    pub const CROP_CONSTRAIN_TO_UNIT_SQUARE: &str = "CropConstrainToUnitSquare";
    pub const HAS_CROP: &str = "HasCrop";
}

/// Every crop attribute this tool owns, in emission order. Clearing a crop
/// removes exactly this set.
pub const CROP_ATTRIBUTE_NAMES: [&str; 8] = [
    attr::CROP_LEFT,
    attr::CROP_TOP,
    attr::CROP_RIGHT,
    attr::CROP_BOTTOM,
    attr::CROP_ANGLE,
    attr::CROP_CONSTRAIN_TO_WARP,
    attr::CROP_CONSTRAIN_TO_UNIT_SQUARE,
    attr::HAS_CROP,
];

/// Guards divisions when the crop center sits on a frame edge.
const MIN_EXTENT: f64 = 1e-9;

/// Stored edges carry six decimals, so reading them back can overshoot the
/// unit range by quantization noise. Overshoots inside this tolerance snap
/// to the boundary; in-range values are untouched.
const SNAP_TOLERANCE: f64 = 1e-4;

/// Errors from projecting a region into destination attributes.
///
/// A region that fails here came from a caller bypassing extraction, so
/// treat these as logic faults rather than bad input files.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The region violates the canonical invariants.
    #[error("crop region violates its invariants: {violation}")]
    InvalidRegion { violation: String },

    /// The frame has a zero dimension.
    #[error("cannot project onto degenerate frame {frame}")]
    DegenerateFrame { frame: FrameSize },
}

/// Ordered name/value pairs destined for the camera-raw namespace.
///
/// Order is part of the contract: documents written from the same input
/// must compare byte-identical.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetAttributeSet {
    entries: Vec<(&'static str, String)>,
}

impl TargetAttributeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.entries.iter().map(|(n, v)| (*n, v.as_str()))
    }

    fn push(&mut self, name: &'static str, value: String) {
        self.entries.push((name, value));
    }
}

/// Project a canonical region into the destination's flat attributes.
///
/// A region with `has_crop` false projects to the empty set; the caller
/// decides what an explicit no-crop means for the destination document.
///
/// # Arguments
///
/// * `region` - The canonical crop, validated against its invariants
/// * `frame` - Oriented pixel dimensions the region is measured on
///
/// # Returns
///
/// The full eight-attribute set, or a [`ProjectionError`] if the inputs are
/// internally inconsistent.
pub fn project_crop(
    region: &CropRegion,
    frame: FrameSize,
) -> Result<TargetAttributeSet, ProjectionError> {
    if !region.has_crop {
        return Ok(TargetAttributeSet::default());
    }
    if let Some(violation) = region.invariant_violation() {
        return Err(ProjectionError::InvalidRegion { violation });
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(ProjectionError::DegenerateFrame { frame });
    }

    let edges = project_edges(region, frame);
    let mut attrs = TargetAttributeSet::default();
    attrs.push(attr::CROP_LEFT, format_decimal(edges.left));
    attrs.push(attr::CROP_TOP, format_decimal(edges.top));
    attrs.push(attr::CROP_RIGHT, format_decimal(edges.right));
    attrs.push(attr::CROP_BOTTOM, format_decimal(edges.bottom));
    attrs.push(attr::CROP_ANGLE, format_decimal(region.rotation_degrees));
    attrs.push(attr::CROP_CONSTRAIN_TO_WARP, "0".to_string());
    attrs.push(attr::CROP_CONSTRAIN_TO_UNIT_SQUARE, "1".to_string());
    attrs.push(attr::HAS_CROP, "True".to_string());
    Ok(attrs)
}

/// Normalized positions of the rotated top-left and bottom-right corners.
struct ProjectedEdges {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

fn project_edges(region: &CropRegion, frame: FrameSize) -> ProjectedEdges {
    let fw = frame.width as f64;
    let fh = frame.height as f64;
    let x = region.origin_x * fw;
    let y = region.origin_y * fh;
    let w = region.width * fw;
    let h = region.height * fh;

    let center = Point::new(x + w / 2.0, y + h / 2.0);
    let radians = region.rotation_degrees.to_radians();
    let corners = [
        Point::new(x, y).rotated_about(center, radians),
        Point::new(x + w, y).rotated_about(center, radians),
        Point::new(x, y + h).rotated_about(center, radians),
        Point::new(x + w, y + h).rotated_about(center, radians),
    ];

    let scale = fit_scale(&corners, center, fw, fh);
    let top_left = corners[0].scaled_toward(center, scale);
    let bottom_right = corners[3].scaled_toward(center, scale);

    ProjectedEdges {
        left: top_left.x / fw,
        top: top_left.y / fh,
        right: bottom_right.x / fw,
        bottom: bottom_right.y / fh,
    }
}

/// Smallest shrink factor that pulls every rotated corner inside the frame.
///
/// For each corner past an edge, the required factor is the ratio of its
/// offset from the center to the room available on that side; the overall
/// factor is the worst case, and 1.0 when everything already fits.
fn fit_scale(corners: &[Point; 4], center: Point, fw: f64, fh: f64) -> f64 {
    let mut scale = 1.0f64;
    for corner in corners {
        if corner.x < 0.0 {
            scale = scale.max((center.x - corner.x) / center.x.max(MIN_EXTENT));
        } else if corner.x > fw {
            scale = scale.max((corner.x - center.x) / (fw - center.x).max(MIN_EXTENT));
        }
        if corner.y < 0.0 {
            scale = scale.max((center.y - corner.y) / center.y.max(MIN_EXTENT));
        } else if corner.y > fh {
            scale = scale.max((corner.y - center.y) / (fh - center.y).max(MIN_EXTENT));
        }
    }
    scale
}

/// Fixed six-decimal spelling, avoiding `-0.000000`.
fn format_decimal(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value:.6}")
}

/// Read a previously written crop back from destination-side attributes.
///
/// The inverse of [`project_crop`]: un-rotates the stored corners about
/// their midpoint to recover the canonical region. Returns `Ok(None)` when
/// `HasCrop` is absent or not `True`.
///
/// A zero stored angle needs no pixel dimensions; a nonzero angle reads the
/// frame via [`read_frame`] and fails if the document carries none.
pub fn read_crop<D>(doc: &D) -> Result<Option<CropRegion>, ExtractionError>
where
    D: AttributeSource + ?Sized,
{
    match doc.attribute(ns::CRS, attr::HAS_CROP) {
        Some(v) if v.trim().eq_ignore_ascii_case("true") => {}
        _ => return Ok(None),
    }

    let left = read_decimal(doc, attr::CROP_LEFT)?;
    let top = read_decimal(doc, attr::CROP_TOP)?;
    let right = read_decimal(doc, attr::CROP_RIGHT)?;
    let bottom = read_decimal(doc, attr::CROP_BOTTOM)?;
    let angle = match doc.attribute(ns::CRS, attr::CROP_ANGLE) {
        None => 0.0,
        Some(raw) => parse_decimal(attr::CROP_ANGLE, &raw)?,
    };

    let region = if angle.abs() < COORD_EPSILON {
        // Unrotated corners are the rectangle itself.
        assemble_region(left, top, right, bottom, 0.0)
    } else {
        let frame = read_frame(doc)?.ok_or(ExtractionError::MissingField("ImageWidth"))?;
        let (x0, y0, x1, y1) = unrotate_edges(left, top, right, bottom, angle, frame);
        assemble_region(x0, y0, x1, y1, angle)
    };

    if let Some(violation) = region.invariant_violation() {
        return Err(ExtractionError::InvalidCrop(violation));
    }
    Ok(Some(region))
}

/// Build a region from recovered corner coordinates, snapping quantization
/// overshoots back onto the unit boundary.
fn assemble_region(x0: f64, y0: f64, x1: f64, y1: f64, angle: f64) -> CropRegion {
    let x0 = snap_unit(x0);
    let y0 = snap_unit(y0);
    let x1 = snap_unit(x1);
    let y1 = snap_unit(y1);
    CropRegion::new(x0, y0, x1 - x0, y1 - y0, angle)
}

fn snap_unit(value: f64) -> f64 {
    if value < 0.0 && value > -SNAP_TOLERANCE {
        0.0
    } else if value > 1.0 && value < 1.0 + SNAP_TOLERANCE {
        1.0
    } else {
        value
    }
}

/// Destination-side pixel dimensions.
///
/// Prefers `tiff:ImageWidth`/`tiff:ImageLength`, falling back to
/// `exif:PixelXDimension`/`exif:PixelYDimension`.
pub fn read_frame<D>(doc: &D) -> Result<Option<FrameSize>, ExtractionError>
where
    D: AttributeSource + ?Sized,
{
    if let Some(frame) = dimension_pair(doc, ns::TIFF, "ImageWidth", "ImageLength")? {
        return Ok(Some(frame));
    }
    dimension_pair(doc, ns::EXIF, "PixelXDimension", "PixelYDimension")
}

fn dimension_pair<D>(
    doc: &D,
    namespace: &str,
    width_name: &'static str,
    height_name: &'static str,
) -> Result<Option<FrameSize>, ExtractionError>
where
    D: AttributeSource + ?Sized,
{
    let width = match doc.attribute(namespace, width_name) {
        Some(v) => v,
        None => return Ok(None),
    };
    let height = match doc.attribute(namespace, height_name) {
        Some(v) => v,
        None => return Ok(None),
    };

    let parse = |field: &'static str, raw: &str| {
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| ExtractionError::InvalidField {
                field,
                reason: format!("expected a positive pixel count, found {raw:?}"),
            })
    };
    Ok(Some(FrameSize::new(
        parse(width_name, &width)?,
        parse(height_name, &height)?,
    )))
}

fn read_decimal<D>(doc: &D, name: &'static str) -> Result<f64, ExtractionError>
where
    D: AttributeSource + ?Sized,
{
    let raw = doc
        .attribute(ns::CRS, name)
        .ok_or(ExtractionError::MissingField(name))?;
    parse_decimal(name, &raw)
}

/// Parse a stored decimal, accepting the rational spelling (`"433985/100000"`)
/// some writers use alongside plain floats.
fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, ExtractionError> {
    let text = raw.trim();
    let invalid = |reason: String| ExtractionError::InvalidField { field, reason };

    let value = if let Some((numerator, denominator)) = text.split_once('/') {
        let n: f64 = numerator
            .trim()
            .parse()
            .map_err(|_| invalid(format!("unparseable number {text:?}")))?;
        let d: f64 = denominator
            .trim()
            .parse()
            .map_err(|_| invalid(format!("unparseable number {text:?}")))?;
        if d == 0.0 {
            return Err(invalid(format!("zero denominator in {text:?}")));
        }
        n / d
    } else {
        text.parse()
            .map_err(|_| invalid(format!("unparseable number {text:?}")))?
    };

    if !value.is_finite() {
        return Err(invalid(format!("non-finite value {text:?}")));
    }
    Ok(value)
}

/// Recover normalized pre-rotation corners from stored post-rotation edges.
fn unrotate_edges(
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    angle_degrees: f64,
    frame: FrameSize,
) -> (f64, f64, f64, f64) {
    let fw = frame.width as f64;
    let fh = frame.height as f64;

    let stored_tl = Point::new(left * fw, top * fh);
    let stored_br = Point::new(right * fw, bottom * fh);
    // Rotation about the center leaves the center in place, so the stored
    // corners' midpoint is the rectangle's center.
    let center = Point::midpoint(stored_tl, stored_br);
    let radians = angle_degrees.to_radians();
    let tl = stored_tl.rotated_about(center, -radians);
    let br = stored_br.rotated_about(center, -radians);

    (tl.x / fw, tl.y / fh, br.x / fw, br.y / fh)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
