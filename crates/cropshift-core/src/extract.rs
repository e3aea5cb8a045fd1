//! Locating the crop record inside a decoded edit model.
//!
//! The vendor's model is versioned: `editModel.versions[]` each carry an
//! `adjDataArr[]` of adjustment records, and the crop lives in the record
//! whose `id` is `"Crop"`. When several versions carry one, the last wins.
//! The record's own geometry hides one layer deeper, in its string-typed
//! `json` field.
//!
//! # Source geometry
//!
//! `cropRect` is `[[x, y], [width, height]]` in pixels, measured on the
//! oriented frame with the origin at the bottom-left and y growing upward.
//! Canonical [`CropRegion`] coordinates are normalized with a top-left
//! origin and y growing downward, so x carries over and y flips:
//!
//! ```text
//! origin_x = x / frame_width
//! origin_y = (frame_height - (y + height)) / frame_height
//! width    = width  / frame_width
//! height   = height / frame_height
//! ```
//!
//! The vendor's `straighten` angle carries over numerically unchanged: it is
//! counter-clockwise-positive in the vendor's y-up frame, which is the same
//! physical rotation as clockwise-positive in the canonical y-down frame.
//!
//! # Special states
//!
//! - An all-zero `cropRect` marks a rotation-only edit; it extracts as a
//!   full-frame region carrying the straighten angle.
//! - A record with `enabled` false extracts as the explicit no-crop region,
//!   so callers can distinguish "crop removed" from "never cropped".

use thiserror::Error;

use crate::decode::{decode_json_fragment, EditValue};
use crate::geometry::{CropRegion, FrameSize, Orientation};

/// Errors from reading a crop out of a decoded edit model.
///
/// These fire only once a crop record exists: a model with no crop record at
/// all is not an error, it is [`None`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A field the crop schema requires is absent.
    #[error("missing required field {0:?}")]
    MissingField(&'static str),

    /// A field is present but unusable, with the reason spelled out.
    #[error("invalid field {field:?}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Destination-side crop attributes that do not assemble into a region.
    #[error("stored crop is inconsistent: {0}")]
    InvalidCrop(String),
}

/// A crop pulled out of a source model, with the frame it is measured on.
///
/// `frame` is the oriented pixel size: the sensor dimensions with width and
/// height swapped when the orientation transposes the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedCrop {
    pub region: CropRegion,
    pub frame: FrameSize,
}

/// Search a decoded edit model for its crop state.
///
/// Returns `Ok(None)` when the model carries no crop record at all, in
/// which case the destination should stay untouched. A disabled record returns
/// a region with `has_crop` false; an all-zero rectangle returns a
/// full-frame region carrying only the straighten angle.
///
/// The orientation used to orient the sensor frame comes from the model's
/// own `defaultOrientation` when present, then from `document_orientation`
/// (typically the document's `tiff:Orientation`), then defaults to normal.
///
/// # Arguments
///
/// * `model` - The tree produced by [`decode_edit_model`]
/// * `document_orientation` - Orientation from outside the model, if any
///
/// # Returns
///
/// The extracted crop and its frame, `None` for crop-less models, or an
/// [`ExtractionError`] naming the field that could not be read.
///
/// [`decode_edit_model`]: crate::decode::decode_edit_model
pub fn extract_crop(
    model: &EditValue,
    document_orientation: Option<Orientation>,
) -> Result<Option<ExtractedCrop>, ExtractionError> {
    let record = match find_crop_record(model) {
        Some(record) => record,
        None => return Ok(None),
    };

    let orientation = model_orientation(model)
        .or(document_orientation)
        .unwrap_or_default();
    let frame = sensor_frame(model)?.oriented(orientation);

    if !record_enabled(record) {
        return Ok(Some(ExtractedCrop {
            region: CropRegion::no_crop(),
            frame,
        }));
    }

    let payload_json = record
        .get("json")
        .and_then(EditValue::as_str)
        .ok_or(ExtractionError::MissingField("json"))?;
    let payload = decode_json_fragment(payload_json).map_err(|e| ExtractionError::InvalidField {
        field: "json",
        reason: e.to_string(),
    })?;

    let straighten = straighten_degrees(&payload)?;
    let region = match crop_rect(&payload)? {
        PixelRect::Zero => CropRegion::full_frame(straighten),
        PixelRect::Rect { x, y, width, height } => {
            pixels_to_region(x, y, width, height, straighten, frame)?
        }
    };

    Ok(Some(ExtractedCrop { region, frame }))
}

/// The last `"Crop"` record across all versions, or `None`.
fn find_crop_record(model: &EditValue) -> Option<&EditValue> {
    let versions = model.get("editModel")?.get("versions")?.as_seq()?;
    let mut found = None;
    for version in versions {
        let records = match version.get("adjDataArr").and_then(EditValue::as_seq) {
            Some(records) => records,
            None => continue,
        };
        for record in records {
            if record.get("id").and_then(EditValue::as_str) == Some("Crop") {
                found = Some(record);
            }
        }
    }
    found
}

/// A record with no `enabled` key counts as enabled.
fn record_enabled(record: &EditValue) -> bool {
    match record.get("enabled") {
        None => true,
        Some(value) => value
            .as_bool()
            .or_else(|| value.as_i64().map(|i| i != 0))
            .unwrap_or(true),
    }
}

/// Orientation stored in the model itself (`editModel.defaultOrientation`).
fn model_orientation(model: &EditValue) -> Option<Orientation> {
    let code = model.get("editModel")?.get("defaultOrientation")?.as_i64()?;
    u32::try_from(code).ok().map(Orientation::from)
}

/// The unoriented sensor size from `originalImagePixelSize`.
fn sensor_frame(model: &EditValue) -> Result<FrameSize, ExtractionError> {
    let value = model
        .get("originalImagePixelSize")
        .ok_or(ExtractionError::MissingField("originalImagePixelSize"))?;
    let text = value.as_str().ok_or_else(|| ExtractionError::InvalidField {
        field: "originalImagePixelSize",
        reason: format!("expected a size string, found {}", value.type_name()),
    })?;
    text.parse::<FrameSize>()
        .map_err(|e| ExtractionError::InvalidField {
            field: "originalImagePixelSize",
            reason: e.to_string(),
        })
}

/// `numeric.straighten`, defaulting to zero when absent.
fn straighten_degrees(payload: &EditValue) -> Result<f64, ExtractionError> {
    match payload.get("numeric").and_then(|n| n.get("straighten")) {
        None => Ok(0.0),
        Some(value) => value
            .as_f64()
            .filter(|d| d.is_finite())
            .ok_or_else(|| ExtractionError::InvalidField {
                field: "straighten",
                reason: format!("expected a finite number, found {}", value.type_name()),
            }),
    }
}

enum PixelRect {
    /// The all-zero rectangle: rotation-only edit, crop covers the frame.
    Zero,
    Rect { x: f64, y: f64, width: f64, height: f64 },
}

/// Pull `cropRect` apart into its origin and size pairs.
fn crop_rect(payload: &EditValue) -> Result<PixelRect, ExtractionError> {
    let value = payload
        .get("cropRect")
        .ok_or(ExtractionError::MissingField("cropRect"))?;

    let malformed = || ExtractionError::InvalidField {
        field: "cropRect",
        reason: "expected [[x, y], [width, height]] with numeric members".to_string(),
    };
    let pairs = value.as_seq().filter(|s| s.len() == 2).ok_or_else(malformed)?;
    let (x, y) = number_pair(&pairs[0]).ok_or_else(malformed)?;
    let (width, height) = number_pair(&pairs[1]).ok_or_else(malformed)?;

    if x == 0.0 && y == 0.0 && width == 0.0 && height == 0.0 {
        return Ok(PixelRect::Zero);
    }
    Ok(PixelRect::Rect { x, y, width, height })
}

fn number_pair(value: &EditValue) -> Option<(f64, f64)> {
    let seq = value.as_seq()?;
    if seq.len() != 2 {
        return None;
    }
    Some((seq[0].as_f64()?, seq[1].as_f64()?))
}

/// Convert a bottom-left pixel rectangle into a canonical region.
///
/// Applies the y-flip and normalization described in the module docs, then
/// validates the result so downstream projection can rely on it.
fn pixels_to_region(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    straighten: f64,
    frame: FrameSize,
) -> Result<CropRegion, ExtractionError> {
    let fw = frame.width as f64;
    let fh = frame.height as f64;
    let region = CropRegion::new(
        x / fw,
        (fh - (y + height)) / fh,
        width / fw,
        height / fh,
        straighten,
    );
    if let Some(violation) = region.invariant_violation() {
        return Err(ExtractionError::InvalidField {
            field: "cropRect",
            reason: violation,
        });
    }
    Ok(region)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
