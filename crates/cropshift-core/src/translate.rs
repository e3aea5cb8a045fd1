//! Orchestrating one document-pair translation.
//!
//! One call moves the crop state of a source document into a destination
//! document: decode the vendor attribute, extract the canonical region,
//! project the destination attributes, merge. Three terminal outcomes:
//!
//! - [`Translation::Merged`] - an active crop was written
//! - [`Translation::Cleared`] - the source says "no crop" explicitly, and
//!   stale crop attributes were removed from the destination
//! - [`Translation::NoCropPresent`] - the source carries no crop metadata;
//!   the destination was not touched
//!
//! The merge is atomic with respect to errors: every fallible step runs
//! before the first destination mutation, so a failed translation leaves
//! the destination exactly as it was.

use thiserror::Error;

use crate::decode::{decode_edit_model, DecodeError};
use crate::extract::{extract_crop, ExtractionError};
use crate::geometry::Orientation;
use crate::project::{project_crop, ProjectionError, TargetAttributeSet, CROP_ATTRIBUTE_NAMES};
use crate::{ns, AttributeSink, AttributeSource};

/// Local name of the vendor attribute holding the embedded edit model.
pub const EDIT_MODEL_ATTRIBUTE: &str = "EditModel";

/// Whether an explicit no-crop source clears previously written crop
/// attributes from the destination. Without this, toggling a crop off in
/// the vendor editor would leave the stale rectangle visible to every
/// destination-side reader.
pub const CLEAR_STALE_CROP: bool = true;

/// Terminal outcome of a successful translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Crop attributes were merged into the destination.
    Merged(TargetAttributeSet),
    /// The source carries an explicit no-crop; stale attributes removed.
    Cleared,
    /// The source has no crop metadata at all; destination untouched.
    NoCropPresent,
}

/// Errors from the translation pipeline.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The vendor attribute exists but does not decode.
    #[error("decoding {attribute}: {source}")]
    Decode {
        attribute: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Translate the crop state of `source` into `destination`.
///
/// Reads the vendor edit model (and `tiff:Orientation` as an orientation
/// fallback) from the source, then merges the projected camera-raw
/// attributes into the destination. Attributes outside the crop set are
/// never touched, so repeated runs converge: translating a document the
/// tool already processed rewrites the same values.
///
/// # Arguments
///
/// * `source` - Document carrying the vendor edit model
/// * `destination` - Document receiving camera-raw crop attributes
///
/// # Returns
///
/// Which terminal state applied, or a [`TranslateError`]; on error the
/// destination is guaranteed unmodified.
pub fn translate_crop<S, D>(source: &S, destination: &mut D) -> Result<Translation, TranslateError>
where
    S: AttributeSource + ?Sized,
    D: AttributeSink + ?Sized,
{
    let raw = match source.attribute(ns::NITRO, EDIT_MODEL_ATTRIBUTE) {
        Some(raw) => raw,
        None => return Ok(Translation::NoCropPresent),
    };

    let model = decode_edit_model(&raw).map_err(|source| TranslateError::Decode {
        attribute: format!("nitro:{EDIT_MODEL_ATTRIBUTE}"),
        source,
    })?;

    let document_orientation = source
        .attribute(ns::TIFF, "Orientation")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(Orientation::from);

    let extracted = match extract_crop(&model, document_orientation)? {
        Some(extracted) => extracted,
        None => return Ok(Translation::NoCropPresent),
    };

    let attributes = project_crop(&extracted.region, extracted.frame)?;
    if attributes.is_empty() {
        // Explicit no-crop from the source.
        if CLEAR_STALE_CROP {
            for name in CROP_ATTRIBUTE_NAMES {
                destination.remove_attribute(ns::CRS, name);
            }
            return Ok(Translation::Cleared);
        }
        return Ok(Translation::NoCropPresent);
    }

    // Every fallible step is behind us; the merge cannot stop halfway.
    for (name, value) in attributes.iter() {
        destination.set_attribute(ns::CRS, name, value);
    }
    Ok(Translation::Merged(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::attr;
    use crate::AttributeMap;

    /// A vendor edit model carrying the given crop record fields, as the
    /// raw attribute value (unescaped plist; decoding accepts both).
    fn edit_model_attribute(size: &str, record_json: &str) -> String {
        let model = format!(
            r#"{{"defaultOrientation":1,"versions":[{{"adjDataArr":[{record_json}]}}]}}"#
        );
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<plist version="1.0"><dict>"#,
                "<key>originalImagePixelSize</key><string>{size}</string>",
                "<key>editModel</key><string>{model}</string>",
                "</dict></plist>",
            ),
            size = size,
            model = xml_escape_text(&model),
        )
    }

    /// Minimal text-content escaping for building plist fixtures.
    fn xml_escape_text(text: &str) -> String {
        text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    fn active_crop_record() -> String {
        r#"{"id":"Crop","enabled":true,"json":"{\"cropRect\":[[100,100],[800,800]],\"numeric\":{\"straighten\":0}}"}"#
            .to_string()
    }

    fn source_with(attribute_value: &str) -> AttributeMap {
        let mut source = AttributeMap::new();
        source.set(ns::NITRO, EDIT_MODEL_ATTRIBUTE, attribute_value);
        source
    }

    fn stale_destination() -> AttributeMap {
        let mut destination = AttributeMap::new();
        destination.set(ns::CRS, attr::HAS_CROP, "True");
        destination.set(ns::CRS, attr::CROP_LEFT, "0.400000");
        destination.set(ns::CRS, "Exposure2012", "+0.5");
        destination
    }

    #[test]
    fn test_active_crop_merges() {
        let source = source_with(&edit_model_attribute("{1000, 1000}", &active_crop_record()));
        let mut destination = AttributeMap::new();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        let attrs = match outcome {
            Translation::Merged(attrs) => attrs,
            other => panic!("expected Merged, got {other:?}"),
        };

        assert_eq!(attrs.len(), 8);
        assert_eq!(destination.get(ns::CRS, attr::CROP_LEFT), Some("0.100000"));
        assert_eq!(destination.get(ns::CRS, attr::CROP_TOP), Some("0.100000"));
        assert_eq!(destination.get(ns::CRS, attr::CROP_RIGHT), Some("0.900000"));
        assert_eq!(destination.get(ns::CRS, attr::CROP_BOTTOM), Some("0.900000"));
        assert_eq!(destination.get(ns::CRS, attr::CROP_ANGLE), Some("0.000000"));
        assert_eq!(destination.get(ns::CRS, attr::HAS_CROP), Some("True"));
    }

    #[test]
    fn test_merge_overwrites_stale_values_only() {
        let source = source_with(&edit_model_attribute("{1000, 1000}", &active_crop_record()));
        let mut destination = stale_destination();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert!(matches!(outcome, Translation::Merged(_)));

        assert_eq!(destination.get(ns::CRS, attr::CROP_LEFT), Some("0.100000"));
        // Non-crop attributes in the same namespace survive.
        assert_eq!(destination.get(ns::CRS, "Exposure2012"), Some("+0.5"));
    }

    #[test]
    fn test_no_edit_model_is_untouched() {
        let source = AttributeMap::new();
        let mut destination = stale_destination();
        let before = destination.clone();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert_eq!(outcome, Translation::NoCropPresent);
        assert_eq!(destination, before);
    }

    #[test]
    fn test_model_without_crop_record_is_untouched() {
        let attribute = edit_model_attribute(
            "{1000, 1000}",
            r#"{"id":"Exposure","enabled":true,"json":"{}"}"#,
        );
        let source = source_with(&attribute);
        let mut destination = stale_destination();
        let before = destination.clone();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert_eq!(outcome, Translation::NoCropPresent);
        assert_eq!(destination, before);
    }

    #[test]
    fn test_disabled_crop_clears_stale_attributes() {
        let attribute = edit_model_attribute(
            "{1000, 1000}",
            r#"{"id":"Crop","enabled":false,"json":"{\"cropRect\":[[100,100],[800,800]]}"}"#,
        );
        let source = source_with(&attribute);
        let mut destination = stale_destination();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert_eq!(outcome, Translation::Cleared);

        assert_eq!(destination.get(ns::CRS, attr::HAS_CROP), None);
        assert_eq!(destination.get(ns::CRS, attr::CROP_LEFT), None);
        // Clearing is scoped to the crop attribute set.
        assert_eq!(destination.get(ns::CRS, "Exposure2012"), Some("+0.5"));
    }

    #[test]
    fn test_decode_failure_names_the_attribute() {
        let source = source_with("not a plist at all");
        let mut destination = AttributeMap::new();

        let err = translate_crop(&source, &mut destination).unwrap_err();
        assert!(matches!(err, TranslateError::Decode { .. }));
        assert!(err.to_string().contains("nitro:EditModel"));
    }

    #[test]
    fn test_failures_leave_destination_untouched() {
        let mut destination = stale_destination();
        let before = destination.clone();

        // Decode-stage failure.
        let garbage = source_with("<plist><dict></plist>");
        assert!(translate_crop(&garbage, &mut destination).is_err());
        assert_eq!(destination, before);

        // Extraction-stage failure: crop record with no cropRect.
        let missing_rect = source_with(&edit_model_attribute(
            "{1000, 1000}",
            r#"{"id":"Crop","enabled":true,"json":"{\"numeric\":{}}"}"#,
        ));
        let err = translate_crop(&missing_rect, &mut destination).unwrap_err();
        assert!(err.to_string().contains("cropRect"));
        assert_eq!(destination, before);
    }

    #[test]
    fn test_escaped_attribute_round_trips() {
        // As stored in a real file: the whole plist entity-escaped once more.
        let raw = edit_model_attribute("{1000, 1000}", &active_crop_record());
        let escaped = raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
        let source = source_with(&escaped);
        let mut destination = AttributeMap::new();

        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert!(matches!(outcome, Translation::Merged(_)));
        assert_eq!(destination.get(ns::CRS, attr::CROP_LEFT), Some("0.100000"));
    }

    #[test]
    fn test_document_orientation_fallback_applies() {
        // Model without defaultOrientation; tiff:Orientation=6 transposes
        // the 6000x4000 sensor, and the full-frame crop follows it.
        let model = r#"{"versions":[{"adjDataArr":[{"id":"Crop","enabled":true,"json":"{\"cropRect\":[[0,0],[0,0]],\"numeric\":{\"straighten\":0}}"}]}]}"#;
        let attribute = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<plist version="1.0"><dict>"#,
                "<key>originalImagePixelSize</key><string>{{6000, 4000}}</string>",
                "<key>editModel</key><string>{model}</string>",
                "</dict></plist>",
            ),
            model = xml_escape_text(model),
        );
        let mut source = source_with(&attribute);
        source.set(ns::TIFF, "Orientation", "6");

        let mut destination = AttributeMap::new();
        let outcome = translate_crop(&source, &mut destination).unwrap();
        assert!(matches!(outcome, Translation::Merged(_)));
        assert_eq!(destination.get(ns::CRS, attr::CROP_LEFT), Some("0.000000"));
        assert_eq!(destination.get(ns::CRS, attr::CROP_RIGHT), Some("1.000000"));
    }

    #[test]
    fn test_repeated_translation_converges() {
        let source = source_with(&edit_model_attribute("{1000, 1000}", &active_crop_record()));
        let mut destination = AttributeMap::new();

        translate_crop(&source, &mut destination).unwrap();
        let first = destination.clone();
        translate_crop(&source, &mut destination).unwrap();
        assert_eq!(destination, first);
    }
}
