//! Decoding the vendor's embedded edit model.
//!
//! The vendor stores its entire edit state in a single XMP attribute. The
//! attribute value is an XML property list, entity-escaped so it can live
//! inside another XML document. Inside the plist, the `editModel` key holds
//! yet another layer: a JSON document serialized as a string.
//!
//! [`decode_edit_model`] peels all three layers and returns one uniform
//! [`EditValue`] tree, with the `editModel` payload promoted from an opaque
//! string to structured data in place.

use thiserror::Error;

use super::value::EditValue;

/// Errors from decoding an embedded edit model.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The attribute value is empty or whitespace.
    #[error("edit model attribute is empty")]
    Empty,

    /// The property-list layer is not well formed.
    #[error("malformed property list: {0}")]
    Plist(#[from] plist::Error),

    /// The `editModel` payload announced itself as JSON but does not parse.
    #[error("malformed editModel JSON: {0}")]
    EditModelJson(#[from] serde_json::Error),
}

/// Decode a raw edit-model attribute value into a uniform tree.
///
/// The input may arrive with zero, one, or two layers of XML entity escaping
/// depending on how the caller read it out of the document; escaping is
/// undone until the text looks like markup. The plist is then parsed, and a
/// root-level `editModel` string is promoted to its decoded JSON structure.
///
/// A present-but-malformed `editModel` payload is an error: a model that
/// advertises edits which cannot be read must not pass for one with no edits.
///
/// # Arguments
///
/// * `raw` - The attribute value exactly as read from the document
///
/// # Returns
///
/// The decoded tree, or a [`DecodeError`] describing the layer that failed.
///
/// # Example
///
/// ```ignore
/// let tree = decode_edit_model(raw_attribute)?;
/// let size = tree.get("originalImagePixelSize").and_then(EditValue::as_str);
/// ```
pub fn decode_edit_model(raw: &str) -> Result<EditValue, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut text = trimmed.to_string();
    // At most two escape layers occur in the wild: one from the attribute
    // encoding, one from the vendor writing pre-escaped text into it.
    for _ in 0..2 {
        if text.trim_start().starts_with('<') {
            break;
        }
        let unescaped = unescape_entities(&text);
        if unescaped == text {
            break;
        }
        text = unescaped;
    }

    let value = plist::Value::from_reader_xml(text.as_bytes())?;
    let mut tree = EditValue::from(value);
    promote_edit_model(&mut tree)?;
    Ok(tree)
}

/// Parse a JSON fragment into the shared tree shape.
///
/// Used for the string-typed JSON payloads nested inside edit models, such
/// as the per-adjustment `json` field.
pub fn decode_json_fragment(raw: &str) -> Result<EditValue, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(EditValue::from(value))
}

/// Replace a root-level `editModel` string with its decoded JSON.
fn promote_edit_model(tree: &mut EditValue) -> Result<(), DecodeError> {
    if let EditValue::Map(entries) = tree {
        for (key, value) in entries.iter_mut() {
            if key != "editModel" {
                continue;
            }
            if let EditValue::Str(json) = value {
                *value = decode_json_fragment(json)?;
            }
            break;
        }
    }
    Ok(())
}

/// Undo one layer of XML entity escaping.
///
/// Handles the five named XML entities plus decimal and hexadecimal
/// character references. Unrecognized `&...;` runs pass through untouched.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        // The longest reference we decode is &#x10FFFF; so a distant or
        // missing semicolon means this ampersand is literal text.
        match rest.find(';') {
            Some(end) if end > 1 && end <= 12 => {
                let replacement = match &rest[1..end] {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "amp" => Some('&'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    entity => decode_char_reference(entity),
                };
                match replacement {
                    Some(c) => {
                        out.push(c);
                        rest = &rest[end + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode a numeric character reference body (`#NN` or `#xNN`).
fn decode_char_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small but structurally faithful edit-model plist.
    fn sample_plist() -> String {
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#,
            "\n",
            r#"<plist version="1.0">"#,
            "\n",
            "<dict>\n",
            "\t<key>originalImagePixelSize</key>\n",
            "\t<string>{6000, 4000}</string>\n",
            "\t<key>formatVersion</key>\n",
            "\t<integer>4</integer>\n",
            "\t<key>editModel</key>\n",
            "\t<string>{\"defaultOrientation\":1,\"versions\":[{\"adjDataArr\":[",
            "{\"id\":\"Crop\",\"enabled\":true,\"json\":",
            "\"{\\\"cropRect\\\":[[600,400],[4800,3200]],\\\"numeric\\\":{\\\"straighten\\\":0}}\"",
            "}]}]}</string>\n",
            "</dict>\n",
            "</plist>\n",
        )
        .to_string()
    }

    /// One layer of escaping, the way the attribute appears in a raw file.
    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    #[test]
    fn test_decode_unescaped_plist() {
        let tree = decode_edit_model(&sample_plist()).unwrap();
        assert_eq!(
            tree.get("originalImagePixelSize").and_then(EditValue::as_str),
            Some("{6000, 4000}")
        );
        assert_eq!(tree.get("formatVersion").and_then(EditValue::as_i64), Some(4));
    }

    #[test]
    fn test_decode_escaped_plist() {
        let escaped = escape(&sample_plist());
        assert!(!escaped.starts_with('<'));
        let tree = decode_edit_model(&escaped).unwrap();
        assert_eq!(
            tree.get("originalImagePixelSize").and_then(EditValue::as_str),
            Some("{6000, 4000}")
        );
    }

    #[test]
    fn test_decode_doubly_escaped_plist() {
        let escaped = escape(&escape(&sample_plist()));
        let tree = decode_edit_model(&escaped).unwrap();
        assert!(tree.get("editModel").is_some());
    }

    #[test]
    fn test_edit_model_promoted_to_structure() {
        let tree = decode_edit_model(&sample_plist()).unwrap();
        let model = tree.get("editModel").unwrap();
        assert_eq!(model.type_name(), "mapping");
        assert_eq!(
            model.get("defaultOrientation").and_then(EditValue::as_i64),
            Some(1)
        );

        // The inner per-adjustment payload stays a string; promotion only
        // applies to the root editModel key.
        let record = model.get("versions").and_then(EditValue::as_seq).unwrap()[0]
            .get("adjDataArr")
            .and_then(EditValue::as_seq)
            .unwrap()[0]
            .clone();
        assert_eq!(record.get("id").and_then(EditValue::as_str), Some("Crop"));
        assert_eq!(record.get("json").unwrap().type_name(), "string");
    }

    #[test]
    fn test_empty_attribute_is_an_error() {
        assert!(matches!(decode_edit_model(""), Err(DecodeError::Empty)));
        assert!(matches!(decode_edit_model("   \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_malformed_plist_is_an_error() {
        let result = decode_edit_model("<plist version=\"1.0\"><dict><key>x</key></plist>");
        assert!(matches!(result, Err(DecodeError::Plist(_))));
    }

    #[test]
    fn test_malformed_edit_model_json_is_an_error() {
        let bad = sample_plist().replace("{\"defaultOrientation\"", "{defaultOrientation");
        let result = decode_edit_model(&bad);
        assert!(matches!(result, Err(DecodeError::EditModelJson(_))));
    }

    #[test]
    fn test_non_string_edit_model_left_alone() {
        let text = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<plist version="1.0"><dict>"#,
            "<key>editModel</key><integer>1</integer>",
            "</dict></plist>",
        );
        let tree = decode_edit_model(text).unwrap();
        assert_eq!(tree.get("editModel").and_then(EditValue::as_i64), Some(1));
    }

    #[test]
    fn test_unescape_named_entities() {
        assert_eq!(unescape_entities("&lt;a b=&quot;1&quot;&gt;"), "<a b=\"1\">");
        assert_eq!(unescape_entities("&apos;x&apos; &amp; y"), "'x' & y");
    }

    #[test]
    fn test_unescape_char_references() {
        assert_eq!(unescape_entities("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(unescape_entities("&#x20AC;"), "\u{20AC}");
    }

    #[test]
    fn test_unescape_leaves_literals_alone() {
        assert_eq!(unescape_entities("a & b"), "a & b");
        assert_eq!(unescape_entities("&unknown;"), "&unknown;");
        assert_eq!(unescape_entities("&;"), "&;");
        assert_eq!(unescape_entities("fish &chips; tonight"), "fish &chips; tonight");
        assert_eq!(unescape_entities("trailing &"), "trailing &");
    }

    #[test]
    fn test_unescape_is_single_layer() {
        assert_eq!(unescape_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_decode_json_fragment() {
        let value = decode_json_fragment("{\"cropRect\":[[0,0],[10,20]]}").unwrap();
        let rect = value.get("cropRect").and_then(EditValue::as_seq).unwrap();
        assert_eq!(rect.len(), 2);
        assert!(decode_json_fragment("not json").is_err());
    }
}
