//! Edit-model decoding.
//!
//! This module turns the vendor's escaped plist-with-embedded-JSON attribute
//! into a single uniform tree. It provides:
//! - Entity unescaping, applied until the text looks like markup
//! - Property-list parsing into the generic [`EditValue`] tree
//! - In-place promotion of the root `editModel` JSON string to structure
//!
//! It knows nothing about crops: schema questions (which keys matter, what
//! the geometry means) belong to the extractor.
//!
//! # Examples
//!
//! ```ignore
//! use cropshift_core::decode::{decode_edit_model, EditValue};
//!
//! let tree = decode_edit_model(&raw_attribute)?;
//! let size = tree.get("originalImagePixelSize").and_then(EditValue::as_str);
//! ```

mod model;
mod value;

pub use model::{decode_edit_model, decode_json_fragment, unescape_entities, DecodeError};
pub use value::EditValue;
