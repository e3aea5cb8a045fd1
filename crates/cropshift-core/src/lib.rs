//! Cropshift Core - Crop metadata translation library
//!
//! This crate translates crop and rotation metadata between two XMP sidecar
//! dialects: a vendor's plist-with-embedded-JSON edit model and the flat
//! camera-raw-settings attributes understood by mainstream raw editors.
//!
//! The pipeline runs in four stages, each its own module:
//!
//! 1. [`decode`] - peel the vendor attribute's escaping/plist/JSON layers
//! 2. [`extract`] - locate the crop record and convert it to canonical form
//! 3. [`project`] - turn the canonical region into destination attributes
//! 4. [`translate`] - orchestrate one document pair, with merge semantics
//!
//! Geometry shared by the stages lives in [`geometry`]. Documents reach the
//! library through the [`AttributeSource`] and [`AttributeSink`] traits, so
//! the core never touches XML itself.

pub mod decode;
pub mod extract;
pub mod geometry;
pub mod project;
pub mod translate;

pub use decode::{decode_edit_model, DecodeError, EditValue};
pub use extract::{extract_crop, ExtractedCrop, ExtractionError};
pub use geometry::{CropRegion, FrameSize, Orientation};
pub use project::{project_crop, read_crop, read_frame, ProjectionError, TargetAttributeSet};
pub use translate::{translate_crop, Translation, TranslateError, CLEAR_STALE_CROP};

/// XMP namespace URIs this library reads or writes.
pub mod ns {
    /// The vendor's edit-model namespace (source dialect).
    pub const NITRO: &str = "http://com.gentlemencoders/xmp/nitro/1.0/";
    /// Camera-raw-settings namespace (destination dialect).
    pub const CRS: &str = "http://ns.adobe.com/camera-raw-settings/1.0/";
    /// TIFF properties: orientation and pixel dimensions.
    pub const TIFF: &str = "http://ns.adobe.com/tiff/1.0/";
    /// EXIF properties: fallback pixel dimensions.
    pub const EXIF: &str = "http://ns.adobe.com/exif/1.0/";
}

/// Read access to a document's XMP attributes.
///
/// Implementations resolve namespace URIs to whatever prefixes the concrete
/// document declares; the library only ever speaks URI plus local name.
pub trait AttributeSource {
    /// Look up an attribute value by namespace URI and local name.
    fn attribute(&self, namespace: &str, name: &str) -> Option<String>;
}

/// Write access to a document's XMP attributes.
///
/// Setting an attribute replaces any existing value; removing an absent
/// attribute is a no-op.
pub trait AttributeSink {
    fn set_attribute(&mut self, namespace: &str, name: &str, value: &str);
    fn remove_attribute(&mut self, namespace: &str, name: &str);
}

/// An in-memory attribute collection, preserving insertion order.
///
/// Implements both document traits; the tests run the whole pipeline
/// against it, and adapters can use it as a staging buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<((String, String), String)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set an attribute, replacing any existing value in place.
    pub fn set(&mut self, namespace: &str, name: &str, value: &str) {
        let key = (namespace.to_string(), name.to_string());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((key, value.to_string())),
        }
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|((ns, n), _)| ns == namespace && n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, namespace: &str, name: &str) {
        self.entries
            .retain(|((ns, n), _)| !(ns == namespace && n == name));
    }

    /// All entries as (namespace, name, value), in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.entries
            .iter()
            .map(|((ns, n), v)| (ns.as_str(), n.as_str(), v.as_str()))
    }
}

impl AttributeSource for AttributeMap {
    fn attribute(&self, namespace: &str, name: &str) -> Option<String> {
        self.get(namespace, name).map(str::to_string)
    }
}

impl AttributeSink for AttributeMap {
    fn set_attribute(&mut self, namespace: &str, name: &str, value: &str) {
        self.set(namespace, name, value);
    }

    fn remove_attribute(&mut self, namespace: &str, name: &str) {
        self.remove(namespace, name);
    }
}
