//! Text-level XMP sidecar access.
//!
//! Sidecars are edited as text, never round-tripped through a DOM: every
//! byte the translation does not own stays exactly as the upstream editor
//! wrote it, so diffs show only the crop attributes.
//!
//! The core library speaks namespace URI plus local name. This adapter
//! resolves each namespace to the prefix the document actually declares,
//! falling back to the conventional prefix for files that use one without
//! declaring it, and performs the attribute surgery:
//!
//! - reads both `name="value"` and `<name>value</name>` forms
//! - replaces existing values in place
//! - inserts missing attributes after the last sibling in the same
//!   namespace, matching its indentation, or into the `rdf:Description`
//!   open tag when there is no sibling yet
//! - removes attributes together with their leading whitespace

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cropshift_core::decode::unescape_entities;
use cropshift_core::{ns, AttributeSink, AttributeSource};
use regex::Regex;

/// Conventional prefixes, used when a document references a namespace
/// without declaring it.
const CANONICAL_PREFIXES: &[(&str, &str)] = &[
    ("nitro", ns::NITRO),
    ("crs", ns::CRS),
    ("tiff", ns::TIFF),
    ("exif", ns::EXIF),
];

/// An XMP sidecar held as text, with attribute-level editing.
#[derive(Debug, Clone)]
pub struct XmpDocument {
    content: String,
}

impl XmpDocument {
    pub fn new(content: String) -> Self {
        Self { content }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self::new(content))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.content).with_context(|| format!("writing {}", path.display()))
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the document has the `rdf:Description` element attributes
    /// are merged into.
    pub fn has_description(&self) -> bool {
        self.content.contains("<rdf:Description")
    }

    /// The prefix this document uses for `namespace`, from its own `xmlns:`
    /// declarations, else the conventional prefix.
    fn prefix_for(&self, namespace: &str) -> Option<String> {
        let pattern = format!(
            r#"xmlns:([A-Za-z_][\w.-]*)\s*=\s*["']{}["']"#,
            regex::escape(namespace)
        );
        if let Some(captures) = Regex::new(&pattern).ok()?.captures(&self.content) {
            return captures.get(1).map(|m| m.as_str().to_string());
        }
        CANONICAL_PREFIXES
            .iter()
            .find(|(_, uri)| *uri == namespace)
            .map(|(prefix, _)| prefix.to_string())
    }

    fn lookup(&self, namespace: &str, name: &str) -> Option<String> {
        let prefix = self.prefix_for(namespace)?;
        let qualified = regex::escape(&format!("{prefix}:{name}"));

        let attribute_form = Regex::new(&format!(r#"(?m)(?:^|\s){qualified}\s*=\s*"([^"]*)""#)).ok()?;
        if let Some(captures) = attribute_form.captures(&self.content) {
            return captures.get(1).map(|m| unescape_entities(m.as_str()));
        }

        let element_form =
            Regex::new(&format!(r"<{qualified}>\s*([^<]*?)\s*</{qualified}>")).ok()?;
        if let Some(captures) = element_form.captures(&self.content) {
            return captures.get(1).map(|m| unescape_entities(m.as_str()));
        }
        None
    }

    fn write_attribute(&mut self, namespace: &str, name: &str, value: &str) {
        let Some(prefix) = self.prefix_for(namespace) else {
            tracing::warn!("no prefix for namespace {namespace}, dropping {name}");
            return;
        };
        let qualified = format!("{prefix}:{name}");
        let escaped_value = escape_attribute_value(value);

        // Replace an existing value in place.
        let pattern = format!(r#"(?m)(^|\s){}\s*=\s*"[^"]*""#, regex::escape(&qualified));
        if let Ok(re) = Regex::new(&pattern) {
            if re.is_match(&self.content) {
                self.content = re
                    .replace_all(&self.content, |caps: &regex::Captures| {
                        let boundary = caps.get(1).map_or("", |m| m.as_str());
                        format!("{boundary}{qualified}=\"{escaped_value}\"")
                    })
                    .into_owned();
                return;
            }
        }

        // Insert after the last whole-line attribute in the same namespace,
        // matching its indentation.
        let sibling_pattern = format!(
            r#"(?m)^([ \t]*){}:[\w-]+\s*=\s*"[^"]*"$"#,
            regex::escape(&prefix)
        );
        if let Ok(re) = Regex::new(&sibling_pattern) {
            let last = re
                .captures_iter(&self.content)
                .last()
                .and_then(|c| Some((c.get(0)?.end(), c.get(1)?.as_str().to_string())));
            if let Some((end, indent)) = last {
                let line = format!("\n{indent}{qualified}=\"{escaped_value}\"");
                self.content.insert_str(end, &line);
                return;
            }
        }

        self.insert_into_description(namespace, &prefix, &qualified, &escaped_value);
    }

    /// Place an attribute inside the first `rdf:Description` open tag,
    /// declaring the namespace there first when the document has not.
    fn insert_into_description(
        &mut self,
        namespace: &str,
        prefix: &str,
        qualified: &str,
        escaped_value: &str,
    ) {
        let Some(tag_start) = self.content.find("<rdf:Description") else {
            tracing::warn!("no rdf:Description element, dropping {qualified}");
            return;
        };
        let Some(tag_end) = tag_close_position(&self.content, tag_start) else {
            tracing::warn!("unterminated rdf:Description tag, dropping {qualified}");
            return;
        };

        let declared = Regex::new(&format!(r"xmlns:{}\s*=", regex::escape(prefix)))
            .map(|re| re.is_match(&self.content))
            .unwrap_or(false);

        let mut insertion = String::new();
        if !declared {
            insertion.push_str(&format!(" xmlns:{prefix}=\"{namespace}\""));
        }
        insertion.push_str(&format!(" {qualified}=\"{escaped_value}\""));
        self.content.insert_str(tag_end, &insertion);
    }

    fn erase_attribute(&mut self, namespace: &str, name: &str) {
        let Some(prefix) = self.prefix_for(namespace) else {
            return;
        };
        let pattern = format!(
            r#"\s*{}\s*=\s*"[^"]*""#,
            regex::escape(&format!("{prefix}:{name}"))
        );
        if let Ok(re) = Regex::new(&pattern) {
            self.content = re.replace_all(&self.content, "").into_owned();
        }
    }
}

/// Position just before the `>` (or `/>`) closing an open tag, quote-aware.
fn tag_close_position(content: &str, tag_start: usize) -> Option<usize> {
    let mut in_quote = false;
    for (offset, c) in content[tag_start..].char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            '>' if !in_quote => {
                let end = tag_start + offset;
                // Insert before the slash of a self-closing tag.
                if end > tag_start && content.as_bytes()[end - 1] == b'/' {
                    return Some(end - 1);
                }
                return Some(end);
            }
            _ => {}
        }
    }
    None
}

fn escape_attribute_value(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

impl AttributeSource for XmpDocument {
    fn attribute(&self, namespace: &str, name: &str) -> Option<String> {
        self.lookup(namespace, name)
    }
}

impl AttributeSink for XmpDocument {
    fn set_attribute(&mut self, namespace: &str, name: &str, value: &str) {
        self.write_attribute(namespace, name, value);
    }

    fn remove_attribute(&mut self, namespace: &str, name: &str) {
        self.erase_attribute(namespace, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADOBE_SIDECAR: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Adobe XMP Core 7.0-c000">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:tiff="http://ns.adobe.com/tiff/1.0/"
    xmlns:crs="http://ns.adobe.com/camera-raw-settings/1.0/"
   tiff:ImageWidth="6000"
   tiff:ImageLength="4000"
   crs:Version="15.0"
   crs:WhiteBalance="As Shot"
   crs:HasCrop="False">
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
"#;

    #[test]
    fn test_reads_attribute_form() {
        let doc = XmpDocument::new(ADOBE_SIDECAR.to_string());
        assert_eq!(doc.lookup(ns::TIFF, "ImageWidth").as_deref(), Some("6000"));
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("False"));
        assert_eq!(doc.lookup(ns::CRS, "CropLeft"), None);
    }

    #[test]
    fn test_reads_element_form() {
        let doc = XmpDocument::new(
            "<rdf:Description xmlns:tiff=\"http://ns.adobe.com/tiff/1.0/\">\n\
             <tiff:ImageWidth> 6000 </tiff:ImageWidth>\n\
             </rdf:Description>"
                .to_string(),
        );
        assert_eq!(doc.lookup(ns::TIFF, "ImageWidth").as_deref(), Some("6000"));
    }

    #[test]
    fn test_resolves_nonstandard_prefix() {
        let doc = XmpDocument::new(
            "<rdf:Description xmlns:camraw=\"http://ns.adobe.com/camera-raw-settings/1.0/\" \
             camraw:HasCrop=\"True\"/>"
                .to_string(),
        );
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("True"));
    }

    #[test]
    fn test_falls_back_to_conventional_prefix() {
        // No xmlns declaration at all; files like this exist.
        let doc = XmpDocument::new("<rdf:Description crs:HasCrop=\"True\"/>".to_string());
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("True"));
    }

    #[test]
    fn test_read_unescapes_entities() {
        let doc = XmpDocument::new(
            "<rdf:Description xmlns:nitro=\"http://com.gentlemencoders/xmp/nitro/1.0/\" \
             nitro:EditModel=\"&lt;?xml version=&quot;1.0&quot;?&gt;\"/>"
                .to_string(),
        );
        assert_eq!(
            doc.lookup(ns::NITRO, "EditModel").as_deref(),
            Some("<?xml version=\"1.0\"?>")
        );
    }

    #[test]
    fn test_replace_preserves_every_other_byte() {
        let mut doc = XmpDocument::new(ADOBE_SIDECAR.to_string());
        doc.write_attribute(ns::CRS, "HasCrop", "True");

        let expected = ADOBE_SIDECAR.replace("crs:HasCrop=\"False\"", "crs:HasCrop=\"True\"");
        assert_eq!(doc.content(), expected);
    }

    #[test]
    fn test_insert_after_last_sibling_matches_indentation() {
        let mut doc = XmpDocument::new(ADOBE_SIDECAR.to_string());
        doc.write_attribute(ns::CRS, "CropLeft", "0.100000");

        // crs:HasCrop ends its line with `>` so the last whole-line sibling
        // is crs:WhiteBalance.
        let expected = ADOBE_SIDECAR.replace(
            "   crs:WhiteBalance=\"As Shot\"\n",
            "   crs:WhiteBalance=\"As Shot\"\n   crs:CropLeft=\"0.100000\"\n",
        );
        assert_eq!(doc.content(), expected);
    }

    #[test]
    fn test_insert_into_description_declares_namespace() {
        let mut doc = XmpDocument::new(
            "<rdf:RDF xmlns:rdf=\"x\">\n <rdf:Description rdf:about=\"\">\n </rdf:Description>\n</rdf:RDF>"
                .to_string(),
        );
        doc.write_attribute(ns::CRS, "HasCrop", "True");

        assert!(doc
            .content()
            .contains("xmlns:crs=\"http://ns.adobe.com/camera-raw-settings/1.0/\""));
        assert!(doc.content().contains("crs:HasCrop=\"True\""));
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("True"));
    }

    #[test]
    fn test_insert_into_self_closing_description() {
        let mut doc = XmpDocument::new(
            "<rdf:Description rdf:about=\"\" xmlns:crs=\"http://ns.adobe.com/camera-raw-settings/1.0/\"/>"
                .to_string(),
        );
        doc.write_attribute(ns::CRS, "HasCrop", "True");
        assert!(doc.content().ends_with("crs:HasCrop=\"True\"/>"));
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("True"));
    }

    #[test]
    fn test_sequential_inserts_keep_order() {
        let mut doc = XmpDocument::new(
            "<rdf:Description rdf:about=\"\" xmlns:crs=\"http://ns.adobe.com/camera-raw-settings/1.0/\">\n</rdf:Description>"
                .to_string(),
        );
        doc.write_attribute(ns::CRS, "CropLeft", "0.1");
        doc.write_attribute(ns::CRS, "CropTop", "0.2");
        doc.write_attribute(ns::CRS, "HasCrop", "True");

        let left = doc.content().find("crs:CropLeft").unwrap();
        let top = doc.content().find("crs:CropTop").unwrap();
        let has = doc.content().find("crs:HasCrop").unwrap();
        assert!(left < top && top < has, "content was {}", doc.content());
    }

    #[test]
    fn test_write_escapes_value() {
        let mut doc = XmpDocument::new(
            "<rdf:Description xmlns:crs=\"http://ns.adobe.com/camera-raw-settings/1.0/\" crs:HasCrop=\"False\"/>"
                .to_string(),
        );
        doc.write_attribute(ns::CRS, "HasCrop", "a\"b<c&d");
        assert!(doc.content().contains("crs:HasCrop=\"a&quot;b&lt;c&amp;d\""));
        assert_eq!(doc.lookup(ns::CRS, "HasCrop").as_deref(), Some("a\"b<c&d"));
    }

    #[test]
    fn test_remove_takes_whole_line() {
        let mut doc = XmpDocument::new(ADOBE_SIDECAR.to_string());
        doc.erase_attribute(ns::CRS, "WhiteBalance");

        let expected = ADOBE_SIDECAR.replace("\n   crs:WhiteBalance=\"As Shot\"", "");
        assert_eq!(doc.content(), expected);

        // Removing an absent attribute is a no-op.
        let before = doc.content().to_string();
        doc.erase_attribute(ns::CRS, "CropLeft");
        assert_eq!(doc.content(), before);
    }

    #[test]
    fn test_tag_close_position() {
        assert_eq!(tag_close_position("<a b=\"c\">", 0), Some(8));
        assert_eq!(tag_close_position("<a b=\"c\"/>", 0), Some(8));
        // A `>` inside a quoted value does not close the tag.
        assert_eq!(tag_close_position("<a b=\"x>y\" c=\"d\">", 0), Some(16));
        assert_eq!(tag_close_position("<a b=\"unterminated", 0), None);
    }

    #[test]
    fn test_has_description() {
        assert!(XmpDocument::new(ADOBE_SIDECAR.to_string()).has_description());
        assert!(!XmpDocument::new("<html></html>".to_string()).has_description());
    }
}
