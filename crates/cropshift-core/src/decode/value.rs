//! Generic tagged tree for decoded edit models.
//!
//! The vendor's embedded settings are a heterogeneous, versioned structure:
//! dozens of adjustment types, most of them irrelevant here. Decoding keeps
//! the whole tree generic; only the crop path gets strong typing, and that
//! happens at the extractor, not here.

/// One value in a decoded edit model.
///
/// Covers both layers of the vendor encoding: property-list values and the
/// JSON documents embedded inside them. Property-list dictionaries keep
/// their source order. Binary and date scalars degrade to strings, since
/// nothing in an edit model stores meaningful data in them.
#[derive(Debug, Clone, PartialEq)]
pub enum EditValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<EditValue>),
    Map(Vec<(String, EditValue)>),
}

impl EditValue {
    /// Look up a key in a mapping. Returns `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&EditValue> {
        match self {
            EditValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EditValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            EditValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric access; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EditValue::Int(i) => Some(*i as f64),
            EditValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EditValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[EditValue]> {
        match self {
            EditValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of a mapping, in source order.
    pub fn entries(&self) -> Option<&[(String, EditValue)]> {
        match self {
            EditValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            EditValue::Null => "null",
            EditValue::Bool(_) => "boolean",
            EditValue::Int(_) => "integer",
            EditValue::Float(_) => "float",
            EditValue::Str(_) => "string",
            EditValue::Seq(_) => "sequence",
            EditValue::Map(_) => "mapping",
        }
    }
}

impl From<plist::Value> for EditValue {
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::Boolean(b) => EditValue::Bool(b),
            plist::Value::Integer(i) => match i.as_signed() {
                Some(v) => EditValue::Int(v),
                // Magnitudes past i64 only fit the float variant.
                None => EditValue::Float(i.as_unsigned().map(|u| u as f64).unwrap_or(f64::NAN)),
            },
            plist::Value::Real(f) => EditValue::Float(f),
            plist::Value::String(s) => EditValue::Str(s),
            plist::Value::Date(d) => EditValue::Str(d.to_xml_format()),
            plist::Value::Data(bytes) => EditValue::Str(String::from_utf8_lossy(&bytes).into_owned()),
            plist::Value::Uid(uid) => EditValue::Int(uid.get() as i64),
            plist::Value::Array(items) => {
                EditValue::Seq(items.into_iter().map(EditValue::from).collect())
            }
            plist::Value::Dictionary(dict) => {
                EditValue::Map(dict.into_iter().map(|(k, v)| (k, EditValue::from(v))).collect())
            }
            _ => EditValue::Null,
        }
    }
}

impl From<serde_json::Value> for EditValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => EditValue::Null,
            serde_json::Value::Bool(b) => EditValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => EditValue::Int(i),
                None => EditValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => EditValue::Str(s),
            serde_json::Value::Array(items) => {
                EditValue::Seq(items.into_iter().map(EditValue::from).collect())
            }
            serde_json::Value::Object(map) => {
                EditValue::Map(map.into_iter().map(|(k, v)| (k, EditValue::from(v))).collect())
            }
        }
    }
}
