//! Template data tree and image payload normalization.
//!
//! Request data arrives as arbitrary JSON. Before it reaches the rendering
//! delegate every `data:image/...;base64,` string is turned into an
//! [`ImageDescriptor`], which is what image directives in templates consume.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Width and height given to every embedded image, in centimetres.
///
/// Not derived from the pixel data. Templates rendered by the delegate today
/// are laid out around this size, so changing it changes their output.
pub const DEFAULT_IMAGE_SIZE: u32 = 6;

static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:image/(png|jpg|jpeg);base64,(.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    /// Base64 payload with the `data:` prefix removed, never re-encoded.
    pub data: String,
    pub extension: String,
}

/// A node of the template data tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    Sequence(Vec<DataValue>),
    Mapping(BTreeMap<String, DataValue>),
    Image(ImageDescriptor),
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(b),
            Value::Number(n) => DataValue::Number(n),
            Value::String(s) => DataValue::String(s),
            Value::Array(items) => {
                DataValue::Sequence(items.into_iter().map(DataValue::from).collect())
            }
            Value::Object(map) => DataValue::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, DataValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::Null => serializer.serialize_unit(),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Number(n) => n.serialize(serializer),
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Date(date) => serializer.serialize_str(&date.to_rfc3339()),
            DataValue::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            DataValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DataValue::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            DataValue::Image(image) => image.serialize(serializer),
        }
    }
}

/// Parse a `data:image/<fmt>;base64,<payload>` string.
pub fn parse_image_data_uri(value: &str) -> Option<ImageDescriptor> {
    let caps = DATA_URI_RE.captures(value)?;
    Some(ImageDescriptor {
        width: DEFAULT_IMAGE_SIZE,
        height: DEFAULT_IMAGE_SIZE,
        data: caps[2].to_string(),
        extension: format!(".{}", &caps[1]),
    })
}

/// Replace every image data URI in the tree with an [`ImageDescriptor`].
/// Dates and binary blobs are leaves and are never descended into.
pub fn normalize(value: DataValue) -> DataValue {
    match value {
        DataValue::String(s) => match parse_image_data_uri(&s) {
            Some(image) => DataValue::Image(image),
            None => DataValue::String(s),
        },
        DataValue::Sequence(items) => {
            DataValue::Sequence(items.into_iter().map(normalize).collect())
        }
        DataValue::Mapping(entries) => DataValue::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect(),
        ),
        leaf @ (DataValue::Date(_) | DataValue::Binary(_) | DataValue::Image(_)) => leaf,
        scalar @ (DataValue::Null | DataValue::Bool(_) | DataValue::Number(_)) => scalar,
    }
}
