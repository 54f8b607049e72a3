//! Caller-facing request data: payloads, file values and per-call options.
//!
//! # Design
//! A `Payload` is a flat mapping of field names to `FormValue`s. Files are
//! recognised structurally by the `FormValue::File` variant, which is what
//! decides between JSON and multipart encoding later on. `RequestOptions`
//! doubles as the client-wide "common options" and as the per-call override
//! bag; `RequestOptions::merge` implements the priority deep merge between
//! the two.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::http::Method;

/// An uploadable file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A file serialized as JSON is written as its metadata.
impl Serialize for FileBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("type", &self.content_type)?;
        map.serialize_entry("size", &self.bytes.len())?;
        map.end()
    }
}

/// A single payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Any plain JSON value, `null` included.
    Json(Value),
    File(FileBlob),
    /// An array value that may hold files.
    List(Vec<FormValue>),
}

impl FormValue {
    /// True for a file, or an array holding a file at any depth.
    pub fn contains_file(&self) -> bool {
        match self {
            FormValue::File(_) => true,
            FormValue::List(items) => items.iter().any(FormValue::contains_file),
            FormValue::Json(_) => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FormValue::Json(Value::Null))
    }
}

impl Serialize for FormValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FormValue::Json(value) => value.serialize(serializer),
            FormValue::File(file) => file.serialize(serializer),
            FormValue::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FormValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FormValue::Json)
    }
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        FormValue::Json(value)
    }
}

impl From<FileBlob> for FormValue {
    fn from(file: FileBlob) -> Self {
        FormValue::File(file)
    }
}

impl From<Vec<FileBlob>> for FormValue {
    fn from(files: Vec<FileBlob>) -> Self {
        FormValue::List(files.into_iter().map(FormValue::File).collect())
    }
}

/// Request data keyed by field name.
///
/// Keys are kept sorted, so JSON members and multipart parts follow key
/// order rather than insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, FormValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FormValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FormValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_file(&self) -> bool {
        self.0.values().any(FormValue::contains_file)
    }

    /// Key-level merge where `other` wins. JSON objects present on both
    /// sides are merged recursively.
    pub fn merge(mut self, other: Payload) -> Payload {
        for (key, value) in other.0 {
            match value {
                FormValue::Json(Value::Object(over)) => match self.0.get_mut(&key) {
                    Some(FormValue::Json(Value::Object(base))) => deep_merge(base, over),
                    _ => {
                        self.0.insert(key, FormValue::Json(Value::Object(over)));
                    }
                },
                value => {
                    self.0.insert(key, value);
                }
            }
        }
        self
    }

    /// Flatten into query-string pairs for a GET request.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            match value {
                FormValue::List(items) => {
                    let marked = format!("{key}[]");
                    pairs.extend(items.iter().map(|item| (marked.clone(), query_text(item))));
                }
                FormValue::Json(Value::Array(items)) => {
                    let marked = format!("{key}[]");
                    pairs.extend(items.iter().map(|item| (marked.clone(), json_text(item))));
                }
                other => pairs.push((key.clone(), query_text(other))),
            }
        }
        pairs
    }
}

impl FromIterator<(String, FormValue)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, FormValue)>>(iter: I) -> Self {
        Payload(iter.into_iter().collect())
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, FormValue::Json(v))).collect()
    }
}

fn query_text(value: &FormValue) -> String {
    match value {
        FormValue::Json(value) => json_text(value),
        FormValue::File(file) => file.name.clone(),
        FormValue::List(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Text form of a JSON value: strings unquoted, `null` empty.
pub(crate) fn json_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursively merge `over` into `base`; leaves in `over` replace.
pub(crate) fn deep_merge(base: &mut Map<String, Value>, over: Map<String, Value>) {
    for (key, value) in over {
        match value {
            Value::Object(value) => match base.get_mut(&key) {
                Some(Value::Object(inner)) => deep_merge(inner, value),
                _ => {
                    base.insert(key, Value::Object(value));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Upload progress callback, receives a percentage in `0..=100`.
#[derive(Clone)]
pub struct OnProgress(Arc<dyn Fn(u8) + Send + Sync>);

impl OnProgress {
    pub fn new(f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, percent: u8) {
        (self.0)(percent)
    }
}

impl fmt::Debug for OnProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnProgress(..)")
    }
}

/// Options for a single request, and the shape of the client-wide defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: BTreeMap<String, String>,
    /// Opaque transport settings, e.g. `{"withCredentials": true}`.
    pub fields: Map<String, Value>,
    pub data: Option<Payload>,
    #[serde(skip)]
    pub on_progress: Option<OnProgress>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    pub fn on_progress(mut self, f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(OnProgress::new(f));
        self
    }

    /// Priority deep merge: values set in `overrides` win.
    pub fn merge(mut self, overrides: RequestOptions) -> RequestOptions {
        if overrides.method.is_some() {
            self.method = overrides.method;
        }
        self.headers.extend(overrides.headers);
        deep_merge(&mut self.fields, overrides.fields);
        self.data = match (self.data, overrides.data) {
            (Some(base), Some(over)) => Some(base.merge(over)),
            (base, over) => over.or(base),
        };
        if overrides.on_progress.is_some() {
            self.on_progress = overrides.on_progress;
        }
        self
    }
}
