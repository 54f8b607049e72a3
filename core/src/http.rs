//! Transport-ready request description.
//!
//! # Design
//! The option builder turns caller-facing `RequestOptions` into a
//! `TransportOptions` value: plain data describing exactly what the transport
//! should put on the wire (method, headers, body encoding, caching) plus the
//! upload-progress hook. Transports read these fields and never look at the
//! caller's payload types directly, except for the GET query payload which is
//! handed over untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FileBlob, OnProgress, Payload};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the transport should set the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Transport default.
    Auto,
    /// `application/json`.
    Json,
    /// Do not set one; the transport's multipart encoder supplies the boundary.
    Disabled,
}

impl ContentType {
    pub const JSON: &'static str = "application/json";
}

/// One multipart entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(FileBlob),
}

/// Ordered multipart form. Names may repeat (array fields).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<(String, PartValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: PartValue) {
        self.parts.push((name.into(), value));
    }

    pub fn parts(&self) -> &[(String, PartValue)] {
        &self.parts
    }

    /// All values appended under `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PartValue> + 'a {
        self.parts.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Total bytes across all file parts.
    pub fn file_bytes(&self) -> u64 {
        self.parts
            .iter()
            .map(|(_, v)| match v {
                PartValue::File(file) => file.len() as u64,
                PartValue::Text(_) => 0,
            })
            .sum()
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// GET: the payload, untouched, for the transport to put in the query.
    Query(Option<Payload>),
    /// JSON text, `None` when there was no payload.
    Json(Option<String>),
    Multipart(MultipartForm),
}

/// Translates raw upload byte counts into percentages for the caller.
#[derive(Debug, Clone, Default)]
pub struct UploadProgress {
    on_progress: Option<OnProgress>,
}

impl UploadProgress {
    pub fn new(on_progress: Option<OnProgress>) -> Self {
        Self { on_progress }
    }

    /// Whether a caller callback is attached.
    pub fn is_listening(&self) -> bool {
        self.on_progress.is_some()
    }

    /// Report one progress event. An unknown `total` (zero) counts as done.
    pub fn report(&self, loaded: u64, total: u64) {
        if let Some(on_progress) = &self.on_progress {
            on_progress.call(percent(loaded, total));
        }
    }
}

/// `ceil(loaded * 100 / total)`, capped at 100. Nothing sent yet is 0,
/// never 100; only an unknown total reports 100.
fn percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = (loaded.saturating_mul(100)).div_ceil(total);
    scaled.min(100) as u8
}

/// Everything a transport needs to issue one request.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub fields: Map<String, Value>,
    pub cache: bool,
    pub process_data: bool,
    pub content_type: ContentType,
    pub body: RequestBody,
    pub upload: Option<UploadProgress>,
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn method_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Method::Patch).unwrap(), r#""PATCH""#);
        let m: Method = serde_json::from_str(r#""DELETE""#).unwrap();
        assert_eq!(m, Method::Delete);
        assert_eq!(Method::Post.to_string(), "POST");
    }

    #[test]
    fn nothing_sent_reports_zero_not_done() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(0, 1), 0);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn percent_rounds_up_and_caps() {
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(100, 200), 50);
        assert_eq!(percent(199, 200), 100);
        assert_eq!(percent(250, 200), 100);
        assert_eq!(percent(10, 0), 100);
    }

    #[test]
    fn upload_progress_calls_back_once_per_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let upload = UploadProgress::new(Some(OnProgress::new(move |p| {
            sink.lock().unwrap().push(p);
        })));
        assert!(upload.is_listening());

        upload.report(25, 100);
        upload.report(100, 100);
        assert_eq!(*seen.lock().unwrap(), vec![25, 100]);
    }

    #[test]
    fn upload_progress_without_listener_is_silent() {
        let upload = UploadProgress::default();
        assert!(!upload.is_listening());
        upload.report(1, 2);
    }

    #[test]
    fn multipart_form_keeps_repeated_names() {
        let mut form = MultipartForm::new();
        form.append("files[]", PartValue::File(FileBlob::new("a", "1")));
        form.append("files[]", PartValue::File(FileBlob::new("b", "22")));
        form.append("name", PartValue::Text("paco".into()));

        assert_eq!(form.len(), 3);
        assert_eq!(form.get_all("files[]").count(), 2);
        assert!(form.contains("name"));
        assert_eq!(form.file_bytes(), 3);
    }
}
