//! `Transport` backed by `reqwest`, one tokio task per request.
//!
//! Cancelling aborts the task, which drops the completion; the caller then
//! sees an empty rejection. File parts are streamed in chunks so upload
//! progress can be reported as hyper pulls the body.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::AdapterError;
use crate::http::{ContentType, Method, MultipartForm, PartValue, RequestBody, TransportOptions, UploadProgress};
use crate::transport::{Cancel, Completion, FailureResponse, Outcome, Transport};

const CHUNK_SIZE: usize = 64 * 1024;

/// HTTP transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    runtime: Handle,
}

impl ReqwestTransport {
    /// Bind to the tokio runtime of the calling context.
    pub fn new(client: reqwest::Client) -> Result<Self, AdapterError> {
        let runtime = Handle::try_current().map_err(|e| AdapterError::Runtime(e.to_string()))?;
        Ok(Self::with_handle(client, runtime))
    }

    pub fn with_handle(client: reqwest::Client, runtime: Handle) -> Self {
        Self { client, runtime }
    }
}

struct TaskCancel(AbortHandle);

impl Cancel for TaskCancel {
    fn cancel(&self) {
        self.0.abort();
    }
}

impl Transport for ReqwestTransport {
    fn issue(&self, url: &str, options: TransportOptions, complete: Completion) -> Box<dyn Cancel> {
        let client = self.client.clone();
        let url = url.to_string();
        let task = self.runtime.spawn(async move {
            let outcome = match execute(&client, &url, options).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::debug!(error = %e, %url, "request failed before a response");
                    Outcome::Failure(FailureResponse::network())
                }
            };
            complete(outcome);
        });
        Box::new(TaskCancel(task.abort_handle()))
    }
}

async fn execute(client: &reqwest::Client, url: &str, options: TransportOptions) -> Result<Outcome, reqwest::Error> {
    let method = match options.method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    };
    let mut builder = client.request(method, url);

    if !options.fields.is_empty() {
        tracing::trace!(fields = ?options.fields, "transport fields ignored by reqwest");
    }
    if !options.cache {
        builder = builder.header(CACHE_CONTROL, "no-cache");
    }
    if options.content_type == ContentType::Json {
        builder = builder.header(CONTENT_TYPE, ContentType::JSON);
    }

    builder = match options.body {
        RequestBody::Query(Some(payload)) => builder.query(&payload.query_pairs()),
        RequestBody::Query(None) | RequestBody::Json(None) => builder,
        RequestBody::Json(Some(text)) => builder.body(text),
        RequestBody::Multipart(form) => {
            builder.multipart(multipart_form(form, options.upload.unwrap_or_default())?)
        }
    };

    // Caller headers replace whatever the builder already set under the same name.
    builder = builder.headers(caller_headers(&options.headers));

    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Ok(Outcome::Failure(FailureResponse::new(status.as_u16(), text)));
    }
    Ok(Outcome::Success(success_value(text)))
}

fn caller_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping header that is not valid HTTP"),
        }
    }
    map
}

/// Successful bodies: JSON when they parse, the raw text otherwise.
fn success_value(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn multipart_form(form: MultipartForm, upload: UploadProgress) -> Result<Form, reqwest::Error> {
    let total = form.file_bytes();
    let sent = Arc::new(AtomicU64::new(0));
    let mut out = Form::new();

    for (name, value) in form.parts().iter().cloned() {
        out = match value {
            PartValue::Text(text) => out.text(name, text),
            PartValue::File(file) => {
                let len = file.len() as u64;
                let part = if upload.is_listening() {
                    let body = progress_body(file.bytes, total, sent.clone(), upload.clone());
                    Part::stream_with_length(body, len)
                } else {
                    Part::bytes(file.bytes.to_vec())
                };
                let part = part.file_name(file.name);
                let part = match file.content_type {
                    Some(content_type) => part.mime_str(&content_type)?,
                    None => part,
                };
                out.part(name, part)
            }
        };
    }
    Ok(out)
}

/// Stream `bytes` in chunks, reporting cumulative progress as each is pulled.
fn progress_body(bytes: Bytes, total: u64, sent: Arc<AtomicU64>, upload: UploadProgress) -> reqwest::Body {
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len())))
        .collect();
    let stream = stream::iter(chunks.into_iter().map(move |chunk| {
        let loaded = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
        upload.report(loaded, total);
        Ok::<_, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_value_parses_json_or_keeps_text() {
        assert_eq!(success_value(r#"{"id":1}"#.to_string()), json!({"id": 1}));
        assert_eq!(success_value("plain".to_string()), json!("plain"));
        assert_eq!(success_value(String::new()), Value::Null);
    }

    #[test]
    fn caller_headers_keep_one_value_per_name() {
        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/vnd.api+json".to_string()),
            ("bad header".to_string(), "x".to_string()),
            ("X-Trace".to_string(), "abc".to_string()),
        ]);
        let map = caller_headers(&headers);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(map[CONTENT_TYPE], "application/vnd.api+json");
        assert_eq!(map["x-trace"], "abc");
    }

    #[test]
    fn new_outside_a_runtime_fails() {
        let err = ReqwestTransport::new(reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, AdapterError::Runtime(_)));
    }

    #[tokio::test]
    async fn new_inside_a_runtime_succeeds() {
        assert!(ReqwestTransport::new(reqwest::Client::new()).is_ok());
    }
}
