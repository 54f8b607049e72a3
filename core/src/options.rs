//! Turns merged `RequestOptions` into `TransportOptions`.
//!
//! # Design
//! GET requests pass their payload through untouched. Every other method
//! picks an encoding from the payload: multipart as soon as one file is
//! present (directly or inside an array value), JSON otherwise. `null`
//! entries are dropped from multipart forms but kept in JSON.

use serde_json::Value;

use crate::error::AdapterError;
use crate::http::{ContentType, Method, MultipartForm, PartValue, RequestBody, TransportOptions, UploadProgress};
use crate::types::{json_text, FormValue, Payload, RequestOptions};

/// Build transport-ready options for one request.
pub fn build_transport_options(options: RequestOptions) -> Result<TransportOptions, AdapterError> {
    let RequestOptions {
        method,
        headers,
        fields,
        data,
        on_progress,
    } = options;
    let method = method.unwrap_or_default();

    let mut built = TransportOptions {
        method,
        headers,
        fields,
        cache: true,
        process_data: true,
        content_type: ContentType::Auto,
        body: RequestBody::Query(None),
        upload: None,
    };

    if method == Method::Get {
        built.body = RequestBody::Query(data);
        return Ok(built);
    }

    match data {
        Some(payload) if payload.has_file() => {
            built.cache = false;
            built.process_data = false;
            built.content_type = ContentType::Disabled;
            built.body = RequestBody::Multipart(encode_multipart(&payload));
            built.upload = Some(UploadProgress::new(on_progress));
        }
        data => {
            let body = data
                .map(|payload| serde_json::to_string(&payload))
                .transpose()
                .map_err(|e| AdapterError::Serialization(e.to_string()))?;
            built.content_type = ContentType::Json;
            built.body = RequestBody::Json(body);
        }
    }

    Ok(built)
}

/// Encode a payload as a multipart form.
///
/// Array values go under `key[]`, one part per non-null element. An array
/// with nothing to send still leaves one empty `key[]` part behind.
pub fn encode_multipart(payload: &Payload) -> MultipartForm {
    let mut form = MultipartForm::new();
    for (key, value) in payload.iter() {
        let marked = format!("{key}[]");
        let parts: Vec<PartValue> = match value {
            FormValue::List(items) => items.iter().filter(|item| !item.is_null()).map(part_for).collect(),
            FormValue::Json(Value::Array(items)) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| PartValue::Text(json_text(item)))
                .collect(),
            value if value.is_null() => continue,
            value => {
                form.append(key.clone(), part_for(value));
                continue;
            }
        };
        if parts.is_empty() {
            form.append(marked, PartValue::Text(String::new()));
            continue;
        }
        for part in parts {
            form.append(marked.clone(), part);
        }
    }
    form
}

fn part_for(value: &FormValue) -> PartValue {
    match value {
        FormValue::File(file) => PartValue::File(file.clone()),
        FormValue::Json(value) => PartValue::Text(json_text(value)),
        FormValue::List(_) => PartValue::Text(serde_json::to_string(value).unwrap_or_default()),
    }
}
