//! Error types for the adapter.
//!
//! # Design
//! Two kinds of failure exist. `AdapterError` covers setup paths that can
//! fail synchronously (loading configuration, constructing a transport,
//! encoding a payload). `Rejection` is how a request fails: it carries the
//! server's `errors` value, or an empty object when nothing usable came back,
//! and is only ever delivered through the returned future.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while configuring the client or preparing a request.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No async runtime was available to drive the transport.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

/// A settled failure of a request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request rejected: {0}")]
pub struct Rejection(pub Value);

impl Rejection {
    /// Rejection with an empty object, used when the error body is unusable.
    pub fn empty() -> Self {
        Rejection(Value::Object(Map::new()))
    }

    pub fn errors(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.0, Value::Object(map) if map.is_empty())
    }
}
