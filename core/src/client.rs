//! Verb-named request methods over an injected transport.
//!
//! # Design
//! `Client` is built once and never mutated afterwards: it holds the base
//! path, the common options merged into every call, and the transport. Each
//! verb concatenates the base path with the given path (no slash handling),
//! merges `{method, data}` < common options < per-call options, and hands the
//! result to `ajax`. Nothing is raised synchronously; every failure arrives
//! through the returned `PendingRequest`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AdapterError, Rejection};
use crate::http::Method;
use crate::options::build_transport_options;
use crate::pending::{dispatch, PendingRequest};
use crate::transport::Transport;
use crate::types::{Payload, RequestOptions};

/// Client-wide defaults as a loadable document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_path: String,
    pub headers: BTreeMap<String, String>,
    pub fields: Map<String, Value>,
}

impl ClientConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AdapterError> {
        serde_json::from_str(raw).map_err(|e| AdapterError::Config(e.to_string()))
    }

    /// Headers and fields as common request options.
    pub fn common_options(&self) -> RequestOptions {
        RequestOptions {
            headers: self.headers.clone(),
            fields: self.fields.clone(),
            ..RequestOptions::default()
        }
    }
}

/// Immutable request client. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    base_path: String,
    common: RequestOptions,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_path", &self.base_path)
            .field("common", &self.common)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            base_path: String::new(),
            common: RequestOptions::default(),
            transport,
        }
    }

    pub fn from_config(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let common = config.common_options();
        Self::new(transport)
            .with_base_path(config.base_path)
            .with_common_options(common)
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_common_options(mut self, common: RequestOptions) -> Self {
        self.common = common;
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn common_options(&self) -> &RequestOptions {
        &self.common
    }

    pub fn get(&self, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        self.verb(Method::Get, path, data, options)
    }

    pub fn post(&self, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        self.verb(Method::Post, path, data, options)
    }

    pub fn put(&self, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        self.verb(Method::Put, path, data, options)
    }

    pub fn patch(&self, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        self.verb(Method::Patch, path, data, options)
    }

    /// DELETE. Takes positional data like the other verbs and encodes it the
    /// same way: JSON, or multipart when it holds a file.
    pub fn del(&self, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        self.verb(Method::Delete, path, data, options)
    }

    fn verb(&self, method: Method, path: &str, data: Option<Payload>, options: RequestOptions) -> PendingRequest {
        let url = format!("{}{}", self.base_path, path);
        let defaults = RequestOptions {
            method: Some(method),
            data,
            ..RequestOptions::default()
        };
        let merged = defaults.merge(self.common.clone()).merge(options);
        self.ajax(&url, merged)
    }

    /// Issue one request to `url` with fully merged options.
    pub fn ajax(&self, url: &str, options: RequestOptions) -> PendingRequest {
        let method = options.method.unwrap_or_default();
        let span = tracing::debug_span!("ajax", request_id = %Uuid::new_v4(), %method, url);
        let _guard = span.enter();

        let transport_options = match build_transport_options(options) {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!(error = %e, "could not build request");
                return PendingRequest::settled(Err(Rejection::empty()));
            }
        };

        tracing::debug!(
            content_type = ?transport_options.content_type,
            headers = transport_options.headers.len(),
            "dispatching request"
        );
        let completion_span = span.clone();
        dispatch(|complete| {
            self.transport.issue(
                url,
                transport_options,
                Box::new(move |outcome| {
                    let _entered = completion_span.enter();
                    complete(outcome);
                }),
            )
        })
    }
}
