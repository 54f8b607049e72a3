//! Verb-named HTTP requests over an injected transport.
//!
//! # Overview
//! `Client::get/post/put/patch/del` merge per-call options with client-wide
//! defaults, choose JSON or multipart encoding depending on whether the
//! payload carries files, issue exactly one call through a `Transport`, and
//! return a `PendingRequest`: an abort handle plus a future that settles once
//! with the success payload or a `Rejection`.
//!
//! # Design
//! - `Client` is immutable after construction; defaults never change mid-flight.
//! - The transport is a trait object injected at construction, so tests can
//!   substitute a recording fake without touching global state.
//! - Option building (`options`) is pure and separately testable from
//!   dispatch (`pending`), which only adapts a completion callback into a
//!   future.
//! - `ReqwestTransport` (feature `reqwest`) is the stock network backend.

pub mod client;
pub mod error;
pub mod http;
pub mod options;
pub mod pending;
#[cfg(feature = "reqwest")]
pub mod reqwest_transport;
pub mod transport;
pub mod types;

pub use client::{Client, ClientConfig};
pub use error::{AdapterError, Rejection};
pub use http::{ContentType, Method, MultipartForm, PartValue, RequestBody, TransportOptions, UploadProgress};
pub use options::{build_transport_options, encode_multipart};
pub use pending::{settle, AbortHandle, PendingRequest, ResponseFuture, ResponseResult};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
pub use transport::{Cancel, Completion, FailureResponse, NoopCancel, Outcome, Transport};
pub use types::{FileBlob, FormValue, OnProgress, Payload, RequestOptions};
