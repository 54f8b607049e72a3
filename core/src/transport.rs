//! The seam between the adapter and whatever actually performs HTTP.
//!
//! # Design
//! A transport receives a fully built `TransportOptions` and a one-shot
//! `Completion`. It must call the completion at most once, from any thread,
//! when the request finishes, and hand back a `Cancel` handle right away.
//! Dropping the completion without calling it is allowed (for instance after
//! a cancel) and surfaces to the caller as an empty rejection.

use serde_json::Value;

use crate::http::TransportOptions;

/// What the server sent back for a failed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureResponse {
    /// `None` when the request never produced a response.
    pub status: Option<u16>,
    pub body: Option<String>,
}

impl FailureResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: Some(body.into()),
        }
    }

    /// A failure with no response at all (connection refused, DNS, ...).
    pub fn network() -> Self {
        Self::default()
    }
}

/// How a transport call finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(FailureResponse),
}

/// Invoked by the transport exactly once when the call settles.
pub type Completion = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Cancellation primitive for an issued call.
pub trait Cancel: Send + Sync {
    fn cancel(&self);
}

/// An HTTP backend.
pub trait Transport: Send + Sync {
    fn issue(&self, url: &str, options: TransportOptions, complete: Completion) -> Box<dyn Cancel>;
}

/// A `Cancel` that does nothing, for calls that settle synchronously.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCancel;

impl Cancel for NoopCancel {
    fn cancel(&self) {}
}
