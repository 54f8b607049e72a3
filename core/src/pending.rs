//! Adapts the transport's completion callback into a future.
//!
//! # Design
//! `settle` maps a transport `Outcome` to the caller-visible result. The
//! completion handed to the transport owns the sending half of a oneshot
//! channel, so settlement happens at most once; `ResponseFuture` owns the
//! receiving half. The cancel handle is captured before the future is handed
//! back, so `abort` works whichever way the request ends.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use serde_json::Value;

use crate::error::Rejection;
use crate::transport::{Cancel, Completion, FailureResponse, NoopCancel, Outcome};

/// Caller-side result of a request.
pub type ResponseResult = Result<Value, Rejection>;

/// Cancels an in-flight request. Cheap to clone.
#[derive(Clone)]
pub struct AbortHandle(Arc<dyn Cancel>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.cancel();
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AbortHandle(..)")
    }
}

/// Resolves once with the success payload, or rejects once.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct ResponseFuture {
    rx: oneshot::Receiver<ResponseResult>,
}

impl Future for ResponseFuture {
    type Output = ResponseResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => {
                tracing::warn!("transport dropped the completion without settling");
                Poll::Ready(Err(Rejection::empty()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Handle returned by every request.
#[derive(Debug)]
pub struct PendingRequest {
    pub abort: AbortHandle,
    pub promise: ResponseFuture,
}

impl PendingRequest {
    /// Shorthand for `self.abort.abort()`.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// A request that has already settled with `result`.
    pub(crate) fn settled(result: ResponseResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self {
            abort: AbortHandle(Arc::new(NoopCancel)),
            promise: ResponseFuture { rx },
        }
    }
}

impl std::future::IntoFuture for PendingRequest {
    type Output = ResponseResult;
    type IntoFuture = ResponseFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.promise
    }
}

/// Issue a call through `issue`, wiring its completion to a fresh future.
pub(crate) fn dispatch<F>(issue: F) -> PendingRequest
where
    F: FnOnce(Completion) -> Box<dyn Cancel>,
{
    let (tx, rx) = oneshot::channel();
    let complete: Completion = Box::new(move |outcome| {
        let _ = tx.send(settle(outcome));
    });
    let cancel = issue(complete);
    PendingRequest {
        abort: AbortHandle(Arc::from(cancel)),
        promise: ResponseFuture { rx },
    }
}

/// Map a transport outcome onto the caller's result.
pub fn settle(outcome: Outcome) -> ResponseResult {
    match outcome {
        Outcome::Success(value) => {
            tracing::debug!("request resolved");
            Ok(value)
        }
        Outcome::Failure(response) => {
            tracing::debug!(status = ?response.status, "request rejected");
            Err(parse_failure(&response))
        }
    }
}

/// The `errors` field of a JSON error body, or an empty object.
fn parse_failure(response: &FailureResponse) -> Rejection {
    let Some(body) = response.body.as_deref() else {
        return Rejection::empty();
    };
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) => match map.remove("errors") {
            Some(Value::Null) | None => Rejection::empty(),
            Some(errors) => Rejection(errors),
        },
        Ok(_) => Rejection::empty(),
        Err(e) => {
            tracing::debug!(error = %e, "error body is not JSON");
            Rejection::empty()
        }
    }
}
