//! One-shot response sink and future.
//!
//! Every in-flight request has exactly one [`ResponseSink`] (held by the
//! controller) and one [`ResponseFuture`] (held by the caller). The sink is
//! single-assignment: it is completed with a value or an error at most once
//! over its lifetime. The future resolves when the sink is completed and
//! can be awaited from any thread, or polled by hand via [`ResponseFuture::try_take`]
//! in tick-driven code.
//!
//! If a sink is dropped without being completed, the future resolves to
//! [`ClientError::Unknown`] so the caller can never hang on a lost request.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::ClientError;

struct Inner<T> {
    result: Option<Result<T, ClientError>>,
    waker: Option<Waker>,
    fulfilled: bool,
}

/// Create a connected sink/future pair.
pub fn response_channel<T>() -> (ResponseSink<T>, ResponseFuture<T>) {
    let inner = Arc::new(Mutex::new(Inner {
        result: None,
        waker: None,
        fulfilled: false,
    }));
    (
        ResponseSink {
            inner: Arc::clone(&inner),
        },
        ResponseFuture { inner },
    )
}

/// The completing half: single-assignment, consumed on completion.
pub struct ResponseSink<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> ResponseSink<T> {
    /// Complete the request with a value.
    ///
    /// Consumes the sink, preventing double completion.
    pub fn complete(self, value: T) {
        self.fulfill(Ok(value));
    }

    /// Complete the request with an error.
    ///
    /// Consumes the sink, preventing double completion.
    pub fn complete_err(self, error: ClientError) {
        self.fulfill(Err(error));
    }

    fn fulfill(&self, result: Result<T, ClientError>) {
        let waker = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.fulfilled {
                debug_assert!(false, "response sink completed twice");
                tracing::warn!("response sink completed twice; dropping second completion");
                return;
            }
            inner.result = Some(result);
            inner.fulfilled = true;
            inner.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> Drop for ResponseSink<T> {
    fn drop(&mut self) {
        let already_fulfilled = self
            .inner
            .lock()
            .map(|inner| inner.fulfilled)
            .unwrap_or(true);
        if !already_fulfilled {
            tracing::warn!("response sink dropped without completion");
            self.fulfill(Err(ClientError::Unknown));
        }
    }
}

/// The observing half: resolves when the sink is completed.
pub struct ResponseFuture<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> ResponseFuture<T> {
    /// Whether the request has completed (the result may already be taken).
    pub fn is_done(&self) -> bool {
        self.inner.lock().map(|i| i.fulfilled).unwrap_or(false)
    }

    /// Take the result without blocking. Returns `None` while the request
    /// is still in flight, and after the result has already been taken.
    pub fn try_take(&self) -> Option<Result<T, ClientError>> {
        self.inner.lock().ok()?.result.take()
    }
}

impl<T> Future for ResponseFuture<T> {
    type Output = Result<T, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Ok(mut inner) = self.inner.lock() else {
            return Poll::Ready(Err(ClientError::Unknown));
        };

        if let Some(result) = inner.result.take() {
            return Poll::Ready(result);
        }
        if inner.fulfilled {
            // Completed but already taken elsewhere.
            return Poll::Ready(Err(ClientError::Unknown));
        }

        inner.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
