//! Panic containment for event handlers and background tasks.

use std::{
    any::Any,
    cell::Cell,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    task::{Context, Poll},
};

use futures::FutureExt;

thread_local! {
    static SUPERVISED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        SUPERVISED_DEPTH.with(|d| d.set(d.get() + 1));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        SUPERVISED_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Whether the current thread is polling a [`supervise`]d future.
///
/// The panic hook uses this to tell contained handler panics apart from
/// faults that should bring the process down.
pub fn is_supervised() -> bool {
    SUPERVISED_DEPTH.with(|d| d.get() > 0)
}

struct Scoped<'a, T> {
    inner: Pin<Box<dyn Future<Output = T> + Send + 'a>>,
}

impl<T> Future for Scoped<'_, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let _guard = DepthGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// Run `fut`, turning a panic into `Err(message)`.
pub async fn supervise<'a, T>(fut: impl Future<Output = T> + Send + 'a) -> Result<T, String> {
    let scoped = Scoped {
        inner: Box::pin(fut),
    };
    AssertUnwindSafe(scoped)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
