//! Panic containment.
//!
//! Futures polled through [`catch_panic`] mark the current thread while they
//! run, so the process panic hook can tell a panic that will be caught and
//! converted into a value from one that escapes and must stop the process.

use std::any::Any;
use std::cell::Cell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;

thread_local! {
    static CONTAINED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether the current thread is polling a future whose panics are caught.
pub fn is_contained() -> bool {
    CONTAINED_DEPTH.with(|depth| depth.get() > 0)
}

/// Decrements on drop so the marker is restored while unwinding.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        CONTAINED_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CONTAINED_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

struct Contained<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Contained<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = DepthGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// Poll `future` to completion, returning the panic payload instead of unwinding.
pub async fn catch_panic<F: Future>(future: F) -> Result<F::Output, Box<dyn Any + Send>> {
    AssertUnwindSafe(Contained {
        inner: Box::pin(future),
    })
    .catch_unwind()
    .await
}
