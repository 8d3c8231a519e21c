//! Latency timing for async computations.
//!
//! [`AsyncTimer`] pairs a registered [`TimerHandle`] with the registry's
//! [`Clock`]. Every computation run through [`AsyncTimer::record`] produces
//! exactly one sample, whether it returns, panics, or is dropped before it
//! finishes.
//!
//! ```ignore
//! let timer = registry.timed("db.query", [("table", "users")])?;
//! let rows = timer.record(fetch_users()).await?;
//! ```

pub mod builder;

pub use builder::{AsyncTimerBuilder, DistributionConfig, TimedRegistryExt};

use crate::clock::Clock;
use crate::registry::{MeterId, TimerHandle};
use futures::future::{BoxFuture, FutureExt, LocalBoxFuture};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Times async computations into a shared timer.
///
/// Cloning is cheap; clones record into the same timer.
#[derive(Clone)]
pub struct AsyncTimer {
    timer: Arc<dyn TimerHandle>,
    clock: Arc<dyn Clock>,
}

impl AsyncTimer {
    pub fn new(timer: Arc<dyn TimerHandle>, clock: Arc<dyn Clock>) -> Self {
        Self { timer, clock }
    }

    /// Start configuring a timer with custom distribution statistics.
    pub fn builder(name: impl Into<String>) -> AsyncTimerBuilder {
        AsyncTimerBuilder::new(name)
    }

    /// The underlying timer, for reading count and totals.
    pub fn handle(&self) -> &Arc<dyn TimerHandle> {
        &self.timer
    }

    pub fn id(&self) -> &MeterId {
        self.timer.id()
    }

    /// Run `computation` to completion and record how long it took.
    ///
    /// The clock is read before the computation is first polled and again
    /// once it reaches a terminal state. Time spent suspended counts. The
    /// output, including any `Err`, is returned untouched after the sample
    /// has been recorded. A panic or cancellation still records the time
    /// elapsed up to that point.
    pub async fn record<F>(&self, computation: F) -> F::Output
    where
        F: Future,
    {
        self.record_with(|| computation).await
    }

    /// Read the clock, then create the computation with `f` and run it.
    ///
    /// Work `f` does before handing back its future is part of the sample.
    async fn record_with<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let mut sample = Sample::start(self.timer.as_ref(), self.clock.as_ref());
        let output = f().await;
        sample.completed = true;
        drop(sample);
        output
    }

    /// Turn an async function into one that is timed on every call.
    ///
    /// Nothing is timed or registered until the returned function is called.
    pub fn wrap<F, Fut>(
        &self,
        f: F,
    ) -> impl Fn() -> BoxFuture<'static, Fut::Output> + Clone + Send + Sync + 'static
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let timer = self.clone();
        let f = Arc::new(f);

        move || {
            let timer = timer.clone();
            let f = f.clone();
            async move { timer.record_with(|| f()).await }.boxed()
        }
    }

    /// Like [`wrap`](Self::wrap), for functions whose futures are not `Send`.
    ///
    /// The returned function must be called and awaited on one thread, for
    /// example inside a `tokio::task::LocalSet`.
    pub fn wrap_local<F, Fut>(
        &self,
        f: F,
    ) -> impl Fn() -> LocalBoxFuture<'static, Fut::Output> + Clone + 'static
    where
        F: Fn() -> Fut + 'static,
        Fut: Future + 'static,
    {
        let timer = self.clone();
        let f = Rc::new(f);

        move || {
            let timer = timer.clone();
            let f = f.clone();
            async move { timer.record_with(|| f()).await }.boxed_local()
        }
    }
}

impl std::fmt::Debug for AsyncTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTimer")
            .field("id", self.timer.id())
            .field("count", &self.timer.count())
            .finish()
    }
}

/// One in-flight measurement. Records when dropped.
struct Sample<'a> {
    timer: &'a dyn TimerHandle,
    clock: &'a dyn Clock,
    start: u64,
    completed: bool,
}

impl<'a> Sample<'a> {
    fn start(timer: &'a dyn TimerHandle, clock: &'a dyn Clock) -> Self {
        Self {
            timer,
            clock,
            start: clock.now(),
            completed: false,
        }
    }
}

impl Drop for Sample<'_> {
    fn drop(&mut self) {
        let elapsed = Duration::from_nanos(self.clock.now().saturating_sub(self.start));

        if !self.completed {
            tracing::debug!(
                timer = %self.timer.id(),
                elapsed_ns = elapsed.as_nanos() as u64,
                panicking = std::thread::panicking(),
                "Timed computation abandoned before completion"
            );
        }

        self.timer.record(elapsed);
    }
}
