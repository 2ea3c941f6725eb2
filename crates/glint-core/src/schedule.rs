//! Cooperative scheduling primitives.
//!
//! glint is single-threaded: every task runs on the thread that owns the
//! document. The scheduler spawns local tasks and provides the two waits the
//! rest of the crate needs, timer sleeps (debounce, icon reverts, overlay
//! removal, navigation backoff) and frame ticks (bulk-init chunking).

use std::time::Duration;

use futures_util::future::LocalBoxFuture;

/// Local task spawner with timers.
pub trait Scheduler: Clone + 'static {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
    /// Resolve at the next rendering opportunity.
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;
}

/// Nominal frame length used where no real frame clock exists.
pub const FRAME: Duration = Duration::from_millis(16);

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
mod native {
    use std::time::Duration;

    use futures_util::FutureExt;
    use futures_util::future::LocalBoxFuture;

    use super::{FRAME, Scheduler};

    /// Scheduler backed by tokio's local task set.
    ///
    /// Tasks are spawned with `tokio::task::spawn_local`, so callers must be
    /// running inside a `tokio::task::LocalSet`.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TokioScheduler;

    impl Scheduler for TokioScheduler {
        fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
            tokio::task::spawn_local(task);
        }

        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            tokio::time::sleep(duration).boxed_local()
        }

        fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
            tokio::time::sleep(FRAME).boxed_local()
        }
    }
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub use native::TokioScheduler;

/// Milliseconds as a `Duration`.
pub fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}
