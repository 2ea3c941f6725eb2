//! Browser task scheduling.

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use glint_core::{FRAME, Scheduler};
use tokio::sync::oneshot;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Scheduler on the page's event loop.
///
/// Tasks run through `wasm_bindgen_futures::spawn_local`, timers through
/// `gloo-timers`, and frame ticks through `requestAnimationFrame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        gloo_timers::future::sleep(duration).boxed_local()
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        let Some(window) = web_sys::window() else {
            return self.sleep(FRAME);
        };
        let (tx, rx) = oneshot::channel::<()>();
        let tick = Closure::once_into_js(move || {
            let _ = tx.send(());
        });
        if let Err(e) = window.request_animation_frame(tick.unchecked_ref()) {
            tracing::debug!(error = ?e, "requestAnimationFrame failed, using a timer");
            return self.sleep(FRAME);
        }
        // A dropped sender (page teardown) resolves the frame as well.
        rx.map(|_| ()).boxed_local()
    }
}
