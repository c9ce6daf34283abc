use std::sync::Arc;
use std::time::Duration;

use tauri::AppHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Owns one repeating clock. Dropping or cancelling the handle stops it.
pub struct ClockHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ClockHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire_cancel();
    }

    fn fire_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.fire_cancel();
    }
}

impl std::fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Source of repeating and one-shot timers.
pub trait Scheduler: Send + Sync {
    /// Calls `on_tick` every `period`, first one `period` from now.
    fn every(&self, period: Duration, on_tick: TickFn) -> ClockHandle;

    /// Runs `task` once after `delay`.
    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>);
}

/// Clocks timed on the Tauri async runtime. Callbacks are delivered on the
/// main thread, where commands and window events also run.
#[derive(Clone)]
pub struct AsyncScheduler {
    app: AppHandle,
}

impl AsyncScheduler {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Scheduler for AsyncScheduler {
    fn every(&self, period: Duration, on_tick: TickFn) -> ClockHandle {
        let app = self.app.clone();
        let task = tauri::async_runtime::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let on_tick = on_tick.clone();
                if let Err(err) = app.run_on_main_thread(move || on_tick()) {
                    debug!("clock stopped, event loop is gone: {err}");
                    break;
                }
            }
        });
        ClockHandle::new(move || task.abort())
    }

    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        let app = self.app.clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = app.run_on_main_thread(task) {
                debug!("delayed task dropped, event loop is gone: {err}");
            }
        });
    }
}
