//! Periodic tick driver for the orchestrator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::queue::orchestrator::Orchestrator;

pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Calls [`Orchestrator::tick`] on a fixed interval, one pass at a time.
pub struct TickDriver {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl TickDriver {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            interval: TICK_INTERVAL,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the tick loop in a background task until [`TickDriver::stop`].
    pub fn start(&self) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    log::debug!("Tick driver stopped");
                    break;
                }

                orchestrator.tick();
            }
        })
    }

    /// Ticks until no job is queued, uploading or processing, or until
    /// stopped. Returns true if the queue drained.
    pub async fn run_until_idle(&self) -> bool {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {},
                _ = self.wake.notified() => {},
            }

            if self.shutdown.load(Ordering::Acquire) {
                return false;
            }

            self.orchestrator.tick();

            if self.orchestrator.is_idle() {
                return true;
            }
        }
    }

    /// Signals the loop to exit before its next tick.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
