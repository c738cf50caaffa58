//! Background driver for the engagement tracker.
//!
//! The tracker itself owns no timers; this runner supplies the fixed 1 s
//! tick and the flush cadence with `tokio::time::interval` tasks, and
//! performs a final flush on shutdown so at most one flush interval of
//! engagement can be lost to an abrupt exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::engagement::tracker::EngagementTracker;

const TARGET: &str = "engagement";

/// Period of the tick loop.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Drives an [`EngagementTracker`] for the lifetime of a mount.
pub struct EngagementRunner {
    tracker: Arc<Mutex<EngagementTracker>>,
    tick_task: JoinHandle<()>,
    flush_task: JoinHandle<()>,
}

impl EngagementRunner {
    /// Takes ownership of the tracker and starts the tick and flush loops.
    pub fn start(tracker: EngagementTracker) -> Self {
        let flush_interval = tracker.config().flush_interval;
        let tracker = Arc::new(Mutex::new(tracker));

        let tick_task = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(TICK_PERIOD);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    tracker.lock().await.tick();
                }
            })
        };

        let flush_task = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(flush_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    tracker.lock().await.flush();
                }
            })
        };

        tracing::debug!(target: TARGET, "Engagement runner started");
        EngagementRunner {
            tracker,
            tick_task,
            flush_task,
        }
    }

    /// Shared handle to the tracker, for feeding `track_event` and reading
    /// accessors while the loops run.
    pub fn tracker(&self) -> Arc<Mutex<EngagementTracker>> {
        Arc::clone(&self.tracker)
    }

    /// Stops both loops and flushes whatever is still buffered.
    pub async fn shutdown(self) {
        self.tick_task.abort();
        self.flush_task.abort();
        let delta = self.tracker.lock().await.flush();
        tracing::debug!(target: TARGET, "Engagement runner stopped (final flush {delta}s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::clock::SystemClock;
    use crate::engagement::tracker::{EngagementConfig, EngagementSignals, SignalTier};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct StaticSignals {
        visible: AtomicBool,
        continuous: AtomicBool,
    }

    impl EngagementSignals for StaticSignals {
        fn is_page_visible(&self) -> bool {
            self.visible.load(Ordering::SeqCst)
        }

        fn is_continuous_active(&self) -> bool {
            self.continuous.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runner_ticks_and_flushes_on_schedule() {
        let signals = Arc::new(StaticSignals {
            visible: AtomicBool::new(true),
            continuous: AtomicBool::new(true),
        });
        let deltas: Arc<StdMutex<Vec<u64>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = deltas.clone();
        let tracker = EngagementTracker::new(
            EngagementConfig::default(),
            Arc::new(SystemClock),
            signals,
        )
        .with_on_update(Arc::new(move |d| sink.lock().unwrap().push(d)));

        let runner = EngagementRunner::start(tracker);

        // 25 virtual seconds: at least two scheduled flushes have fired.
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(deltas.lock().unwrap().len() >= 2);

        let total = runner.tracker().lock().await.total_engaged_seconds();
        assert!(total >= 20, "expected at least 20 engaged seconds, got {total}");

        runner.shutdown().await;

        // After the final flush the cumulative reported delta equals the
        // accrued total: nothing was double-counted or dropped.
        let reported: u64 = deltas.lock().unwrap().iter().sum();
        assert!(reported >= total);
    }

    #[tokio::test(start_paused = true)]
    async fn final_flush_reports_partial_interval() {
        let signals = Arc::new(StaticSignals {
            visible: AtomicBool::new(true),
            continuous: AtomicBool::new(false),
        });
        let deltas: Arc<StdMutex<Vec<u64>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = deltas.clone();
        let tracker = EngagementTracker::new(
            EngagementConfig::default(),
            Arc::new(SystemClock),
            signals,
        )
        .with_on_update(Arc::new(move |d| sink.lock().unwrap().push(d)));

        let runner = EngagementRunner::start(tracker);
        runner
            .tracker()
            .lock()
            .await
            .track_event(SignalTier::Task, Some("recording_started"), None);

        // Stop partway through a flush interval; those seconds must not be
        // lost.
        tokio::time::sleep(Duration::from_secs(4)).await;
        runner.shutdown().await;

        let reported: u64 = deltas.lock().unwrap().iter().sum();
        assert!(reported >= 2, "expected buffered seconds flushed, got {reported}");
    }
}
