//! Engagement window tracker.
//!
//! Measures genuine engagement with a decaying, tiered attention window
//! instead of raw wall-clock time. Discrete task events (tier 3) open the
//! window; interactions (tier 2) can only stretch an already-open window,
//! so idle typing after expiry cannot fake engagement; presence (tier 1)
//! is derived every tick from page visibility and force-closes the window
//! while the page is hidden. A continuous-activity flag (e.g. an active
//! recording) refreshes the window every tick, guaranteeing uninterrupted
//! crediting for the activity's duration.
//!
//! Engaged seconds accrue one per tick while the window is open. Accrued
//! time is reported to the store as periodic deltas, not running totals,
//! so the collaborator can add against its own last-known total no matter
//! how its save cycle is phased against the tracker's. A crash loses at
//! most one flush interval of unflushed time; that bound is accepted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engagement::clock::Clock;

const TARGET: &str = "engagement";

/// Default window extension granted by a task event.
pub const DEFAULT_WINDOW_EXTENSION: Duration = Duration::from_secs(30);

/// Default interval between delta flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Capacity of the debug event ring buffer.
pub const DEBUG_LOG_CAPACITY: usize = 50;

/// Confidence level of an engagement signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTier {
    /// Implicit presence, derived from page visibility every tick
    Presence,
    /// Lower-confidence discrete signal (e.g. a keystroke)
    Interaction,
    /// High-confidence discrete signal (e.g. recording started)
    Task,
}

/// What happened to the window, for the diagnostics ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEventKind {
    Opened,
    Extended,
    Expired,
    Closed,
    PresenceLost,
    PresenceRegained,
    /// Interaction arrived while the window was closed; no effect
    InteractionIgnored,
}

/// One entry in the bounded debug log, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub kind: WindowEventKind,
    #[serde(default)]
    pub tier: Option<SignalTier>,
    #[serde(default)]
    pub label: Option<String>,
    pub at: DateTime<Utc>,
}

/// Tracker construction config.
#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// Disabled trackers ignore all signals and accrue nothing
    pub enabled: bool,
    /// Window extension granted by task events and interactions
    pub window_extension: Duration,
    /// Interval between delta flushes (consumed by the runner)
    pub flush_interval: Duration,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        EngagementConfig {
            enabled: true,
            window_extension: DEFAULT_WINDOW_EXTENSION,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Ambient inputs sampled on every tick.
///
/// Implemented by the host over its page-visibility and recording state.
pub trait EngagementSignals: Send + Sync {
    /// Tier-1 presence: is the page currently visible?
    fn is_page_visible(&self) -> bool;

    /// Continuous-activity flag (e.g. "is recording").
    fn is_continuous_active(&self) -> bool;
}

/// Receives flushed engagement deltas (seconds, not running totals).
pub type OnUpdate = Arc<dyn Fn(u64) + Send + Sync>;

/// Timer-driven engagement accountant. One instance per mount; discarded
/// after a final flush on unmount.
///
/// The tracker owns no timers itself: the host (normally
/// [`EngagementRunner`](crate::engagement::EngagementRunner)) calls
/// [`tick`](Self::tick) once per second and [`flush`](Self::flush) on its
/// flush cadence.
pub struct EngagementTracker {
    config: EngagementConfig,
    clock: Arc<dyn Clock>,
    signals: Arc<dyn EngagementSignals>,
    on_update: Option<OnUpdate>,
    window_open: bool,
    expires_at: Option<DateTime<Utc>>,
    page_visible: bool,
    total_engaged_seconds: u64,
    unflushed_seconds: u64,
    debug_events: VecDeque<WindowEvent>,
}

impl EngagementTracker {
    pub fn new(
        config: EngagementConfig,
        clock: Arc<dyn Clock>,
        signals: Arc<dyn EngagementSignals>,
    ) -> Self {
        EngagementTracker {
            config,
            clock,
            signals,
            on_update: None,
            window_open: false,
            expires_at: None,
            page_visible: true,
            total_engaged_seconds: 0,
            unflushed_seconds: 0,
            debug_events: VecDeque::with_capacity(DEBUG_LOG_CAPACITY),
        }
    }

    /// Sets the delta callback invoked by [`flush`](Self::flush).
    pub fn with_on_update(mut self, on_update: OnUpdate) -> Self {
        self.on_update = Some(on_update);
        self
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    /// Total engaged seconds accrued since construction. Monotone.
    pub fn total_engaged_seconds(&self) -> u64 {
        self.total_engaged_seconds
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open
    }

    /// Whole seconds until the window expires, rounded up; 0 when closed.
    pub fn window_time_remaining(&self) -> u64 {
        if !self.window_open {
            return 0;
        }
        let Some(expires_at) = self.expires_at else {
            return 0;
        };
        let remaining_ms = (expires_at - self.clock.now()).num_milliseconds();
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms as u64).div_ceil(1000)
        }
    }

    /// Read-only view of the debug ring, newest first.
    pub fn debug_events(&self) -> impl Iterator<Item = &WindowEvent> {
        self.debug_events.iter()
    }

    pub fn clear_debug_events(&mut self) {
        self.debug_events.clear();
    }

    /// Feeds a discrete engagement signal.
    ///
    /// Task events always open or reopen the window; interactions only
    /// stretch a window that is already open and unexpired. An explicit
    /// presence event is ignored; presence is sampled on every tick.
    /// `duration` overrides the configured extension for this event.
    pub fn track_event(&mut self, tier: SignalTier, label: Option<&str>, duration: Option<Duration>) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();
        let extension = duration.unwrap_or(self.config.window_extension);

        match tier {
            SignalTier::Task => {
                let kind = if self.window_open {
                    WindowEventKind::Extended
                } else {
                    WindowEventKind::Opened
                };
                self.window_open = true;
                self.expires_at = Some(now + extension);
                self.push_event(kind, Some(tier), label, now);
            }
            SignalTier::Interaction => {
                if self.window_open && self.expires_at.is_some_and(|e| e > now) {
                    self.expires_at = Some(now + extension);
                    self.push_event(WindowEventKind::Extended, Some(tier), label, now);
                } else {
                    self.push_event(WindowEventKind::InteractionIgnored, Some(tier), label, now);
                }
            }
            SignalTier::Presence => {
                tracing::debug!(target: TARGET, "Explicit presence event ignored (sampled per tick)");
            }
        }
    }

    /// One step of the fixed 1 s tick loop.
    ///
    /// Order matters: hidden pages close the window before anything can
    /// accrue; continuous activity refreshes the window before the accrual
    /// check; an open, unexpired window credits exactly one second.
    pub fn tick(&mut self) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();

        let visible = self.signals.is_page_visible();
        if !visible {
            if self.page_visible {
                self.push_event(WindowEventKind::PresenceLost, Some(SignalTier::Presence), None, now);
            }
            self.page_visible = false;
            if self.window_open {
                self.window_open = false;
                self.expires_at = None;
                self.push_event(WindowEventKind::Closed, Some(SignalTier::Presence), None, now);
            }
            return;
        }
        if !self.page_visible {
            self.push_event(
                WindowEventKind::PresenceRegained,
                Some(SignalTier::Presence),
                None,
                now,
            );
        }
        self.page_visible = true;

        if self.signals.is_continuous_active() {
            if !self.window_open {
                self.push_event(WindowEventKind::Opened, Some(SignalTier::Task), Some("continuous"), now);
            }
            self.window_open = true;
            self.expires_at = Some(now + self.config.window_extension);
        }

        if self.window_open {
            if self.expires_at.is_some_and(|e| e > now) {
                self.total_engaged_seconds += 1;
                self.unflushed_seconds += 1;
            } else {
                self.window_open = false;
                self.expires_at = None;
                self.push_event(WindowEventKind::Expired, None, None, now);
            }
        }
    }

    /// Reports buffered seconds through the callback and zeroes the buffer.
    ///
    /// Returns the delta that was flushed. A zero buffer is a no-op and
    /// the callback is not invoked.
    pub fn flush(&mut self) -> u64 {
        if self.unflushed_seconds == 0 {
            return 0;
        }
        let delta = self.unflushed_seconds;
        self.unflushed_seconds = 0;
        if let Some(on_update) = &self.on_update {
            on_update(delta);
        }
        tracing::debug!(target: TARGET, "Flushed {delta}s engagement delta");
        delta
    }

    fn push_event(
        &mut self,
        kind: WindowEventKind,
        tier: Option<SignalTier>,
        label: Option<&str>,
        at: DateTime<Utc>,
    ) {
        self.debug_events.push_front(WindowEvent {
            kind,
            tier,
            label: label.map(str::to_string),
            at,
        });
        self.debug_events.truncate(DEBUG_LOG_CAPACITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(ManualClock {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct MockSignals {
        hidden: AtomicBool,
        continuous: AtomicBool,
    }

    impl EngagementSignals for MockSignals {
        fn is_page_visible(&self) -> bool {
            !self.hidden.load(Ordering::SeqCst)
        }

        fn is_continuous_active(&self) -> bool {
            self.continuous.load(Ordering::SeqCst)
        }
    }

    fn tracker(
        clock: Arc<ManualClock>,
        signals: Arc<MockSignals>,
    ) -> EngagementTracker {
        EngagementTracker::new(EngagementConfig::default(), clock, signals)
    }

    /// Advances the clock one second and ticks, n times.
    fn run_ticks(t: &mut EngagementTracker, clock: &ManualClock, n: usize) {
        for _ in 0..n {
            clock.advance(Duration::from_secs(1));
            t.tick();
        }
    }

    #[test]
    fn task_event_opens_the_window() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, Some("recording_started"), None);

        assert!(t.is_window_open());
        assert_eq!(t.window_time_remaining(), 30);
    }

    #[test]
    fn window_expires_within_extension_plus_one_tick() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 31);

        assert!(!t.is_window_open());
        assert_eq!(t.window_time_remaining(), 0);
        // Every unexpired tick credited one second.
        assert!(t.total_engaged_seconds() >= 29 && t.total_engaged_seconds() <= 30);
    }

    #[test]
    fn window_time_remaining_rounds_partial_seconds_up() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, None, None);
        clock.advance(Duration::from_millis(29_500));

        // 500 ms left still counts as one whole second.
        assert_eq!(t.window_time_remaining(), 1);

        clock.advance(Duration::from_millis(600));
        assert_eq!(t.window_time_remaining(), 0);
    }

    #[test]
    fn interaction_cannot_open_a_closed_window() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Interaction, Some("keystroke"), None);

        assert!(!t.is_window_open());
        assert_eq!(
            t.debug_events().next().unwrap().kind,
            WindowEventKind::InteractionIgnored
        );
    }

    #[test]
    fn interaction_extends_an_open_window() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 20);
        assert!(t.window_time_remaining() <= 10);

        t.track_event(SignalTier::Interaction, Some("keystroke"), None);
        assert_eq!(t.window_time_remaining(), 30);
    }

    #[test]
    fn interaction_after_expiry_keeps_window_closed() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 31);
        assert!(!t.is_window_open());

        t.track_event(SignalTier::Interaction, None, None);
        assert!(!t.is_window_open());
    }

    #[test]
    fn hidden_page_closes_window_and_stops_accrual() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals.clone());

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 5);
        let before_hide = t.total_engaged_seconds();

        signals.hidden.store(true, Ordering::SeqCst);
        run_ticks(&mut t, &clock, 10);

        assert!(!t.is_window_open());
        assert_eq!(t.total_engaged_seconds(), before_hide);
        let kinds: Vec<_> = t.debug_events().map(|e| e.kind).collect();
        assert!(kinds.contains(&WindowEventKind::PresenceLost));
        assert!(kinds.contains(&WindowEventKind::Closed));
    }

    #[test]
    fn presence_regained_does_not_reopen_window() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals.clone());

        t.track_event(SignalTier::Task, None, None);
        signals.hidden.store(true, Ordering::SeqCst);
        run_ticks(&mut t, &clock, 2);
        signals.hidden.store(false, Ordering::SeqCst);
        run_ticks(&mut t, &clock, 2);

        // Visible again, but a fresh task event is needed to reopen.
        assert!(!t.is_window_open());
        assert_eq!(
            t.debug_events().next().map(|e| e.kind),
            Some(WindowEventKind::PresenceRegained)
        );
    }

    #[test]
    fn continuous_activity_credits_every_tick() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        signals.continuous.store(true, Ordering::SeqCst);
        let deltas: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = deltas.clone();
        let mut t = tracker(clock.clone(), signals)
            .with_on_update(Arc::new(move |d| sink.lock().unwrap().push(d)));

        // 45 ticks with a flush every 10, the runner's cadence.
        for i in 1..=45 {
            clock.advance(Duration::from_secs(1));
            t.tick();
            if i % 10 == 0 {
                t.flush();
            }
        }
        t.flush(); // final flush on unmount

        assert!(t.total_engaged_seconds() >= 45);
        let reported: Vec<u64> = deltas.lock().unwrap().clone();
        assert_eq!(reported.iter().sum::<u64>(), 45);
        assert!(reported.len() <= 45_usize.div_ceil(10) + 1);
    }

    #[test]
    fn flush_reports_deltas_not_totals() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let deltas: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = deltas.clone();
        let mut t = tracker(clock.clone(), signals)
            .with_on_update(Arc::new(move |d| sink.lock().unwrap().push(d)));

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 5);
        assert_eq!(t.flush(), 5);
        run_ticks(&mut t, &clock, 3);
        assert_eq!(t.flush(), 3);

        assert_eq!(*deltas.lock().unwrap(), vec![5, 3]);
        assert_eq!(t.total_engaged_seconds(), 8);
    }

    #[test]
    fn empty_flush_skips_the_callback() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let calls: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let mut t = tracker(clock, signals)
            .with_on_update(Arc::new(move |d| sink.lock().unwrap().push(d)));

        assert_eq!(t.flush(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_ring_is_bounded_and_newest_first() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        for _ in 0..60 {
            t.track_event(SignalTier::Interaction, Some("keystroke"), None);
        }
        t.track_event(SignalTier::Task, Some("latest"), None);

        assert_eq!(t.debug_events().count(), DEBUG_LOG_CAPACITY);
        let newest = t.debug_events().next().unwrap();
        assert_eq!(newest.label.as_deref(), Some("latest"));

        t.clear_debug_events();
        assert_eq!(t.debug_events().count(), 0);
    }

    #[test]
    fn disabled_tracker_ignores_everything() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let config = EngagementConfig {
            enabled: false,
            ..EngagementConfig::default()
        };
        let mut t = EngagementTracker::new(config, clock.clone(), signals);

        t.track_event(SignalTier::Task, None, None);
        run_ticks(&mut t, &clock, 10);

        assert!(!t.is_window_open());
        assert_eq!(t.total_engaged_seconds(), 0);
    }

    #[test]
    fn custom_event_duration_overrides_extension() {
        let clock = ManualClock::new();
        let signals = Arc::new(MockSignals::default());
        let mut t = tracker(clock.clone(), signals);

        t.track_event(SignalTier::Task, None, Some(Duration::from_secs(60)));
        assert_eq!(t.window_time_remaining(), 60);
    }
}
