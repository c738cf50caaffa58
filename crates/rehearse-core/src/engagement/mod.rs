//! Engagement tracking module.
//!
//! Computes "engaged seconds" from tiered signals using a decaying
//! attention window, independently of render cycles. The tracker pushes
//! periodic deltas into the session store through a single callback; there
//! is no other shared state between the two subsystems.

mod clock;
mod runner;
mod tracker;

pub use clock::{Clock, SystemClock};
pub use runner::{EngagementRunner, TICK_PERIOD};
pub use tracker::{
    EngagementConfig, EngagementSignals, EngagementTracker, OnUpdate, SignalTier, WindowEvent,
    WindowEventKind, DEBUG_LOG_CAPACITY, DEFAULT_FLUSH_INTERVAL, DEFAULT_WINDOW_EXTENSION,
};
