//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Nominal tick period. 16ms gives 62.5 ticks per second, not a clean 60.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Smallest tick delta the simulation will integrate (seconds)
pub const MIN_TICK_DELTA: f32 = 0.001;

/// Largest tick delta the simulation will integrate (seconds)
pub const MAX_TICK_DELTA: f32 = 0.5;

/// Whether a measured tick delta is safe to integrate.
///
/// Deltas outside `[MIN_TICK_DELTA, MAX_TICK_DELTA]` come from timer jitter or
/// a stalled runtime and would produce an explosive integration step.
pub fn accept_tick_delta(dt: f32) -> bool {
    dt.is_finite() && (MIN_TICK_DELTA..=MAX_TICK_DELTA).contains(&dt)
}

/// Measures wall-clock time between tick firings
#[derive(Debug, Clone)]
pub struct TickClock {
    last: Instant,
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or construction), restarting the clock
    pub fn lap(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        // Whole milliseconds, so the guard sees the same resolution the timer runs at
        dt.as_millis() as f32 / 1000.0
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
