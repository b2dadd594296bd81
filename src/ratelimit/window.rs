//! Fixed-window counter implementation.

use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// Window length used for every registry limiter.
pub const ONE_SECOND: Duration = Duration::from_secs(1);

/// A counter that admits at most `limit` calls per fixed window.
///
/// The window restarts lazily: the first observation after it expires resets
/// the count. Count and window start share one lock so a rollover and an
/// admission can never interleave.
#[derive(Debug)]
pub struct FixedWindow {
    limit: NonZeroU32,
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    count: u32,
    started: Instant,
}

impl WindowState {
    fn roll(&mut self, window: Duration) {
        if self.started.elapsed() >= window {
            self.count = 0;
            self.started = Instant::now();
        }
    }
}

impl FixedWindow {
    /// Create a new counter.
    pub fn new(limit: NonZeroU32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                count: 0,
                started: Instant::now(),
            }),
        }
    }

    /// Admit one call if the current window has capacity.
    ///
    /// Returns `false` without touching the count when the window is full.
    pub fn try_take(&self) -> bool {
        let mut state = self.state.lock();
        state.roll(self.window);

        if state.count < self.limit.get() {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// Check whether one more call would exceed the limit right now.
    pub fn would_exceed(&self) -> bool {
        let mut state = self.state.lock();
        state.roll(self.window);
        state.count >= self.limit.get()
    }

    /// Calls admitted in the current window.
    pub fn current_count(&self) -> u32 {
        let mut state = self.state.lock();
        state.roll(self.window);
        state.count
    }

    /// Calls still available in the current window.
    pub fn remaining(&self) -> u32 {
        self.limit.get().saturating_sub(self.current_count())
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self) -> Duration {
        let state = self.state.lock();
        self.window.saturating_sub(state.started.elapsed())
    }
}
