//! Core registry of per-action limiters.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::backoff::Backoff;
use super::key::ActionKey;
use super::scoped::ScopedLimiter;
use super::window::{FixedWindow, ONE_SECOND};
use crate::config::LimiterConfig;
use crate::error::{Result, ThrottleError};

/// Owns one fixed-window limiter per `"<namespace>.<action>"` key.
///
/// Limits are resolved the first time a key is seen, in priority order:
/// an exact composite-key entry, then the namespace entry, then the global
/// default. The resolved value is written back under the composite key and
/// the limiter built from it is reused for the life of the registry.
///
/// A single lock guards both the table and the limiters. It is held only
/// for lookup and insertion, never while a caller waits for capacity.
pub struct LimiterRegistry {
    state: Mutex<RegistryState>,
    default_limit: NonZeroU32,
    backoff: Backoff,
    wait_warning_threshold: Duration,
}

#[derive(Default)]
struct RegistryState {
    /// Table entries, plus every resolved composite key
    limits: HashMap<String, NonZeroU32>,
    /// Limiters indexed by composite key
    limiters: HashMap<String, Arc<FixedWindow>>,
}

impl RegistryState {
    fn resolve(&mut self, key: &ActionKey, composite: &str, default: NonZeroU32) -> NonZeroU32 {
        if let Some(limit) = self.limits.get(composite) {
            return *limit;
        }

        let limit = self
            .limits
            .get(&key.namespace)
            .copied()
            .unwrap_or(default);
        self.limits.insert(composite.to_string(), limit);
        limit
    }
}

impl LimiterRegistry {
    /// Create a registry from a validated configuration.
    pub fn new(config: LimiterConfig) -> Result<Self> {
        config.validate()?;

        let default_limit = non_zero("default_limit", config.default_limit)?;
        let mut state = RegistryState::default();
        for (key, limit) in &config.limits {
            state.limits.insert(key.clone(), non_zero(key, *limit)?);
        }

        debug!(
            entries = state.limits.len(),
            default_limit = default_limit.get(),
            "Limit table loaded"
        );

        Ok(Self {
            state: Mutex::new(state),
            default_limit,
            backoff: Backoff::from(&config.backoff),
            wait_warning_threshold: config.wait_warning_threshold(),
        })
    }

    /// Block the current thread until `namespace.action` has capacity.
    ///
    /// This never fails. A caller that keeps waiting past the warning
    /// threshold is logged on every retry, but keeps waiting.
    pub fn acquire(&self, namespace: &str, action: &str) {
        let key = ActionKey::new(namespace, action);
        let limiter = self.limiter_for(&key);
        let started = Instant::now();

        while !limiter.try_take() {
            std::thread::sleep(self.retry_delay(&key, &limiter, started));
        }

        admitted(&key, started);
    }

    /// Like [`acquire`](Self::acquire), but gives up once `deadline` passes.
    ///
    /// A call with capacity available succeeds even if the deadline is
    /// already in the past.
    pub fn acquire_until(&self, namespace: &str, action: &str, deadline: Instant) -> Result<()> {
        let key = ActionKey::new(namespace, action);
        let limiter = self.limiter_for(&key);
        let started = Instant::now();

        while !limiter.try_take() {
            let left = time_left(&key, started, deadline)?;
            std::thread::sleep(self.retry_delay(&key, &limiter, started).min(left));
        }

        admitted(&key, started);
        Ok(())
    }

    /// Wait asynchronously until `namespace.action` has capacity.
    ///
    /// Dropping the future abandons the wait without consuming capacity.
    pub async fn acquire_async(&self, namespace: &str, action: &str) {
        let key = ActionKey::new(namespace, action);
        let limiter = self.limiter_for(&key);
        let started = Instant::now();

        while !limiter.try_take() {
            tokio::time::sleep(self.retry_delay(&key, &limiter, started)).await;
        }

        admitted(&key, started);
    }

    /// Async form of [`acquire_until`](Self::acquire_until).
    pub async fn acquire_async_until(
        &self,
        namespace: &str,
        action: &str,
        deadline: Instant,
    ) -> Result<()> {
        let key = ActionKey::new(namespace, action);
        let limiter = self.limiter_for(&key);
        let started = Instant::now();

        while !limiter.try_take() {
            let left = time_left(&key, started, deadline)?;
            tokio::time::sleep(self.retry_delay(&key, &limiter, started).min(left)).await;
        }

        admitted(&key, started);
        Ok(())
    }

    /// Take capacity for `namespace.action` only if it is available now.
    pub fn try_acquire(&self, namespace: &str, action: &str) -> bool {
        self.limiter_for(&ActionKey::new(namespace, action)).try_take()
    }

    /// Add or replace a table entry.
    ///
    /// Keys that already have a limiter keep the limit they were resolved
    /// with; the new value is ignored for them.
    pub fn set_limit(&self, key: impl Into<String>, limit: u32) -> Result<()> {
        let key = key.into();
        let limit = non_zero(&key, limit)?;

        let mut state = self.state.lock();
        if state.limiters.contains_key(&key) {
            warn!(
                key = %key,
                limit = limit.get(),
                "Ignoring limit change for a key that is already in use"
            );
            return Ok(());
        }

        state.limits.insert(key, limit);
        Ok(())
    }

    /// The table entry for a bare namespace or composite key, if any.
    pub fn configured_limit(&self, key: &str) -> Option<u32> {
        self.state.lock().limits.get(key).map(|limit| limit.get())
    }

    /// Resolve the effective limit for `namespace.action`.
    ///
    /// This registers the key exactly as a first [`acquire`](Self::acquire)
    /// would, without consuming capacity.
    pub fn resolve_limit(&self, namespace: &str, action: &str) -> u32 {
        self.limiter_for(&ActionKey::new(namespace, action)).limit()
    }

    /// The limiter for `namespace.action`, if one has been created.
    pub fn limiter(&self, namespace: &str, action: &str) -> Option<Arc<FixedWindow>> {
        let composite = ActionKey::new(namespace, action).composite();
        self.state.lock().limiters.get(&composite).cloned()
    }

    /// Get the number of active limiters.
    pub fn limiter_count(&self) -> usize {
        self.state.lock().limiters.len()
    }

    /// A handle that acquires under a fixed namespace.
    pub fn scoped(self: &Arc<Self>, namespace: impl Into<String>) -> ScopedLimiter {
        ScopedLimiter::new(Arc::clone(self), namespace)
    }

    /// Get or create the limiter for a key.
    fn limiter_for(&self, key: &ActionKey) -> Arc<FixedWindow> {
        let composite = key.composite();
        let mut state = self.state.lock();

        if let Some(limiter) = state.limiters.get(&composite) {
            return Arc::clone(limiter);
        }

        let limit = state.resolve(key, &composite, self.default_limit);
        debug!(
            key = %key,
            limit = limit.get(),
            "Creating new action limiter"
        );

        let limiter = Arc::new(FixedWindow::new(limit, ONE_SECOND));
        state.limiters.insert(composite, Arc::clone(&limiter));
        limiter
    }

    fn retry_delay(&self, key: &ActionKey, limiter: &FixedWindow, started: Instant) -> Duration {
        let waited = started.elapsed();
        if waited >= self.wait_warning_threshold {
            warn!(
                key = %key,
                waited_secs = waited.as_secs(),
                "Waited too long for rate limit capacity, forcing a release to retry"
            );
        }

        self.backoff.delay(limiter.duration_until_reset())
    }
}

impl Default for LimiterRegistry {
    /// A registry over the built-in limit table.
    fn default() -> Self {
        Self::new(LimiterConfig::default()).expect("built-in limit table is valid")
    }
}

fn non_zero(key: &str, limit: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(limit).ok_or_else(|| ThrottleError::InvalidLimit {
        key: key.to_string(),
    })
}

fn time_left(key: &ActionKey, started: Instant, deadline: Instant) -> Result<Duration> {
    let now = Instant::now();
    if now >= deadline {
        debug!(key = %key, "Deadline reached while waiting for capacity");
        return Err(ThrottleError::DeadlineExceeded {
            key: key.to_string(),
            waited: now.duration_since(started),
        });
    }
    Ok(deadline - now)
}

fn admitted(key: &ActionKey, started: Instant) {
    trace!(
        key = %key,
        waited = ?started.elapsed(),
        "Action admitted"
    );
}
