//! Per-action rate limiting logic and state management.

mod backoff;
mod key;
mod registry;
mod scoped;
mod window;

pub use backoff::Backoff;
pub use key::{namespace_from_path, ActionKey};
pub use registry::LimiterRegistry;
pub use scoped::{ApiAction, ScopedLimiter};
pub use window::{FixedWindow, ONE_SECOND};
