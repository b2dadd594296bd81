//! Action Throttle - client-side rate limiting for cloud API calls
//!
//! Every outbound API call is throttled per `"<namespace>.<action>"` key.
//! Limits come from a static table (exact key, then namespace, then a
//! global default of 20 calls per second), are resolved the first time a
//! key is used, and are enforced by a one-second fixed window. Callers
//! block until the window has capacity.
//!
//! ```no_run
//! use action_throttle::{LimiterConfig, LimiterRegistry};
//!
//! let registry = LimiterRegistry::new(LimiterConfig::default())?;
//! registry.acquire("service_vod", "CreateProcedureTemplate");
//! // issue the real request here
//! # Ok::<(), action_throttle::ThrottleError>(())
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;

pub use config::{BackoffConfig, LimiterConfig, DEFAULT_LIMIT};
pub use error::{Result, ThrottleError};
pub use ratelimit::{
    namespace_from_path, ActionKey, ApiAction, FixedWindow, LimiterRegistry, ScopedLimiter,
};
