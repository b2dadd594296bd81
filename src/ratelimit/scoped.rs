//! Namespace-bound limiter handles.

use std::sync::Arc;
use std::time::Instant;

use super::registry::LimiterRegistry;
use crate::error::Result;

/// An outbound request that knows its remote action name.
pub trait ApiAction {
    fn action(&self) -> &str;
}

impl ApiAction for str {
    fn action(&self) -> &str {
        self
    }
}

impl ApiAction for String {
    fn action(&self) -> &str {
        self
    }
}

/// A registry handle fixed to one namespace.
///
/// Service clients hold one of these per resource type so every call site
/// only names its action.
#[derive(Clone)]
pub struct ScopedLimiter {
    registry: Arc<LimiterRegistry>,
    namespace: String,
}

impl ScopedLimiter {
    pub fn new(registry: Arc<LimiterRegistry>, namespace: impl Into<String>) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    /// Block until `action` has capacity in this namespace.
    pub fn acquire(&self, action: &str) {
        self.registry.acquire(&self.namespace, action);
    }

    /// Block until the request's action has capacity in this namespace.
    pub fn acquire_for<R: ApiAction + ?Sized>(&self, request: &R) {
        self.acquire(request.action());
    }

    pub fn acquire_until(&self, action: &str, deadline: Instant) -> Result<()> {
        self.registry.acquire_until(&self.namespace, action, deadline)
    }

    pub async fn acquire_async(&self, action: &str) {
        self.registry.acquire_async(&self.namespace, action).await;
    }

    pub fn try_acquire(&self, action: &str) -> bool {
        self.registry.try_acquire(&self.namespace, action)
    }
}

impl std::fmt::Debug for ScopedLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedLimiter")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Acquire using the calling source file's stem as the namespace.
///
/// `acquire!(registry, "DescribeInstances")` in `service_cvm.rs` waits on
/// `service_cvm.DescribeInstances`.
#[macro_export]
macro_rules! acquire {
    ($registry:expr, $action:expr) => {
        $registry.acquire($crate::namespace_from_path(file!()), $action)
    };
}
