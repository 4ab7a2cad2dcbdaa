// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decode-session service locator.
//!
//! Some constructor arguments of decoded entities are never serialized:
//! they are collaborator references supplied fresh by the *decoding*
//! session. The locator is consulted during decode only; the write side
//! never sees it, which is what makes the asymmetry deliberate rather than
//! accidental.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::identity::SharedValue;

/// Typed service locator for one decode session.
///
/// Keyed by concrete service type. Registration happens before the session
/// starts; the registry is immutable while a decode is running.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, SharedValue>,
}

impl ServiceRegistry {
    /// Start an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance, replacing any previous one of the
    /// same type.
    #[must_use]
    pub fn provide<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }

    /// Look up a service by type.
    #[must_use]
    pub fn lookup<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.clone().downcast::<T>().ok())
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no service is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Clock {
        now: u64,
    }

    // ── 1. lookup returns the registered instance ───────────────────────

    #[test]
    fn lookup_returns_registered_instance() {
        let clock = Arc::new(Clock { now: 9 });
        let services = ServiceRegistry::new().provide(clock.clone());
        let found = services.lookup::<Clock>().unwrap();
        assert_eq!(found.now, 9);
        assert!(Arc::ptr_eq(&clock, &found));
    }

    // ── 2. missing service is None, not an error ────────────────────────

    #[test]
    fn missing_service_is_none() {
        let services = ServiceRegistry::new();
        assert!(services.lookup::<Clock>().is_none());
        assert!(services.is_empty());
    }
}
