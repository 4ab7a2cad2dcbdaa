// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lazily-computed value cells and their codec.
//!
//! A cell wraps a description of how to produce a value and, once some
//! consumer forces it, the cached result. Computation happens at most once,
//! under mutual exclusion, on first access. The codec serializes the
//! description — and the cached result when one is already present — but
//! never forces computation itself; that belongs to the consuming system,
//! possibly on threads the codec never sees.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::{ReadContext, WriteContext};
use crate::error::CodecError;
use crate::identity::SharedValue;
use crate::registry::Codec;

/// Deferred computation cell: description `D`, result `T`.
///
/// Lifecycle: created holding only the description; `force` computes at
/// most once (the mutex held for the duration of the producer is the
/// "computing" state); once computed, the result is cached for the cell's
/// lifetime. `peek` observes without forcing.
pub struct LazyCell<D, T> {
    description: Arc<D>,
    value: Mutex<Option<Arc<T>>>,
}

impl<D, T> LazyCell<D, T> {
    /// A cell that has never been computed.
    #[must_use]
    pub fn new(description: Arc<D>) -> Self {
        Self {
            description,
            value: Mutex::new(None),
        }
    }

    /// A cell reconstructed in the already-computed state.
    #[must_use]
    pub fn with_value(description: Arc<D>, value: Arc<T>) -> Self {
        Self {
            description,
            value: Mutex::new(Some(value)),
        }
    }

    /// The description of how to produce the value.
    #[must_use]
    pub fn description(&self) -> &Arc<D> {
        &self.description
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<T>>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached result, without forcing computation.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<T>> {
        self.lock().clone()
    }

    /// Whether the value has been computed.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.lock().is_some()
    }

    /// Force the value, computing it at most once.
    ///
    /// Concurrent first accesses serialize on the cell's mutex; exactly one
    /// of them runs `produce`, the rest observe its cached result.
    pub fn force(&self, produce: impl FnOnce(&D) -> T) -> Arc<T> {
        let mut guard = self.lock();
        if let Some(value) = guard.as_ref() {
            return value.clone();
        }
        let value = Arc::new(produce(&self.description));
        *guard = Some(value.clone());
        value
    }
}

impl<D, T> fmt::Debug for LazyCell<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCell")
            .field("computed", &self.is_computed())
            .finish_non_exhaustive()
    }
}

/// Codec for [`LazyCell`], delegating both halves through dispatch.
///
/// Encodes the description, then a presence flag, then the cached value iff
/// one exists — without ever forcing. Decode reconstructs a cell in the
/// same lifecycle state, ready for on-demand evaluation by consumers.
pub struct LazyCellCodec<D, T> {
    _marker: std::marker::PhantomData<fn() -> (D, T)>,
}

impl<D, T> LazyCellCodec<D, T> {
    /// Create the codec.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D, T> Default for LazyCellCodec<D, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, T> Codec for LazyCellCodec<D, T>
where
    D: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Value = LazyCell<D, T>;

    fn encode(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Arc<Self::Value>,
    ) -> Result<(), CodecError> {
        let description: SharedValue = value.description().clone();
        ctx.with_field("description", |ctx| ctx.write_value(&description))?;
        match value.peek() {
            Some(computed) => {
                ctx.write_bool(true);
                let computed: SharedValue = computed;
                ctx.with_field("value", |ctx| ctx.write_value(&computed))
            }
            None => {
                ctx.write_bool(false);
                Ok(())
            }
        }
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError> {
        let description = ctx.with_field("description", ReadContext::read_value_of::<D>)?;
        let computed = ctx.read_bool()?;
        if computed {
            let value = ctx.with_field("value", ReadContext::read_value_of::<T>)?;
            Ok(Arc::new(LazyCell::with_value(description, value)))
        } else {
            Ok(Arc::new(LazyCell::new(description)))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── 1. peek never forces ────────────────────────────────────────────

    #[test]
    fn peek_never_forces() {
        let cell: LazyCell<String, u64> = LazyCell::new(Arc::new("desc".to_string()));
        assert!(cell.peek().is_none());
        assert!(!cell.is_computed());
    }

    // ── 2. force computes at most once ──────────────────────────────────

    #[test]
    fn force_computes_at_most_once() {
        let calls = AtomicUsize::new(0);
        let cell: LazyCell<u32, u32> = LazyCell::new(Arc::new(20));
        let first = cell.force(|d| {
            calls.fetch_add(1, Ordering::SeqCst);
            d * 2
        });
        let second = cell.force(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            0
        });
        assert_eq!(*first, 40);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ── 3. concurrent first access computes exactly once ────────────────

    #[test]
    fn concurrent_first_access_computes_once() {
        let cell: Arc<LazyCell<u32, u32>> = Arc::new(LazyCell::new(Arc::new(7)));
        let calls: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    *cell.force(|d| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        d + 1
                    })
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 8);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // ── 4. already-computed cell reports its value ──────────────────────

    #[test]
    fn with_value_starts_computed() {
        let cell: LazyCell<String, u64> =
            LazyCell::with_value(Arc::new("desc".to_string()), Arc::new(99));
        assert!(cell.is_computed());
        assert_eq!(*cell.peek().unwrap(), 99);
        // force returns the cached value without running the producer
        assert_eq!(*cell.force(|_| 0), 99);
    }
}
