// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared-identity tables.
//!
//! One table per session, never shared across sessions. Both sides assign
//! dense indexes in first-encounter order over the same depth-first
//! traversal, so index *n* denotes the same object on both sides without
//! any coordination beyond the call sequence. Dropping a session drops its
//! table wholesale; no partially-registered entry ever escapes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::ConsistencyKind;

/// A type-erased, shareable graph value.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Marker byte starting a new-object identity block.
pub const MARKER_NEW: u8 = 0x00;
/// Marker byte starting a back-reference identity block.
pub const MARKER_BACKREF: u8 = 0x01;

/// Identity of a graph value as observed by reference equality.
///
/// Derived from the `Arc` data pointer, so clones of the same allocation
/// collapse to one token while structurally equal but distinct allocations
/// do not. Tokens are only meaningful while the corresponding `Arc` is
/// alive; the write table keeps no `Arc` itself, so callers keep the graph
/// alive for the duration of the encode session (they always do — they are
/// encoding it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityToken(usize);

impl IdentityToken {
    /// Token for the allocation behind `value`.
    #[must_use]
    pub fn of<T: ?Sized>(value: &Arc<T>) -> Self {
        Self(Arc::as_ptr(value).cast::<()>() as usize)
    }
}

/// Write-side identity table: token → dense index, first-encounter order.
#[derive(Debug, Default)]
pub struct WriteIdentities {
    indexes: FxHashMap<IdentityToken, u32>,
}

impl WriteIdentities {
    /// Index previously assigned to `token`, if any.
    #[must_use]
    pub fn index_of(&self, token: IdentityToken) -> Option<u32> {
        self.indexes.get(&token).copied()
    }

    /// Assign the next dense index to `token`.
    ///
    /// Callers check [`index_of`](Self::index_of) first; assigning the same
    /// token twice would skew the dense ordering both sides rely on.
    pub fn assign(&mut self, token: IdentityToken) -> u32 {
        let index = u32::try_from(self.indexes.len()).unwrap_or(u32::MAX);
        self.indexes.insert(token, index);
        index
    }

    /// Number of identities assigned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether no identity has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Read-side identity table: dense slots filled as payloads materialize.
///
/// A slot is reserved (empty) before its payload is read so that nested
/// objects inside the payload receive the same indexes the writer assigned
/// them. A back-reference into an empty slot means the writer produced a
/// cycle the reader cannot honor, which is a traversal divergence.
#[derive(Default)]
pub struct ReadIdentities {
    slots: Vec<Option<SharedValue>>,
}

impl fmt::Debug for ReadIdentities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadIdentities")
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl ReadIdentities {
    /// Reserve the next dense slot, returning its index.
    pub fn reserve(&mut self) -> u32 {
        self.slots.push(None);
        u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
    }

    /// Register the materialized value for a reserved slot.
    pub fn register(&mut self, index: u32, value: SharedValue) -> Result<(), ConsistencyKind> {
        let slot = self
            .slots
            .get_mut(usize::try_from(index).unwrap_or(usize::MAX))
            .ok_or(ConsistencyKind::SlotMissing { index })?;
        *slot = Some(value);
        Ok(())
    }

    /// Look up a previously materialized value.
    pub fn get(&self, index: u32) -> Result<SharedValue, ConsistencyKind> {
        match self.slots.get(usize::try_from(index).unwrap_or(usize::MAX)) {
            None => Err(ConsistencyKind::BackrefUnassigned { index }),
            Some(None) => Err(ConsistencyKind::BackrefInFlight { index }),
            Some(Some(value)) => Ok(value.clone()),
        }
    }

    /// Index the next [`reserve`](Self::reserve) call would return.
    #[must_use]
    pub fn next_index(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    /// Number of distinct identities seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no identity has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. clones of one Arc share a token, fresh allocations do not ────

    #[test]
    fn token_tracks_allocation_not_value() {
        let a = Arc::new(42_u32);
        let b = Arc::clone(&a);
        let c = Arc::new(42_u32);
        assert_eq!(IdentityToken::of(&a), IdentityToken::of(&b));
        assert_ne!(IdentityToken::of(&a), IdentityToken::of(&c));
    }

    // ── 2. unsized coercion preserves the token ─────────────────────────

    #[test]
    fn token_survives_type_erasure() {
        let typed = Arc::new("shared".to_string());
        let erased: SharedValue = typed.clone();
        assert_eq!(IdentityToken::of(&typed), IdentityToken::of(&erased));
    }

    // ── 3. write table assigns dense first-encounter indexes ────────────

    #[test]
    fn write_table_assigns_dense_indexes() {
        let a = Arc::new(1_u8);
        let b = Arc::new(2_u8);
        let mut table = WriteIdentities::default();
        assert_eq!(table.index_of(IdentityToken::of(&a)), None);
        assert_eq!(table.assign(IdentityToken::of(&a)), 0);
        assert_eq!(table.assign(IdentityToken::of(&b)), 1);
        assert_eq!(table.index_of(IdentityToken::of(&a)), Some(0));
        assert_eq!(table.len(), 2);
    }

    // ── 4. read table lifecycle: reserve, register, get ─────────────────

    #[test]
    fn read_table_lifecycle() {
        let mut table = ReadIdentities::default();
        let index = table.reserve();
        assert_eq!(index, 0);
        assert_eq!(
            table.get(index).unwrap_err(),
            ConsistencyKind::BackrefInFlight { index: 0 }
        );
        let value: SharedValue = Arc::new("materialized".to_string());
        table.register(index, value).unwrap();
        let got = table.get(index).unwrap();
        assert!(got.downcast::<String>().is_ok());
    }

    // ── 5. back-reference to unassigned index is a consistency error ────

    #[test]
    fn unassigned_backref_is_consistency_error() {
        let table = ReadIdentities::default();
        assert_eq!(
            table.get(3).unwrap_err(),
            ConsistencyKind::BackrefUnassigned { index: 3 }
        );
    }
}
