// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Type registry and codec dispatch.
//!
//! The registry is the application-supplied lookup table that turns a stable
//! type name into something loadable and back. It is built once at startup
//! and shared immutably across sessions; dispatch through it is a pure
//! lookup with a fail-fast contract — an unknown name aborts the decode,
//! never yields a placeholder object.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::{ReadContext, WriteContext};
use crate::error::{CodecError, FormatKind};
use crate::identity::SharedValue;

/// A (stable name, loadable type) pair.
///
/// The name is the only part that crosses the wire; the `TypeId` is the
/// reader- or writer-local loadable reference it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: &'static str,
    type_id: TypeId,
}

impl TypeDescriptor {
    /// Descriptor binding `name` to the concrete type `T`.
    #[must_use]
    pub fn of<T: Any>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
        }
    }

    /// Stable name written to the stream.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Local loadable reference.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether this descriptor denotes the concrete type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

/// A typed codec: the unit of work for one concrete type.
///
/// Codecs are referentially transparent over their context — no side effect
/// beyond stream position advancement and identity-table bookkeeping. A
/// codec for a composite type delegates nested fields back through the
/// context without knowing how those nested codecs manage identity or
/// laziness.
pub trait Codec: Send + Sync + 'static {
    /// Concrete type this codec handles.
    type Value: Send + Sync + 'static;

    /// Serialize `value` into the write context.
    fn encode(&self, ctx: &mut WriteContext<'_>, value: &Arc<Self::Value>)
        -> Result<(), CodecError>;

    /// Materialize a value from the read context.
    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError>;
}

/// Object-safe codec surface used by dispatch.
pub trait DynCodec: Send + Sync {
    /// Serialize a type-erased value.
    fn encode_value(&self, ctx: &mut WriteContext<'_>, value: &SharedValue)
        -> Result<(), CodecError>;

    /// Materialize a type-erased value.
    fn decode_value(&self, ctx: &mut ReadContext<'_>) -> Result<SharedValue, CodecError>;
}

/// Bridges a typed [`Codec`] onto the object-safe [`DynCodec`] surface.
pub struct TypedCodecAdapter<C: Codec> {
    inner: C,
}

impl<C: Codec> TypedCodecAdapter<C> {
    /// Wrap a typed codec.
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Codec> DynCodec for TypedCodecAdapter<C> {
    fn encode_value(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &SharedValue,
    ) -> Result<(), CodecError> {
        let typed = value.clone().downcast::<C::Value>().map_err(|_| {
            ctx.format_error(FormatKind::UnexpectedType {
                expected: std::any::type_name::<C::Value>(),
                actual: format!("{:?}", (**value).type_id()),
            })
        })?;
        self.inner.encode(ctx, &typed)
    }

    fn decode_value(&self, ctx: &mut ReadContext<'_>) -> Result<SharedValue, CodecError> {
        let value = self.inner.decode(ctx)?;
        Ok(value)
    }
}

struct Entry {
    descriptor: TypeDescriptor,
    codec: Option<Arc<dyn DynCodec>>,
}

/// Builder for [`CodecRegistry`]; run once at startup.
#[derive(Default)]
pub struct CodecRegistryBuilder {
    entries: HashMap<&'static str, Entry>,
    names: HashMap<TypeId, &'static str>,
}

impl CodecRegistryBuilder {
    /// Start an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name-resolvable type with no codec of its own.
    ///
    /// Such types can appear as type descriptors in the stream (policy
    /// markers, implementation classes) but cannot be dispatched as values.
    #[must_use]
    pub fn register_type<T: Send + Sync + 'static>(mut self, name: &'static str) -> Self {
        let descriptor = TypeDescriptor::of::<T>(name);
        self.names.insert(descriptor.type_id(), name);
        self.entries.insert(
            name,
            Entry {
                descriptor,
                codec: None,
            },
        );
        self
    }

    /// Register a type together with its codec.
    #[must_use]
    pub fn register<C: Codec>(mut self, name: &'static str, codec: C) -> Self {
        let descriptor = TypeDescriptor::of::<C::Value>(name);
        self.names.insert(descriptor.type_id(), name);
        self.entries.insert(
            name,
            Entry {
                descriptor,
                codec: Some(Arc::new(TypedCodecAdapter::new(codec))),
            },
        );
        debug!(name, "registered codec");
        self
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            entries: self.entries,
            names: self.names,
        }
    }
}

/// Immutable name ↔ type ↔ codec lookup table.
///
/// Shared by reference across concurrent sessions; holds no session state.
/// Lookups return `Option` — the contexts turn misses into
/// [`CodecError::TypeResolution`] with the failing field path attached.
pub struct CodecRegistry {
    entries: HashMap<&'static str, Entry>,
    names: HashMap<TypeId, &'static str>,
}

impl CodecRegistry {
    /// Resolve a wire name to its local descriptor.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<TypeDescriptor> {
        self.entries.get(name).map(|entry| entry.descriptor)
    }

    /// Stable name registered for a local type.
    #[must_use]
    pub fn name_of(&self, type_id: TypeId) -> Option<&'static str> {
        self.names.get(&type_id).copied()
    }

    /// Codec registered under a wire name.
    #[must_use]
    pub fn codec(&self, name: &str) -> Option<Arc<dyn DynCodec>> {
        self.entries.get(name).and_then(|entry| entry.codec.clone())
    }

    /// Name and codec responsible for a runtime type.
    #[must_use]
    pub fn codec_for(&self, type_id: TypeId) -> Option<(&'static str, Arc<dyn DynCodec>)> {
        let name = self.name_of(type_id)?;
        let codec = self.codec(name)?;
        Some((name, codec))
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("types", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Probe;

    // ── 1. type-only registration resolves both directions ──────────────

    #[test]
    fn type_registration_resolves_both_ways() {
        let registry = CodecRegistryBuilder::new()
            .register_type::<Probe>("test.Probe")
            .build();
        let descriptor = registry.descriptor("test.Probe").unwrap();
        assert!(descriptor.is::<Probe>());
        assert_eq!(descriptor.name(), "test.Probe");
        assert_eq!(registry.name_of(TypeId::of::<Probe>()), Some("test.Probe"));
        assert!(registry.codec("test.Probe").is_none());
    }

    // ── 2. unknown names miss cleanly ───────────────────────────────────

    #[test]
    fn unknown_name_misses() {
        let registry = CodecRegistryBuilder::new().build();
        assert!(registry.descriptor("nope").is_none());
        assert!(registry.name_of(TypeId::of::<Probe>()).is_none());
        assert!(registry.is_empty());
    }
}
