// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Encode and decode session contexts.
//!
//! A context owns everything one session needs: the byte stream, the
//! shared-identity table, a borrow of the registry, and the diagnostic
//! field-path trace. Sessions are strictly sequential — the identity-index
//! ordering invariant lives in the call sequence, so no two operations of
//! one session ever interleave. Independent sessions on separate threads
//! never share a context or a table. Dropping a context aborts its session;
//! the table goes with it and no partially-registered entry survives.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{CodecError, ConsistencyKind, FieldPath, FormatKind};
use crate::identity::{
    IdentityToken, ReadIdentities, SharedValue, WriteIdentities, MARKER_BACKREF, MARKER_NEW,
};
use crate::registry::{CodecRegistry, TypeDescriptor};
use crate::services::ServiceRegistry;
use crate::stream::{ByteReader, ByteWriter, MAX_BYTES_LEN};
use crate::tagged::TaggedEnum;

/// One encode session: graph in, bytes out.
#[derive(Debug)]
pub struct WriteContext<'a> {
    registry: &'a CodecRegistry,
    writer: ByteWriter,
    identities: WriteIdentities,
    trace: Vec<String>,
}

impl<'a> WriteContext<'a> {
    /// Start an encode session against `registry`.
    #[must_use]
    pub fn new(registry: &'a CodecRegistry) -> Self {
        Self {
            registry,
            writer: ByteWriter::default(),
            identities: WriteIdentities::default(),
            trace: Vec::new(),
        }
    }

    /// Start an encode session with a pre-allocated output buffer.
    #[must_use]
    pub fn with_capacity(registry: &'a CodecRegistry, capacity: usize) -> Self {
        Self {
            registry,
            writer: ByteWriter::with_capacity(capacity),
            identities: WriteIdentities::default(),
            trace: Vec::new(),
        }
    }

    /// Finish the session and take the encoded bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.writer.into_vec()
    }

    /// Abort the session, discarding the identity table and all output.
    pub fn abort(self) {
        debug!(
            identities = self.identities.len(),
            bytes = self.writer.len(),
            "encode session aborted"
        );
    }

    /// Number of distinct identities assigned so far.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Current field path, for diagnostics.
    #[must_use]
    pub fn path(&self) -> FieldPath {
        FieldPath::from_trace(&self.trace)
    }

    /// Run `body` with `field` pushed onto the diagnostic path.
    pub fn with_field<R>(
        &mut self,
        field: impl Into<String>,
        body: impl FnOnce(&mut Self) -> Result<R, CodecError>,
    ) -> Result<R, CodecError> {
        self.trace.push(field.into());
        let result = body(self);
        self.trace.pop();
        result
    }

    /// Build a format error at the current field path.
    #[must_use]
    pub fn format_error(&self, kind: FormatKind) -> CodecError {
        CodecError::Format {
            kind,
            path: self.path(),
        }
    }

    fn type_error(&self, name: impl Into<String>) -> CodecError {
        CodecError::TypeResolution {
            name: name.into(),
            path: self.path(),
        }
    }

    fn lift<T>(&self, result: Result<T, FormatKind>) -> Result<T, CodecError> {
        result.map_err(|kind| self.format_error(kind))
    }

    /// Write a boolean as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.writer.write_u8(u8::from(value));
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.writer.write_u8(value);
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.writer.write_u32_le(value);
    }

    /// Write a little-endian u64.
    pub fn write_u64(&mut self, value: u64) {
        self.writer.write_u64_le(value);
    }

    /// Write a compact var-u32.
    pub fn write_var_u32(&mut self, value: u32) {
        self.writer.write_var_u32(value);
    }

    /// Write length-prefixed raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let result = self.writer.write_len_prefixed(bytes, MAX_BYTES_LEN);
        self.lift(result)
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let result = self.writer.write_string(value);
        self.lift(result)
    }

    /// Write an enumeration value as its wire ordinal.
    pub fn write_enum<E: TaggedEnum>(&mut self, value: E) -> Result<(), CodecError> {
        let ordinal = value.ordinal().ok_or_else(|| {
            self.format_error(FormatKind::UnlistedEnumVariant {
                enum_name: std::any::type_name::<E>(),
            })
        })?;
        self.writer.write_var_u32(ordinal);
        Ok(())
    }

    /// Write a type descriptor as its stable name.
    pub fn write_type(&mut self, descriptor: TypeDescriptor) -> Result<(), CodecError> {
        let result = self.writer.write_string(descriptor.name());
        self.lift(result)
    }

    /// Dispatch a type-erased value through the registry.
    ///
    /// Writes the type name followed by the payload produced by the
    /// registered codec. Fails with a type-resolution error when the
    /// value's runtime type has no registered codec.
    pub fn write_value(&mut self, value: &SharedValue) -> Result<(), CodecError> {
        let type_id = (**value).type_id();
        let (name, codec) = self
            .registry
            .codec_for(type_id)
            .ok_or_else(|| self.type_error(format!("{type_id:?}")))?;
        self.write_string(name)?;
        self.with_field(name, |ctx| codec.encode_value(ctx, value))
    }

    /// Encode a payload exactly once per identity.
    ///
    /// First encounter of `token`: assign the next dense index, write the
    /// new-object marker and index, then run `payload` to serialize the
    /// object's fields. Every later encounter: write only a back-reference
    /// marker and the assigned index.
    pub fn encode_shared(
        &mut self,
        token: IdentityToken,
        payload: impl FnOnce(&mut Self) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        if let Some(index) = self.identities.index_of(token) {
            self.writer.write_u8(MARKER_BACKREF);
            self.writer.write_var_u32(index);
            return Ok(());
        }
        let index = self.identities.assign(token);
        trace!(index, "assigned identity index");
        self.writer.write_u8(MARKER_NEW);
        self.writer.write_var_u32(index);
        payload(self)
    }
}

/// One decode session: bytes in, graph out.
///
/// Carries the decoding session's own [`ServiceRegistry`] so composite
/// codecs can supply collaborator references that were never serialized.
#[derive(Debug)]
pub struct ReadContext<'a> {
    registry: &'a CodecRegistry,
    services: Arc<ServiceRegistry>,
    reader: ByteReader<'a>,
    identities: ReadIdentities,
    trace: Vec<String>,
}

impl<'a> ReadContext<'a> {
    /// Start a decode session over `bytes`.
    #[must_use]
    pub fn new(registry: &'a CodecRegistry, services: Arc<ServiceRegistry>, bytes: &'a [u8]) -> Self {
        Self {
            registry,
            services,
            reader: ByteReader::new(bytes),
            identities: ReadIdentities::default(),
            trace: Vec::new(),
        }
    }

    /// Finish the session, failing if unconsumed bytes remain.
    pub fn finish(self) -> Result<(), CodecError> {
        let remaining = self.reader.remaining();
        if remaining > 0 {
            return Err(CodecError::Format {
                kind: FormatKind::TrailingBytes { remaining },
                path: FieldPath::from_trace(&self.trace),
            });
        }
        Ok(())
    }

    /// Abort the session, discarding the identity table.
    pub fn abort(self) {
        debug!(
            identities = self.identities.len(),
            remaining = self.reader.remaining(),
            "decode session aborted"
        );
    }

    /// This decode session's service locator.
    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Number of distinct identities seen so far.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Current field path, for diagnostics.
    #[must_use]
    pub fn path(&self) -> FieldPath {
        FieldPath::from_trace(&self.trace)
    }

    /// Run `body` with `field` pushed onto the diagnostic path.
    pub fn with_field<R>(
        &mut self,
        field: impl Into<String>,
        body: impl FnOnce(&mut Self) -> Result<R, CodecError>,
    ) -> Result<R, CodecError> {
        self.trace.push(field.into());
        let result = body(self);
        self.trace.pop();
        result
    }

    /// Build a format error at the current field path.
    #[must_use]
    pub fn format_error(&self, kind: FormatKind) -> CodecError {
        CodecError::Format {
            kind,
            path: self.path(),
        }
    }

    fn type_error(&self, name: impl Into<String>) -> CodecError {
        CodecError::TypeResolution {
            name: name.into(),
            path: self.path(),
        }
    }

    fn consistency_error(&self, kind: ConsistencyKind) -> CodecError {
        CodecError::Consistency {
            kind,
            path: self.path(),
        }
    }

    fn lift<T>(&self, result: Result<T, FormatKind>) -> Result<T, CodecError> {
        result.map_err(|kind| self.format_error(kind))
    }

    /// Read a boolean byte, rejecting anything but 0 or 1.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        let result = self.reader.read_u8();
        match self.lift(result)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.format_error(FormatKind::InvalidBool(other))),
        }
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let result = self.reader.read_u8();
        self.lift(result)
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let result = self.reader.read_u32_le();
        self.lift(result)
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let result = self.reader.read_u64_le();
        self.lift(result)
    }

    /// Read a compact var-u32.
    pub fn read_var_u32(&mut self) -> Result<u32, CodecError> {
        let result = self.reader.read_var_u32();
        self.lift(result)
    }

    /// Read length-prefixed raw bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let result = self.reader.read_len_prefixed(MAX_BYTES_LEN).map(<[u8]>::to_vec);
        self.lift(result)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let result = self.reader.read_string();
        self.lift(result)
    }

    /// Read an enumeration value by wire ordinal, bounds-checked against
    /// the reader-side variant list.
    pub fn read_enum<E: TaggedEnum>(&mut self) -> Result<E, CodecError> {
        let ordinal = self.read_var_u32()?;
        E::from_ordinal(ordinal).ok_or_else(|| {
            self.format_error(FormatKind::EnumOrdinalOutOfRange {
                ordinal,
                variant_count: E::VARIANTS.len(),
                enum_name: std::any::type_name::<E>(),
            })
        })
    }

    /// Read a type name and resolve it through the registry.
    ///
    /// Fails the session with a type-resolution error when the name has no
    /// registry entry — no placeholder descriptor is ever produced.
    pub fn read_type(&mut self) -> Result<TypeDescriptor, CodecError> {
        let name = self.read_string()?;
        self.registry
            .descriptor(&name)
            .ok_or_else(|| self.type_error(name))
    }

    fn read_value_with_name(&mut self) -> Result<(String, SharedValue), CodecError> {
        let name = self.read_string()?;
        let codec = self
            .registry
            .codec(&name)
            .ok_or_else(|| self.type_error(name.clone()))?;
        let value = self.with_field(name.clone(), |ctx| codec.decode_value(ctx))?;
        Ok((name, value))
    }

    /// Read a type name and dispatch to its registered codec.
    pub fn read_value(&mut self) -> Result<SharedValue, CodecError> {
        let (_, value) = self.read_value_with_name()?;
        Ok(value)
    }

    /// Read a dispatched value and downcast it to `T`.
    pub fn read_value_of<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, CodecError> {
        let (name, value) = self.read_value_with_name()?;
        value.downcast::<T>().map_err(|_| {
            self.format_error(FormatKind::UnexpectedType {
                expected: std::any::type_name::<T>(),
                actual: name,
            })
        })
    }

    /// Decode a payload exactly once per identity, mirroring
    /// [`WriteContext::encode_shared`].
    ///
    /// A new-object marker reserves the next dense slot, runs `payload` to
    /// materialize the object, then registers it; the transmitted index
    /// must match the reserved one or the traversal has diverged. A
    /// back-reference marker returns the previously materialized object.
    pub fn decode_shared<T: Send + Sync + 'static>(
        &mut self,
        payload: impl FnOnce(&mut Self) -> Result<Arc<T>, CodecError>,
    ) -> Result<Arc<T>, CodecError> {
        let marker = self.read_u8()?;
        match marker {
            MARKER_BACKREF => {
                let index = self.read_var_u32()?;
                let value = self
                    .identities
                    .get(index)
                    .map_err(|kind| self.consistency_error(kind))?;
                value.downcast::<T>().map_err(|_| {
                    self.format_error(FormatKind::UnexpectedType {
                        expected: std::any::type_name::<T>(),
                        actual: format!("identity slot {index}"),
                    })
                })
            }
            MARKER_NEW => {
                let index = self.read_var_u32()?;
                let reserved = self.identities.reserve();
                if index != reserved {
                    return Err(self.consistency_error(ConsistencyKind::IndexNotDense {
                        index,
                        expected: reserved,
                    }));
                }
                trace!(index, "materializing identity index");
                let value = payload(self)?;
                let shared: SharedValue = value.clone();
                self.identities
                    .register(reserved, shared)
                    .map_err(|kind| self.consistency_error(kind))?;
                Ok(value)
            }
            other => Err(self.format_error(FormatKind::InvalidMarker(other))),
        }
    }
}
