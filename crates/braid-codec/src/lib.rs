// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Object-graph codec framework with shared-identity preservation.
//!
//! `braid-codec` writes arbitrary in-memory object graphs to a byte stream
//! and reconstructs them exactly: two fields that pointed at the same object
//! before serialization point at the same reconstructed object afterwards.
//! Polymorphic types resolve by stable name through an application-built
//! [`CodecRegistry`], and deferred values travel as [`LazyCell`]s without
//! their computation ever being forced by serialization.
//!
//! # Sharing Invariant
//!
//! Both sides assign dense identity indexes in first-encounter order over
//! the same depth-first traversal. Index *n* therefore denotes the same
//! object on both sides with no coordination beyond the call sequence; the
//! wire still carries the index so traversal divergence is caught as a
//! consistency error instead of silent graph corruption.
//!
//! # Failure Policy
//!
//! Nothing here is locally recoverable. Unresolvable type names, malformed
//! data, and identity-table divergence each abort the whole session as a
//! single [`CodecError`] carrying the originating field path. Retry policy
//! belongs to whatever layer decided to (re)serialize.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod context;
mod error;
mod identity;
mod lazy;
mod registry;
mod services;
mod stream;
mod tagged;

pub use context::{ReadContext, WriteContext};
pub use error::{CodecError, ConsistencyKind, FieldPath, FormatKind};
pub use identity::{
    IdentityToken, ReadIdentities, SharedValue, WriteIdentities, MARKER_BACKREF, MARKER_NEW,
};
pub use lazy::{LazyCell, LazyCellCodec};
pub use registry::{
    Codec, CodecRegistry, CodecRegistryBuilder, DynCodec, TypeDescriptor, TypedCodecAdapter,
};
pub use services::ServiceRegistry;
pub use stream::{ByteReader, ByteWriter, MAX_BYTES_LEN, MAX_STRING_LEN};
pub use tagged::TaggedEnum;

use std::sync::Arc;

/// Encode one root value into a fresh byte vector.
///
/// Runs a complete encode session: a fresh identity table is created for
/// the call and discarded when it returns.
pub fn encode_to_vec(
    registry: &CodecRegistry,
    value: &SharedValue,
) -> Result<Vec<u8>, CodecError> {
    let mut ctx = WriteContext::new(registry);
    ctx.write_value(value)?;
    Ok(ctx.finish())
}

/// Decode one root value from a byte slice, consuming it fully.
///
/// Runs a complete decode session against the given service locator;
/// trailing bytes after the root value fail the session.
pub fn decode_from_bytes(
    registry: &CodecRegistry,
    services: Arc<ServiceRegistry>,
    bytes: &[u8],
) -> Result<SharedValue, CodecError> {
    let mut ctx = ReadContext::new(registry, services, bytes);
    let value = ctx.read_value()?;
    ctx.finish()?;
    Ok(value)
}

/// Decode one root value and downcast it to `T`.
pub fn decode_from_bytes_as<T: Send + Sync + 'static>(
    registry: &CodecRegistry,
    services: Arc<ServiceRegistry>,
    bytes: &[u8],
) -> Result<Arc<T>, CodecError> {
    let mut ctx = ReadContext::new(registry, services, bytes);
    let value = ctx.read_value_of::<T>()?;
    ctx.finish()?;
    Ok(value)
}
