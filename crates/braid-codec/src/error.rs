// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session-fatal error taxonomy.
//!
//! Nothing in this module is locally recoverable: a codec that hits any of
//! these aborts the whole encode or decode session. Errors carry the field
//! path at which they originated so the caller can report *where* in the
//! graph the session died, not just why.

use core::fmt;
use thiserror::Error;

/// Dot-joined path of field labels from the graph root to the failure site.
///
/// Captured by the write/read contexts at the moment an error is built.
/// An empty path renders as `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub(crate) fn from_trace(trace: &[String]) -> Self {
        Self {
            segments: trace.to_vec(),
        }
    }

    /// Field labels from root to failure site, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("root");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Malformed, truncated, or out-of-range stream data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatKind {
    /// Attempted to read beyond the end of the stream.
    #[error("stream truncated")]
    Truncated,
    /// A var-int ran past its maximum encoded width.
    #[error("var-int exceeds 5 bytes")]
    VarIntOverflow,
    /// A length prefix exceeded the bound for its call site.
    #[error("length {len} exceeds bound {max}")]
    LengthTooLarge {
        /// Length read from the stream.
        len: u64,
        /// Maximum the call site allows.
        max: u64,
    },
    /// String payload was not valid UTF-8.
    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,
    /// Boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    /// Identity-block marker byte was neither new-object nor back-reference.
    #[error("invalid identity marker byte {0:#04x}")]
    InvalidMarker(u8),
    /// Enumeration ordinal fell outside the reader-side variant list.
    #[error("ordinal {ordinal} out of range for {enum_name} ({variant_count} variants)")]
    EnumOrdinalOutOfRange {
        /// Ordinal read from the stream.
        ordinal: u32,
        /// Number of variants the reader knows.
        variant_count: usize,
        /// Rust path of the enumeration type.
        enum_name: &'static str,
    },
    /// An enumeration value was absent from its own `VARIANTS` list.
    #[error("value of {enum_name} is not listed in its variant table")]
    UnlistedEnumVariant {
        /// Rust path of the enumeration type.
        enum_name: &'static str,
    },
    /// A decoded value had a different runtime type than the call site expects.
    #[error("decoded value of type {actual:?} where {expected} was expected")]
    UnexpectedType {
        /// Rust path of the expected type.
        expected: &'static str,
        /// Type name found in the stream.
        actual: String,
    },
    /// Bytes remained after the root value was fully decoded.
    #[error("{remaining} trailing bytes after root value")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },
}

/// Divergence between the encode and decode traversal algorithms.
///
/// These are never data-dependent: identical writer and reader logic cannot
/// produce them, so hitting one means the two sides disagree about the
/// traversal itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsistencyKind {
    /// Back-reference to an identity index no session ever assigned.
    #[error("back-reference to unassigned identity index {index}")]
    BackrefUnassigned {
        /// Index read from the stream.
        index: u32,
    },
    /// Back-reference to an identity slot still being materialized.
    #[error("back-reference to identity index {index} still materializing")]
    BackrefInFlight {
        /// Index read from the stream.
        index: u32,
    },
    /// A new-object marker carried an index out of dense first-encounter order.
    #[error("new-object index {index} where dense order requires {expected}")]
    IndexNotDense {
        /// Index read from the stream.
        index: u32,
        /// Next index the reader-side table would assign.
        expected: u32,
    },
    /// An identity slot vanished between reservation and registration.
    #[error("identity slot {index} missing at registration")]
    SlotMissing {
        /// Index the payload reader tried to register.
        index: u32,
    },
}

/// Terminal failure of an encode or decode session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A type name in the stream (or a runtime type at encode) has no
    /// registry entry. The session aborts with no partial objects.
    #[error("[TYPE_UNRESOLVED] type {name:?} is not registered (at {path})")]
    TypeResolution {
        /// Type name that failed to resolve.
        name: String,
        /// Field path at the failure site.
        path: FieldPath,
    },
    /// Malformed, truncated, or out-of-range stream data.
    #[error("[FORMAT] {kind} (at {path})")]
    Format {
        /// What was wrong with the data.
        kind: FormatKind,
        /// Field path at the failure site.
        path: FieldPath,
    },
    /// Writer/reader traversal divergence. Always a programming-logic
    /// failure, never recoverable by retrying with different data.
    #[error("[CONSISTENCY] {kind} (at {path})")]
    Consistency {
        /// Which identity invariant broke.
        kind: ConsistencyKind,
        /// Field path at the failure site.
        path: FieldPath,
    },
}
