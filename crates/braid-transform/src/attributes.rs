// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable attribute sets.
//!
//! Attribute containers are interned by the surrounding system and
//! frequently shared between descriptors, so their codec preserves identity:
//! a container referenced from ten descriptors serializes once and decodes
//! to one shared instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use braid_codec::{Codec, CodecError, FormatKind, IdentityToken, ReadContext, WriteContext};

/// Immutable, deterministically ordered attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeContainer {
    entries: BTreeMap<String, String>,
}

impl AttributeContainer {
    /// Build a container from name/value pairs. Later duplicates win.
    #[must_use]
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of an attribute, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterate entries in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identity-preserving codec for [`AttributeContainer`].
pub struct AttributeContainerCodec;

impl Codec for AttributeContainerCodec {
    type Value = AttributeContainer;

    fn encode(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Arc<Self::Value>,
    ) -> Result<(), CodecError> {
        ctx.encode_shared(IdentityToken::of(value), |ctx| {
            let count = u32::try_from(value.len()).map_err(|_| {
                ctx.format_error(FormatKind::LengthTooLarge {
                    len: u64::try_from(value.len()).unwrap_or(u64::MAX),
                    max: u64::from(u32::MAX),
                })
            })?;
            ctx.write_var_u32(count);
            for (name, attribute) in value.iter() {
                ctx.write_string(name)?;
                ctx.write_string(attribute)?;
            }
            Ok(())
        })
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError> {
        ctx.decode_shared(|ctx| {
            let count = ctx.read_var_u32()?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let name = ctx.read_string()?;
                let attribute = ctx.read_string()?;
                entries.insert(name, attribute);
            }
            Ok(Arc::new(AttributeContainer { entries }))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. entries come back in sorted order ────────────────────────────

    #[test]
    fn entries_sort_by_name() {
        let attrs = AttributeContainer::from_entries([("usage", "api"), ("category", "library")]);
        let names: Vec<_> = attrs.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, ["category", "usage"]);
        assert_eq!(attrs.get("usage"), Some("api"));
        assert_eq!(attrs.get("absent"), None);
    }

    // ── 2. later duplicates win ─────────────────────────────────────────

    #[test]
    fn later_duplicates_win() {
        let attrs =
            AttributeContainer::from_entries([("usage", "api"), ("usage", "runtime")]);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("usage"), Some("runtime"));
    }
}
