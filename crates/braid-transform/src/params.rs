// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transform parameter payloads.
//!
//! `ParameterSpec` is the description half of the lazy parameter cell: the
//! declared inputs as the build script authored them. `IsolatedParameters`
//! is the computed half: inputs resolved against the host filesystem and
//! fingerprinted. Only the spec is required on the wire; the isolated form
//! travels only when some consumer already forced it before encode.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use braid_codec::{Codec, CodecError, FormatKind, ReadContext, WriteContext};

/// Declared transform parameters, not yet resolved against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    inputs: BTreeMap<String, String>,
}

impl ParameterSpec {
    /// Build a spec from declared input name/value pairs.
    #[must_use]
    pub fn from_inputs<I, K, V>(inputs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inputs: inputs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Declared value of an input, if present.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    /// Iterate declared inputs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of declared inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether no input is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Parameters resolved against the host filesystem, with a stable
/// fingerprint over the resolved values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedParameters {
    values: BTreeMap<String, String>,
    fingerprint: u64,
}

impl IsolatedParameters {
    /// Build from resolved name/value pairs, fingerprinting the result.
    #[must_use]
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values: BTreeMap<String, String> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let fingerprint = fingerprint_of(&values);
        Self {
            values,
            fingerprint,
        }
    }

    fn from_parts(values: BTreeMap<String, String>, fingerprint: u64) -> Self {
        Self {
            values,
            fingerprint,
        }
    }

    /// Resolved value of an input, if present.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Iterate resolved values in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stable fingerprint over the resolved values.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

fn fingerprint_of(values: &BTreeMap<String, String>) -> u64 {
    // FNV-1a over the sorted entries; stable across processes, unlike the
    // std RandomState hashers.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut write = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    };
    for (name, value) in values {
        write(name.as_bytes());
        write(&[0]);
        write(value.as_bytes());
        write(&[0]);
    }
    hash
}

fn write_entries(
    ctx: &mut WriteContext<'_>,
    entries: &BTreeMap<String, String>,
) -> Result<(), CodecError> {
    let count = u32::try_from(entries.len()).map_err(|_| {
        ctx.format_error(FormatKind::LengthTooLarge {
            len: u64::try_from(entries.len()).unwrap_or(u64::MAX),
            max: u64::from(u32::MAX),
        })
    })?;
    ctx.write_var_u32(count);
    for (name, value) in entries {
        ctx.write_string(name)?;
        ctx.write_string(value)?;
    }
    Ok(())
}

fn read_entries(ctx: &mut ReadContext<'_>) -> Result<BTreeMap<String, String>, CodecError> {
    let count = ctx.read_var_u32()?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let name = ctx.read_string()?;
        let value = ctx.read_string()?;
        entries.insert(name, value);
    }
    Ok(entries)
}

/// Value codec for [`ParameterSpec`].
pub struct ParameterSpecCodec;

impl Codec for ParameterSpecCodec {
    type Value = ParameterSpec;

    fn encode(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Arc<Self::Value>,
    ) -> Result<(), CodecError> {
        write_entries(ctx, &value.inputs)
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError> {
        Ok(Arc::new(ParameterSpec {
            inputs: read_entries(ctx)?,
        }))
    }
}

/// Value codec for [`IsolatedParameters`].
pub struct IsolatedParametersCodec;

impl Codec for IsolatedParametersCodec {
    type Value = IsolatedParameters;

    fn encode(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Arc<Self::Value>,
    ) -> Result<(), CodecError> {
        write_entries(ctx, &value.values)?;
        ctx.write_u64(value.fingerprint);
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError> {
        let values = read_entries(ctx)?;
        let fingerprint = ctx.read_u64()?;
        Ok(Arc::new(IsolatedParameters::from_parts(
            values,
            fingerprint,
        )))
    }
}

impl Hash for IsolatedParameters {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. fingerprint is order-independent and value-sensitive ─────────

    #[test]
    fn fingerprint_tracks_values() {
        let a = IsolatedParameters::from_values([("min", "1"), ("max", "9")]);
        let b = IsolatedParameters::from_values([("max", "9"), ("min", "1")]);
        let c = IsolatedParameters::from_values([("max", "9"), ("min", "2")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    // ── 2. spec accessors ───────────────────────────────────────────────

    #[test]
    fn spec_accessors() {
        let spec = ParameterSpec::from_inputs([("level", "7")]);
        assert_eq!(spec.input("level"), Some("7"));
        assert_eq!(spec.input("absent"), None);
        assert_eq!(spec.len(), 1);
        assert!(!spec.is_empty());
    }
}
