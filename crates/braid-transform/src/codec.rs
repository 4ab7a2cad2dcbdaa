// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The transform descriptor codec.
//!
//! Field order is the contract: implementation type, attribute set, the two
//! normalization policies, cacheability, directory sensitivity, parameter
//! cell — all inside one identity-preserving block so repeated references
//! serialize once. Decode mirrors the order exactly, then constructs the
//! descriptor with collaborators the stream never carried.

use std::sync::Arc;

use braid_codec::{
    Codec, CodecError, CodecRegistryBuilder, IdentityToken, LazyCell, LazyCellCodec, ReadContext,
    SharedValue, WriteContext,
};
use tracing::trace;

use crate::attributes::{AttributeContainer, AttributeContainerCodec};
use crate::params::{
    IsolatedParameters, IsolatedParametersCodec, ParameterSpec, ParameterSpecCodec,
};
use crate::services::{FileLookup, InstantiationScheme};
use crate::{
    AbsolutePathNormalization, DirectorySensitivity, IgnoredPathNormalization,
    NameOnlyNormalization, PathNormalization, TransformEnvironment, TransformSpec,
};

/// Identity-preserving codec for [`TransformSpec`].
///
/// Holds the host collaborators it injects at decode; the session service
/// locator is taken from the read context instead, so a descriptor always
/// binds to the services of the session that materialized it.
pub struct TransformSpecCodec {
    file_lookup: Arc<FileLookup>,
    instantiation: Arc<InstantiationScheme>,
}

impl TransformSpecCodec {
    /// A codec injecting the given host collaborators.
    #[must_use]
    pub fn new(file_lookup: Arc<FileLookup>, instantiation: Arc<InstantiationScheme>) -> Self {
        Self {
            file_lookup,
            instantiation,
        }
    }
}

impl Codec for TransformSpecCodec {
    type Value = TransformSpec;

    fn encode(
        &self,
        ctx: &mut WriteContext<'_>,
        value: &Arc<Self::Value>,
    ) -> Result<(), CodecError> {
        ctx.encode_shared(IdentityToken::of(value), |ctx| {
            ctx.with_field("implementation", |ctx| ctx.write_type(value.implementation()))?;
            let attributes: SharedValue = value.from_attributes().clone();
            ctx.with_field("from_attributes", |ctx| ctx.write_value(&attributes))?;
            ctx.with_field("input_normalizer", |ctx| {
                ctx.write_type(value.normalization().input)
            })?;
            ctx.with_field("dependencies_normalizer", |ctx| {
                ctx.write_type(value.normalization().dependencies)
            })?;
            ctx.write_bool(value.is_cacheable());
            ctx.write_enum(value.directory_sensitivity())?;
            let parameters: SharedValue = value.parameters().clone();
            ctx.with_field("parameters", |ctx| ctx.write_value(&parameters))
        })
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Self::Value>, CodecError> {
        ctx.decode_shared(|ctx| {
            let implementation = ctx.with_field("implementation", ReadContext::read_type)?;
            let from_attributes = ctx.with_field("from_attributes", |ctx| {
                ctx.read_value_of::<AttributeContainer>()
            })?;
            let input = ctx.with_field("input_normalizer", ReadContext::read_type)?;
            let dependencies =
                ctx.with_field("dependencies_normalizer", ReadContext::read_type)?;
            let cacheable = ctx.read_bool()?;
            let directory_sensitivity = ctx.read_enum::<DirectorySensitivity>()?;
            let parameters = ctx.with_field("parameters", |ctx| {
                ctx.read_value_of::<LazyCell<ParameterSpec, IsolatedParameters>>()
            })?;
            // collaborators are never round-tripped: the codec's own host
            // instances plus the decoding session's service locator
            let environment = TransformEnvironment {
                file_lookup: self.file_lookup.clone(),
                instantiation: self.instantiation.clone(),
                services: ctx.services().clone(),
            };
            trace!(implementation = implementation.name(), "decoded transform descriptor");
            Ok(Arc::new(TransformSpec::new(
                implementation,
                from_attributes,
                PathNormalization {
                    input,
                    dependencies,
                },
                cacheable,
                directory_sensitivity,
                parameters,
                environment,
            )))
        })
    }
}

/// Wire names for the transform codec family.
pub mod names {
    /// Transform descriptor.
    pub const TRANSFORM_SPEC: &str = "braid.transform.TransformSpec";
    /// Attribute container.
    pub const ATTRIBUTES: &str = "braid.transform.AttributeContainer";
    /// Declared parameter spec.
    pub const PARAMETER_SPEC: &str = "braid.transform.ParameterSpec";
    /// Isolated parameters.
    pub const ISOLATED_PARAMETERS: &str = "braid.transform.IsolatedParameters";
    /// Lazy parameter cell.
    pub const LAZY_PARAMETERS: &str = "braid.transform.LazyParameters";
    /// Absolute-path normalization marker.
    pub const ABSOLUTE_PATH: &str = "braid.transform.AbsolutePathNormalization";
    /// Name-only normalization marker.
    pub const NAME_ONLY: &str = "braid.transform.NameOnlyNormalization";
    /// Ignored-path normalization marker.
    pub const IGNORED_PATH: &str = "braid.transform.IgnoredPathNormalization";
}

/// Register the full transform codec family on a registry builder.
///
/// `file_lookup` and `instantiation` become the collaborators every
/// descriptor decoded through this registry is constructed with.
#[must_use]
pub fn register_transform_codecs(
    builder: CodecRegistryBuilder,
    file_lookup: Arc<FileLookup>,
    instantiation: Arc<InstantiationScheme>,
) -> CodecRegistryBuilder {
    builder
        .register(
            names::TRANSFORM_SPEC,
            TransformSpecCodec::new(file_lookup, instantiation),
        )
        .register(names::ATTRIBUTES, AttributeContainerCodec)
        .register(names::PARAMETER_SPEC, ParameterSpecCodec)
        .register(names::ISOLATED_PARAMETERS, IsolatedParametersCodec)
        .register(
            names::LAZY_PARAMETERS,
            LazyCellCodec::<ParameterSpec, IsolatedParameters>::new(),
        )
        .register_type::<AbsolutePathNormalization>(names::ABSOLUTE_PATH)
        .register_type::<NameOnlyNormalization>(names::NAME_ONLY)
        .register_type::<IgnoredPathNormalization>(names::IGNORED_PATH)
}
