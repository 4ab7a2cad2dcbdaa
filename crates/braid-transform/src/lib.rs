// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Artifact transform descriptors over `braid-codec`.
//!
//! A [`TransformSpec`] describes one registered artifact transform: the
//! implementation type, the attribute set it matches, its two
//! path-normalization policies, cacheability, directory sensitivity, and a
//! lazily-isolated parameter cell. Descriptors are heavily shared — many
//! edges of a build graph reference the same transform — so their codec
//! preserves identity, and two collaborators (file lookup, instantiation
//! scheme) plus a session service locator are injected fresh at decode
//! rather than round-tripped.
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

mod attributes;
mod codec;
mod params;
mod services;

pub use attributes::{AttributeContainer, AttributeContainerCodec};
pub use codec::{names, register_transform_codecs, TransformSpecCodec};
pub use params::{
    IsolatedParameters, IsolatedParametersCodec, ParameterSpec, ParameterSpecCodec,
};
pub use services::{FileLookup, InstantiationScheme};

use std::sync::Arc;

use braid_codec::{LazyCell, ServiceRegistry, TaggedEnum, TypeDescriptor};

/// How a transform's fingerprinting treats directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySensitivity {
    /// Directories participate in fingerprints.
    Default,
    /// Directories are ignored; only file contents matter.
    IgnoreDirectories,
}

impl TaggedEnum for DirectorySensitivity {
    const VARIANTS: &'static [Self] = &[Self::Default, Self::IgnoreDirectories];
}

/// Normalization policy marker: inputs compared by absolute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsolutePathNormalization;

/// Normalization policy marker: inputs compared by file name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameOnlyNormalization;

/// Normalization policy marker: inputs excluded from comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoredPathNormalization;

/// The two normalization policies a transform declares, written to the
/// stream as type descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathNormalization {
    /// Policy for the input artifact itself.
    pub input: TypeDescriptor,
    /// Policy for the input artifact's dependencies.
    pub dependencies: TypeDescriptor,
}

/// Host-side collaborators a descriptor needs but never serializes.
///
/// The codec holds the file lookup and instantiation scheme; the service
/// registry comes from the decoding session itself.
#[derive(Debug, Clone)]
pub struct TransformEnvironment {
    /// Resolves declared input paths on this host.
    pub file_lookup: Arc<FileLookup>,
    /// Turns parameter specs into isolated parameters.
    pub instantiation: Arc<InstantiationScheme>,
    /// The owning session's service locator.
    pub services: Arc<ServiceRegistry>,
}

/// One registered artifact transform.
///
/// Multiply-referenced by design: the codec guarantees that every
/// reference to one descriptor decodes to one shared instance.
#[derive(Debug)]
pub struct TransformSpec {
    implementation: TypeDescriptor,
    from_attributes: Arc<AttributeContainer>,
    normalization: PathNormalization,
    cacheable: bool,
    directory_sensitivity: DirectorySensitivity,
    parameters: Arc<LazyCell<ParameterSpec, IsolatedParameters>>,
    environment: TransformEnvironment,
}

impl TransformSpec {
    /// Assemble a descriptor from its fields and host environment.
    #[must_use]
    pub fn new(
        implementation: TypeDescriptor,
        from_attributes: Arc<AttributeContainer>,
        normalization: PathNormalization,
        cacheable: bool,
        directory_sensitivity: DirectorySensitivity,
        parameters: Arc<LazyCell<ParameterSpec, IsolatedParameters>>,
        environment: TransformEnvironment,
    ) -> Self {
        Self {
            implementation,
            from_attributes,
            normalization,
            cacheable,
            directory_sensitivity,
            parameters,
            environment,
        }
    }

    /// Implementation type of the transform action.
    #[must_use]
    pub fn implementation(&self) -> TypeDescriptor {
        self.implementation
    }

    /// Attribute set this transform matches.
    #[must_use]
    pub fn from_attributes(&self) -> &Arc<AttributeContainer> {
        &self.from_attributes
    }

    /// Declared normalization policies.
    #[must_use]
    pub fn normalization(&self) -> PathNormalization {
        self.normalization
    }

    /// Whether transform outputs may be cached.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Directory sensitivity of the transform's fingerprinting.
    #[must_use]
    pub fn directory_sensitivity(&self) -> DirectorySensitivity {
        self.directory_sensitivity
    }

    /// The lazily-isolated parameter cell.
    #[must_use]
    pub fn parameters(&self) -> &Arc<LazyCell<ParameterSpec, IsolatedParameters>> {
        &self.parameters
    }

    /// Host environment this descriptor was constructed against.
    #[must_use]
    pub fn environment(&self) -> &TransformEnvironment {
        &self.environment
    }

    /// Isolated parameters, computed on first access.
    ///
    /// Forces the parameter cell through this descriptor's instantiation
    /// scheme and file lookup; at most one caller ever runs the isolation.
    #[must_use]
    pub fn isolated_parameters(&self) -> Arc<IsolatedParameters> {
        self.parameters.force(|spec| {
            self.environment
                .instantiation
                .isolate(spec, &self.environment.file_lookup)
        })
    }
}
