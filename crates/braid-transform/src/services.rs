// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host collaborators supplied outside the stream.
//!
//! Neither of these is ever serialized: the codec that decodes a transform
//! descriptor holds its own instances and injects them fresh, so a stream
//! written on one host materializes against the *reading* host's file
//! layout and instantiation strategy.

use std::path::{Path, PathBuf};

use crate::params::{IsolatedParameters, ParameterSpec};

/// Resolves declared input paths against a host base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLookup {
    base: PathBuf,
}

impl FileLookup {
    /// A lookup rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a declared path: absolute paths pass through, relative
    /// paths join the base directory.
    #[must_use]
    pub fn resolve(&self, declared: &str) -> PathBuf {
        let path = Path::new(declared);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

/// Strategy for turning a declared parameter spec into isolated parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationScheme {
    strategy: String,
}

impl InstantiationScheme {
    /// A scheme named after its instantiation strategy.
    #[must_use]
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
        }
    }

    /// Strategy name.
    #[must_use]
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Isolate a parameter spec: resolve every declared input against the
    /// host filesystem and fingerprint the result.
    #[must_use]
    pub fn isolate(&self, spec: &ParameterSpec, files: &FileLookup) -> IsolatedParameters {
        IsolatedParameters::from_values(
            spec.iter()
                .map(|(name, declared)| {
                    (
                        name.to_string(),
                        files.resolve(declared).to_string_lossy().into_owned(),
                    )
                }),
        )
    }
}
