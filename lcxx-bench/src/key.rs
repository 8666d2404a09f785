//! Job keys: the typed dimension tuples that identify one measurement.
//!
//! A key's identity is its job kind name plus its dimension values in
//! declaration order. The path key joins each dimension's [`PathKey`] form
//! with `/` and doubles as both the cache key and the scratch directory
//! suffix.

use lcxx_common::{
    DebugOpts, LibcxxVersion, OptimizerOpts, PathKey, Standard, StlHeader, TestInput,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Identity of one job instance within its kind.
pub trait JobKey:
    Clone + Debug + Eq + Hash + Ord + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Toolchain dimension, resolved through the version registry.
    fn libcxx(&self) -> LibcxxVersion;

    /// Path-key form of each dimension, in declaration order.
    fn components(&self) -> Vec<String>;

    /// Whether the combination is meaningful (e.g. the header exists in the
    /// dialect). Callers may filter on this; expansion never does.
    fn is_supported(&self) -> bool {
        true
    }

    fn path_key(&self) -> String {
        self.components().join("/")
    }
}

/// A set of values per dimension whose Cartesian product is a batch.
pub trait KeySpace {
    type Key: JobKey;

    /// One key per combination, in nested declaration order.
    fn expand(&self) -> Vec<Self::Key>;

    /// Size of the product.
    fn size(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeaderKey {
    pub libcxx: LibcxxVersion,
    pub standard: Standard,
    pub header: StlHeader,
}

impl JobKey for HeaderKey {
    fn libcxx(&self) -> LibcxxVersion {
        self.libcxx
    }

    fn components(&self) -> Vec<String> {
        vec![
            self.libcxx.path_key(),
            self.standard.path_key(),
            self.header.path_key(),
        ]
    }

    fn is_supported(&self) -> bool {
        self.header.available_in(self.standard)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSpace {
    pub libcxx: Vec<LibcxxVersion>,
    pub standards: Vec<Standard>,
    pub headers: Vec<StlHeader>,
}

impl KeySpace for HeaderSpace {
    type Key = HeaderKey;

    fn expand(&self) -> Vec<HeaderKey> {
        self.libcxx
            .iter()
            .flat_map(|&libcxx| {
                self.standards.iter().flat_map(move |&standard| {
                    self.headers.iter().map(move |&header| HeaderKey {
                        libcxx,
                        standard,
                        header,
                    })
                })
            })
            .collect()
    }

    fn size(&self) -> usize {
        self.libcxx.len() * self.standards.len() * self.headers.len()
    }
}

/// Key for measurements over an instantiation test source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub libcxx: LibcxxVersion,
    pub standard: Standard,
    pub input: TestInput,
}

impl JobKey for SourceKey {
    fn libcxx(&self) -> LibcxxVersion {
        self.libcxx
    }

    fn components(&self) -> Vec<String> {
        vec![
            self.libcxx.path_key(),
            self.standard.path_key(),
            self.input.path_key(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSpace {
    pub libcxx: Vec<LibcxxVersion>,
    pub standards: Vec<Standard>,
    pub inputs: Vec<TestInput>,
}

impl KeySpace for SourceSpace {
    type Key = SourceKey;

    fn expand(&self) -> Vec<SourceKey> {
        self.libcxx
            .iter()
            .flat_map(|&libcxx| {
                self.standards.iter().flat_map(move |&standard| {
                    self.inputs.iter().map(move |&input| SourceKey {
                        libcxx,
                        standard,
                        input,
                    })
                })
            })
            .collect()
    }

    fn size(&self) -> usize {
        self.libcxx.len() * self.standards.len() * self.inputs.len()
    }
}

/// Key for object-code measurements under specific code-generation options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstantiationKey {
    pub libcxx: LibcxxVersion,
    pub standard: Standard,
    pub input: TestInput,
    pub debug: DebugOpts,
    pub optimize: OptimizerOpts,
}

impl JobKey for InstantiationKey {
    fn libcxx(&self) -> LibcxxVersion {
        self.libcxx
    }

    fn components(&self) -> Vec<String> {
        vec![
            self.libcxx.path_key(),
            self.standard.path_key(),
            self.input.path_key(),
            self.debug.path_key(),
            self.optimize.path_key(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstantiationSpace {
    pub libcxx: Vec<LibcxxVersion>,
    pub standards: Vec<Standard>,
    pub inputs: Vec<TestInput>,
    pub debug: Vec<DebugOpts>,
    pub optimize: Vec<OptimizerOpts>,
}

impl KeySpace for InstantiationSpace {
    type Key = InstantiationKey;

    fn expand(&self) -> Vec<InstantiationKey> {
        let mut keys = Vec::with_capacity(self.size());
        for &libcxx in &self.libcxx {
            for &standard in &self.standards {
                for &input in &self.inputs {
                    for &debug in &self.debug {
                        for &optimize in &self.optimize {
                            keys.push(InstantiationKey {
                                libcxx,
                                standard,
                                input,
                                debug,
                                optimize,
                            });
                        }
                    }
                }
            }
        }
        keys
    }

    fn size(&self) -> usize {
        self.libcxx.len()
            * self.standards.len()
            * self.inputs.len()
            * self.debug.len()
            * self.optimize.len()
    }
}
