//! Errors shared by the vocabulary types and the version registry.

use std::path::PathBuf;
use thiserror::Error;

/// A dimension value could not be parsed from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown C++ dialect: {0}")]
    UnknownDialect(String),

    #[error("Unknown standard header: {0}")]
    UnknownHeader(String),

    #[error("Unknown test input: {0}")]
    UnknownTestInput(String),

    #[error("Unknown {kind} option: {value}")]
    UnknownOption { kind: &'static str, value: String },

    #[error("Unknown libc++ version: {0}")]
    UnknownVersion(String),
}

/// Errors raised while resolving a toolchain identifier to a descriptor.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No such version: {identifier} (tried {} locations)", tried.len())]
    NoSuchVersion {
        identifier: String,
        tried: Vec<PathBuf>,
    },

    #[error("Directory name {0} does not match any toolchain naming pattern")]
    UnrecognizedName(String),

    #[error("Invalid toolchain descriptor at {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed info.json at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
