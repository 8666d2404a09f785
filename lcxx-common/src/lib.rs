//! Shared vocabulary for the libc++ metrics harness.
//!
//! Toolchain identifiers and descriptors, the version registry, the key
//! dimension types (dialects, headers, test inputs, code-generation options),
//! configuration and logging.

pub mod config;
pub mod dialect;
pub mod error;
pub mod header;
pub mod identifier;
pub mod inputs;
pub mod logging;
pub mod pathkey;
pub mod registry;
pub mod toolchain;
pub mod units;

pub use config::{BenchConfig, ConfigError, ExecutorKind, FailurePolicy};
pub use dialect::Standard;
pub use error::{ParseError, ResolveError, ResolveResult};
pub use header::StlHeader;
pub use identifier::{Datestamp, Identifier, Version};
pub use inputs::{DebugOpts, OptimizerOpts, TestInput};
pub use logging::{LogConfig, LogFormat, LoggingError, LoggingGuards, init_logging};
pub use pathkey::{PathKey, is_safe_path_key, join_components, sanitize_component};
pub use registry::VersionRegistry;
pub use toolchain::{LibcxxVersion, ToolchainDescriptor};
pub use units::{Elapsed, MemoryUsage};
