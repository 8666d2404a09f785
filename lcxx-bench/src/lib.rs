//! Memoized libc++ compile-metric jobs.
//!
//! A job is a [`JobKind`] plus a key naming one point of a configuration
//! space (libc++ release, dialect, header or test input, ...). Results live
//! in a SQLite-backed [`DatapointStore`] keyed by job name and key string, so
//! each measurement is taken once and reused. [`JobRunner`] expands, prunes
//! and executes whole batches.

pub mod error;
pub mod invocation;
pub mod job;
pub mod jobs;
pub mod key;
pub mod output;
pub mod runner;
pub mod store;
pub mod value_registry;

pub use error::{JobError, JobResult, RunnerError, StoreError, StoreResult};
pub use invocation::{Invocation, ProcessOutput};
pub use job::{BenchContext, Job, JobKind, include_source};
pub use jobs::{
    BinarySizeJob, CompilerMetricsJob, CompilerMetricsTestSourceJob, IncludeSizeJob, JobName,
    StdSymbolsJob,
};
pub use key::{
    HeaderKey, HeaderSpace, InstantiationKey, InstantiationSpace, JobKey, KeySpace, SourceKey,
    SourceSpace,
};
pub use output::{
    BinarySize, CompilerMetrics, CompilerMetricsList, IncludeSizeOutput, JobOutput,
    SymbolCountOutput,
};
pub use runner::{BatchReport, JobFailure, JobRunner, RunnerOptions, expand, expand_keys};
pub use store::{DatapointStore, Record};
pub use value_registry::StoredValue;
