//! Error types for the datapoint store, jobs and the batch runner.

use crate::runner::BatchReport;
use lcxx_common::ResolveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unregistered value type '{0}'")]
    UnregisteredType(String),

    #[error("Stored value for {job}/{key} is a {stored}, expected {expected}")]
    TypeMismatch {
        job: String,
        key: String,
        stored: String,
        expected: &'static str,
    },

    #[error("No cached value for {job}/{key}")]
    Missing { job: String, key: String },

    #[error("Bad timestamp '{value}' for {job}/{key}: {source}")]
    Timestamp {
        job: String,
        key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {}", exit_status(.exit_code), .stderr.trim())]
    ToolFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to parse {job} output: {message}")]
    Parse { job: &'static str, message: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job task failed: {0}")]
    Join(String),
}

impl JobError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type JobResult<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to prune batch: {0}")]
    Store(#[from] StoreError),

    #[error(
        "Batch aborted after {} failure(s); {} job(s) skipped",
        report.failed.len(),
        report.skipped
    )]
    Aborted { report: Box<BatchReport> },
}
