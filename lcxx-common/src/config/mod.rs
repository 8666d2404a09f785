//! Configuration for the benchmarking harness.
//!
//! Values are layered: built-in defaults, then a TOML file, then `LCXX_*`
//! environment variables. Command-line flags are applied last by the binary.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser, expand_path};
pub use source::{ConfigSource, Sourced};

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid environment configuration: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// How the runner executes jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// Bounded pool of blocking workers, one external tool invocation each.
    #[default]
    Blocking,
    /// Fixed number of async tasks draining a shared queue.
    Async,
}

impl FromStr for ExecutorKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "process" | "pool" => Ok(Self::Blocking),
            "async" => Ok(Self::Async),
            other => Err(ParseError::UnknownOption {
                kind: "executor",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => f.write_str("blocking"),
            Self::Async => f.write_str("async"),
        }
    }
}

/// What the runner does when a job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log, keep going, report failed keys at the end.
    #[default]
    Isolate,
    /// Stop dispatching after the first failure.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolate" | "continue" => Ok(Self::Isolate),
            "abort" | "fail-fast" | "fail_fast" => Ok(Self::Abort),
            other => Err(ParseError::UnknownOption {
                kind: "failure policy",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolate => f.write_str("isolate"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub versions_root: PathBuf,
    pub inputs_root: PathBuf,
    pub scratch_root: PathBuf,
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let database = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".database")
            .join("libcxx-info.db");
        Self {
            versions_root: PathBuf::from("libcxx-versions"),
            inputs_root: PathBuf::from("inputs"),
            scratch_root: std::env::temp_dir().join("libcxx-jobs"),
            database,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub cxx: String,
    pub clang_query: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cxx: "clang++".to_string(),
            clang_query: "clang-query".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub workers: u32,
    pub executor: ExecutorKind,
    pub failure_policy: FailurePolicy,
    pub shuffle_seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            executor: ExecutorKind::default(),
            failure_policy: FailurePolicy::default(),
            shuffle_seed: None,
        }
    }
}

fn default_workers() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Sampling settings for repeatable job kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// How many times each combination is replicated by the runner.
    pub repeat_count: u32,
    /// Samples taken inside one run.
    pub runs_per_repeat: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            runs_per_repeat: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub runner: RunnerConfig,
    pub jobs: JobsConfig,
    /// Origin of every field that was not left at its built-in default.
    #[serde(skip)]
    pub origins: BTreeMap<&'static str, ConfigSource>,
}

/// Every settable field, as `section.key`.
pub const FIELDS: &[&str] = &[
    "paths.versions_root",
    "paths.inputs_root",
    "paths.scratch_root",
    "paths.database",
    "tools.cxx",
    "tools.clang_query",
    "runner.workers",
    "runner.executor",
    "runner.failure_policy",
    "runner.shuffle_seed",
    "jobs.repeat_count",
    "jobs.runs_per_repeat",
];

/// A field that was overridden from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverride {
    pub field: &'static str,
    pub var: String,
}

impl BenchConfig {
    /// Default location: `<config dir>/lcxx-bench/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lcxx-bench").join("config.toml"))
    }

    /// Load defaults, then `explicit` (or the default path if it exists),
    /// then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        let overrides = config.apply_env()?;
        for o in &overrides {
            debug!(field = o.field, var = %o.var, "Config value overridden from environment");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut config = Self::from_toml(&text).map_err(parse_error)?;
        let table: toml::Table = toml::from_str(&text).map_err(parse_error)?;
        config.record_file_fields(&table, path);
        config.expand_paths();
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn record_file_fields(&mut self, table: &toml::Table, path: &Path) {
        for &field in FIELDS {
            let Some((section, key)) = field.split_once('.') else {
                continue;
            };
            let present = table
                .get(section)
                .and_then(toml::Value::as_table)
                .is_some_and(|t| t.contains_key(key));
            if present {
                self.origins.insert(field, ConfigSource::File(path.to_path_buf()));
            }
        }
    }

    /// Record that `field` was set from a command-line flag.
    pub fn mark_cli(&mut self, field: &'static str) {
        self.origins.insert(field, ConfigSource::Cli);
    }

    pub fn source_of(&self, field: &str) -> ConfigSource {
        self.origins.get(field).cloned().unwrap_or(ConfigSource::Default)
    }

    /// `value` tagged with the origin of `field`.
    pub fn sourced<T>(&self, field: &str, value: T) -> Sourced<T> {
        Sourced::new(value, self.source_of(field))
    }

    fn expand_paths(&mut self) {
        for p in [
            &mut self.paths.versions_root,
            &mut self.paths.inputs_root,
            &mut self.paths.scratch_root,
            &mut self.paths.database,
        ] {
            *p = expand_path(&p.to_string_lossy());
        }
    }

    /// Apply `LCXX_*` overrides. All invalid variables are reported together.
    pub fn apply_env(&mut self) -> Result<Vec<EnvOverride>, ConfigError> {
        let mut parser = EnvParser::new();
        let mut overrides = Vec::new();

        macro_rules! take {
            ($field:literal, $target:expr, $sourced:expr) => {{
                let sourced = $sourced;
                if let Some(var) = sourced.var {
                    $target = sourced.value;
                    overrides.push(EnvOverride { field: $field, var });
                }
            }};
        }

        let paths = &mut self.paths;
        take!("paths.versions_root", paths.versions_root, {
            parser.get_path("VERSIONS_ROOT", &paths.versions_root)
        });
        take!("paths.inputs_root", paths.inputs_root, {
            parser.get_path("INPUTS_ROOT", &paths.inputs_root)
        });
        take!("paths.scratch_root", paths.scratch_root, {
            parser.get_path("SCRATCH_ROOT", &paths.scratch_root)
        });
        take!("paths.database", paths.database, {
            parser.get_path("DATABASE", &paths.database)
        });
        take!("tools.cxx", self.tools.cxx, parser.get_string("CXX", &self.tools.cxx));
        take!("tools.clang_query", self.tools.clang_query, {
            parser.get_string("CLANG_QUERY", &self.tools.clang_query)
        });
        take!("runner.workers", self.runner.workers, {
            parser.get_u32_range("WORKERS", self.runner.workers, 1, 1024)
        });
        take!("runner.executor", self.runner.executor, {
            parser.get_parsed("EXECUTOR", self.runner.executor, "blocking or async")
        });
        take!("runner.failure_policy", self.runner.failure_policy, {
            parser.get_parsed("FAILURE_POLICY", self.runner.failure_policy, "isolate or abort")
        });
        let seed = parser.get_optional_u64("SHUFFLE_SEED");
        if let (Some(value), Some(var)) = (seed.value, seed.var) {
            self.runner.shuffle_seed = Some(value);
            overrides.push(EnvOverride { field: "runner.shuffle_seed", var });
        }
        take!("jobs.repeat_count", self.jobs.repeat_count, {
            parser.get_u32_range("REPEAT_COUNT", self.jobs.repeat_count, 1, 10_000)
        });
        take!("jobs.runs_per_repeat", self.jobs.runs_per_repeat, {
            parser.get_u32_range("RUNS_PER_REPEAT", self.jobs.runs_per_repeat, 1, 10_000)
        });

        for o in &overrides {
            self.origins.insert(o.field, ConfigSource::Environment);
        }

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(overrides)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.workers == 0 {
            return Err(ConfigError::Invalid("runner.workers must be at least 1".into()));
        }
        if self.jobs.repeat_count == 0 {
            return Err(ConfigError::Invalid("jobs.repeat_count must be at least 1".into()));
        }
        if self.jobs.runs_per_repeat == 0 {
            return Err(ConfigError::Invalid("jobs.runs_per_repeat must be at least 1".into()));
        }
        if self.tools.cxx.trim().is_empty() {
            return Err(ConfigError::Invalid("tools.cxx must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
