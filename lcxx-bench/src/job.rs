//! Jobs: a key bound to a resolved toolchain, with a memoized call.
//!
//! Construction is two-phase. [`Job::create`] resolves the toolchain and
//! computes scratch paths without touching the filesystem;
//! [`Job::ensure_scratch_dirs`] creates them. `run` calls it itself, so
//! callers only need it when preparing files ahead of a run.

use crate::error::{JobError, JobResult};
use crate::invocation::{Invocation, ProcessOutput};
use crate::key::JobKey;
use crate::output::JobOutput;
use crate::store::DatapointStore;
use lcxx_common::{BenchConfig, ToolchainDescriptor, VersionRegistry};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shared settings every job of a batch reads.
#[derive(Debug)]
pub struct BenchContext {
    pub registry: Arc<VersionRegistry>,
    pub cxx: String,
    pub clang_query: String,
    pub inputs_root: PathBuf,
    pub scratch_root: PathBuf,
    /// Measurement passes per run of a repeatable kind.
    pub runs_per_repeat: u32,
    /// Copies of each repeatable job the runner schedules.
    pub repeat_count: u32,
}

impl BenchContext {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            registry: Arc::new(VersionRegistry::new(&config.paths.versions_root)),
            cxx: config.tools.cxx.clone(),
            clang_query: config.tools.clang_query.clone(),
            inputs_root: config.paths.inputs_root.clone(),
            scratch_root: config.paths.scratch_root.clone(),
            runs_per_repeat: config.jobs.runs_per_repeat,
            repeat_count: config.jobs.repeat_count,
        }
    }
}

/// A class of measurement.
pub trait JobKind: Sized + Send + Sync + 'static {
    type Key: JobKey;
    type Output: JobOutput;

    /// Name used as the job component of cache identities.
    const NAME: &'static str;

    /// Repeatable kinds accumulate samples instead of caching one value.
    const REPEATABLE: bool = false;

    /// Measurement passes per `run`.
    fn samples(_ctx: &BenchContext) -> u32 {
        1
    }

    /// Write any input files and build the command for one pass.
    fn prepare(job: &Job<Self>) -> JobResult<Invocation>;

    /// Turn one pass's process output into a result.
    fn parse(job: &Job<Self>, output: ProcessOutput) -> JobResult<Self::Output>;
}

pub struct Job<K: JobKind> {
    key: K::Key,
    toolchain: Arc<ToolchainDescriptor>,
    ctx: Arc<BenchContext>,
    scratch_dir: PathBuf,
    _kind: PhantomData<fn() -> K>,
}

impl<K: JobKind> Clone for Job<K> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            toolchain: Arc::clone(&self.toolchain),
            ctx: Arc::clone(&self.ctx),
            scratch_dir: self.scratch_dir.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: JobKind> fmt::Debug for Job<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("kind", &K::NAME)
            .field("key", &self.key)
            .field("toolchain", &self.toolchain.name)
            .finish()
    }
}

impl<K: JobKind> Job<K> {
    /// Resolve the key's toolchain and bind it. No filesystem writes.
    pub fn create(key: K::Key, ctx: &Arc<BenchContext>) -> JobResult<Self> {
        let toolchain = ctx.registry.resolve_version(key.libcxx())?;
        Ok(Self::with_toolchain(key, toolchain, Arc::clone(ctx)))
    }

    pub fn with_toolchain(
        key: K::Key,
        toolchain: Arc<ToolchainDescriptor>,
        ctx: Arc<BenchContext>,
    ) -> Self {
        let scratch_dir = ctx.scratch_root.join(K::NAME).join(key.path_key());
        Self {
            key,
            toolchain,
            ctx,
            scratch_dir,
            _kind: PhantomData,
        }
    }

    pub fn key(&self) -> &K::Key {
        &self.key
    }

    pub fn toolchain(&self) -> &ToolchainDescriptor {
        &self.toolchain
    }

    pub fn context(&self) -> &BenchContext {
        &self.ctx
    }

    pub fn path_key(&self) -> String {
        self.key.path_key()
    }

    /// Cache identity: job kind name plus key string.
    pub fn identity(&self) -> (&'static str, String) {
        (K::NAME, self.key.path_key())
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.scratch_dir.join("tmp")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.scratch_dir.join("out")
    }

    pub fn tmp_file(&self, name: &str) -> PathBuf {
        self.tmp_dir().join(name)
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// Create the tmp and output directories. Idempotent.
    pub fn ensure_scratch_dirs(&self) -> JobResult<()> {
        for dir in [self.tmp_dir(), self.output_dir()] {
            fs::create_dir_all(&dir).map_err(|e| JobError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn write_tmp_file(&self, name: &str, contents: &str) -> JobResult<PathBuf> {
        let path = self.tmp_file(name);
        fs::write(&path, contents).map_err(|e| JobError::io(&path, e))?;
        Ok(path)
    }

    /// The configured C++ compiler, with no arguments yet.
    pub fn compiler(&self) -> Invocation {
        Invocation::new(&self.ctx.cxx)
    }

    fn passes(&self) -> u32 {
        K::samples(&self.ctx).max(1)
    }

    /// Execute one run: every measurement pass, merged.
    pub fn run(&self) -> JobResult<K::Output> {
        self.ensure_scratch_dirs()?;
        let mut result: Option<K::Output> = None;
        for pass in 0..self.passes() {
            let invocation = K::prepare(self)?;
            let output = K::parse(self, invocation.run_blocking()?)?;
            debug!(job = K::NAME, key = %self.path_key(), pass, "Measurement pass complete");
            accumulate(&mut result, output);
        }
        result.ok_or_else(|| no_passes::<K>())
    }

    /// Same as [`Job::run`], awaiting the external tool without blocking.
    pub async fn arun(&self) -> JobResult<K::Output> {
        self.ensure_scratch_dirs()?;
        let mut result: Option<K::Output> = None;
        for pass in 0..self.passes() {
            let invocation = K::prepare(self)?;
            let output = K::parse(self, invocation.run_async().await?)?;
            debug!(job = K::NAME, key = %self.path_key(), pass, "Measurement pass complete");
            accumulate(&mut result, output);
        }
        result.ok_or_else(|| no_passes::<K>())
    }

    /// Return the cached value unless `force_rerun`; otherwise run and store
    /// (merging for repeatable kinds). Returns this run's output.
    pub fn memoized_call(&self, store: &DatapointStore, force_rerun: bool) -> JobResult<K::Output> {
        if !force_rerun && let Some(hit) = store.get::<K>(&self.key)? {
            debug!(job = K::NAME, key = %self.path_key(), "Cache hit");
            return Ok(hit);
        }
        let output = self.run()?;
        store.store::<K>(&self.key, output.clone())?;
        Ok(output)
    }

    /// Async form of [`Job::memoized_call`]. Store access runs on the
    /// blocking pool.
    pub async fn amemoized_call(
        &self,
        store: &DatapointStore,
        force_rerun: bool,
    ) -> JobResult<K::Output> {
        if !force_rerun {
            let (store, key) = (store.clone(), self.key.clone());
            let cached = tokio::task::spawn_blocking(move || store.get::<K>(&key))
                .await
                .map_err(|e| JobError::Join(e.to_string()))??;
            if let Some(hit) = cached {
                debug!(job = K::NAME, key = %self.path_key(), "Cache hit");
                return Ok(hit);
            }
        }
        let output = self.arun().await?;
        let (store, key, value) = (store.clone(), self.key.clone(), output.clone());
        tokio::task::spawn_blocking(move || store.store::<K>(&key, value))
            .await
            .map_err(|e| JobError::Join(e.to_string()))??;
        Ok(output)
    }
}

fn accumulate<O: JobOutput>(acc: &mut Option<O>, next: O) {
    match acc {
        Some(existing) => existing.merge(next),
        None => *acc = Some(next),
    }
}

fn no_passes<K: JobKind>() -> JobError {
    JobError::Parse {
        job: K::NAME,
        message: "no measurement passes were run".to_string(),
    }
}

/// Preprocessor input that includes exactly one header.
pub fn include_source(header: &str) -> String {
    format!("#include <{header}>\nint main() {{\n}}\n")
}
