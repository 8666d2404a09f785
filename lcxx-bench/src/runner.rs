//! Batch expansion and execution.
//!
//! A batch is the Cartesian product of a key space, materialized as jobs,
//! pruned against the store, shuffled and executed by one of two executors.
//! Both executors share pruning, dispatch and failure handling; they only
//! differ in how a single job is awaited.

use crate::error::{JobError, JobResult, RunnerError};
use crate::job::{BenchContext, Job, JobKind};
use crate::key::KeySpace;
use crate::store::DatapointStore;
use lcxx_common::{BenchConfig, ExecutorKind, FailurePolicy};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Materialize one job per combination. Repeatable kinds get
/// `repeat_count` copies of each.
pub fn expand<K, S>(space: &S, ctx: &Arc<BenchContext>) -> JobResult<Vec<Job<K>>>
where
    K: JobKind,
    S: KeySpace<Key = K::Key>,
{
    expand_keys(space.expand(), ctx)
}

pub fn expand_keys<K: JobKind>(
    keys: Vec<K::Key>,
    ctx: &Arc<BenchContext>,
) -> JobResult<Vec<Job<K>>> {
    let copies = if K::REPEATABLE {
        ctx.repeat_count.max(1) as usize
    } else {
        1
    };
    let mut jobs = Vec::with_capacity(keys.len() * copies);
    for key in keys {
        let job = Job::<K>::create(key, ctx)?;
        for _ in 1..copies {
            jobs.push(job.clone());
        }
        jobs.push(job);
    }
    debug!(job = K::NAME, count = jobs.len(), "Expanded batch");
    Ok(jobs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    pub workers: usize,
    pub executor: ExecutorKind,
    pub failure_policy: FailurePolicy,
    pub shuffle_seed: Option<u64>,
    /// Re-run cached repeatable jobs and merge the new samples.
    pub force_rerun: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            executor: ExecutorKind::Blocking,
            failure_policy: FailurePolicy::Isolate,
            shuffle_seed: None,
            force_rerun: false,
        }
    }
}

impl RunnerOptions {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            workers: config.runner.workers.max(1) as usize,
            executor: config.runner.executor,
            failure_policy: config.runner.failure_policy,
            shuffle_seed: config.runner.shuffle_seed,
            force_rerun: false,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_force_rerun(mut self, force: bool) -> Self {
        self.force_rerun = force;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub key: String,
    pub error: String,
}

/// What happened to every job of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub job: String,
    /// Jobs handed to the runner.
    pub total: usize,
    /// Already cached.
    pub pruned: usize,
    /// Identical non-repeatable jobs collapsed into one.
    pub deduplicated: usize,
    pub executed: usize,
    pub failed: Vec<JobFailure>,
    /// Never started because the batch was aborted.
    pub skipped: usize,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }
}

#[derive(Clone)]
enum Outcome {
    Completed,
    Failed(JobFailure),
    Skipped,
}

pub struct JobRunner {
    store: DatapointStore,
    options: RunnerOptions,
}

impl JobRunner {
    pub fn new(store: DatapointStore, options: RunnerOptions) -> Self {
        Self { store, options }
    }

    /// Drop cached and duplicate jobs, then shuffle the rest.
    pub fn plan<K: JobKind>(
        &self,
        jobs: Vec<Job<K>>,
        report: &mut BatchReport,
    ) -> Result<Vec<Job<K>>, RunnerError> {
        let rerun_cached = self.options.force_rerun && K::REPEATABLE;
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(jobs.len());

        for job in jobs {
            let key = job.path_key();
            if !rerun_cached && self.store.contains(K::NAME, &key)? {
                report.pruned += 1;
                continue;
            }
            if !K::REPEATABLE && !seen.insert(key) {
                report.deduplicated += 1;
                continue;
            }
            pending.push(job);
        }

        let mut rng = match self.options.shuffle_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        rng.shuffle(&mut pending);
        Ok(pending)
    }

    /// Run a batch to completion. Completion order is unspecified.
    ///
    /// Under [`FailurePolicy::Isolate`] failures are collected in the report.
    /// Under [`FailurePolicy::Abort`] no job starts after the first failure
    /// and the report comes back inside [`RunnerError::Aborted`].
    pub async fn run_all<K: JobKind>(&self, jobs: Vec<Job<K>>) -> Result<BatchReport, RunnerError> {
        let mut report = BatchReport {
            job: K::NAME.to_string(),
            total: jobs.len(),
            ..BatchReport::default()
        };
        let pending = self.plan(jobs, &mut report)?;
        info!(
            job = K::NAME,
            total = report.total,
            pruned = report.pruned,
            deduplicated = report.deduplicated,
            pending = pending.len(),
            workers = self.options.workers,
            executor = %self.options.executor,
            "Starting batch"
        );

        let outcomes = match self.options.executor {
            ExecutorKind::Blocking => self.run_blocking_pool(pending).await,
            ExecutorKind::Async => self.run_async_pool(pending).await,
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Completed => report.executed += 1,
                Outcome::Failed(failure) => report.failed.push(failure),
                Outcome::Skipped => report.skipped += 1,
            }
        }
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            job = K::NAME,
            executed = report.executed,
            failed = report.failed.len(),
            skipped = report.skipped,
            "Batch finished"
        );

        if self.options.failure_policy == FailurePolicy::Abort && !report.failed.is_empty() {
            return Err(RunnerError::Aborted {
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    /// One blocking-pool thread per running unit, bounded by a semaphore.
    async fn run_blocking_pool<K: JobKind>(&self, jobs: Vec<Job<K>>) -> Vec<Outcome> {
        let permits = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let aborted = Arc::new(AtomicBool::new(false));
        let mut set = JoinSet::new();

        for unit in units(jobs) {
            let permits = Arc::clone(&permits);
            let aborted = Arc::clone(&aborted);
            let store = self.store.clone();
            let policy = self.options.failure_policy;
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return vec![Outcome::Skipped; unit.len()];
                };
                let mut outcomes = Vec::with_capacity(unit.len());
                for job in unit {
                    if aborted.load(Ordering::SeqCst) {
                        outcomes.push(Outcome::Skipped);
                        continue;
                    }
                    let key = job.path_key();
                    let store = store.clone();
                    let result =
                        tokio::task::spawn_blocking(move || job.memoized_call(&store, true))
                            .await
                            .map_err(|e| JobError::Join(e.to_string()))
                            .and_then(|r| r.map(|_| ()));
                    outcomes.push(settle::<K>(key, result, policy, &aborted));
                }
                outcomes
            });
        }

        collect(set).await
    }

    /// A fixed set of tasks draining a shared queue of units. Each job runs in
    /// its own task so a panic settles as that job's failure.
    async fn run_async_pool<K: JobKind>(&self, jobs: Vec<Job<K>>) -> Vec<Outcome> {
        let queue = Arc::new(Mutex::new(VecDeque::from(units(jobs))));
        let aborted = Arc::new(AtomicBool::new(false));
        let mut set = JoinSet::new();

        for worker in 0..self.options.workers.max(1) {
            let queue = Arc::clone(&queue);
            let aborted = Arc::clone(&aborted);
            let store = self.store.clone();
            let policy = self.options.failure_policy;
            set.spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
                    let Some(unit) = next else { break };
                    for job in unit {
                        if aborted.load(Ordering::SeqCst) {
                            outcomes.push(Outcome::Skipped);
                            continue;
                        }
                        let key = job.path_key();
                        debug!(worker, job = K::NAME, key = %key, "Dequeued job");
                        let store = store.clone();
                        let result = tokio::spawn(async move {
                            job.amemoized_call(&store, true).await.map(|_| ())
                        })
                        .await
                        .map_err(|e| JobError::Join(e.to_string()))
                        .and_then(|r| r);
                        outcomes.push(settle::<K>(key, result, policy, &aborted));
                    }
                }
                outcomes
            });
        }

        collect(set).await
    }
}

/// Group copies of the same job so they run one after another. Copies share
/// a scratch directory.
fn units<K: JobKind>(jobs: Vec<Job<K>>) -> Vec<Vec<Job<K>>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut units: Vec<Vec<Job<K>>> = Vec::new();
    for job in jobs {
        match index.get(&job.path_key()) {
            Some(&i) => units[i].push(job),
            None => {
                index.insert(job.path_key(), units.len());
                units.push(vec![job]);
            }
        }
    }
    units
}

fn settle<K: JobKind>(
    key: String,
    result: JobResult<()>,
    policy: FailurePolicy,
    aborted: &AtomicBool,
) -> Outcome {
    match result {
        Ok(()) => {
            info!(job = K::NAME, key = %key, "Job complete");
            Outcome::Completed
        }
        Err(e) => {
            warn!(job = K::NAME, key = %key, error = %e, "Job failed");
            if policy == FailurePolicy::Abort {
                aborted.store(true, Ordering::SeqCst);
            }
            Outcome::Failed(JobFailure {
                key,
                error: e.to_string(),
            })
        }
    }
}

async fn collect(mut set: JoinSet<Vec<Outcome>>) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(batch) => outcomes.extend(batch),
            Err(e) => outcomes.push(Outcome::Failed(JobFailure {
                key: "<task>".to_string(),
                error: e.to_string(),
            })),
        }
    }
    outcomes
}
