//! Batch expansion, pruning and both executors.
#![cfg(unix)]

mod common;

use common::Bench;
use lcxx_bench::{
    BatchReport, CompilerMetricsJob, HeaderKey, HeaderSpace, IncludeSizeJob, IncludeSizeOutput,
    Invocation, Job, JobKind, JobResult, JobRunner, KeySpace, ProcessOutput, RunnerError,
    RunnerOptions, expand,
};
use lcxx_common::{ExecutorKind, FailurePolicy, LibcxxVersion, Standard, StlHeader};

fn space(standards: Vec<Standard>) -> HeaderSpace {
    HeaderSpace {
        libcxx: vec![LibcxxVersion::V15, LibcxxVersion::V16],
        standards,
        headers: vec![StlHeader::Vector, StlHeader::Map, StlHeader::Array],
    }
}

/// Preprocesses like `include_size` but panics while preparing `<map>`.
struct PanicsOnMap;

impl JobKind for PanicsOnMap {
    type Key = HeaderKey;
    type Output = IncludeSizeOutput;
    const NAME: &'static str = "panics_on_map";

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        assert!(key.header != StlHeader::Map, "cannot prepare {}", key.header);
        Ok(job.compiler().arg(key.standard.flag()).arg("-E"))
    }

    fn parse(_job: &Job<Self>, output: ProcessOutput) -> JobResult<IncludeSizeOutput> {
        output.require_success()?;
        Ok(IncludeSizeOutput {
            line_count: 1,
            size_in_bytes: 1,
        })
    }
}

fn runner(bench: &Bench, options: RunnerOptions) -> JobRunner {
    JobRunner::new(bench.store.clone(), options.with_shuffle_seed(7))
}

#[test]
fn test_expand_replicates_repeatable_jobs() {
    let bench = Bench::new(1, 3);
    let space = space(vec![Standard::Cpp11, Standard::Cpp17]);
    assert_eq!(space.size(), 12);

    let once = expand::<IncludeSizeJob, _>(&space, &bench.ctx).unwrap();
    assert_eq!(once.len(), 12);
    let repeated = expand::<CompilerMetricsJob, _>(&space, &bench.ctx).unwrap();
    assert_eq!(repeated.len(), 36);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_batch_is_fully_pruned() {
    let bench = Bench::new(1, 1);
    let jobs = expand::<IncludeSizeJob, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    let runner = runner(&bench, RunnerOptions::default().with_workers(4));

    let first = runner.run_all(jobs.clone()).await.unwrap();
    assert_eq!(first.total, 6);
    assert_eq!(first.executed, 6);
    assert!(first.is_success());
    assert_eq!(bench.calls(), 6);

    let second = runner.run_all(jobs).await.unwrap();
    assert_eq!(second.pruned, 6);
    assert_eq!(second.executed, 0);
    assert_eq!(bench.calls(), 6);
    assert_eq!(bench.store.list("include_size").unwrap().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_jobs_run_once() {
    let bench = Bench::new(1, 1);
    let mut jobs = expand::<IncludeSizeJob, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    jobs.extend(jobs.clone());

    let report = runner(&bench, RunnerOptions::default().with_workers(3))
        .run_all(jobs)
        .await
        .unwrap();
    assert_eq!(report.total, 12);
    assert_eq!(report.deduplicated, 6);
    assert_eq!(report.executed, 6);
    assert_eq!(bench.calls(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_force_rerun_merges_repeatable_samples() {
    let bench = Bench::new(2, 2);
    let space = HeaderSpace {
        libcxx: vec![LibcxxVersion::V16],
        standards: vec![Standard::Cpp17],
        headers: vec![StlHeader::Vector],
    };
    let jobs = expand::<CompilerMetricsJob, _>(&space, &bench.ctx).unwrap();
    let key = jobs[0].key().clone();
    assert_eq!(jobs.len(), 2);

    let options = RunnerOptions::default().with_workers(2);
    let report = runner(&bench, options.clone()).run_all(jobs.clone()).await.unwrap();
    assert_eq!(report.executed, 2);
    let stored = bench.store.require::<CompilerMetricsJob>(&key).unwrap();
    assert_eq!(stored.len(), 4);

    let report = runner(&bench, options.clone()).run_all(jobs.clone()).await.unwrap();
    assert_eq!(report.pruned, 2);

    let report = runner(&bench, options.with_force_rerun(true))
        .run_all(jobs)
        .await
        .unwrap();
    assert_eq!(report.executed, 2);
    let stored = bench.store.require::<CompilerMetricsJob>(&key).unwrap();
    assert_eq!(stored.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_force_rerun_still_prunes_single_shot_jobs() {
    let bench = Bench::new(1, 1);
    let jobs = expand::<IncludeSizeJob, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    let options = RunnerOptions::default().with_force_rerun(true);

    runner(&bench, options.clone()).run_all(jobs.clone()).await.unwrap();
    let report = runner(&bench, options).run_all(jobs).await.unwrap();
    assert_eq!(report.pruned, 6);
    assert_eq!(bench.calls(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_isolated_failure_does_not_stop_batch() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-std=c++11");
    let jobs = expand::<IncludeSizeJob, _>(
        &space(vec![Standard::Cpp11, Standard::Cpp17]),
        &bench.ctx,
    )
    .unwrap();

    let report = runner(&bench, RunnerOptions::default().with_workers(4))
        .run_all(jobs)
        .await
        .unwrap();
    assert_eq!(report.executed, 6);
    assert_eq!(report.failed.len(), 6);
    assert!(report.failed.iter().all(|f| f.key.contains("/c++11/")));
    assert!(!report.is_success());

    let cached = bench.store.list("include_size").unwrap();
    assert_eq!(cached.len(), 6);
    assert!(cached.iter().all(|r| r.key.contains("/c++17/")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_skips_remaining_jobs() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-E");
    let jobs = expand::<IncludeSizeJob, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    let options = RunnerOptions::default()
        .with_workers(1)
        .with_failure_policy(FailurePolicy::Abort);

    let report = match runner(&bench, options).run_all(jobs).await {
        Err(RunnerError::Aborted { report }) => report,
        other => panic!("expected an aborted batch, got {other:?}"),
    };
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.skipped, 5);
    assert_eq!(report.executed, 0);
    assert_eq!(bench.calls(), 1);
}

#[tokio::test]
async fn test_async_executor_drains_queue() {
    let bench = Bench::new(1, 1);
    let jobs = expand::<IncludeSizeJob, _>(
        &space(vec![Standard::Cpp14, Standard::Cpp17]),
        &bench.ctx,
    )
    .unwrap();
    let options = RunnerOptions::default()
        .with_workers(3)
        .with_executor(ExecutorKind::Async);

    let report: BatchReport = runner(&bench, options).run_all(jobs).await.unwrap();
    assert_eq!(report.executed, 12);
    assert!(report.is_success());
    assert_eq!(bench.calls(), 12);
}

#[tokio::test]
async fn test_async_executor_abort() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-E");
    let jobs = expand::<IncludeSizeJob, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    let options = RunnerOptions::default()
        .with_workers(1)
        .with_executor(ExecutorKind::Async)
        .with_failure_policy(FailurePolicy::Abort);

    match runner(&bench, options).run_all(jobs).await {
        Err(RunnerError::Aborted { report }) => {
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.skipped, 5);
        }
        other => panic!("expected an aborted batch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_async_executor_isolates_failures() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-std=c++11");
    let jobs = expand::<IncludeSizeJob, _>(
        &space(vec![Standard::Cpp11, Standard::Cpp17]),
        &bench.ctx,
    )
    .unwrap();
    let options = RunnerOptions::default()
        .with_workers(2)
        .with_executor(ExecutorKind::Async);

    let report = runner(&bench, options).run_all(jobs).await.unwrap();
    assert_eq!(report.executed, 6);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed.len(), 6);
    assert!(report.failed.iter().all(|f| f.key.contains("/c++11/")));
    assert_eq!(bench.calls(), 12);

    let cached = bench.store.list("include_size").unwrap();
    assert_eq!(cached.len(), 6);
    assert!(cached.iter().all(|r| r.key.contains("/c++17/")));
}

async fn run_with_panicking_jobs(executor: ExecutorKind) {
    let bench = Bench::new(1, 1);
    let jobs = expand::<PanicsOnMap, _>(&space(vec![Standard::Cpp17]), &bench.ctx).unwrap();
    let options = RunnerOptions::default()
        .with_workers(2)
        .with_executor(executor);

    let report = runner(&bench, options).run_all(jobs).await.unwrap();
    assert_eq!(report.total, 6);
    assert_eq!(report.executed, 4, "{executor}");
    assert_eq!(report.failed.len(), 2, "{executor}");
    assert!(report.failed.iter().all(|f| f.key.ends_with("/map")));
    assert_eq!(bench.store.list(PanicsOnMap::NAME).unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_job_is_a_failure_on_blocking_pool() {
    run_with_panicking_jobs(ExecutorKind::Blocking).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_job_is_a_failure_on_async_pool() {
    run_with_panicking_jobs(ExecutorKind::Async).await;
}

#[test]
fn test_seeded_plan_is_reproducible() {
    let bench = Bench::new(1, 1);
    let jobs = expand::<IncludeSizeJob, _>(
        &space(vec![Standard::Cpp14, Standard::Cpp17]),
        &bench.ctx,
    )
    .unwrap();
    let runner = runner(&bench, RunnerOptions::default());

    let order = |jobs: Vec<Job<IncludeSizeJob>>| {
        let mut report = BatchReport::default();
        runner
            .plan(jobs, &mut report)
            .unwrap()
            .iter()
            .map(|j| j.path_key())
            .collect::<Vec<_>>()
    };
    let a = order(jobs.clone());
    let b = order(jobs.clone());
    assert_eq!(a, b);

    let mut sorted = a.clone();
    sorted.sort();
    let mut expected: Vec<_> = jobs.iter().map(|j| j.path_key()).collect();
    expected.sort();
    assert_eq!(sorted, expected);
}
