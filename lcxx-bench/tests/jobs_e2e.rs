//! Each job kind end to end against the fake toolchain.
#![cfg(unix)]

mod common;

use common::{Bench, PREPROCESSED};
use lcxx_bench::{
    BinarySize, BinarySizeJob, CompilerMetricsJob, CompilerMetricsTestSourceJob, HeaderKey,
    IncludeSizeJob, InstantiationKey, Job, JobError, SourceKey, StdSymbolsJob,
};
use lcxx_common::{
    DebugOpts, LibcxxVersion, OptimizerOpts, ResolveError, Standard, StlHeader, TestInput,
};
use std::fs;

fn vector_key(standard: Standard) -> HeaderKey {
    HeaderKey {
        libcxx: LibcxxVersion::V16,
        standard,
        header: StlHeader::Vector,
    }
}

#[test]
fn test_include_size_is_measured_once() {
    let bench = Bench::new(10, 1);
    let job = Job::<IncludeSizeJob>::create(vector_key(Standard::Cpp17), &bench.ctx).unwrap();

    let first = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(first.line_count, 5);
    assert_eq!(first.size_in_bytes, PREPROCESSED.trim().len() as u64);
    assert_eq!(bench.calls(), 1);

    let second = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(second, first);
    assert_eq!(bench.calls(), 1);

    let input = fs::read_to_string(job.tmp_file("input.cpp")).unwrap();
    assert_eq!(input, "#include <vector>\nint main() {\n}\n");
}

#[test]
fn test_compiler_metrics_collects_runs_per_repeat_samples() {
    let bench = Bench::new(10, 1);
    let job = Job::<CompilerMetricsJob>::create(vector_key(Standard::Cpp17), &bench.ctx).unwrap();

    let list = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(list.len(), 10);
    let avg = list.compute_average().unwrap();
    // Calls 1..=10 report n ms total, n/2 ms user, n*100 KB.
    assert_eq!(avg.total_execution_time.microseconds, 5_500);
    assert_eq!(avg.user_execution_time.microseconds, 2_750);
    assert_eq!(avg.peak_memory_usage.kilobytes, 550);

    // Forced reruns merge into the stored samples but return only their own.
    let rerun = job.memoized_call(&bench.store, true).unwrap();
    assert_eq!(rerun.len(), 10);
    assert_eq!(rerun.samples[0].total_execution_time.microseconds, 11_000);
    let stored = bench.store.require::<CompilerMetricsJob>(job.key()).unwrap();
    assert_eq!(stored.len(), 20);
    assert_eq!(bench.calls(), 20);
}

#[test]
fn test_compiler_metrics_on_test_source() {
    let bench = Bench::new(3, 1);
    let key = SourceKey {
        libcxx: LibcxxVersion::V15,
        standard: Standard::Cpp20,
        input: TestInput::SharedPtr,
    };
    let job = Job::<CompilerMetricsTestSourceJob>::create(key, &bench.ctx).unwrap();
    assert_eq!(job.path_key(), "15.0.0/c++20/instantiation.shared_ptr");

    let list = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(bench.calls(), 3);
}

#[test]
fn test_std_symbols_writes_compilation_database() {
    let bench = Bench::new(1, 1);
    let job = Job::<StdSymbolsJob>::create(vector_key(Standard::Cpp14), &bench.ctx).unwrap();

    let out = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(out.symbol_count, 3);

    let database = fs::read_to_string(job.tmp_file("compile_commands.json")).unwrap();
    let database: serde_json::Value = serde_json::from_str(&database).unwrap();
    let arguments = database[0]["arguments"].as_array().unwrap();
    assert!(arguments.iter().any(|a| a == "-std=c++14"));
    assert!(job.tmp_file("matcher.txt").is_file());
}

#[test]
fn test_binary_size_records_object_size() {
    let bench = Bench::new(1, 1);
    let key = InstantiationKey {
        libcxx: LibcxxVersion::V16,
        standard: Standard::Cpp17,
        input: TestInput::Vector,
        debug: DebugOpts::Off,
        optimize: OptimizerOpts::O2,
    };
    let job = Job::<BinarySizeJob>::create(key, &bench.ctx).unwrap();
    let out = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(out, BinarySize::Object { bytes: 1234 });
}

#[test]
fn test_binary_size_caches_compile_failure() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-O3");
    let key = InstantiationKey {
        libcxx: LibcxxVersion::V16,
        standard: Standard::Cpp17,
        input: TestInput::Algorithm,
        debug: DebugOpts::On,
        optimize: OptimizerOpts::O3,
    };
    let job = Job::<BinarySizeJob>::create(key, &bench.ctx).unwrap();

    let out = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(out, BinarySize::CompileFailed { exit_code: Some(1) });
    assert_eq!(out.bytes(), None);

    job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(bench.calls(), 1);
}

#[test]
fn test_failed_tool_stores_nothing() {
    let bench = Bench::new(1, 1);
    bench.fail_on("-std=c++11");
    let job = Job::<IncludeSizeJob>::create(vector_key(Standard::Cpp11), &bench.ctx).unwrap();

    let err = job.memoized_call(&bench.store, false).unwrap_err();
    assert!(matches!(err, JobError::ToolFailed { exit_code: Some(1), .. }));
    assert!(err.to_string().contains("simulated failure"));
    assert!(bench.store.get::<IncludeSizeJob>(job.key()).unwrap().is_none());
}

#[test]
fn test_uninstalled_release_fails_to_create() {
    let bench = Bench::new(1, 1);
    let key = HeaderKey {
        libcxx: LibcxxVersion::V9,
        standard: Standard::Cpp17,
        header: StlHeader::Vector,
    };
    let err = Job::<IncludeSizeJob>::create(key, &bench.ctx).unwrap_err();
    assert!(matches!(
        err,
        JobError::Resolve(ResolveError::NoSuchVersion { .. })
    ));
    assert!(!bench.ctx.scratch_root.exists());
}

#[tokio::test]
async fn test_async_call_matches_blocking_call() {
    let bench = Bench::new(4, 1);
    let job = Job::<CompilerMetricsJob>::create(vector_key(Standard::Cpp20), &bench.ctx).unwrap();

    let first = job.amemoized_call(&bench.store, false).await.unwrap();
    assert_eq!(first.len(), 4);
    let cached = job.memoized_call(&bench.store, false).unwrap();
    assert_eq!(cached, first);
    assert_eq!(bench.calls(), 4);
}
