//! libc++ metrics - batch CLI
//!
//! Resolves toolchains, runs measurement batches against the datapoint
//! store, and inspects or clears cached results.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lcxx_bench::{
    BatchReport, BenchContext, BinarySizeJob, CompilerMetricsJob, CompilerMetricsTestSourceJob,
    DatapointStore, HeaderSpace, IncludeSizeJob, InstantiationSpace, JobKey, JobKind, JobName,
    JobRunner, KeySpace, RunnerError, RunnerOptions, SourceSpace, StdSymbolsJob, expand_keys,
};
use lcxx_common::{
    BenchConfig, DebugOpts, ExecutorKind, FailurePolicy, LibcxxVersion, LogConfig, OptimizerOpts,
    Standard, StlHeader, TestInput, VersionRegistry, init_logging,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lcxx-bench")]
#[command(author, version, about = "Memoized libc++ compile-metric batches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/lcxx-bench/config.toml if present)
    #[arg(long, global = true, env = "LCXX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a version identifier and print its toolchain descriptor
    Resolve {
        /// e.g. "16", "v16.0.0", "trunk", "installed"
        identifier: String,

        /// Print the compile and link flags instead of the descriptor
        #[arg(long)]
        flags: bool,
    },

    /// List every toolchain installed under the versions root
    Versions,

    /// Expand, prune and execute a batch of jobs
    Run(RunArgs),

    /// List cached results for a job kind
    Show {
        job: JobName,

        #[arg(long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Delete every cached result for a job kind
    Clear { job: JobName },

    /// Count cached results per job kind
    Status,
}

#[derive(Args)]
struct RunArgs {
    /// Job kind (include_size, compiler_metrics, compiler_metrics_test_source,
    /// std_symbols, binary_size)
    job: JobName,

    /// libc++ releases (defaults to every release installed)
    #[arg(long, value_delimiter = ',')]
    versions: Vec<LibcxxVersion>,

    /// Language dialects (defaults to all)
    #[arg(long, value_delimiter = ',')]
    standards: Vec<Standard>,

    /// Headers for header-keyed jobs (defaults to a small core sample)
    #[arg(long, value_delimiter = ',')]
    headers: Vec<StlHeader>,

    /// Test inputs for source-keyed jobs (defaults to all)
    #[arg(long, value_delimiter = ',')]
    inputs: Vec<TestInput>,

    /// Debug modes for binary_size (defaults to both)
    #[arg(long, value_delimiter = ',')]
    debug: Vec<DebugOpts>,

    /// Optimization levels for binary_size (defaults to all)
    #[arg(long, value_delimiter = ',')]
    optimize: Vec<OptimizerOpts>,

    /// Re-run cached repeatable jobs and merge the new samples
    #[arg(long)]
    force: bool,

    /// Concurrent jobs
    #[arg(short, long)]
    workers: Option<u32>,

    #[arg(long)]
    executor: Option<ExecutorKind>,

    /// Stop starting new jobs after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Fixed shuffle seed for a reproducible dispatch order
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    let mut config = BenchConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Resolve { identifier, flags } => {
            let registry = VersionRegistry::new(&config.paths.versions_root);
            let descriptor = registry.resolve(&identifier)?;
            if flags {
                println!("{}", descriptor.flags().join(" "));
            } else {
                println!("{}", serde_json::to_string_pretty(&*descriptor)?);
            }
            Ok(())
        }
        Commands::Versions => {
            let registry = VersionRegistry::new(&config.paths.versions_root);
            for descriptor in registry.available()? {
                println!("{:<16} {}", descriptor.identifier, descriptor.path.display());
            }
            Ok(())
        }
        Commands::Run(args) => {
            apply_run_flags(&mut config, &args)?;
            let report = run(&config, args).await?;
            print_report(&report);
            if !report.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Show { job, format } => {
            let store = DatapointStore::open(&config.paths.database)?;
            let records = store.list(job.as_str())?;
            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = records
                        .iter()
                        .map(|r| {
                            serde_json::json!({
                                "key": r.key,
                                "dimensions": r.key_json,
                                "value_type": r.value.type_tag(),
                                "value": r.value,
                                "updated_at": r.updated_at.to_rfc3339(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                OutputFormat::Pretty => {
                    if records.is_empty() {
                        println!("No cached results for {job}");
                    }
                    for r in &records {
                        println!("{:<56} {}", r.key, r.value.summary());
                    }
                }
            }
            Ok(())
        }
        Commands::Clear { job } => {
            let store = DatapointStore::open(&config.paths.database)?;
            let removed = store.clear(job.as_str())?;
            println!("Removed {removed} cached result(s) for {job}");
            Ok(())
        }
        Commands::Status => {
            let store = DatapointStore::open(&config.paths.database)?;
            println!("Database: {}", store.path().display());
            println!("Settings:");
            print_setting(&config, "paths.versions_root", config.paths.versions_root.display());
            print_setting(&config, "paths.inputs_root", config.paths.inputs_root.display());
            print_setting(&config, "tools.cxx", &config.tools.cxx);
            print_setting(&config, "runner.workers", config.runner.workers);
            print_setting(&config, "runner.executor", config.runner.executor);
            print_setting(&config, "runner.failure_policy", config.runner.failure_policy);
            print_setting(&config, "jobs.repeat_count", config.jobs.repeat_count);
            print_setting(&config, "jobs.runs_per_repeat", config.jobs.runs_per_repeat);
            println!("Cached results:");
            let counts = store.job_counts()?;
            for name in JobName::ALL {
                let n = counts
                    .iter()
                    .find(|(job, _)| job == name.as_str())
                    .map_or(0, |(_, n)| *n);
                println!("  {:<30} {n}", name.as_str());
            }
            Ok(())
        }
    }
}

async fn run(config: &BenchConfig, args: RunArgs) -> Result<BatchReport> {
    let ctx = Arc::new(BenchContext::from_config(config));
    let store = DatapointStore::open(&config.paths.database)?;

    info!(
        workers = %config.sourced("runner.workers", config.runner.workers),
        executor = %config.sourced("runner.executor", config.runner.executor),
        failure_policy = %config.sourced("runner.failure_policy", config.runner.failure_policy),
        "Runner settings"
    );
    let options = RunnerOptions::from_config(config).with_force_rerun(args.force);
    let runner = JobRunner::new(store, options);

    let versions = if args.versions.is_empty() {
        installed_releases(&ctx.registry)
    } else {
        args.versions
    };
    let standards = or_all(args.standards, &Standard::ALL);

    match args.job {
        JobName::IncludeSize | JobName::CompilerMetrics | JobName::StdSymbols => {
            let headers = if args.headers.is_empty() {
                StlHeader::small_core_sample()
            } else {
                args.headers
            };
            let space = HeaderSpace {
                libcxx: versions,
                standards,
                headers,
            };
            match args.job {
                JobName::IncludeSize => run_space::<IncludeSizeJob, _>(&runner, &ctx, &space).await,
                JobName::CompilerMetrics => {
                    run_space::<CompilerMetricsJob, _>(&runner, &ctx, &space).await
                }
                _ => run_space::<StdSymbolsJob, _>(&runner, &ctx, &space).await,
            }
        }
        JobName::CompilerMetricsTestSource => {
            let space = SourceSpace {
                libcxx: versions,
                standards,
                inputs: or_all(args.inputs, &TestInput::ALL),
            };
            run_space::<CompilerMetricsTestSourceJob, _>(&runner, &ctx, &space).await
        }
        JobName::BinarySize => {
            let space = InstantiationSpace {
                libcxx: versions,
                standards,
                inputs: or_all(args.inputs, &TestInput::ALL),
                debug: or_all(args.debug, &DebugOpts::ALL),
                optimize: or_all(args.optimize, &OptimizerOpts::ALL),
            };
            run_space::<BinarySizeJob, _>(&runner, &ctx, &space).await
        }
    }
}

async fn run_space<K, S>(
    runner: &JobRunner,
    ctx: &Arc<BenchContext>,
    space: &S,
) -> Result<BatchReport>
where
    K: JobKind,
    S: KeySpace<Key = K::Key>,
{
    let keys: Vec<K::Key> = space.expand().into_iter().filter(|k| k.is_supported()).collect();
    let unsupported = space.size() - keys.len();
    if unsupported > 0 {
        info!(job = K::NAME, unsupported, "Skipping unsupported combinations");
    }
    let jobs = expand_keys::<K>(keys, ctx)?;
    match runner.run_all(jobs).await {
        Ok(report) => Ok(report),
        Err(RunnerError::Aborted { report }) => {
            warn!(job = K::NAME, "Batch aborted after a failure");
            Ok(*report)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fold the runner flags into the config so they are tagged as command-line values.
fn apply_run_flags(config: &mut BenchConfig, args: &RunArgs) -> Result<()> {
    if let Some(workers) = args.workers {
        config.runner.workers = workers;
        config.mark_cli("runner.workers");
    }
    if let Some(executor) = args.executor {
        config.runner.executor = executor;
        config.mark_cli("runner.executor");
    }
    if args.fail_fast {
        config.runner.failure_policy = FailurePolicy::Abort;
        config.mark_cli("runner.failure_policy");
    }
    if let Some(seed) = args.seed {
        config.runner.shuffle_seed = Some(seed);
        config.mark_cli("runner.shuffle_seed");
    }
    config.validate()?;
    Ok(())
}

fn print_setting(config: &BenchConfig, field: &str, value: impl std::fmt::Display) {
    println!("  {field:<24} {}", config.sourced(field, value));
}

/// Released versions that resolve under the versions root.
fn installed_releases(registry: &VersionRegistry) -> Vec<LibcxxVersion> {
    LibcxxVersion::ALL
        .into_iter()
        .filter(|v| v.version().is_some())
        .filter(|v| registry.resolve_version(*v).is_ok())
        .collect()
}

fn or_all<T: Copy>(chosen: Vec<T>, all: &[T]) -> Vec<T> {
    if chosen.is_empty() { all.to_vec() } else { chosen }
}

fn print_report(report: &BatchReport) {
    println!("=== {} ===", report.job);
    println!("Total:        {}", report.total);
    println!("Cached:       {}", report.pruned);
    println!("Deduplicated: {}", report.deduplicated);
    println!("Executed:     {}", report.executed);
    println!("Failed:       {}", report.failed.len());
    if report.skipped > 0 {
        println!("Skipped:      {}", report.skipped);
    }
    for failure in &report.failed {
        println!("  {}: {}", failure.key, failure.error);
    }
}
