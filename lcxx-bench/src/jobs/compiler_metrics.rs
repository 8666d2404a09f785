//! Compile time and peak memory, sampled from clang's `-fproc-stat-report`.

use crate::error::{JobError, JobResult};
use crate::invocation::{Invocation, ProcessOutput};
use crate::job::{BenchContext, Job, JobKind, include_source};
use crate::key::{HeaderKey, SourceKey};
use crate::output::{CompilerMetrics, CompilerMetricsList};
use lcxx_common::{Elapsed, MemoryUsage, Standard};
use std::fs;
use std::path::Path;

const REPORT_FILE: &str = "usage.txt";

/// Compiles a one-header translation unit.
pub struct CompilerMetricsJob;

impl JobKind for CompilerMetricsJob {
    type Key = HeaderKey;
    type Output = CompilerMetricsList;
    const NAME: &'static str = "compiler_metrics";
    const REPEATABLE: bool = true;

    fn samples(ctx: &BenchContext) -> u32 {
        ctx.runs_per_repeat
    }

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        let input = job.write_tmp_file("input.cpp", &include_source(key.header.as_str()))?;
        stat_invocation(job, key.standard, &input, Vec::new())
    }

    fn parse(job: &Job<Self>, output: ProcessOutput) -> JobResult<CompilerMetricsList> {
        read_report(job, output)
    }
}

/// Compiles an instantiation test source from the inputs root.
pub struct CompilerMetricsTestSourceJob;

impl JobKind for CompilerMetricsTestSourceJob {
    type Key = SourceKey;
    type Output = CompilerMetricsList;
    const NAME: &'static str = "compiler_metrics_test_source";
    const REPEATABLE: bool = true;

    fn samples(ctx: &BenchContext) -> u32 {
        ctx.runs_per_repeat
    }

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        let inputs_root = &job.context().inputs_root;
        let input = key.input.path(inputs_root);
        let include = inputs_root.join("include").display().to_string();
        stat_invocation(job, key.standard, &input, vec!["-I".to_string(), include])
    }

    fn parse(job: &Job<Self>, output: ProcessOutput) -> JobResult<CompilerMetricsList> {
        read_report(job, output)
    }
}

fn stat_invocation<K: JobKind>(
    job: &Job<K>,
    standard: Standard,
    input: &Path,
    extra: Vec<String>,
) -> JobResult<Invocation> {
    // A stale report from an earlier pass must never be read back.
    let report = job.output_file(REPORT_FILE);
    match fs::remove_file(&report) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(JobError::io(&report, e)),
    }

    Ok(job
        .compiler()
        .args(["-o", "/dev/null", "-c"])
        .arg(standard.flag())
        .args(job.toolchain().include_flags())
        .args(extra)
        .arg(format!("-fproc-stat-report={}", report.display()))
        .arg("-xc++")
        .path_arg(input))
}

fn read_report<K: JobKind>(job: &Job<K>, output: ProcessOutput) -> JobResult<CompilerMetricsList> {
    output.require_success()?;
    let report = job.output_file(REPORT_FILE);
    let text = fs::read_to_string(&report).map_err(|e| JobError::io(&report, e))?;
    let sample = parse_proc_stat_report(&text).map_err(|message| JobError::Parse {
        job: K::NAME,
        message,
    })?;
    Ok(CompilerMetricsList::single(sample))
}

/// Parse the last record of a proc-stat report.
///
/// Columns: filename, output filename, total µs, user µs, peak KB. Names may
/// contain commas, so the numeric columns are taken from the right.
pub fn parse_proc_stat_report(text: &str) -> Result<CompilerMetrics, String> {
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| "empty proc-stat report".to_string())?;

    let fields: Vec<&str> = line.rsplitn(4, ',').collect();
    let [peak, user, total, names] = fields.as_slice() else {
        return Err(format!("expected 5 columns in proc-stat record: {line}"));
    };
    if !names.contains(',') {
        return Err(format!("expected 5 columns in proc-stat record: {line}"));
    }

    let num = |column: &str, raw: &str| {
        raw.trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid {column} '{raw}' in proc-stat record"))
    };
    Ok(CompilerMetrics {
        total_execution_time: Elapsed::from_micros(num("total time", *total)?),
        user_execution_time: Elapsed::from_micros(num("user time", *user)?),
        peak_memory_usage: MemoryUsage::from_kilobytes(num("peak memory", *peak)?),
    })
}
