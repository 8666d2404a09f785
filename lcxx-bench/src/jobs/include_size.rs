//! Preprocessed size of a single header.

use crate::error::JobResult;
use crate::invocation::{Invocation, ProcessOutput};
use crate::job::{Job, JobKind, include_source};
use crate::key::HeaderKey;
use crate::output::IncludeSizeOutput;

pub struct IncludeSizeJob;

impl JobKind for IncludeSizeJob {
    type Key = HeaderKey;
    type Output = IncludeSizeOutput;
    const NAME: &'static str = "include_size";

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        let input = job.write_tmp_file("input.cpp", &include_source(key.header.as_str()))?;
        Ok(job
            .compiler()
            .arg(key.standard.flag())
            .arg("-E")
            .args(job.toolchain().include_flags())
            .arg("-xc++")
            .path_arg(&input))
    }

    fn parse(_job: &Job<Self>, output: ProcessOutput) -> JobResult<IncludeSizeOutput> {
        let output = output.require_success()?;
        Ok(measure_preprocessed(&output.stdout))
    }
}

/// Count code lines (skipping blanks and `#` line markers) and trimmed size.
pub fn measure_preprocessed(text: &str) -> IncludeSizeOutput {
    let line_count = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .count() as u64;
    IncludeSizeOutput {
        line_count,
        size_in_bytes: text.trim().len() as u64,
    }
}
