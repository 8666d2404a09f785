//! Number of `std` classes and functions a header declares, counted with
//! clang-query.

use crate::error::{JobError, JobResult};
use crate::invocation::{Invocation, ProcessOutput};
use crate::job::{Job, JobKind, include_source};
use crate::key::HeaderKey;
use crate::output::SymbolCountOutput;
use regex::Regex;
use std::sync::OnceLock;

const QUERY: &str = "set traversal IgnoreUnlessSpelledInSource
set bind-root false
m namedDecl(anyOf(cxxRecordDecl(isInStdNamespace()), functionDecl(isInStdNamespace())))
";

fn matches_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+) match(?:es)?\.$").expect("valid match-count regex"))
}

pub struct StdSymbolsJob;

impl JobKind for StdSymbolsJob {
    type Key = HeaderKey;
    type Output = SymbolCountOutput;
    const NAME: &'static str = "std_symbols";

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        let input = job.write_tmp_file("input.cpp", &include_source(key.header.as_str()))?;

        let mut command = vec![job.context().cxx.clone(), key.standard.flag()];
        command.extend(job.toolchain().include_flags());
        command.extend(["-xc++".to_string(), "-c".to_string(), input.display().to_string()]);
        let database = serde_json::json!([{
            "directory": job.tmp_dir(),
            "arguments": command,
            "file": input,
        }]);
        let database = serde_json::to_string_pretty(&database).map_err(|e| JobError::Parse {
            job: Self::NAME,
            message: format!("cannot encode compilation database: {e}"),
        })?;
        job.write_tmp_file("compile_commands.json", &database)?;
        let matcher = job.write_tmp_file("matcher.txt", QUERY)?;

        Ok(Invocation::new(&job.context().clang_query)
            .arg("-f")
            .path_arg(&matcher)
            .arg("-p")
            .path_arg(&job.tmp_dir())
            .path_arg(&input))
    }

    fn parse(_job: &Job<Self>, output: ProcessOutput) -> JobResult<SymbolCountOutput> {
        let output = output.require_success()?;
        let symbol_count = count_matches(&output.stdout).ok_or_else(|| JobError::Parse {
            job: Self::NAME,
            message: "no match count in clang-query output".to_string(),
        })?;
        Ok(SymbolCountOutput { symbol_count })
    }
}

/// The `N matches.` summary from the last non-empty line.
pub fn count_matches(stdout: &str) -> Option<u64> {
    let last = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    matches_re().captures(last)?.get(1)?.as_str().parse().ok()
}
