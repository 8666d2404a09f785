//! External tool invocations.

use crate::error::{JobError, JobResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use tracing::debug;

/// A command line to run, independent of how it is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Captured result of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub program: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    fn from_output(program: &str, output: Output) -> Self {
        Self {
            program: program.to_string(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Treat a non-zero exit as a job failure.
    pub fn require_success(self) -> JobResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(JobError::ToolFailed {
                program: self.program,
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn spawn_error(&self, source: std::io::Error) -> JobError {
        JobError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    /// Run to completion on the current thread.
    pub fn run_blocking(&self) -> JobResult<ProcessOutput> {
        debug!(command = %self, "Running");
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|e| self.spawn_error(e))?;
        Ok(ProcessOutput::from_output(&self.program, output))
    }

    /// Run to completion without blocking the runtime.
    pub async fn run_async(&self) -> JobResult<ProcessOutput> {
        debug!(command = %self, "Running (async)");
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let output = cmd.output().await.map_err(|e| self.spawn_error(e))?;
        Ok(ProcessOutput::from_output(&self.program, output))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
