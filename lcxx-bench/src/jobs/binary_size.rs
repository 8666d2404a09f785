//! Object size of an instantiation test source.
//!
//! A configuration that fails to compile is an observation, not an error:
//! it is recorded as [`BinarySize::CompileFailed`] and cached.

use crate::error::{JobError, JobResult};
use crate::invocation::{Invocation, ProcessOutput};
use crate::job::{Job, JobKind};
use crate::key::InstantiationKey;
use crate::output::BinarySize;
use std::fs;
use tracing::debug;

const OBJECT_FILE: &str = "test.o";

pub struct BinarySizeJob;

impl JobKind for BinarySizeJob {
    type Key = InstantiationKey;
    type Output = BinarySize;
    const NAME: &'static str = "binary_size";

    fn prepare(job: &Job<Self>) -> JobResult<Invocation> {
        let key = job.key();
        let object = job.tmp_file(OBJECT_FILE);
        match fs::remove_file(&object) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(JobError::io(&object, e)),
        }

        let inputs_root = &job.context().inputs_root;
        Ok(job
            .compiler()
            .arg(key.standard.flag())
            .arg(key.debug.flag())
            .arg(key.optimize.flag())
            .args(job.toolchain().include_flags())
            .arg("-I")
            .path_arg(&inputs_root.join("include"))
            .arg("-o")
            .path_arg(&object)
            .arg("-c")
            .path_arg(&key.input.path(inputs_root)))
    }

    fn parse(job: &Job<Self>, output: ProcessOutput) -> JobResult<BinarySize> {
        if !output.success() {
            debug!(
                key = %job.path_key(),
                exit_code = ?output.exit_code,
                "Configuration does not compile"
            );
            return Ok(BinarySize::CompileFailed {
                exit_code: output.exit_code,
            });
        }
        let object = job.tmp_file(OBJECT_FILE);
        let bytes = fs::metadata(&object)
            .map_err(|e| JobError::io(&object, e))?
            .len();
        Ok(BinarySize::Object { bytes })
    }
}
