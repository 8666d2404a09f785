//! Concrete job kinds.

mod binary_size;
mod compiler_metrics;
mod include_size;
mod std_symbols;

pub use binary_size::BinarySizeJob;
pub use compiler_metrics::{
    CompilerMetricsJob, CompilerMetricsTestSourceJob, parse_proc_stat_report,
};
pub use include_size::{IncludeSizeJob, measure_preprocessed};
pub use std_symbols::{StdSymbolsJob, count_matches};

use crate::job::JobKind;
use std::fmt;
use std::str::FromStr;

/// Names of every job kind, for selecting one at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    IncludeSize,
    CompilerMetrics,
    CompilerMetricsTestSource,
    StdSymbols,
    BinarySize,
}

impl JobName {
    pub const ALL: [JobName; 5] = [
        Self::IncludeSize,
        Self::CompilerMetrics,
        Self::CompilerMetricsTestSource,
        Self::StdSymbols,
        Self::BinarySize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncludeSize => IncludeSizeJob::NAME,
            Self::CompilerMetrics => CompilerMetricsJob::NAME,
            Self::CompilerMetricsTestSource => CompilerMetricsTestSourceJob::NAME,
            Self::StdSymbols => StdSymbolsJob::NAME,
            Self::BinarySize => BinarySizeJob::NAME,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        match self {
            Self::IncludeSize => IncludeSizeJob::REPEATABLE,
            Self::CompilerMetrics => CompilerMetricsJob::REPEATABLE,
            Self::CompilerMetricsTestSource => CompilerMetricsTestSourceJob::REPEATABLE,
            Self::StdSymbols => StdSymbolsJob::REPEATABLE,
            Self::BinarySize => BinarySizeJob::REPEATABLE,
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let normalized = normalized.trim_end_matches("_job");
        Self::ALL
            .into_iter()
            .find(|j| j.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(JobName::as_str).collect();
                format!("unknown job '{s}' (known: {})", known.join(", "))
            })
    }
}
