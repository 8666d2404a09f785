//! Type tags for polymorphic stored values.
//!
//! The store persists each value with the tag of its output type. Decoding a
//! row without knowing the job kind goes through this fixed table; a tag
//! missing from it means the database was written by an incompatible build.

use crate::error::{StoreError, StoreResult};
use crate::output::{
    BinarySize, CompilerMetricsList, IncludeSizeOutput, JobOutput, SymbolCountOutput,
};
use serde::Serialize;

/// Every output type the store knows how to decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredValue {
    IncludeSize(IncludeSizeOutput),
    CompilerMetrics(CompilerMetricsList),
    SymbolCount(SymbolCountOutput),
    BinarySize(BinarySize),
}

pub const REGISTERED_TAGS: [&str; 4] = [
    IncludeSizeOutput::TYPE_TAG,
    CompilerMetricsList::TYPE_TAG,
    SymbolCountOutput::TYPE_TAG,
    BinarySize::TYPE_TAG,
];

pub fn is_registered(tag: &str) -> bool {
    REGISTERED_TAGS.contains(&tag)
}

fn parse<T: JobOutput>(json: &str) -> StoreResult<T> {
    serde_json::from_str(json).map_err(|source| StoreError::Serialize {
        what: T::TYPE_TAG,
        source,
    })
}

/// Decode a stored value by its tag.
pub fn decode(tag: &str, json: &str) -> StoreResult<StoredValue> {
    match tag {
        t if t == IncludeSizeOutput::TYPE_TAG => parse(json).map(StoredValue::IncludeSize),
        t if t == CompilerMetricsList::TYPE_TAG => parse(json).map(StoredValue::CompilerMetrics),
        t if t == SymbolCountOutput::TYPE_TAG => parse(json).map(StoredValue::SymbolCount),
        t if t == BinarySize::TYPE_TAG => parse(json).map(StoredValue::BinarySize),
        other => Err(StoreError::UnregisteredType(other.to_string())),
    }
}

impl StoredValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::IncludeSize(_) => IncludeSizeOutput::TYPE_TAG,
            Self::CompilerMetrics(_) => CompilerMetricsList::TYPE_TAG,
            Self::SymbolCount(_) => SymbolCountOutput::TYPE_TAG,
            Self::BinarySize(_) => BinarySize::TYPE_TAG,
        }
    }

    /// One-line human summary; repeatable samples are shown as their average.
    pub fn summary(&self) -> String {
        match self {
            Self::IncludeSize(v) => format!("{} lines, {} bytes", v.line_count, v.size_in_bytes),
            Self::CompilerMetrics(list) => match list.compute_average() {
                Some(avg) => format!(
                    "{} samples, avg total {}, user {}, peak {}",
                    list.len(),
                    avg.total_execution_time,
                    avg.user_execution_time,
                    avg.peak_memory_usage
                ),
                None => "no samples".to_string(),
            },
            Self::SymbolCount(v) => format!("{} symbols", v.symbol_count),
            Self::BinarySize(BinarySize::Object { bytes }) => format!("{bytes} bytes"),
            Self::BinarySize(BinarySize::CompileFailed { exit_code }) => match exit_code {
                Some(code) => format!("compile failed (status {code})"),
                None => "compile failed (signal)".to_string(),
            },
        }
    }
}
