//! Job outputs.

use lcxx_common::{Elapsed, MemoryUsage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A job's measurement result as stored in the datapoint store.
pub trait JobOutput:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Registered type tag persisted next to the value.
    const TYPE_TAG: &'static str;

    /// Fold a newer result into this one. Single-shot outputs are replaced;
    /// sample collections are extended.
    fn merge(&mut self, other: Self) {
        *self = other;
    }
}

/// Size of a header after preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeSizeOutput {
    /// Non-empty lines that are not line markers.
    pub line_count: u64,
    pub size_in_bytes: u64,
}

impl JobOutput for IncludeSizeOutput {
    const TYPE_TAG: &'static str = "IncludeSizeOutput";
}

/// One compiler resource-usage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerMetrics {
    pub total_execution_time: Elapsed,
    pub user_execution_time: Elapsed,
    pub peak_memory_usage: MemoryUsage,
}

/// Accumulated samples for a repeatable compile-time measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerMetricsList {
    pub samples: Vec<CompilerMetrics>,
}

impl CompilerMetricsList {
    pub fn single(sample: CompilerMetrics) -> Self {
        Self {
            samples: vec![sample],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Integer mean of every field across all samples.
    pub fn compute_average(&self) -> Option<CompilerMetrics> {
        let n = self.samples.len() as u64;
        if n == 0 {
            return None;
        }
        let mean = |f: fn(&CompilerMetrics) -> u64| self.samples.iter().map(f).sum::<u64>() / n;
        Some(CompilerMetrics {
            total_execution_time: Elapsed::from_micros(mean(|s| {
                s.total_execution_time.microseconds
            })),
            user_execution_time: Elapsed::from_micros(mean(|s| s.user_execution_time.microseconds)),
            peak_memory_usage: MemoryUsage::from_kilobytes(mean(|s| s.peak_memory_usage.kilobytes)),
        })
    }
}

impl JobOutput for CompilerMetricsList {
    const TYPE_TAG: &'static str = "CompilerMetricsList";

    fn merge(&mut self, other: Self) {
        self.samples.extend(other.samples);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCountOutput {
    pub symbol_count: u64,
}

impl JobOutput for SymbolCountOutput {
    const TYPE_TAG: &'static str = "SymbolCountOutput";
}

/// Object size, or the fact that the configuration did not compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BinarySize {
    Object { bytes: u64 },
    CompileFailed { exit_code: Option<i32> },
}

impl BinarySize {
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Object { bytes } => Some(*bytes),
            Self::CompileFailed { .. } => None,
        }
    }
}

impl JobOutput for BinarySize {
    const TYPE_TAG: &'static str = "BinarySize";
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(total: u64, user: u64, kb: u64) -> CompilerMetrics {
        CompilerMetrics {
            total_execution_time: Elapsed::from_micros(total),
            user_execution_time: Elapsed::from_micros(user),
            peak_memory_usage: MemoryUsage::from_kilobytes(kb),
        }
    }

    #[test]
    fn test_average_is_integer_mean() {
        let list = CompilerMetricsList {
            samples: vec![sample(10, 5, 100), sample(11, 6, 101), sample(13, 6, 103)],
        };
        let avg = list.compute_average().unwrap();
        assert_eq!(avg.total_execution_time.microseconds, 11);
        assert_eq!(avg.user_execution_time.microseconds, 5);
        assert_eq!(avg.peak_memory_usage.kilobytes, 101);
        assert!(CompilerMetricsList::default().compute_average().is_none());
    }

    #[test]
    fn test_single_shot_merge_replaces() {
        let mut a = IncludeSizeOutput {
            line_count: 1,
            size_in_bytes: 2,
        };
        let b = IncludeSizeOutput {
            line_count: 3,
            size_in_bytes: 4,
        };
        a.merge(b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_binary_size_json_shape() {
        let v = serde_json::to_value(BinarySize::Object { bytes: 42 }).unwrap();
        assert_eq!(v, serde_json::json!({"outcome": "object", "bytes": 42}));
        let v = serde_json::to_value(BinarySize::CompileFailed { exit_code: Some(1) }).unwrap();
        assert_eq!(v["outcome"], "compile_failed");
    }

    fn samples() -> impl Strategy<Value = Vec<CompilerMetrics>> {
        prop::collection::vec(
            (0u64..10_000_000, 0u64..10_000_000, 0u64..4_000_000)
                .prop_map(|(t, u, m)| sample(t, u, m)),
            1..20,
        )
    }

    proptest! {
        #[test]
        fn prop_merge_counts_and_weighted_mean(a in samples(), b in samples()) {
            let mut merged = CompilerMetricsList { samples: a.clone() };
            merged.merge(CompilerMetricsList { samples: b.clone() });
            prop_assert_eq!(merged.len(), a.len() + b.len());

            let total: u64 = a
                .iter()
                .chain(b.iter())
                .map(|s| s.total_execution_time.microseconds)
                .sum();
            let expected = total / (a.len() + b.len()) as u64;
            let avg = merged.compute_average().unwrap();
            prop_assert_eq!(avg.total_execution_time.microseconds, expected);
        }

        #[test]
        fn prop_merge_is_order_insensitive_for_average(a in samples(), b in samples()) {
            let mut ab = CompilerMetricsList { samples: a.clone() };
            ab.merge(CompilerMetricsList { samples: b.clone() });
            let mut ba = CompilerMetricsList { samples: b };
            ba.merge(CompilerMetricsList { samples: a });
            prop_assert_eq!(ab.compute_average(), ba.compute_average());
        }
    }
}
