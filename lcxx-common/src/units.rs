//! Measurement units reported by the compiler's resource-usage report.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A span of CPU or wall time in whole microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Elapsed {
    pub microseconds: u64,
}

impl Elapsed {
    pub fn from_micros(microseconds: u64) -> Self {
        Self { microseconds }
    }

    pub fn milliseconds(&self) -> f64 {
        self.microseconds as f64 / 1_000.0
    }

    pub fn seconds(&self) -> f64 {
        self.microseconds as f64 / 1_000_000.0
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.microseconds)
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", humantime::format_duration(self.as_duration()))
    }
}

/// Peak resident memory as reported by `-fproc-stat-report`, in KiB.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct MemoryUsage {
    pub kilobytes: u64,
}

impl MemoryUsage {
    pub fn from_kilobytes(kilobytes: u64) -> Self {
        Self { kilobytes }
    }

    pub fn bytes(&self) -> u64 {
        self.kilobytes.saturating_mul(1024)
    }

    pub fn megabytes(&self) -> f64 {
        self.kilobytes as f64 / 1024.0
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kilobytes >= 1024 {
            write!(f, "{:.1} MiB", self.megabytes())
        } else {
            write!(f, "{} KiB", self.kilobytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_conversions() {
        let e = Elapsed::from_micros(1_500_000);
        assert_eq!(e.milliseconds(), 1_500.0);
        assert_eq!(e.seconds(), 1.5);
        assert_eq!(e.to_string(), "1s 500ms");
    }

    #[test]
    fn test_memory_display() {
        assert_eq!(MemoryUsage::from_kilobytes(512).to_string(), "512 KiB");
        assert_eq!(MemoryUsage::from_kilobytes(2_560).to_string(), "2.5 MiB");
        assert_eq!(MemoryUsage::from_kilobytes(3).bytes(), 3_072);
        assert_eq!(MemoryUsage::from_kilobytes(u64::MAX).bytes(), u64::MAX);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(Elapsed::from_micros(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "microseconds": 42 }));
    }
}
