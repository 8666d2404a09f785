//! C++ language dialects.

use crate::error::ParseError;
use crate::pathkey::PathKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A C++ language standard revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Standard {
    #[serde(rename = "c++03")]
    Cpp03,
    #[serde(rename = "c++11")]
    Cpp11,
    #[serde(rename = "c++14")]
    Cpp14,
    #[serde(rename = "c++17")]
    Cpp17,
    #[serde(rename = "c++20")]
    Cpp20,
    #[serde(rename = "c++23")]
    Cpp23,
    #[serde(rename = "c++26")]
    Cpp26,
}

impl Standard {
    pub const ALL: [Standard; 7] = [
        Self::Cpp03,
        Self::Cpp11,
        Self::Cpp14,
        Self::Cpp17,
        Self::Cpp20,
        Self::Cpp23,
        Self::Cpp26,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpp03 => "c++03",
            Self::Cpp11 => "c++11",
            Self::Cpp14 => "c++14",
            Self::Cpp17 => "c++17",
            Self::Cpp20 => "c++20",
            Self::Cpp23 => "c++23",
            Self::Cpp26 => "c++26",
        }
    }

    /// Two-digit revision number (3, 11, 14, ...).
    fn number(&self) -> u32 {
        match self {
            Self::Cpp03 => 3,
            Self::Cpp11 => 11,
            Self::Cpp14 => 14,
            Self::Cpp17 => 17,
            Self::Cpp20 => 20,
            Self::Cpp23 => 23,
            Self::Cpp26 => 26,
        }
    }

    pub fn year(&self) -> u32 {
        2000 + self.number()
    }

    /// Pre-standardization spellings accepted by older compilers.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Cpp20 => &["c++2a"],
            Self::Cpp23 => &["c++2b"],
            _ => &[],
        }
    }

    /// The `-std=` flag, preferring the alias so older clangs accept it.
    pub fn flag(&self) -> String {
        match self.aliases().first() {
            Some(alias) => format!("-std={alias}"),
            None => format!("-std={}", self.as_str()),
        }
    }

    /// Inclusive range `[from, to]` in revision order.
    pub fn between(from: Standard, to: Standard) -> Vec<Standard> {
        Self::ALL
            .into_iter()
            .filter(|s| *s >= from && *s <= to)
            .collect()
    }

    pub fn after(from: Standard) -> Vec<Standard> {
        Self::ALL.into_iter().filter(|s| *s >= from).collect()
    }

    pub fn before(to: Standard) -> Vec<Standard> {
        Self::ALL.into_iter().filter(|s| *s < to).collect()
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PathKey for Standard {
    fn path_key(&self) -> String {
        self.as_str().to_string()
    }
}

impl FromStr for Standard {
    type Err = ParseError;

    /// Accepts `17`, `2017`, `c++17`, `Cpp17` and the `c++2a`/`c++2b` aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        for standard in Self::ALL {
            let n = standard.number();
            let matches = lower == standard.as_str()
                || lower == format!("cpp{n:02}")
                || lower == format!("{n:02}")
                || lower == n.to_string()
                || lower == standard.year().to_string()
                || standard.aliases().contains(&lower.as_str());
            if matches {
                return Ok(standard);
            }
        }
        Err(ParseError::UnknownDialect(trimmed.to_string()))
    }
}
