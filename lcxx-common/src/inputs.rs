//! Instantiation test sources and code-generation options.

use crate::error::ParseError;
use crate::pathkey::PathKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A checked-in translation unit that instantiates a chunk of the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestInput {
    Vector,
    SharedPtr,
    Algorithm,
    UnorderedMap,
}

impl TestInput {
    pub const ALL: [TestInput; 4] = [
        Self::Vector,
        Self::SharedPtr,
        Self::Algorithm,
        Self::UnorderedMap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::SharedPtr => "shared_ptr",
            Self::Algorithm => "algorithm",
            Self::UnorderedMap => "unordered_map",
        }
    }

    /// Path of the source relative to the inputs root.
    pub fn relative_path(&self) -> PathBuf {
        Path::new("instantiation").join(format!("{}.cpp", self.name()))
    }

    pub fn path(&self, inputs_root: &Path) -> PathBuf {
        inputs_root.join(self.relative_path())
    }
}

impl fmt::Display for TestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PathKey for TestInput {
    fn path_key(&self) -> String {
        format!("instantiation.{}", self.name())
    }
}

impl FromStr for TestInput {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .trim()
            .trim_start_matches("instantiation/")
            .trim_end_matches(".cpp");
        Self::ALL
            .into_iter()
            .find(|i| i.name() == name)
            .ok_or_else(|| ParseError::UnknownTestInput(s.trim().to_string()))
    }
}

/// Debug-information level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DebugOpts {
    #[serde(rename = "-g0")]
    Off,
    #[serde(rename = "-g")]
    On,
}

impl DebugOpts {
    pub const ALL: [DebugOpts; 2] = [Self::Off, Self::On];

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Off => "-g0",
            Self::On => "-g",
        }
    }
}

impl PathKey for DebugOpts {
    fn path_key(&self) -> String {
        match self {
            Self::Off => "debug_off".to_string(),
            Self::On => "debug_on".to_string(),
        }
    }
}

impl FromStr for DebugOpts {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "-g0" | "off" | "debug_off" | "0" | "false" => Ok(Self::Off),
            "-g" | "on" | "debug_on" | "1" | "true" => Ok(Self::On),
            other => Err(ParseError::UnknownOption {
                kind: "debug",
                value: other.to_string(),
            }),
        }
    }
}

/// Optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptimizerOpts {
    #[serde(rename = "-O0")]
    O0,
    #[serde(rename = "-O1")]
    O1,
    #[serde(rename = "-O2")]
    O2,
    #[serde(rename = "-O3")]
    O3,
}

impl OptimizerOpts {
    pub const ALL: [OptimizerOpts; 4] = [Self::O0, Self::O1, Self::O2, Self::O3];

    pub fn flag(&self) -> &'static str {
        match self {
            Self::O0 => "-O0",
            Self::O1 => "-O1",
            Self::O2 => "-O2",
            Self::O3 => "-O3",
        }
    }
}

impl PathKey for OptimizerOpts {
    fn path_key(&self) -> String {
        self.flag().trim_start_matches('-').to_string()
    }
}

impl FromStr for OptimizerOpts {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = s.trim().trim_start_matches('-').to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|o| o.path_key() == level || o.path_key()[1..] == level)
            .ok_or_else(|| ParseError::UnknownOption {
                kind: "optimize",
                value: s.trim().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_paths() {
        let root = Path::new("/srv/inputs");
        assert_eq!(
            TestInput::SharedPtr.path(root),
            PathBuf::from("/srv/inputs/instantiation/shared_ptr.cpp")
        );
        assert_eq!(
            "instantiation/vector.cpp".parse::<TestInput>().unwrap(),
            TestInput::Vector
        );
    }

    #[test]
    fn test_option_path_keys() {
        assert_eq!(DebugOpts::Off.path_key(), "debug_off");
        assert_eq!(DebugOpts::On.path_key(), "debug_on");
        assert_eq!(OptimizerOpts::O2.path_key(), "O2");
        assert_eq!(TestInput::Vector.path_key(), "instantiation.vector");
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!("-O3".parse::<OptimizerOpts>().unwrap(), OptimizerOpts::O3);
        assert_eq!("o1".parse::<OptimizerOpts>().unwrap(), OptimizerOpts::O1);
        assert_eq!("2".parse::<OptimizerOpts>().unwrap(), OptimizerOpts::O2);
        assert!("-O9".parse::<OptimizerOpts>().is_err());
        assert_eq!("-g".parse::<DebugOpts>().unwrap(), DebugOpts::On);
        assert_eq!("off".parse::<DebugOpts>().unwrap(), DebugOpts::Off);
    }
}
