//! Environment variable parsing with type safety.
//!
//! Values are read with the `LCXX_` prefix. Errors are collected rather than
//! returned eagerly so every bad variable can be reported at once.

use super::source::{ConfigSource, Sourced};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    pub fn new() -> Self {
        Self::with_prefix("LCXX_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Read a variable, treating unset and empty as absent.
    fn read(&self, name: &str) -> Option<(String, String)> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if !value.trim().is_empty() => Some((var_name, value)),
            _ => None,
        }
    }

    pub fn get_string(&mut self, name: &str, default: &str) -> Sourced<String> {
        match self.read(name) {
            Some((var, value)) => Sourced::from_env(value, var),
            None => Sourced::default_value(default.to_string()),
        }
    }

    pub fn get_optional_string(&mut self, name: &str) -> Sourced<Option<String>> {
        match self.read(name) {
            Some((var, value)) => Sourced::from_env(Some(value), var),
            None => Sourced::default_value(None),
        }
    }

    /// Unsigned integer within `min..=max`. Falls back to `default` on error.
    pub fn get_u32_range(&mut self, name: &str, default: u32, min: u32, max: u32) -> Sourced<u32> {
        let Some((var, value)) = self.read(name) else {
            return Sourced::default_value(default);
        };
        match value.trim().parse::<u32>() {
            Ok(n) if (min..=max).contains(&n) => Sourced::from_env(n, var),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var.clone(),
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                Sourced::from_env(default, var)
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "unsigned 32-bit integer".to_string(),
                    value,
                });
                Sourced::default_value(default)
            }
        }
    }

    pub fn get_optional_u64(&mut self, name: &str) -> Sourced<Option<u64>> {
        let Some((var, value)) = self.read(name) else {
            return Sourced::default_value(None);
        };
        match value.trim().parse::<u64>() {
            Ok(n) => Sourced::from_env(Some(n), var),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                Sourced::default_value(None)
            }
        }
    }

    /// Any `FromStr` value, described by `expected` in error messages.
    pub fn get_parsed<T: FromStr>(&mut self, name: &str, default: T, expected: &str) -> Sourced<T> {
        let Some((var, value)) = self.read(name) else {
            return Sourced::default_value(default);
        };
        match value.trim().parse::<T>() {
            Ok(parsed) => Sourced::from_env(parsed, var),
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var,
                    expected: expected.to_string(),
                    value,
                });
                Sourced::default_value(default)
            }
        }
    }

    /// Path with `~` and `$VAR` expansion.
    pub fn get_path(&mut self, name: &str, default: &std::path::Path) -> Sourced<PathBuf> {
        match self.read(name) {
            Some((var, value)) => Sourced::from_env(expand_path(&value), var),
            None => Sourced {
                value: default.to_path_buf(),
                source: ConfigSource::Default,
                var: None,
            },
        }
    }

    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let Some((var, value)) = self.read(name) else {
            return Sourced::default_value(default.to_string());
        };
        let lower = value.to_lowercase();
        match lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => Sourced::from_env(lower, var),
            _ => {
                self.errors.push(EnvError::InvalidLogLevel {
                    var: var.clone(),
                    value,
                });
                Sourced::from_env(default.to_string(), var)
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand `~` and environment variables. Unknown variables are left as-is.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}
