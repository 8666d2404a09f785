//! libc++ toolchain descriptors.
//!
//! A descriptor is the concrete, validated on-disk form of one libc++ build:
//! where its headers and libraries live and which flags select it. It is
//! loaded either from an `info.json` written by the packaging step, or by
//! probing an install directory whose name encodes the version.

use crate::dialect::Standard;
use crate::error::{ParseError, ResolveError, ResolveResult};
use crate::identifier::{Datestamp, Identifier, Version};
use crate::pathkey::PathKey;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Library file stems collected when probing an install directory.
const LIBRARY_NAMES: [&str; 3] = ["libc++", "libc++abi", "libc++experimental"];

/// Include directories probed, relative to an install root.
const PROBED_INCLUDE_DIRS: [&str; 2] = [
    "include/c++/v1",
    "include/x86_64-unknown-linux-gnu/c++/v1",
];

fn versioned_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:clang-)?v?(?P<major>\d{1,2})\.(?P<minor>\d+)(?:\.(?P<patch>\d+))?$")
            .expect("valid versioned directory regex")
    })
}

fn trunk_dir_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:clang-)?trunk-(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})$")
            .expect("valid trunk directory regex")
    })
}

/// Derive an identifier from an install directory name such as `v16.0.0`
/// or `trunk-20230301`.
pub fn identifier_from_dir_name(name: &str) -> Option<Identifier> {
    if let Some(caps) = trunk_dir_re().captures(name) {
        let num = |k: &str| caps.name(k).and_then(|m| m.as_str().parse().ok());
        return Some(Datestamp::new(num("year")?, num("month")?, num("day")?).into());
    }
    if let Some(caps) = versioned_dir_re().captures(name) {
        let num = |k: &str| {
            caps.name(k)
                .map(|m| m.as_str().parse().ok())
                .unwrap_or(Some(0))
        };
        return Some(Version::new(num("major")?, num("minor")?, num("patch")?).into());
    }
    None
}

/// The set of toolchains the harness knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LibcxxVersion {
    #[serde(rename = "installed")]
    Installed,
    #[serde(rename = "installed_libstdcxx")]
    InstalledLibstdcxx,
    #[serde(rename = "4.0.1")]
    V4,
    #[serde(rename = "5.0.1")]
    V5,
    #[serde(rename = "6.0.1")]
    V6,
    #[serde(rename = "7.1.0")]
    V7,
    #[serde(rename = "8.0.1")]
    V8,
    #[serde(rename = "9.0.1")]
    V9,
    #[serde(rename = "10.0.1")]
    V10,
    #[serde(rename = "11.0.1")]
    V11,
    #[serde(rename = "12.0.1")]
    V12,
    #[serde(rename = "13.0.1")]
    V13,
    #[serde(rename = "14.0.0")]
    V14,
    #[serde(rename = "15.0.0")]
    V15,
    #[serde(rename = "16.0.0")]
    V16,
    #[serde(rename = "trunk")]
    Trunk,
}

impl LibcxxVersion {
    /// All known toolchains in ascending order. The system toolchains sort
    /// first and trunk sorts last.
    pub const ALL: [LibcxxVersion; 16] = [
        Self::Installed,
        Self::InstalledLibstdcxx,
        Self::V4,
        Self::V5,
        Self::V6,
        Self::V7,
        Self::V8,
        Self::V9,
        Self::V10,
        Self::V11,
        Self::V12,
        Self::V13,
        Self::V14,
        Self::V15,
        Self::V16,
        Self::Trunk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::InstalledLibstdcxx => "installed_libstdcxx",
            Self::V4 => "4.0.1",
            Self::V5 => "5.0.1",
            Self::V6 => "6.0.1",
            Self::V7 => "7.1.0",
            Self::V8 => "8.0.1",
            Self::V9 => "9.0.1",
            Self::V10 => "10.0.1",
            Self::V11 => "11.0.1",
            Self::V12 => "12.0.1",
            Self::V13 => "13.0.1",
            Self::V14 => "14.0.0",
            Self::V15 => "15.0.0",
            Self::V16 => "16.0.0",
            Self::Trunk => "trunk",
        }
    }

    /// The release version, for tagged releases only.
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Installed | Self::InstalledLibstdcxx | Self::Trunk => None,
            other => Version::parse(other.as_str()),
        }
    }

    /// Short name such as `v16`, used on the command line.
    pub fn short_name(&self) -> String {
        match self.version() {
            Some(v) => format!("v{}", v.major),
            None => self.as_str().to_string(),
        }
    }

    /// The upstream git tag this toolchain was built from.
    pub fn git_tag(&self) -> String {
        match self {
            Self::Trunk => "main".to_string(),
            other => format!("llvmorg-{}", other.as_str()),
        }
    }

    /// Look up a known toolchain by exact value, short name, or bare major
    /// version (`16.0.0`, `v16`, `16`).
    pub fn lookup(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|v| {
            v.as_str() == s
                || v.short_name() == s
                || v.version().is_some_and(|ver| ver.major.to_string() == s)
        })
    }

    /// Inclusive range `[from, to]`.
    pub fn between(from: Self, to: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|v| *v >= from && *v <= to)
            .collect()
    }

    pub fn after(from: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|v| *v >= from).collect()
    }

    pub fn before(to: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|v| *v < to).collect()
    }
}

impl fmt::Display for LibcxxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PathKey for LibcxxVersion {
    fn path_key(&self) -> String {
        self.as_str().to_string()
    }
}

impl FromStr for LibcxxVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ParseError::UnknownVersion(s.trim().to_string()))
    }
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One resolvable libc++ build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainDescriptor {
    pub name: String,
    /// Root directory. Overwritten with the `info.json` parent for
    /// non-installed toolchains.
    #[serde(default)]
    pub path: PathBuf,
    pub identifier: Identifier,
    /// Pre-installed system toolchain selected purely by `install_flags`.
    #[serde(default, deserialize_with = "null_default")]
    pub is_installed: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub install_flags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub include_paths: Vec<PathBuf>,
    #[serde(default, deserialize_with = "null_default")]
    pub library_paths: Vec<PathBuf>,
    #[serde(default, deserialize_with = "null_default")]
    pub libraries: Vec<PathBuf>,
    #[serde(default)]
    pub supported_dialects: Option<Vec<String>>,
}

impl ToolchainDescriptor {
    /// Load from `dir/info.json` if present, else probe `dir` by name.
    pub fn load(dir: &Path) -> ResolveResult<Self> {
        let info = dir.join("info.json");
        if info.is_file() {
            Self::from_info_file(&info)
        } else {
            Self::from_install_dir(dir)
        }
    }

    /// Load and validate an `info.json` descriptor.
    pub fn from_info_file(info: &Path) -> ResolveResult<Self> {
        let info = absolute(info)?;
        let text = fs::read_to_string(&info).map_err(|source| ResolveError::Io {
            path: info.clone(),
            source,
        })?;
        let mut descriptor: Self =
            serde_json::from_str(&text).map_err(|source| ResolveError::Json {
                path: info.clone(),
                source,
            })?;

        if !descriptor.is_installed {
            descriptor.path = info
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
        }

        descriptor.check()?;
        debug!(
            name = %descriptor.name,
            path = %descriptor.path.display(),
            "Loaded toolchain descriptor"
        );
        Ok(descriptor)
    }

    /// Synthesize a descriptor for an install directory named like
    /// `v16.0.0` or `trunk-20230301`.
    pub fn from_install_dir(dir: &Path) -> ResolveResult<Self> {
        let dir = absolute(dir)?;
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identifier = identifier_from_dir_name(&dir_name)
            .ok_or_else(|| ResolveError::UnrecognizedName(dir_name.clone()))?;

        let include_paths = PROBED_INCLUDE_DIRS
            .iter()
            .map(PathBuf::from)
            .filter(|rel| dir.join(rel).is_dir())
            .collect();

        let mut libraries = Vec::new();
        collect_libraries(&dir, &dir, &mut libraries).map_err(|source| ResolveError::Io {
            path: dir.clone(),
            source,
        })?;
        libraries.sort();
        libraries.dedup();

        let mut library_paths: Vec<PathBuf> = libraries
            .iter()
            .filter_map(|l| l.parent().map(Path::to_path_buf))
            .collect();
        library_paths.sort();
        library_paths.dedup();

        let descriptor = Self {
            name: identifier.to_string(),
            path: dir,
            identifier,
            is_installed: false,
            install_flags: Vec::new(),
            include_paths,
            library_paths,
            libraries,
            supported_dialects: None,
        };
        descriptor.check()?;
        debug!(name = %descriptor.name, "Probed toolchain install directory");
        Ok(descriptor)
    }

    /// Either a pre-installed toolchain with explicit flags, or an on-disk
    /// root whose first include path exists.
    pub fn check(&self) -> ResolveResult<()> {
        if self.is_installed && !self.install_flags.is_empty() {
            return Ok(());
        }
        if !self.path.is_dir() {
            return Err(ResolveError::InvalidDescriptor {
                path: self.path.clone(),
                reason: "root directory does not exist".to_string(),
            });
        }
        match self.include_paths.first() {
            Some(first) if self.path.join(first).is_dir() => Ok(()),
            Some(first) => Err(ResolveError::InvalidDescriptor {
                path: self.path.clone(),
                reason: format!("include path {} does not exist", first.display()),
            }),
            None => Err(ResolveError::InvalidDescriptor {
                path: self.path.clone(),
                reason: "no include paths and no install flags".to_string(),
            }),
        }
    }

    pub fn has_version(&self) -> bool {
        self.identifier.is_version()
    }

    fn uses_install_flags(&self) -> bool {
        self.is_installed && !self.install_flags.is_empty()
    }

    pub fn abs_include_paths(&self) -> Vec<PathBuf> {
        self.include_paths.iter().map(|i| self.path.join(i)).collect()
    }

    pub fn abs_library_paths(&self) -> Vec<PathBuf> {
        self.library_paths.iter().map(|l| self.path.join(l)).collect()
    }

    /// First include directory containing `header`.
    pub fn find_header(&self, header: &str) -> Option<PathBuf> {
        self.abs_include_paths()
            .into_iter()
            .map(|dir| dir.join(header))
            .find(|p| p.is_file())
    }

    /// Whether the toolchain declares support for `standard`. Toolchains
    /// without a declared list are assumed to support every dialect.
    pub fn supports(&self, standard: Standard) -> bool {
        match &self.supported_dialects {
            None => true,
            Some(list) => list
                .iter()
                .any(|d| d.parse::<Standard>().is_ok_and(|s| s == standard)),
        }
    }

    /// Flags selecting this toolchain's headers.
    pub fn include_flags(&self) -> Vec<String> {
        if self.uses_install_flags() {
            return self.install_flags.clone();
        }
        let mut flags = vec![
            "-nostdinc++".to_string(),
            "-Wno-unused-command-line-argument".to_string(),
        ];
        for dir in self.abs_include_paths() {
            flags.push("-cxx-isystem".to_string());
            flags.push(dir.display().to_string());
        }
        flags
    }

    /// Flags selecting this toolchain's libraries at link time.
    pub fn library_flags(&self) -> Vec<String> {
        if self.uses_install_flags() {
            return self.install_flags.clone();
        }
        let mut flags = vec![
            "-stdlib=libc++".to_string(),
            "-Wno-unused-command-line-argument".to_string(),
        ];
        for dir in self.abs_library_paths() {
            let dir = dir.display().to_string();
            flags.push("-L".to_string());
            flags.push(dir.clone());
            flags.push(format!("-Wl,-rpath,{dir}"));
        }
        flags
    }

    pub fn flags(&self) -> Vec<String> {
        let mut flags = self.include_flags();
        flags.extend(self.library_flags());
        flags
    }
}

impl PartialOrd for ToolchainDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.identifier.cmp(&other.identifier))
    }
}

fn absolute(path: &Path) -> ResolveResult<PathBuf> {
    std::path::absolute(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_libraries(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_libraries(root, &path, out)?;
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_library = LIBRARY_NAMES
            .iter()
            .any(|stem| name.strip_prefix(stem).is_some_and(|rest| rest.starts_with('.')));
        if is_library && let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}
