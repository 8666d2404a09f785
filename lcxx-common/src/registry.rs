//! Version registry: identifier strings to validated toolchain descriptors.

use crate::error::{ResolveError, ResolveResult};
use crate::identifier::Identifier;
use crate::toolchain::{LibcxxVersion, ToolchainDescriptor, identifier_from_dir_name};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Resolves toolchain identifiers against a versions root directory.
///
/// Descriptors are cached by the raw identifier string for the lifetime of
/// the registry.
#[derive(Debug)]
pub struct VersionRegistry {
    versions_root: PathBuf,
    cache: RwLock<HashMap<String, Arc<ToolchainDescriptor>>>,
}

impl VersionRegistry {
    pub fn new(versions_root: impl Into<PathBuf>) -> Self {
        Self {
            versions_root: versions_root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn versions_root(&self) -> &Path {
        &self.versions_root
    }

    /// Resolve `identifier` (`17`, `v17`, `17.0.1`, `trunk`, `trunk-20230301`,
    /// `installed`, ...).
    pub fn resolve(&self, identifier: &str) -> ResolveResult<Arc<ToolchainDescriptor>> {
        let identifier = identifier.trim();
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
        {
            return Ok(Arc::clone(hit));
        }

        let descriptor = Arc::new(self.resolve_uncached(identifier)?);
        debug!(
            identifier,
            name = %descriptor.name,
            path = %descriptor.path.display(),
            "Resolved toolchain"
        );
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identifier.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn resolve_version(
        &self,
        version: LibcxxVersion,
    ) -> ResolveResult<Arc<ToolchainDescriptor>> {
        self.resolve(version.as_str())
    }

    fn resolve_uncached(&self, identifier: &str) -> ResolveResult<ToolchainDescriptor> {
        let name = match LibcxxVersion::lookup(identifier) {
            Some(LibcxxVersion::Trunk) => return self.newest_trunk(identifier),
            Some(known) => known.as_str().to_string(),
            None => identifier.to_string(),
        };

        let mut tried = Vec::new();
        for candidate in candidate_names(&name) {
            let dir = self.versions_root.join(&candidate);
            if dir.is_dir() {
                return ToolchainDescriptor::load(&dir);
            }
            tried.push(dir);
        }

        Err(ResolveError::NoSuchVersion {
            identifier: identifier.to_string(),
            tried,
        })
    }

    /// The `trunk-YYYYMMDD` directory with the latest date.
    fn newest_trunk(&self, identifier: &str) -> ResolveResult<ToolchainDescriptor> {
        let newest = self
            .scan()?
            .into_iter()
            .filter(|(id, _)| !id.is_version())
            .max_by(|(a, _), (b, _)| a.cmp(b));
        match newest {
            Some((_, dir)) => ToolchainDescriptor::load(&dir),
            None => Err(ResolveError::NoSuchVersion {
                identifier: identifier.to_string(),
                tried: vec![self.versions_root.join("trunk-*")],
            }),
        }
    }

    /// Directories under the root whose names carry a toolchain identifier.
    fn scan(&self) -> ResolveResult<Vec<(Identifier, PathBuf)>> {
        let entries = match fs::read_dir(&self.versions_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ResolveError::Io {
                    path: self.versions_root.clone(),
                    source,
                });
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = identifier_from_dir_name(&name) {
                found.push((id, path));
            }
        }
        Ok(found)
    }

    /// Every loadable toolchain under the root, oldest first. Directories
    /// that fail validation are skipped with a warning.
    pub fn available(&self) -> ResolveResult<Vec<ToolchainDescriptor>> {
        let mut found = Vec::new();
        for (_, dir) in self.scan()? {
            match ToolchainDescriptor::load(&dir) {
                Ok(d) => found.push(d),
                Err(e) => warn!(path = %dir.display(), error = %e, "Skipping invalid toolchain"),
            }
        }
        found.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(found)
    }
}

/// Directory names tried, in priority order, for an identifier.
pub fn candidate_names(identifier: &str) -> Vec<String> {
    let s = identifier.strip_prefix('v').unwrap_or(identifier);
    vec![
        s.to_string(),
        format!("v{s}"),
        format!("{s}.0"),
        format!("{s}.0.0"),
        format!("{s}.0.1"),
        format!("v{s}.0.0"),
        format!("v{s}.0.1"),
    ]
}
