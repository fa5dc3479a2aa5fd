#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! A directory-backed [`NamespaceLoader`] for the `require "name" "version"`
//! expression form (spec §4.5, §6), plus the host-side configuration layer
//! that points it at a search path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tmpl_engine::{Error, ErrorKind, NamespaceLoader, Value};
use tmpl_objects::value_from_json;

/// Where [`DirectoryNamespaceLoader`] looks for `<name>-<version>.json` files,
/// and whether a namespace resolved once is cached for subsequent `require`s.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// Directories searched in order; the first match wins.
    pub search_paths: Vec<PathBuf>,
    /// Whether a successfully loaded namespace is reused across `require`s.
    pub cache: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            cache: true,
        }
    }
}

/// Resolves `require "name" "version"` against JSON files on disk, converting
/// the parsed document into an engine object via [`tmpl_objects::value_from_json`].
///
/// Each namespace is a file named `<name>-<version>.json` under one of
/// [`NamespaceConfig::search_paths`]; its top-level JSON value becomes the
/// bound value, exactly as if a host had wired up that struct by hand.
#[derive(Debug)]
pub struct DirectoryNamespaceLoader {
    config: NamespaceConfig,
    cache: RwLock<HashMap<(String, String), Value>>,
}

impl DirectoryNamespaceLoader {
    /// A loader with no search paths; every `require` fails until paths are
    /// added via [`NamespaceConfig`].
    pub fn new(config: NamespaceConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn locate(&self, name: &str, version: &str) -> Option<PathBuf> {
        let filename = format!("{name}-{version}.json");
        self.config
            .search_paths
            .iter()
            .map(|root| root.join(&filename))
            .find(|candidate| candidate.is_file())
    }
}

impl NamespaceLoader for DirectoryNamespaceLoader {
    fn load(&self, name: &str, version: &str) -> Result<Value, Error> {
        let key = (name.to_string(), version.to_string());
        if self.config.cache {
            if let Some(hit) = self.cache.read().expect("namespace cache poisoned").get(&key) {
                tracing::trace!(name, version, "namespace cache hit");
                return Ok(hit.clone());
            }
        }

        let path = self.locate(name, version).ok_or_else(|| {
            tracing::warn!(name, version, "namespace not found in any search path");
            Error::new(
                ErrorKind::ExternalNamespaceFailure,
                format!("no namespace named '{name}' at version '{version}'"),
            )
        })?;

        let raw = read_namespace_file(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            Error::new(
                ErrorKind::ExternalNamespaceFailure,
                format!("namespace '{name}' at '{}' is not valid JSON: {e}", path.display()),
            )
        })?;
        let value = value_from_json(&parsed);

        if self.config.cache {
            self.cache
                .write()
                .expect("namespace cache poisoned")
                .insert(key, value.clone());
        }
        tracing::trace!(name, version, path = %path.display(), "namespace loaded");
        Ok(value)
    }
}

fn read_namespace_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorKind::ExternalNamespaceFailure,
            format!("failed to read namespace file '{}': {e}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_namespace(dir: &Path, name: &str, version: &str, json: &str) {
        fs::write(dir.join(format!("{name}-{version}.json")), json).unwrap();
    }

    #[test]
    fn loads_and_converts_a_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        write_namespace(dir.path(), "colors", "1.0", r#"{"primary": "blue"}"#);
        let loader = DirectoryNamespaceLoader::new(NamespaceConfig {
            search_paths: vec![dir.path().to_path_buf()],
            cache: true,
        });
        let value = loader.load("colors", "1.0").unwrap();
        let Value::ObjectHandle(handle) = value else { panic!("expected an object handle") };
        assert_eq!(
            handle.get_property("primary").unwrap(),
            Some(Value::String("blue".into()))
        );
    }

    #[test]
    fn missing_namespace_fails_with_external_namespace_failure() {
        let loader = DirectoryNamespaceLoader::new(NamespaceConfig::default());
        let err = loader.load("missing", "1.0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalNamespaceFailure);
    }

    #[test]
    fn invalid_json_fails_with_external_namespace_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_namespace(dir.path(), "broken", "1.0", "{ not json");
        let loader = DirectoryNamespaceLoader::new(NamespaceConfig {
            search_paths: vec![dir.path().to_path_buf()],
            cache: true,
        });
        let err = loader.load("broken", "1.0").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExternalNamespaceFailure);
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_namespace(dir.path(), "counter", "1.0", "1");
        let loader = DirectoryNamespaceLoader::new(NamespaceConfig {
            search_paths: vec![dir.path().to_path_buf()],
            cache: true,
        });
        assert_eq!(loader.load("counter", "1.0").unwrap(), Value::F64(1.0));
        fs::write(dir.path().join("counter-1.0.json"), "2").unwrap();
        // Cached: rewriting the file on disk must not change the bound value.
        assert_eq!(loader.load("counter", "1.0").unwrap(), Value::F64(1.0));
    }
}
