// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Resolves `include` paths against an ordered list of search roots (spec §4.3).

use crate::error::{Error, ErrorKind};

const RESOURCE_SCHEME: &str = "resource://";

/// A single search root, either a filesystem prefix or an embedded-resource
/// namespace (the `resource://` scheme).
#[derive(Debug, Clone)]
pub enum SearchRoot {
    /// A plain filesystem-style prefix; `locate` joins it with the requested path.
    Path(String),
    /// An embedded-resource namespace; entries are looked up in `resources`.
    Resource(String),
}

/// A named, in-memory template source — the unit the locator resolves to.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The fully joined path, used as the include-cycle-detection key.
    pub path: String,
    /// The template source bytes.
    pub contents: Vec<u8>,
}

/// Ordered list of search roots; head is highest priority (spec §4.3).
#[derive(Debug, Default)]
pub struct Locator {
    roots: Vec<SearchRoot>,
    files: std::collections::HashMap<String, Vec<u8>>,
    resources: std::collections::HashMap<String, Vec<u8>>,
}

impl Locator {
    /// An empty locator with no search roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filesystem-style search root, lowest priority so far.
    pub fn add_path_root(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.roots.push(SearchRoot::Path(prefix.into()));
        self
    }

    /// Appends an embedded-resource search root.
    pub fn add_resource_root(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.roots.push(SearchRoot::Resource(namespace.into()));
        self
    }

    /// Registers an in-memory file reachable through `Path` roots, keyed by
    /// the joined path a `Path(prefix)` root would produce.
    pub fn insert_file(&mut self, joined_path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(joined_path.into(), contents.into());
    }

    /// Registers an in-memory embedded resource, keyed by its
    /// `resource://`-stripped name.
    pub fn insert_resource(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.resources.insert(name.into(), contents.into());
    }

    /// Resolves `path` against every root in registration order, returning the
    /// first successful open. Rejects candidates that escape their root via `..`.
    pub fn locate(&self, path: &str) -> Result<Resolved, Error> {
        if path_escapes_root(path) {
            return Err(Error::new(
                ErrorKind::TemplateNotFound,
                format!("include path \"{path}\" escapes its search root"),
            ));
        }

        for root in &self.roots {
            match root {
                SearchRoot::Path(prefix) => {
                    let joined = join_root(prefix, path);
                    if let Some(contents) = self.files.get(&joined) {
                        return Ok(Resolved {
                            path: joined,
                            contents: contents.clone(),
                        });
                    }
                }
                SearchRoot::Resource(namespace) => {
                    let key = format!("{namespace}/{path}");
                    if let Some(contents) = self.resources.get(&key) {
                        return Ok(Resolved {
                            path: format!("{RESOURCE_SCHEME}{key}"),
                            contents: contents.clone(),
                        });
                    }
                }
            }
        }

        Err(Error::new(
            ErrorKind::TemplateNotFound,
            format!("no search root resolved include \"{path}\""),
        ))
    }
}

fn join_root(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else if prefix.ends_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}

fn path_escapes_root(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_first_matching_root_in_priority_order() {
        let mut locator = Locator::new();
        locator.add_path_root("first");
        locator.add_path_root("second");
        locator.insert_file("first/a.tmpl", "from first");
        locator.insert_file("second/a.tmpl", "from second");
        let resolved = locator.locate("a.tmpl").unwrap();
        assert_eq!(resolved.contents, b"from first");
    }

    #[test]
    fn falls_back_to_next_root_when_first_misses() {
        let mut locator = Locator::new();
        locator.add_path_root("first");
        locator.add_path_root("second");
        locator.insert_file("second/a.tmpl", "from second");
        let resolved = locator.locate("a.tmpl").unwrap();
        assert_eq!(resolved.contents, b"from second");
    }

    #[test]
    fn resource_scheme_root_matches_by_namespace() {
        let mut locator = Locator::new();
        locator.add_resource_root("app");
        locator.insert_resource("app/a.tmpl", "embedded");
        let resolved = locator.locate("a.tmpl").unwrap();
        assert_eq!(resolved.contents, b"embedded");
        assert!(resolved.path.starts_with(RESOURCE_SCHEME));
    }

    #[test]
    fn rejects_paths_that_escape_their_root() {
        let mut locator = Locator::new();
        locator.add_path_root("root");
        let err = locator.locate("../secret.tmpl").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
    }

    #[test]
    fn missing_template_is_template_not_found() {
        let locator = Locator::new();
        let err = locator.locate("missing.tmpl").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TemplateNotFound);
    }
}
