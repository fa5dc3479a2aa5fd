// SPDX-License-Identifier: Apache-2.0 OR MIT
//! A buildable unit a pipeline can produce (spec §3 "BuildTarget").

/// The kind of artifact a [`BuildTarget`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTargetKind {
    /// No producible artifact (a phony/meta target).
    None,
    /// A standalone executable.
    Executable,
    /// A shared library.
    SharedLibrary,
    /// A static library.
    StaticLibrary,
    /// A plain file a plugin-defined provider wants to expose.
    File,
    /// Anything else a plugin-defined provider wants to expose.
    Other,
}

/// One entry in a pipeline's target list, as returned by a build-target
/// provider.
#[derive(Debug, Clone)]
pub struct BuildTarget {
    /// The stable name used to select this target for a focused build.
    pub name: String,
    /// Human-readable name, defaulting to `name` when not set explicitly.
    pub display_name: Option<String>,
    /// Where the produced artifact is installed, once built.
    pub install_directory: Option<String>,
    /// Relative ordering among a pipeline's targets; lower runs first.
    pub priority: i32,
    /// The argv used to run this target, defaulting to `[name]` (or, once
    /// `install_directory` is set, `[install_directory/name]`; spec §3
    /// "default argv derived from name joined onto install_directory").
    pub argv: Vec<String>,
    /// Working directory to run `argv` from, if not the project root.
    pub cwd: Option<String>,
    /// The target's source language, defaulting to `"asm"` (spec §3).
    pub language: String,
    /// What kind of artifact this target produces.
    pub kind: BuildTargetKind,
}

impl BuildTarget {
    /// A target with a default argv of `[name]` and no install directory yet.
    pub fn new(name: impl Into<String>, kind: BuildTargetKind) -> Self {
        let name = name.into();
        let argv = vec![name.clone()];
        Self {
            name,
            display_name: None,
            install_directory: None,
            priority: 0,
            argv,
            cwd: None,
            language: "asm".to_string(),
            kind,
        }
    }

    /// The name a UI should show: `display_name` if set, else `name`.
    pub fn effective_display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Sets `install_directory` and recomputes the default `argv` from it
    /// joined onto `name` (spec §3); a caller-set `argv` should be applied
    /// after this, not before.
    pub fn with_install_directory(mut self, install_directory: impl Into<String>) -> Self {
        let install_directory = install_directory.into();
        self.argv = vec![format!("{}/{}", install_directory.trim_end_matches('/'), self.name)];
        self.install_directory = Some(install_directory);
        self
    }
}
