// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Build diagnostics emitted by a pipeline stage (spec §3 "Diagnostic").

use serde::{Deserialize, Serialize};

/// The diagnostic's severity, used by [`super::build_manager::BuildManager`]
/// to maintain running error/warning counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; never counted as an error or warning.
    Note,
    /// Counted toward the running warning count.
    Warning,
    /// Counted toward the running error count.
    Error,
    /// Also counted toward the running error count (spec §3 "error_count for
    /// Error|Fatal").
    Fatal,
}

impl Severity {
    /// Whether this severity is counted toward the running error count.
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error | Severity::Fatal)
    }
}

/// A single diagnostic produced while running a build stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity bucket.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Source file the diagnostic refers to, if known.
    pub file: Option<String>,
    /// 1-based line number, if known.
    pub line: Option<u32>,
}

impl Diagnostic {
    /// Builds a diagnostic with no location information.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Attaches a source location.
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}
