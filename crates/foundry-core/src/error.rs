// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Manager-level failures (spec §7), distinguishing cancellation from error.

use thiserror::Error;

/// A failure from the build-foundry half of the workspace.
#[derive(Debug, Error)]
pub enum FoundryError {
    /// The pipeline could not be assembled for the active configuration.
    #[error("pipeline preparation failed: {0}")]
    PipelinePreparation(String),
    /// A runtime/toolchain/device provider failed to load.
    #[error("provider load failed: {0}")]
    ProviderLoad(String),
    /// The operation was cancelled; never counted as an error (spec §7).
    #[error("operation cancelled")]
    Cancelled,
    /// No provider supports the requested operation.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// A configuration or toolchain id lookup failed, reusing the engine's
    /// `MissingSymbol`-shaped vocabulary.
    #[error("lookup failed: {0}")]
    MissingSymbol(#[from] tmpl_engine::Error),
}

impl FoundryError {
    /// True for the sentinel that must never be surfaced as a user-facing
    /// error (spec §7 "logged but never fatal").
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FoundryError::Cancelled)
    }
}
