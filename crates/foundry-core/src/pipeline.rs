// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The build pipeline: an ordered set of phases a plugin attaches stages to,
//! and the provider trait that runs them (spec §3 "Pipeline", §4.8).

use std::sync::Arc;

use async_trait::async_trait;

use crate::build_target::BuildTarget;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::device::Device;
use crate::diagnostic::Diagnostic;
use crate::error::FoundryError;
use crate::runtime_manager::Runtime;
use crate::toolchain_manager::Toolchain;

/// Coarse build phases, run in ascending order (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelinePhase {
    /// Fetch dependencies / generate sources.
    Prepare,
    /// Run the configure step (e.g. `cmake`, `./configure`).
    Configure,
    /// Compile.
    Build,
    /// Produce install-tree artifacts.
    Install,
    /// Remove build outputs.
    Clean,
}

/// Receives a pipeline's streaming signals (spec §3 `started/finished/
/// diagnostic/notify/loaded`; §9 "model as an observer registry keyed by the
/// pipeline object; on swap, unbind old, bind new, replay busy/message
/// state"). Default no-op bodies let a listener subscribe to only what it
/// needs.
pub trait PipelineObserver: Send + Sync {
    /// A phase began executing.
    fn started(&self, phase: PipelinePhase) {
        let _ = phase;
    }
    /// A diagnostic was produced mid-run.
    fn diagnostic(&self, diagnostic: Diagnostic) {
        let _ = diagnostic;
    }
    /// The run finished, successfully or not.
    fn finished(&self, success: bool) {
        let _ = success;
    }
    /// `busy` changed, independent of a `started`/`finished` pair.
    fn notify_busy(&self, busy: bool) {
        let _ = busy;
    }
    /// `message` changed.
    fn notify_message(&self, message: Option<String>) {
        let _ = message;
    }
    /// Initialization completed; the pipeline is ready to be advanced.
    fn loaded(&self) {}
}

/// A runnable build pipeline assembled for one configuration/device pair.
///
/// Implementations own the actual process-spawning and are driven by
/// [`crate::build_manager::BuildManager`], which also registers itself as
/// this pipeline's [`PipelineObserver`] to surface its streaming state.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// The configuration this pipeline was built for.
    fn config(&self) -> Config;
    /// The device this pipeline targets, if any.
    fn device(&self) -> Option<Device>;
    /// The runtime attached after preparation, if any.
    fn runtime(&self) -> Option<Runtime>;
    /// The toolchain attached after preparation, if any.
    fn toolchain(&self) -> Option<Toolchain>;
    /// Whether a phase is currently executing.
    fn busy(&self) -> bool;
    /// The last status message reported by a running phase, if any.
    fn message(&self) -> Option<String>;
    /// Whether `export` is currently meaningful for this pipeline.
    fn can_export(&self) -> bool;

    /// Runs device/runtime/toolchain-independent setup, the last step of the
    /// build manager's invalidate/rebuild chain (spec §4.8 "pipeline.init").
    /// `device` is the info the device manager reported, if a device is set.
    async fn init(&self, device: Option<Device>, cancel: CancelToken) -> Result<(), FoundryError>;

    /// Runs every stage at or before `through_phase` against `targets` (all
    /// targets when `None`), reporting `observer.started`/`diagnostic`/
    /// `finished` as the run progresses. Must poll `cancel` between stages
    /// and return [`FoundryError::Cancelled`] promptly once it fires.
    async fn advance(
        &self,
        through_phase: PipelinePhase,
        targets: Option<Vec<BuildTarget>>,
        cancel: CancelToken,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<(), FoundryError>;

    /// Lists the targets this pipeline's providers expose. An empty result
    /// with no provider attached is a [`FoundryError::NotSupported`], not an
    /// empty `Ok` (spec §4.8 "`list_targets_async` ... fails `NotSupported`
    /// with zero matches").
    async fn list_targets(&self) -> Result<Vec<BuildTarget>, FoundryError>;
}

/// Builds a fresh [`Pipeline`] for a config/device pair (spec §4.8
/// "construct a new pipeline with (current config, current device)").
pub trait PipelineFactory: Send + Sync {
    /// Assembles an unprepared pipeline; the caller still owes it an `init`.
    fn create(&self, config: Config, device: Option<Device>) -> Arc<dyn Pipeline>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_order_prepare_before_clean() {
        assert!(PipelinePhase::Prepare < PipelinePhase::Clean);
        assert!(PipelinePhase::Configure < PipelinePhase::Build);
    }
}
