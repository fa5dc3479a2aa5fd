// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Manages the active build configuration and pipeline (spec §3, §4.8).
//!
//! Grounded in `ide-build-manager.c`: `vcs_changed` ignores changes that
//! don't alter the branch name, action-enabled bits are recomputed from
//! `(busy, can_build, can_export)` as one unit rather than field-by-field,
//! and `invalidate` is the single place a pipeline is torn down and, unless
//! shutting down, rebuilt against the current config/device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::build_target::BuildTarget;
use crate::cancel::CancelToken;
use crate::config::ConfigManager;
use crate::device::DeviceManager;
use crate::diagnostic::Diagnostic;
use crate::error::FoundryError;
use crate::pipeline::{Pipeline, PipelineFactory, PipelineObserver, PipelinePhase};
use crate::runtime_manager::RuntimeManager;
use crate::toolchain_manager::ToolchainManager;

/// The save-all/rediagnose capability for open editor buffers (spec §4.8, a
/// capability of the buffer-manager collaborator). A minimal interface; a
/// concrete buffer manager itself is out of scope (spec §1).
#[async_trait]
pub trait BufferManager: Send + Sync {
    /// Saves every modified open buffer before a build advances past `Build`.
    async fn save_all(&self) -> Result<(), FoundryError>;
    /// Re-runs diagnostics over every open buffer after a configuring build.
    async fn rediagnose_all(&self);
}

/// The action-enabled bits a UI would bind to (spec §4.8
/// "`ide_build_manager_action_update_enabled`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionState {
    /// Whether a `build` action should currently be enabled.
    pub build_enabled: bool,
    /// Whether a `clean` action should currently be enabled.
    pub clean_enabled: bool,
    /// Whether an `install` action should currently be enabled.
    pub install_enabled: bool,
    /// Whether an `export` action should currently be enabled.
    pub export_enabled: bool,
}

/// A build-manager lifecycle event (spec §6 signals, §8 invariant 7, scenario S6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// The pipeline with this id was replaced or removed.
    PipelineTornDown {
        /// The id of the pipeline that was torn down.
        pipeline_id: u64,
    },
    /// A build began against the pipeline with this id (`build-started`).
    BuildStarted {
        /// The id of the pipeline the build is running against.
        pipeline_id: u64,
    },
    /// A build against the pipeline with this id failed (`build-failed`).
    BuildFailed {
        /// The id of the pipeline the build was running against.
        pipeline_id: u64,
    },
    /// A build against the pipeline with this id completed (`build-finished`).
    BuildFinished {
        /// The id of the pipeline the build was running against.
        pipeline_id: u64,
    },
}

/// Owns the active pipeline and the high-level build/clean/rebuild actions.
pub struct BuildManager {
    pipeline: RwLock<Option<Arc<dyn Pipeline>>>,
    pipeline_id: AtomicU64,
    pipeline_factory: Arc<dyn PipelineFactory>,
    runtime_manager: Arc<dyn RuntimeManager>,
    toolchain_manager: Arc<dyn ToolchainManager>,
    device_manager: Arc<dyn DeviceManager>,
    buffer_manager: Option<Arc<dyn BufferManager>>,
    config_manager: Arc<ConfigManager>,
    branch_name: RwLock<Option<String>>,
    device_id: RwLock<Option<String>>,
    default_build_target: RwLock<Option<String>>,
    master_cancel: RwLock<CancelToken>,
    started: AtomicBool,
    shutting_down: AtomicBool,
    busy: AtomicBool,
    can_build: AtomicBool,
    can_export: AtomicBool,
    needs_rediagnose: AtomicBool,
    has_configured: AtomicBool,
    action_state: RwLock<ActionState>,
    last_build_time: RwLock<Option<Instant>>,
    message: RwLock<Option<String>>,
    diagnostic_count: RwLock<usize>,
    error_count: RwLock<usize>,
    warning_count: RwLock<usize>,
    running_time: RwLock<Duration>,
    timer_started_at: RwLock<Option<tokio::time::Instant>>,
    timer_generation: AtomicU64,
    events: RwLock<Vec<BuildEvent>>,
}

impl BuildManager {
    /// Builds a manager with no pipeline attached yet; `can_build`/`can_export`
    /// start `false` until [`BuildManager::start`] (or [`BuildManager::attach_pipeline`]
    /// directly) brings one up.
    pub fn new(
        runtime_manager: Arc<dyn RuntimeManager>,
        toolchain_manager: Arc<dyn ToolchainManager>,
        device_manager: Arc<dyn DeviceManager>,
        pipeline_factory: Arc<dyn PipelineFactory>,
        config_manager: Arc<ConfigManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline: RwLock::new(None),
            pipeline_id: AtomicU64::new(0),
            pipeline_factory,
            runtime_manager,
            toolchain_manager,
            device_manager,
            buffer_manager: None,
            config_manager,
            branch_name: RwLock::new(None),
            device_id: RwLock::new(None),
            default_build_target: RwLock::new(None),
            master_cancel: RwLock::new(CancelToken::new()),
            started: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            can_build: AtomicBool::new(false),
            can_export: AtomicBool::new(false),
            needs_rediagnose: AtomicBool::new(false),
            has_configured: AtomicBool::new(false),
            action_state: RwLock::new(ActionState::default()),
            last_build_time: RwLock::new(None),
            message: RwLock::new(None),
            diagnostic_count: RwLock::new(0),
            error_count: RwLock::new(0),
            warning_count: RwLock::new(0),
            running_time: RwLock::new(Duration::ZERO),
            timer_started_at: RwLock::new(None),
            timer_generation: AtomicU64::new(0),
            events: RwLock::new(Vec::new()),
        })
    }

    /// Attaches a buffer-manager collaborator for save-all/rediagnose. Must
    /// be called before the manager is shared, since it needs exclusive
    /// access to set up; builds proceed with a no-op save/rediagnose when
    /// none is attached.
    pub fn with_buffer_manager(mut self: Arc<Self>, buffer_manager: Arc<dyn BufferManager>) -> Arc<Self> {
        Arc::get_mut(&mut self)
            .expect("with_buffer_manager must run before the manager is shared")
            .buffer_manager = Some(buffer_manager);
        self
    }

    /// Marks the manager started and runs an initial [`BuildManager::invalidate`]
    /// (spec §4.8 "Start: started := true; invalidate").
    pub async fn start(self: &Arc<Self>) {
        self.started.store(true, Ordering::SeqCst);
        self.invalidate().await;
    }

    /// Marks the manager as shutting down; a subsequent [`BuildManager::invalidate`]
    /// tears the pipeline down without constructing a new one.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Attaches (or replaces) the active pipeline directly, enabling
    /// build/export without going through the invalidate/rebuild chain.
    /// Replacing an existing pipeline tears the old one down first, recorded
    /// as a [`BuildEvent::PipelineTornDown`] carrying the *old* id.
    pub fn attach_pipeline(&self, pipeline: Arc<dyn Pipeline>) {
        self.install_pipeline(pipeline);
        self.can_build.store(true, Ordering::SeqCst);
        self.can_export.store(true, Ordering::SeqCst);
        self.recompute_enabled();
    }

    /// The lifecycle events recorded so far, in order (test/diagnostic use).
    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.read().expect("events lock poisoned").clone()
    }

    /// The current action-enabled snapshot.
    pub fn action_state(&self) -> ActionState {
        *self.action_state.read().expect("action state lock poisoned")
    }

    /// The currently attached pipeline, if any (spec §6 exposed state "pipeline").
    pub fn pipeline(&self) -> Option<Arc<dyn Pipeline>> {
        self.pipeline.read().expect("pipeline lock poisoned").clone()
    }

    /// Whether a phase is currently executing (spec §6 exposed state "busy").
    pub fn busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The last status message a running phase reported (spec §6 exposed
    /// state "message").
    pub fn message(&self) -> Option<String> {
        self.message.read().expect("message lock poisoned").clone()
    }

    /// True once at least one diagnostic has been recorded since the last
    /// [`BuildManager::invalidate`] (spec §6 exposed state "has-diagnostics").
    pub fn has_diagnostics(&self) -> bool {
        *self.diagnostic_count.read().expect("diagnostic lock poisoned") > 0
    }

    /// Time elapsed since the current (or most recently finished) build
    /// started (spec §4.8 "Timer: ... a periodic 1 Hz notification while
    /// building; reset on new build; stop on finish/fail").
    pub fn running_time(&self) -> Duration {
        *self.running_time.read().expect("timer lock poisoned")
    }

    /// The wall-clock time the most recent build finished, if any (spec §6
    /// exposed state "last-build-time").
    pub fn last_build_time(&self) -> Option<Instant> {
        *self.last_build_time.read().expect("last build time lock poisoned")
    }

    /// `default-build-target(string)`; an empty string clears the default,
    /// falling back to "build everything" (spec §6).
    pub fn set_default_build_target(&self, name: impl Into<String>) {
        let name = name.into();
        *self.default_build_target.write().expect("target lock poisoned") = if name.is_empty() { None } else { Some(name) };
    }

    /// Replaces the device id a build targets, invalidating the pipeline if
    /// it actually changed.
    pub async fn set_device(self: &Arc<Self>, device_id: Option<String>) -> bool {
        {
            let mut guard = self.device_id.write().expect("device lock poisoned");
            if *guard == device_id {
                return false;
            }
            *guard = device_id;
        }
        self.invalidate().await;
        true
    }

    /// Replaces the master cancellation token with a fresh one and signals
    /// the old one, stopping whatever is currently running (spec §5 "cancel
    /// replaces the master token with a fresh one and signals the current
    /// pipeline to stop").
    pub fn cancel(&self) {
        let mut guard = self.master_cancel.write().expect("cancel lock poisoned");
        guard.cancel();
        *guard = CancelToken::new();
    }

    fn master_cancel(&self) -> CancelToken {
        self.master_cancel.read().expect("cancel lock poisoned").clone()
    }

    /// Recomputes every action-enabled bit from `(busy, can_build, can_export)`
    /// as a single unit (spec §4.8), rather than toggling them independently.
    fn recompute_enabled(&self) -> ActionState {
        let busy = self.busy.load(Ordering::SeqCst);
        let can_build = self.can_build.load(Ordering::SeqCst);
        let can_export = self.can_export.load(Ordering::SeqCst);
        let state = ActionState {
            build_enabled: !busy && can_build,
            clean_enabled: !busy && can_build,
            install_enabled: !busy && can_build,
            export_enabled: !busy && can_export,
        };
        *self.action_state.write().expect("action state lock poisoned") = state;
        state
    }

    /// Records a VCS branch change, invalidating the pipeline only if the
    /// branch name actually differs from the last-known one.
    pub async fn vcs_branch_changed(self: &Arc<Self>, new_branch: &str) -> bool {
        {
            let mut branch = self.branch_name.write().expect("branch lock poisoned");
            if branch.as_deref() == Some(new_branch) {
                return false;
            }
            *branch = Some(new_branch.to_string());
        }
        self.invalidate().await;
        true
    }

    /// Tears down the current pipeline and, unless shutting down or not yet
    /// started, constructs a fresh one for the active config/device, driving
    /// `device.info_async -> runtime_manager.prepare -> toolchain_manager.prepare
    /// -> pipeline.init` (spec §4.8 "Invalidate"). If a build was in progress,
    /// synthesizes a [`BuildEvent::BuildFailed`] for it first and stops the
    /// running-time timer; diagnostic/error/warning counters always reset.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate(self: &Arc<Self>) {
        if self.busy.swap(false, Ordering::SeqCst) {
            self.synthesize_build_failed();
            self.stop_timer();
        }
        self.teardown_pipeline();
        self.reset_counters();
        self.needs_rediagnose.store(true, Ordering::SeqCst);
        self.can_build.store(false, Ordering::SeqCst);
        self.can_export.store(false, Ordering::SeqCst);
        self.recompute_enabled();

        if self.shutting_down.load(Ordering::SeqCst) || !self.started.load(Ordering::SeqCst) {
            return;
        }

        let config = self.config_manager.current();
        let device_id = self.device_id.read().expect("device lock poisoned").clone();

        let device = match &device_id {
            Some(id) => match self.device_manager.info(id).await {
                Ok(_info) => match self.device_manager.find(id) {
                    Ok(device) => Some(device),
                    Err(e) => {
                        tracing::warn!(error = %e, "device lookup failed");
                        return;
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "device info failed");
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = self.runtime_manager.prepare(&config.runtime_id).await {
            tracing::warn!(error = %e, "runtime preparation failed");
            return;
        }
        if let Err(e) = self.toolchain_manager.prepare(&config.toolchain_id).await {
            tracing::warn!(error = %e, "toolchain preparation failed");
            return;
        }

        let pipeline = self.pipeline_factory.create(config, device.clone());
        if let Err(e) = pipeline.init(device, CancelToken::new()).await {
            tracing::warn!(error = %e, "pipeline init failed");
            return;
        }

        self.install_pipeline(pipeline);
        self.can_build.store(true, Ordering::SeqCst);
        self.can_export.store(true, Ordering::SeqCst);
        self.recompute_enabled();
    }

    /// True if [`BuildManager::invalidate`] has fired since the last
    /// successfully configuring build.
    pub fn needs_rediagnose(&self) -> bool {
        self.needs_rediagnose.load(Ordering::SeqCst)
    }

    fn reset_counters(&self) {
        *self.diagnostic_count.write().expect("diagnostic lock poisoned") = 0;
        *self.error_count.write().expect("diagnostic lock poisoned") = 0;
        *self.warning_count.write().expect("diagnostic lock poisoned") = 0;
    }

    fn record_diagnostic(&self, diagnostic: &Diagnostic) {
        *self.diagnostic_count.write().expect("diagnostic lock poisoned") += 1;
        if diagnostic.severity.is_error() {
            *self.error_count.write().expect("diagnostic lock poisoned") += 1;
        } else if diagnostic.severity == crate::diagnostic::Severity::Warning {
            *self.warning_count.write().expect("diagnostic lock poisoned") += 1;
        }
    }

    /// Running error count, accumulated across every build since the last
    /// [`BuildManager::invalidate`] (spec §3 "error_count for Error|Fatal").
    pub fn error_count(&self) -> usize {
        *self.error_count.read().expect("diagnostic lock poisoned")
    }

    /// Running warning count, accumulated across every build since the last
    /// [`BuildManager::invalidate`].
    pub fn warning_count(&self) -> usize {
        *self.warning_count.read().expect("diagnostic lock poisoned")
    }

    fn require_pipeline(&self) -> Result<Arc<dyn Pipeline>, FoundryError> {
        self.pipeline()
            .ok_or_else(|| FoundryError::PipelinePreparation("no pipeline attached".to_string()))
    }

    fn teardown_pipeline(&self) {
        let old_id = self.pipeline_id.load(Ordering::SeqCst);
        let had_previous = self.pipeline.write().expect("pipeline lock poisoned").take().is_some();
        if had_previous {
            self.events
                .write()
                .expect("events lock poisoned")
                .push(BuildEvent::PipelineTornDown { pipeline_id: old_id });
        }
    }

    fn install_pipeline(&self, pipeline: Arc<dyn Pipeline>) {
        self.teardown_pipeline();
        self.pipeline_id.fetch_add(1, Ordering::SeqCst);
        *self.pipeline.write().expect("pipeline lock poisoned") = Some(pipeline);
    }

    fn synthesize_build_failed(&self) {
        let pipeline_id = self.pipeline_id.load(Ordering::SeqCst);
        self.events
            .write()
            .expect("events lock poisoned")
            .push(BuildEvent::BuildFailed { pipeline_id });
    }

    fn start_timer(self: &Arc<Self>) {
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.timer_started_at.write().expect("timer lock poisoned") = Some(tokio::time::Instant::now());
        *self.running_time.write().expect("timer lock poisoned") = Duration::ZERO;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if this.timer_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if let Some(started) = *this.timer_started_at.read().expect("timer lock poisoned") {
                    *this.running_time.write().expect("timer lock poisoned") = started.elapsed();
                }
                tracing::trace!(generation, "running-time tick");
            }
        });
    }

    fn stop_timer(&self) {
        self.timer_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(started) = self.timer_started_at.write().expect("timer lock poisoned").take() {
            *self.running_time.write().expect("timer lock poisoned") = started.elapsed();
        }
    }

    async fn resolve_targets(
        &self,
        phase: PipelinePhase,
        targets: Option<Vec<BuildTarget>>,
    ) -> Result<Option<Vec<BuildTarget>>, FoundryError> {
        if targets.is_some() || phase >= PipelinePhase::Install {
            return Ok(targets);
        }
        let Some(name) = self.default_build_target.read().expect("target lock poisoned").clone() else {
            return Ok(None);
        };
        let all = self.require_pipeline()?.list_targets().await?;
        Ok(all.into_iter().find(|t| t.name == name).map(|t| vec![t]))
    }

    async fn run_phase(
        self: &Arc<Self>,
        phase: PipelinePhase,
        targets: Option<Vec<BuildTarget>>,
        cancel: CancelToken,
    ) -> Result<(), FoundryError> {
        let pipeline = self.require_pipeline()?;
        let pipeline_id = self.pipeline_id.load(Ordering::SeqCst);
        self.busy.store(true, Ordering::SeqCst);
        self.recompute_enabled();
        self.start_timer();
        self.events
            .write()
            .expect("events lock poisoned")
            .push(BuildEvent::BuildStarted { pipeline_id });

        let observer: Arc<dyn PipelineObserver> = Arc::clone(self) as Arc<dyn PipelineObserver>;
        let result = pipeline.advance(phase, targets, cancel, observer).await;

        self.busy.store(false, Ordering::SeqCst);
        self.stop_timer();
        *self.last_build_time.write().expect("last build time lock poisoned") = Some(Instant::now());
        self.recompute_enabled();

        match &result {
            Ok(()) => {
                self.events
                    .write()
                    .expect("events lock poisoned")
                    .push(BuildEvent::BuildFinished { pipeline_id });
                if phase >= PipelinePhase::Configure {
                    self.has_configured.store(true, Ordering::SeqCst);
                    self.needs_rediagnose.store(false, Ordering::SeqCst);
                    if let Some(buffers) = &self.buffer_manager {
                        buffers.rediagnose_all().await;
                    }
                }
            }
            Err(e) if e.is_cancelled() => tracing::trace!("phase cancelled"),
            Err(e) => {
                tracing::warn!(error = %e, "phase failed");
                self.events
                    .write()
                    .expect("events lock poisoned")
                    .push(BuildEvent::BuildFailed { pipeline_id });
            }
        }
        result
    }

    /// Runs a build through `phase` (spec §4.8 `build`). Saves every open
    /// modified buffer first when `phase >= Build`, and, when `targets` is
    /// `None` and `phase < Install`, resolves the configured default build
    /// target via [`BuildManager::list_targets`] before advancing.
    ///
    /// A cancellation already signalled before preparation begins short-circuits
    /// with [`FoundryError::Cancelled`] and emits no [`BuildEvent`] (spec §8
    /// invariant 7, scenario S6): the current pipeline id is only captured, and
    /// a [`BuildEvent::BuildStarted`] recorded, once a build actually starts.
    #[tracing::instrument(skip(self, targets, cancel))]
    pub async fn build(
        self: &Arc<Self>,
        phase: PipelinePhase,
        targets: Option<Vec<BuildTarget>>,
        cancel: CancelToken,
    ) -> Result<(), FoundryError> {
        let cancel = self.master_cancel().join(&cancel);
        if cancel.is_cancelled() {
            return Err(FoundryError::Cancelled);
        }
        let targets = self.resolve_targets(phase, targets).await?;
        if phase >= PipelinePhase::Build {
            if let Some(buffers) = &self.buffer_manager {
                buffers.save_all().await?;
            }
        }
        self.run_phase(phase, targets, cancel).await
    }

    /// Removes build outputs (spec §4.8 `clean`).
    #[tracing::instrument(skip(self, cancel))]
    pub async fn clean(self: &Arc<Self>, phase: PipelinePhase, cancel: CancelToken) -> Result<(), FoundryError> {
        let cancel = self.master_cancel().join(&cancel);
        if cancel.is_cancelled() {
            return Err(FoundryError::Cancelled);
        }
        self.run_phase(phase, None, cancel).await
    }

    /// Cleans then builds (spec §4.8 `rebuild`).
    #[tracing::instrument(skip(self, targets, cancel))]
    pub async fn rebuild(
        self: &Arc<Self>,
        phase: PipelinePhase,
        targets: Option<Vec<BuildTarget>>,
        cancel: CancelToken,
    ) -> Result<(), FoundryError> {
        self.clean(PipelinePhase::Clean, cancel.clone()).await?;
        self.build(phase, targets, cancel).await
    }

    /// Advances through `Install` directly (spec §4.8 `install`).
    #[tracing::instrument(skip(self, cancel))]
    pub async fn install(self: &Arc<Self>, cancel: CancelToken) -> Result<(), FoundryError> {
        let cancel = self.master_cancel().join(&cancel);
        if cancel.is_cancelled() {
            return Err(FoundryError::Cancelled);
        }
        self.run_phase(PipelinePhase::Install, None, cancel).await
    }

    /// Advances through `Install` and produces a distributable artifact,
    /// failing `NotSupported` if the attached pipeline can't export (spec
    /// §4.8 `export`).
    #[tracing::instrument(skip(self, cancel))]
    pub async fn export(self: &Arc<Self>, cancel: CancelToken) -> Result<(), FoundryError> {
        if !self.require_pipeline()?.can_export() {
            return Err(FoundryError::NotSupported("pipeline cannot export".to_string()));
        }
        let cancel = self.master_cancel().join(&cancel);
        if cancel.is_cancelled() {
            return Err(FoundryError::Cancelled);
        }
        self.run_phase(PipelinePhase::Install, None, cancel).await
    }

    /// Lists the targets the attached pipeline's providers expose.
    #[tracing::instrument(skip(self))]
    pub async fn list_targets(&self) -> Result<Vec<BuildTarget>, FoundryError> {
        self.require_pipeline()?.list_targets().await
    }
}

impl PipelineObserver for BuildManager {
    fn started(&self, phase: PipelinePhase) {
        tracing::trace!(?phase, "pipeline phase started");
    }

    fn diagnostic(&self, diagnostic: Diagnostic) {
        self.record_diagnostic(&diagnostic);
    }

    fn finished(&self, success: bool) {
        tracing::trace!(success, "pipeline phase finished");
    }

    fn notify_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
        self.recompute_enabled();
    }

    fn notify_message(&self, message: Option<String>) {
        *self.message.write().expect("message lock poisoned") = message;
    }

    fn loaded(&self) {
        tracing::trace!("pipeline loaded");
    }
}
