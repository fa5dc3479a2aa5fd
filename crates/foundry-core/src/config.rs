// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Build configuration and its debounced writeback manager (spec §4.10).
//!
//! Grounded in `ide-config.c`/`ide-config-manager.c`: the writeback timer is
//! *reset*, not extended, on every new dirty notification, and a config with
//! an empty id string is treated the same as "no user-chosen id" at load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The debounce interval between a config becoming dirty and its writeback
/// (spec §4.10, grounded in `ide-config-manager.c`'s literal 3 seconds).
pub const WRITEBACK_DEBOUNCE: Duration = Duration::from_secs(3);

/// Where a config's build tree lives relative to the source tree (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locality {
    /// Build inside the source tree.
    InTree,
    /// Build outside the source tree.
    OutOfTree,
    /// Either is acceptable; the pipeline picks.
    #[default]
    Default,
}

/// One named build configuration: which runtime/toolchain it targets, the
/// options/commands a pipeline stage runs under it, and any environment
/// overrides a stage should see (spec §4.10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// User-chosen id; an empty string means "no user-chosen id" (treated the
    /// same as absent at load, per `ide-config.c`).
    pub id: String,
    /// Human-readable name, shown in a UI's config switcher.
    pub display_name: String,
    /// The runtime id a pipeline built under this config should prepare.
    pub runtime_id: String,
    /// The toolchain id a pipeline built under this config should prepare.
    pub toolchain_id: String,
    /// The application id a pipeline passes through to its providers.
    pub app_id: String,
    /// Install prefix, meaningful only when `prefix_set` is `true`.
    pub prefix: Option<String>,
    /// Whether `prefix` was explicitly set by the user, distinct from unset.
    pub prefix_set: bool,
    /// Extra options passed to the configure stage.
    pub config_opts: Vec<String>,
    /// Extra options passed when running a built target.
    pub run_opts: Vec<String>,
    /// Commands run during the build stage, in order, after the pipeline's own.
    pub build_commands: Vec<String>,
    /// Commands run after install, in order.
    pub post_install_commands: Vec<String>,
    /// Directories prepended to `PATH` for every stage's subprocess.
    pub prepend_path: Vec<String>,
    /// Directories appended to `PATH` for every stage's subprocess.
    pub append_path: Vec<String>,
    /// Environment variables merged into a stage's subprocess environment.
    pub env: HashMap<String, String>,
    /// Environment variables merged only into a *run* (not build) subprocess.
    pub runtime_environment: HashMap<String, String>,
    /// Parallel job count a stage should request; `0` means "pipeline default".
    pub parallelism: i32,
    /// Whether this config builds with debug symbols/optimizations off.
    pub debug: bool,
    /// Where this config's build tree lives relative to the source tree.
    pub locality: Locality,
}

impl Config {
    /// The user-chosen id, or `None` if it's empty (spec §4.10 supplement).
    pub fn effective_id(&self) -> Option<&str> {
        if self.id.is_empty() {
            None
        } else {
            Some(self.id.as_str())
        }
    }
}

/// Contributes one or more configs for a project, in priority order (spec
/// §4.10 "orders configs via plugin-contributed providers").
pub trait ConfigProvider: Send + Sync {
    /// The configs this provider contributes, highest priority first.
    fn configs(&self) -> Vec<Config>;
}

/// Owns the active [`Config`] and debounces writeback after each change.
///
/// `seq` strictly increases on every change that marks the config dirty, and
/// `dirty` stays `true` until the debounced writeback actually fires (spec §8
/// invariant 5).
pub struct ConfigManager {
    current: RwLock<Config>,
    seq: AtomicU64,
    dirty: AtomicBool,
    writeback_count: AtomicUsize,
    debounce: Duration,
}

impl ConfigManager {
    /// A manager seeded with `initial`, using the standard debounce interval.
    pub fn new(initial: Config) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(initial),
            seq: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            writeback_count: AtomicUsize::new(0),
            debounce: WRITEBACK_DEBOUNCE,
        })
    }

    /// A manager with a caller-chosen debounce interval, for tests that can't
    /// afford to wait the full 3 seconds.
    pub fn with_debounce(initial: Config, debounce: Duration) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(initial),
            seq: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            writeback_count: AtomicUsize::new(0),
            debounce,
        })
    }

    /// Orders every provider's configs, selects `preferred_id` if it names
    /// one of them, else falls back to the first provider-ordered config
    /// (spec §4.10 "when no user-chosen id exists at load time, the
    /// provider-chosen default is used").
    pub fn from_providers(providers: &[Arc<dyn ConfigProvider>], preferred_id: Option<&str>) -> Arc<Self> {
        let all: Vec<Config> = providers.iter().flat_map(|p| p.configs()).collect();
        let selected = preferred_id
            .and_then(|id| all.iter().find(|c| c.id == id).cloned())
            .or_else(|| all.into_iter().next())
            .unwrap_or_default();
        Self::new(selected)
    }

    /// A clone of the active config.
    pub fn current(&self) -> Config {
        self.current.read().expect("config lock poisoned").clone()
    }

    /// The current sequence number; strictly increases on every dirtying change.
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Whether the active config has a pending (not yet written-back) change.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Replaces the active config and (re)schedules its debounced writeback.
    /// Each call bumps the sequence number, which invalidates any writeback
    /// already in flight from a previous call — the timer restarts rather
    /// than extends.
    pub fn set_current(self: &Arc<Self>, config: Config) {
        *self.current.write().expect("config lock poisoned") = config;
        self.dirty.store(true, Ordering::SeqCst);
        self.schedule_writeback();
    }

    /// Number of writebacks that have actually fired (observable side effect
    /// for tests; a real implementation would persist to disk here instead).
    pub fn writeback_count(&self) -> usize {
        self.writeback_count.load(Ordering::SeqCst)
    }

    fn schedule_writeback(self: &Arc<Self>) {
        let generation = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            if this.seq.load(Ordering::SeqCst) == generation {
                this.writeback_count.fetch_add(1, Ordering::SeqCst);
                this.dirty.store(false, Ordering::SeqCst);
                tracing::trace!(generation, "config writeback fired");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(Vec<Config>);
    impl ConfigProvider for StaticProvider {
        fn configs(&self) -> Vec<Config> {
            self.0.clone()
        }
    }

    #[test]
    fn empty_id_has_no_effective_id() {
        let config = Config::default();
        assert_eq!(config.effective_id(), None);
    }

    #[test]
    fn non_empty_id_is_effective() {
        let config = Config {
            id: "release".into(),
            ..Config::default()
        };
        assert_eq!(config.effective_id(), Some("release"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn setter_call_marks_dirty_and_strictly_increases_seq() {
        let mgr = ConfigManager::with_debounce(Config::default(), Duration::from_secs(3));
        assert!(!mgr.is_dirty());
        let seq_before = mgr.seq();
        mgr.set_current(Config {
            id: "a".into(),
            ..Config::default()
        });
        assert!(mgr.is_dirty());
        assert!(mgr.seq() > seq_before);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn writeback_fires_once_after_the_debounce() {
        let mgr = ConfigManager::with_debounce(Config::default(), Duration::from_millis(10));
        mgr.set_current(Config {
            id: "a".into(),
            ..Config::default()
        });
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.writeback_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn rapid_changes_reset_rather_than_extend_the_timer() {
        let mgr = ConfigManager::with_debounce(Config::default(), Duration::from_millis(10));
        mgr.set_current(Config {
            id: "a".into(),
            ..Config::default()
        });
        tokio::time::advance(Duration::from_millis(8)).await;
        mgr.set_current(Config {
            id: "b".into(),
            ..Config::default()
        });
        // Only 8ms since the first change but the second resets the clock;
        // with a mere extension this would still be within the original window.
        tokio::time::advance(Duration::from_millis(8)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.writeback_count(), 0);
        tokio::time::advance(Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.writeback_count(), 1);
    }

    #[test]
    fn from_providers_falls_back_to_the_first_provider_ordered_config() {
        let providers: Vec<Arc<dyn ConfigProvider>> = vec![Arc::new(StaticProvider(vec![
            Config { id: "release".into(), ..Config::default() },
            Config { id: "debug".into(), ..Config::default() },
        ]))];
        let mgr = ConfigManager::from_providers(&providers, None);
        assert_eq!(mgr.current().id, "release");
    }

    #[test]
    fn from_providers_honors_a_preferred_id_when_present() {
        let providers: Vec<Arc<dyn ConfigProvider>> = vec![Arc::new(StaticProvider(vec![
            Config { id: "release".into(), ..Config::default() },
            Config { id: "debug".into(), ..Config::default() },
        ]))];
        let mgr = ConfigManager::from_providers(&providers, Some("debug"));
        assert_eq!(mgr.current().id, "debug");
    }

    #[test]
    fn from_providers_ignores_an_unknown_preferred_id() {
        let providers: Vec<Arc<dyn ConfigProvider>> = vec![Arc::new(StaticProvider(vec![Config {
            id: "release".into(),
            ..Config::default()
        }]))];
        let mgr = ConfigManager::from_providers(&providers, Some("missing"));
        assert_eq!(mgr.current().id, "release");
    }
}
