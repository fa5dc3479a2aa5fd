// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Runtime preparation: the sysroot/SDK a pipeline builds against (spec §4.9).

use async_trait::async_trait;

use crate::error::FoundryError;

/// A single available runtime (e.g. a flatpak SDK, a container image).
#[derive(Debug, Clone)]
pub struct Runtime {
    /// Stable id used to select this runtime in a [`crate::config::Config`].
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
}

/// Resolves and prepares the runtime a build will target (spec §4.9).
#[async_trait]
pub trait RuntimeManager: Send + Sync {
    /// Lists the runtimes this manager's providers currently have available.
    fn runtimes(&self) -> Vec<Runtime>;

    /// Looks up a runtime by id, failing `ProviderLoad` if unknown.
    fn find(&self, id: &str) -> Result<Runtime, FoundryError> {
        self.runtimes()
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| FoundryError::ProviderLoad(format!("no runtime named \"{id}\"")))
    }

    /// Prepares `id` for use (e.g. downloading an SDK), awaiting completion.
    async fn prepare(&self, id: &str) -> Result<Runtime, FoundryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRuntimes(Vec<Runtime>);

    #[async_trait]
    impl RuntimeManager for StaticRuntimes {
        fn runtimes(&self) -> Vec<Runtime> {
            self.0.clone()
        }

        async fn prepare(&self, id: &str) -> Result<Runtime, FoundryError> {
            self.find(id)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn find_resolves_by_id() {
        let mgr = StaticRuntimes(vec![Runtime {
            id: "host".into(),
            display_name: "Host system".into(),
        }]);
        assert_eq!(mgr.prepare("host").await.unwrap().display_name, "Host system");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_id_fails_provider_load() {
        let mgr = StaticRuntimes(vec![]);
        let err = mgr.prepare("missing").await.unwrap_err();
        assert!(matches!(err, FoundryError::ProviderLoad(_)));
    }
}
