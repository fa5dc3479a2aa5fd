// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Toolchain preparation: the compiler/linker set a pipeline invokes (spec §4.9).

use async_trait::async_trait;

use crate::error::FoundryError;

/// A single available toolchain (e.g. a cross-compiler triplet).
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Stable id used to select this toolchain in a [`crate::config::Config`].
    pub id: String,
    /// The target triplet this toolchain builds for.
    pub triplet: String,
}

/// Resolves and prepares the toolchain a build will use (spec §4.9).
#[async_trait]
pub trait ToolchainManager: Send + Sync {
    /// Lists the toolchains this manager's providers currently have available.
    fn toolchains(&self) -> Vec<Toolchain>;

    /// Looks up a toolchain by id, failing `ProviderLoad` if unknown.
    fn find(&self, id: &str) -> Result<Toolchain, FoundryError> {
        self.toolchains()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| FoundryError::ProviderLoad(format!("no toolchain named \"{id}\"")))
    }

    /// Prepares `id` for use, awaiting completion.
    async fn prepare(&self, id: &str) -> Result<Toolchain, FoundryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticToolchains(Vec<Toolchain>);

    #[async_trait]
    impl ToolchainManager for StaticToolchains {
        fn toolchains(&self) -> Vec<Toolchain> {
            self.0.clone()
        }

        async fn prepare(&self, id: &str) -> Result<Toolchain, FoundryError> {
            self.find(id)
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn find_resolves_by_id() {
        let mgr = StaticToolchains(vec![Toolchain {
            id: "default".into(),
            triplet: "x86_64-unknown-linux-gnu".into(),
        }]);
        assert_eq!(mgr.prepare("default").await.unwrap().triplet, "x86_64-unknown-linux-gnu");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_id_fails_provider_load() {
        let mgr = StaticToolchains(vec![]);
        let err = mgr.prepare("missing").await.unwrap_err();
        assert!(matches!(err, FoundryError::ProviderLoad(_)));
    }
}
