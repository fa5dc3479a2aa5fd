// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Device preparation: the physical or emulated target a build is deployed
//! to (spec §4.9), rounding out runtime/toolchain/device preparation.

use async_trait::async_trait;

use crate::error::FoundryError;

/// A deployment target, e.g. a connected device or an emulator instance.
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable id used to select this device.
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
}

/// Host/kind compatibility info a pipeline checks before preparing a runtime
/// or toolchain against a device (spec §4.9 "device.info_async").
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Coarse device category, e.g. `"host"`, `"emulator"`.
    pub kind: String,
    /// The device's host triplet, compared against a toolchain's triplet.
    pub host_triplet: String,
}

/// Resolves and prepares the device a build will be deployed to (spec §4.9).
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Lists the devices this manager's providers currently have available.
    fn devices(&self) -> Vec<Device>;

    /// Looks up a device by id, failing `ProviderLoad` if unknown.
    fn find(&self, id: &str) -> Result<Device, FoundryError> {
        self.devices()
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| FoundryError::ProviderLoad(format!("no device named \"{id}\"")))
    }

    /// Prepares `id` for use (e.g. establishing a connection), awaiting completion.
    async fn prepare(&self, id: &str) -> Result<Device, FoundryError>;

    /// Reports `id`'s kind/host-triplet, the first step of the build
    /// manager's invalidate/rebuild chain (spec §4.8, §4.9).
    async fn info(&self, id: &str) -> Result<DeviceInfo, FoundryError>;
}
