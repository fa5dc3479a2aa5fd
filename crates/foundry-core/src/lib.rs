#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The build-foundry core: a [`BuildManager`] that drives an attached
//! [`Pipeline`] through runtime/toolchain/device preparation under a
//! configuration owned by [`ConfigManager`] (spec §3, §4.8-§4.10).

pub mod build_manager;
pub mod build_target;
pub mod cancel;
pub mod config;
pub mod device;
pub mod diagnostic;
pub mod error;
pub mod pipeline;
pub mod runtime_manager;
pub mod toolchain_manager;

pub use build_manager::{ActionState, BufferManager, BuildEvent, BuildManager};
pub use build_target::{BuildTarget, BuildTargetKind};
pub use cancel::CancelToken;
pub use config::{Config, ConfigManager, ConfigProvider, Locality};
pub use device::{Device, DeviceInfo, DeviceManager};
pub use diagnostic::{Diagnostic, Severity};
pub use error::FoundryError;
pub use pipeline::{Pipeline, PipelineFactory, PipelineObserver, PipelinePhase};
pub use runtime_manager::{Runtime, RuntimeManager};
pub use toolchain_manager::{Toolchain, ToolchainManager};
