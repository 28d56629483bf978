// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

use thiserror::Error;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
    tracing::debug!("tracing initialised");
}

/// Failures the engine cannot recover from.
///
/// Everything here is fatal: it travels up as `anyhow::Error` to `main`,
/// gets logged, and the process exits nonzero. Stale swapchains are not
/// errors and never show up in this enum.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no suitable physical device (graphics+present queues, swapchain support)")]
    NoSuitableGpu,
    #[error("queue family missing: {0}")]
    MissingQueueFamily(&'static str),
    #[error("no memory type matches filter 0x{type_filter:x} with {properties}")]
    NoMemoryType { type_filter: u32, properties: String },
    #[error("none of the candidate formats is supported: {0}")]
    UnsupportedFormat(String),
    #[error("swapchain: {0}")]
    Swapchain(String),
    #[error("swapchain image or depth format changed across recreation")]
    SwapchainFormatChanged,
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("invalid pipeline config: {0}")]
    InvalidPipelineConfig(&'static str),
    #[error("descriptor: {0}")]
    Descriptor(String),
}
