// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan backend on `ash`.
//!
//! Every wrapper holds an `Rc<Device>` and destroys its own handles in
//! `Drop`, so the device always outlives the objects created from it.

pub mod buffer;
mod debug;
pub mod descriptors;
pub mod device;
pub mod frame;
pub mod game_object;
pub mod model;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod systems;

pub use ash::vk;

pub use buffer::Buffer;
pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
pub use device::Device;
pub use frame::{FrameInfo, GlobalUbo, PointLight, MAX_LIGHTS};
pub use game_object::{GameObject, GameObjectMap, PointLightComponent};
pub use model::{Builder, Model, Vertex};
pub use renderer::Renderer;
pub use swapchain::{SwapChain, SwapchainPreferences};
pub use systems::{PointLightSystem, SimpleRenderSystem};
