// SPDX-License-Identifier: CEPL-1.0
//! Windowing on winit: the presentable window and held-key tracking.

pub use winit;

mod input;
mod window;

pub use input::{KeyMappings, KeyState};
pub use window::Window;
