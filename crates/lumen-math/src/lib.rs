// SPDX-License-Identifier: CEPL-1.0
//! Scene math on top of glam: object transforms, the camera and the
//! keyboard fly controller.

mod camera;
mod controller;
mod transform;

pub use camera::Camera;
pub use controller::{KeyboardMovementController, Movement};
pub use glam;
pub use transform::TransformComponent;
