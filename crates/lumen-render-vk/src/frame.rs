// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use lumen_math::Camera;

pub const MAX_LIGHTS: usize = 10;

/// std140 mirror of `PointLight` in the shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLight {
    pub position: Vec4,
    /// w is intensity
    pub color: Vec4,
}

/// Set 0, binding 0 for every pipeline. Field order and padding follow
/// the `GlobalUbo` block in `simple_shader.vert` / `point_light.vert`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    pub inverse_view: Mat4,
    pub ambient_light_color: Vec4,
    pub point_lights: [PointLight; MAX_LIGHTS],
    pub num_lights: i32,
    _pad: [i32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            ambient_light_color: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLight::default(); MAX_LIGHTS],
            num_lights: 0,
            _pad: [0; 3],
        }
    }
}

impl GlobalUbo {
    pub fn set_camera(&mut self, camera: &Camera) {
        self.projection = *camera.projection();
        self.view = *camera.view();
        self.inverse_view = *camera.inverse_view();
    }

    pub fn lights(&self) -> &[PointLight] {
        &self.point_lights[..self.num_lights.clamp(0, MAX_LIGHTS as i32) as usize]
    }
}

/// Everything a render system needs while recording one frame.
#[derive(Clone, Copy)]
pub struct FrameInfo<'a> {
    pub frame_index: usize,
    pub frame_time: f32,
    pub command_buffer: vk::CommandBuffer,
    pub camera: &'a Camera,
    pub global_descriptor_set: vk::DescriptorSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn ubo_layout_matches_std140_block() {
        assert_eq!(size_of::<PointLight>(), 32);
        assert_eq!(offset_of!(GlobalUbo, view), 64);
        assert_eq!(offset_of!(GlobalUbo, inverse_view), 128);
        assert_eq!(offset_of!(GlobalUbo, ambient_light_color), 192);
        assert_eq!(offset_of!(GlobalUbo, point_lights), 208);
        assert_eq!(offset_of!(GlobalUbo, num_lights), 208 + 32 * MAX_LIGHTS);
        assert_eq!(size_of::<GlobalUbo>() % 16, 0);
        assert!(align_of::<GlobalUbo>() >= 4);
    }

    #[test]
    fn default_ambient_is_dim_white() {
        let ubo = GlobalUbo::default();
        assert_eq!(ubo.ambient_light_color, Vec4::new(1.0, 1.0, 1.0, 0.02));
        assert!(ubo.lights().is_empty());
    }

    #[test]
    fn camera_matrices_are_copied() {
        let mut cam = Camera::default();
        cam.set_view_target(
            glam::Vec3::new(-1.0, -2.0, 2.0),
            glam::Vec3::new(0.0, 0.0, 2.5),
            Camera::DEFAULT_UP,
        );
        let mut ubo = GlobalUbo::default();
        ubo.set_camera(&cam);
        assert_eq!(ubo.view, *cam.view());
        assert_eq!(ubo.inverse_view, *cam.inverse_view());
    }
}
