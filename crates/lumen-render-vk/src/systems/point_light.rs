// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use tracing::warn;

use super::{build_pipeline, ShaderPair, PUSH_STAGES};
use crate::device::Device;
use crate::frame::{FrameInfo, GlobalUbo, PointLight, MAX_LIGHTS};
use crate::game_object::{GameObject, GameObjectMap, Id};
use crate::pipeline::{embedded, Pipeline};

/// Radians per second the lights orbit the world Y axis.
pub const ORBIT_SPEED: f32 = 0.5;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightPushConstants {
    pub position: Vec4,
    pub color: Vec4,
    pub radius: f32,
    _pad: [f32; 3],
}

impl PointLightPushConstants {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position: position.extend(1.0),
            color: color.extend(intensity),
            radius,
            _pad: [0.0; 3],
        }
    }
}

/// Camera-facing billboards for every object with a point light, drawn
/// after the opaque pass with alpha blending.
pub struct PointLightSystem {
    device: Rc<Device>,
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl PointLightSystem {
    pub fn new(
        device: Rc<Device>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        shader_dir: Option<&Path>,
    ) -> Result<Self> {
        let shaders = ShaderPair::resolve(
            shader_dir,
            "point_light",
            embedded::POINT_LIGHT_VERT,
            embedded::POINT_LIGHT_FRAG,
        );
        let (pipeline_layout, pipeline) = build_pipeline(
            &device,
            render_pass,
            global_set_layout,
            size_of::<PointLightPushConstants>(),
            &shaders,
            |config| {
                config.clear_vertex_input().enable_alpha_blending();
            },
        )?;
        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    /// Advances the light orbit and copies the lights into `ubo`.
    pub fn update(&self, frame: &FrameInfo<'_>, objects: &mut GameObjectMap, ubo: &mut GlobalUbo) {
        orbit_lights(objects, ORBIT_SPEED * frame.frame_time);
        fill_point_lights(objects, ubo);
    }

    pub fn render(&self, frame: &FrameInfo<'_>, objects: &GameObjectMap) {
        let d = self.device.raw();
        let cmd = frame.command_buffer;
        let order = back_to_front(objects, frame.camera.position());

        self.pipeline.bind(cmd);
        unsafe {
            d.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[frame.global_descriptor_set],
                &[],
            );
        }

        for id in order {
            let Some(obj) = objects.get(&id) else { continue };
            let Some(light) = obj.point_light else { continue };
            let push = PointLightPushConstants::new(
                obj.transform.translation,
                obj.color,
                light.light_intensity,
                obj.transform.scale.x,
            );
            unsafe {
                d.cmd_push_constants(
                    cmd,
                    self.pipeline_layout,
                    PUSH_STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
                // Billboard quad generated in the vertex shader.
                d.cmd_draw(cmd, 6, 1, 0, 0);
            }
        }
    }
}

impl Drop for PointLightSystem {
    fn drop(&mut self) {
        unsafe {
            self.device
                .raw()
                .destroy_pipeline_layout(self.pipeline_layout, None)
        };
    }
}

fn orbit_lights(objects: &mut GameObjectMap, angle: f32) {
    let rotation = Mat4::from_axis_angle(Vec3::NEG_Y, angle);
    for obj in objects.values_mut().filter(|o| o.point_light.is_some()) {
        obj.transform.translation = rotation.transform_point3(obj.transform.translation);
    }
}

/// Writes lights in id order. Anything past `MAX_LIGHTS` is dropped.
fn fill_point_lights(objects: &GameObjectMap, ubo: &mut GlobalUbo) {
    let mut count = 0;
    for obj in objects.values() {
        let Some(light) = obj.point_light else { continue };
        if count == MAX_LIGHTS {
            debug_assert!(false, "more than {MAX_LIGHTS} point lights");
            warn!("more than {} point lights, extra lights ignored", MAX_LIGHTS);
            break;
        }
        ubo.point_lights[count] = PointLight {
            position: obj.transform.translation.extend(1.0),
            color: obj.color.extend(light.light_intensity),
        };
        count += 1;
    }
    ubo.num_lights = count as i32;
}

/// Farthest light first so blended billboards composite correctly.
fn back_to_front(objects: &GameObjectMap, eye: Vec3) -> Vec<Id> {
    let mut lights: Vec<(f32, Id)> = objects
        .values()
        .filter(|o| o.point_light.is_some())
        .map(|o| (eye.distance_squared(o.transform.translation), o.id()))
        .collect();
    lights.sort_by(|a, b| b.0.total_cmp(&a.0));
    lights.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_at(pos: Vec3) -> GameObject {
        let mut light = GameObject::make_point_light(10.0, 0.1, Vec3::ONE);
        light.transform.translation = pos;
        light
    }

    #[test]
    fn push_block_is_padded_to_vec4() {
        assert_eq!(size_of::<PointLightPushConstants>(), 48);
        let p = PointLightPushConstants::new(Vec3::X, Vec3::ONE, 0.5, 0.2);
        assert_eq!(p.position, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(p.color.w, 0.5);
        assert_eq!(p.radius, 0.2);
    }

    #[test]
    fn ubo_receives_only_lights() {
        let mut objects = GameObjectMap::new();
        light_at(Vec3::new(1.0, 0.0, 0.0)).insert_into(&mut objects);
        GameObject::create().insert_into(&mut objects);
        light_at(Vec3::new(0.0, 0.0, 2.0)).insert_into(&mut objects);

        let mut ubo = GlobalUbo::default();
        fill_point_lights(&objects, &mut ubo);
        assert_eq!(ubo.num_lights, 2);
        assert_eq!(ubo.lights()[0].position, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(ubo.lights()[1].position, Vec4::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(ubo.lights()[1].color, Vec4::new(1.0, 1.0, 1.0, 10.0));
    }

    #[test]
    fn orbit_keeps_radius_and_height() {
        let mut objects = GameObjectMap::new();
        let id = light_at(Vec3::new(1.0, -1.0, 0.0)).insert_into(&mut objects);
        let mut plain = GameObject::create();
        plain.transform.translation = Vec3::new(1.0, 0.0, 0.0);
        let plain_id = plain.insert_into(&mut objects);

        orbit_lights(&mut objects, std::f32::consts::FRAC_PI_2);
        let p = objects[&id].transform.translation;
        assert!((p.y + 1.0).abs() < 1e-6);
        assert!((Vec3::new(p.x, 0.0, p.z).length() - 1.0).abs() < 1e-5);
        assert!(p.x.abs() < 1e-5, "quarter turn moves the light off the x axis");
        assert_eq!(objects[&plain_id].transform.translation, Vec3::X);
    }

    #[test]
    fn lights_sorted_farthest_first() {
        let mut objects = GameObjectMap::new();
        let near = light_at(Vec3::new(0.0, 0.0, 1.0)).insert_into(&mut objects);
        let far = light_at(Vec3::new(0.0, 0.0, 5.0)).insert_into(&mut objects);
        let mid = light_at(Vec3::new(0.0, 0.0, 3.0)).insert_into(&mut objects);
        assert_eq!(back_to_front(&objects, Vec3::ZERO), vec![far, mid, near]);
    }
}
