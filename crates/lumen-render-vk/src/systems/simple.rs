// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};

use super::{build_pipeline, ShaderPair, PUSH_STAGES};
use crate::device::Device;
use crate::frame::FrameInfo;
use crate::game_object::{GameObject, GameObjectMap};
use crate::pipeline::{embedded, Pipeline};

/// Per-draw data. The normal matrix travels as a Mat4 so the block has no
/// std430 vec3 padding to get wrong.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimplePushConstantData {
    pub model_matrix: Mat4,
    pub normal_matrix: Mat4,
}

impl SimplePushConstantData {
    pub fn for_object(obj: &GameObject) -> Self {
        Self {
            model_matrix: obj.transform.mat4(),
            normal_matrix: Mat4::from_mat3(obj.transform.normal_matrix()),
        }
    }
}

impl Default for SimplePushConstantData {
    fn default() -> Self {
        Self {
            model_matrix: Mat4::IDENTITY,
            normal_matrix: Mat4::from_mat3(Mat3::IDENTITY),
        }
    }
}

/// Lit, depth-tested meshes.
pub struct SimpleRenderSystem {
    device: Rc<Device>,
    pipeline: Pipeline,
    pipeline_layout: vk::PipelineLayout,
}

impl SimpleRenderSystem {
    pub fn new(
        device: Rc<Device>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
        shader_dir: Option<&Path>,
    ) -> Result<Self> {
        let shaders = ShaderPair::resolve(
            shader_dir,
            "simple_shader",
            embedded::SIMPLE_VERT,
            embedded::SIMPLE_FRAG,
        );
        let (pipeline_layout, pipeline) = build_pipeline(
            &device,
            render_pass,
            global_set_layout,
            size_of::<SimplePushConstantData>(),
            &shaders,
            |_| {},
        )?;
        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    pub fn render_game_objects(&self, frame: &FrameInfo<'_>, objects: &GameObjectMap) {
        let d = self.device.raw();
        let cmd = frame.command_buffer;
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

        for obj in objects.values() {
            let Some(model) = &obj.model else { continue };
            let push = SimplePushConstantData::for_object(obj);
            unsafe {
                d.cmd_push_constants(
                    cmd,
                    self.pipeline_layout,
                    PUSH_STAGES,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }
            model.bind(d, cmd);
            model.draw(d, cmd);
        }
    }
}

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        unsafe {
            self.device
                .raw()
                .destroy_pipeline_layout(self.pipeline_layout, None)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn push_block_fits_guaranteed_minimum() {
        // 128 bytes is the smallest maxPushConstantsSize a driver may report.
        assert_eq!(size_of::<SimplePushConstantData>(), 128);
    }

    #[test]
    fn push_data_follows_transform() {
        let mut obj = GameObject::create();
        obj.transform.translation = Vec3::new(1.0, 2.0, 3.0);
        obj.transform.scale = Vec3::new(2.0, 2.0, 2.0);
        let push = SimplePushConstantData::for_object(&obj);
        assert_eq!(push.model_matrix.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
        assert!((push.normal_matrix.x_axis.x - 0.5).abs() < 1e-6);
        assert_eq!(push.normal_matrix.w_axis, glam::Vec4::W);
    }
}
