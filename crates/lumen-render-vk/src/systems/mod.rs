// SPDX-License-Identifier: CEPL-1.0
//! Render systems: each owns one pipeline and its layout and records draws
//! for a subset of the game objects.

mod point_light;
mod simple;

pub use point_light::{PointLightPushConstants, PointLightSystem};
pub use simple::{SimplePushConstantData, SimpleRenderSystem};

use std::path::Path;
use std::rc::Rc;

use anyhow::Result;
use ash::vk;

use crate::device::Device;
use crate::pipeline::{create_pipeline_layout, Pipeline, PipelineConfig, ShaderSource};

const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Shader pair for a system: on-disk overrides from `shader_dir`, else the
/// SPIR-V compiled into the binary.
pub struct ShaderPair {
    pub vert: ShaderSource,
    pub frag: ShaderSource,
}

impl ShaderPair {
    pub fn resolve(
        shader_dir: Option<&Path>,
        stem: &str,
        vert: &'static [u8],
        frag: &'static [u8],
    ) -> Self {
        Self {
            vert: ShaderSource::resolve(shader_dir, &format!("{stem}.vert.spv"), vert),
            frag: ShaderSource::resolve(shader_dir, &format!("{stem}.frag.spv"), frag),
        }
    }
}

/// Layout over the global set plus one push-constant block of `push_size`
/// bytes, and the pipeline built on it. The layout is destroyed again if
/// the pipeline fails.
fn build_pipeline(
    device: &Rc<Device>,
    render_pass: vk::RenderPass,
    global_set_layout: vk::DescriptorSetLayout,
    push_size: usize,
    shaders: &ShaderPair,
    customize: impl FnOnce(&mut PipelineConfig),
) -> Result<(vk::PipelineLayout, Pipeline)> {
    let push_range = vk::PushConstantRange {
        stage_flags: PUSH_STAGES,
        offset: 0,
        size: push_size as u32,
    };
    let layout = create_pipeline_layout(device.raw(), &[global_set_layout], &[push_range])?;

    let mut config = PipelineConfig::default();
    customize(&mut config);
    config.render_pass = render_pass;
    config.layout = layout;

    match Pipeline::new(device.clone(), &shaders.vert, &shaders.frag, &config) {
        Ok(pipeline) => Ok((layout, pipeline)),
        Err(e) => {
            unsafe { device.raw().destroy_pipeline_layout(layout, None) };
            Err(e)
        }
    }
}
