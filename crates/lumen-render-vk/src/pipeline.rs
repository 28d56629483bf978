// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use lumen_core::EngineError;
use tracing::debug;

use crate::device::Device;
use crate::model::Vertex;

const ENTRY_POINT: &CStr = c"main";

const RGBA: vk::ColorComponentFlags = vk::ColorComponentFlags::from_raw(
    vk::ColorComponentFlags::R.as_raw()
        | vk::ColorComponentFlags::G.as_raw()
        | vk::ColorComponentFlags::B.as_raw()
        | vk::ColorComponentFlags::A.as_raw(),
);

/// SPIR-V compiled into the binary by build.rs.
pub mod embedded {
    pub const SIMPLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/simple_shader.vert.spv"));
    pub const SIMPLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/simple_shader.frag.spv"));
    pub const POINT_LIGHT_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/point_light.vert.spv"));
    pub const POINT_LIGHT_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/point_light.frag.spv"));
}

#[derive(Clone, Debug)]
pub enum ShaderSource {
    Embedded(&'static [u8]),
    File(PathBuf),
}

impl ShaderSource {
    /// `<dir>/<name>` when an override directory is set, else the built-in blob.
    pub fn resolve(dir: Option<&Path>, name: &str, builtin: &'static [u8]) -> Self {
        match dir {
            Some(d) => ShaderSource::File(d.join(name)),
            None => ShaderSource::Embedded(builtin),
        }
    }

    fn read(&self) -> Result<Vec<u32>> {
        match self {
            ShaderSource::Embedded(bytes) => {
                read_spv(&mut Cursor::new(*bytes)).context("embedded SPIR-V")
            }
            ShaderSource::File(path) => {
                let mut f = File::open(path)
                    .with_context(|| format!("opening shader {}", path.display()))?;
                read_spv(&mut f).with_context(|| format!("reading SPIR-V {}", path.display()))
            }
        }
    }
}

/// Fixed-function state for one graphics pipeline.
#[derive(Clone)]
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    pub rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    pub multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binding_descriptions: Vertex::BINDINGS_DESC.to_vec(),
            attribute_descriptions: Vertex::ATTRIBUTES_DESC.to_vec(),
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo {
                s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
                topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                primitive_restart_enable: vk::FALSE,
                ..Default::default()
            },
            rasterization: vk::PipelineRasterizationStateCreateInfo {
                s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
                depth_clamp_enable: vk::FALSE,
                rasterizer_discard_enable: vk::FALSE,
                polygon_mode: vk::PolygonMode::FILL,
                line_width: 1.0,
                cull_mode: vk::CullModeFlags::NONE,
                front_face: vk::FrontFace::CLOCKWISE,
                depth_bias_enable: vk::FALSE,
                ..Default::default()
            },
            multisample: vk::PipelineMultisampleStateCreateInfo {
                s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
                sample_shading_enable: vk::FALSE,
                rasterization_samples: vk::SampleCountFlags::TYPE_1,
                min_sample_shading: 1.0,
                ..Default::default()
            },
            color_blend_attachment: vk::PipelineColorBlendAttachmentState {
                color_write_mask: RGBA,
                blend_enable: vk::FALSE,
                src_color_blend_factor: vk::BlendFactor::ONE,
                dst_color_blend_factor: vk::BlendFactor::ZERO,
                color_blend_op: vk::BlendOp::ADD,
                src_alpha_blend_factor: vk::BlendFactor::ONE,
                dst_alpha_blend_factor: vk::BlendFactor::ZERO,
                alpha_blend_op: vk::BlendOp::ADD,
            },
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo {
                s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
                depth_test_enable: vk::TRUE,
                depth_write_enable: vk::TRUE,
                depth_compare_op: vk::CompareOp::LESS,
                depth_bounds_test_enable: vk::FALSE,
                min_depth_bounds: 0.0,
                max_depth_bounds: 1.0,
                stencil_test_enable: vk::FALSE,
                ..Default::default()
            },
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            render_pass: vk::RenderPass::null(),
            layout: vk::PipelineLayout::null(),
            subpass: 0,
        }
    }
}

impl PipelineConfig {
    pub fn enable_alpha_blending(&mut self) -> &mut Self {
        let a = &mut self.color_blend_attachment;
        a.blend_enable = vk::TRUE;
        a.color_write_mask = RGBA;
        a.src_color_blend_factor = vk::BlendFactor::SRC_ALPHA;
        a.dst_color_blend_factor = vk::BlendFactor::ONE_MINUS_SRC_ALPHA;
        a.color_blend_op = vk::BlendOp::ADD;
        a.src_alpha_blend_factor = vk::BlendFactor::ONE;
        a.dst_alpha_blend_factor = vk::BlendFactor::ZERO;
        a.alpha_blend_op = vk::BlendOp::ADD;
        self
    }

    /// For pipelines that synthesise vertices in the shader.
    pub fn clear_vertex_input(&mut self) -> &mut Self {
        self.binding_descriptions.clear();
        self.attribute_descriptions.clear();
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.layout == vk::PipelineLayout::null() {
            return Err(EngineError::InvalidPipelineConfig("no pipeline layout"));
        }
        if self.render_pass == vk::RenderPass::null() {
            return Err(EngineError::InvalidPipelineConfig("no render pass"));
        }
        Ok(())
    }
}

pub fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_ranges: &[vk::PushConstantRange],
) -> Result<vk::PipelineLayout> {
    let info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        set_layout_count: set_layouts.len() as u32,
        p_set_layouts: set_layouts.as_ptr(),
        push_constant_range_count: push_constant_ranges.len() as u32,
        p_push_constant_ranges: push_constant_ranges.as_ptr(),
        ..Default::default()
    };
    unsafe { device.create_pipeline_layout(&info, None) }.context("create_pipeline_layout")
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        code_size: code.len() * 4,
        p_code: code.as_ptr(),
        ..Default::default()
    };
    unsafe { device.create_shader_module(&info, None) }.context("create_shader_module")
}

pub struct Pipeline {
    device: Rc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    pub fn new(
        device: Rc<Device>,
        vert: &ShaderSource,
        frag: &ShaderSource,
        config: &PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let vert_code = vert.read()?;
        let frag_code = frag.read()?;
        debug!(
            "pipeline: vert {} words, frag {} words",
            vert_code.len(),
            frag_code.len()
        );

        let d = device.raw();
        let vs = unsafe { create_shader_module(d, &vert_code)? };
        let fs = match unsafe { create_shader_module(d, &frag_code) } {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { d.destroy_shader_module(vs, None) };
                return Err(e);
            }
        };

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: config.binding_descriptions.len() as u32,
            p_vertex_binding_descriptions: config.binding_descriptions.as_ptr(),
            vertex_attribute_description_count: config.attribute_descriptions.len() as u32,
            p_vertex_attribute_descriptions: config.attribute_descriptions.as_ptr(),
            ..Default::default()
        };
        // Viewport and scissor come from dynamic state at record time.
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op_enable: vk::FALSE,
            logic_op: vk::LogicOp::COPY,
            attachment_count: 1,
            p_attachments: &config.color_blend_attachment,
            ..Default::default()
        };
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: config.dynamic_states.len() as u32,
            p_dynamic_states: config.dynamic_states.as_ptr(),
            ..Default::default()
        };

        let info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &config.input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &config.rasterization,
            p_multisample_state: &config.multisample,
            p_depth_stencil_state: &config.depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: config.layout,
            render_pass: config.render_pass,
            subpass: config.subpass,
            base_pipeline_index: -1,
            base_pipeline_handle: vk::Pipeline::null(),
            ..Default::default()
        };

        let created = unsafe {
            d.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&info), None)
        };
        unsafe {
            d.destroy_shader_module(vs, None);
            d.destroy_shader_module(fs, None);
        }
        let pipeline = match created {
            Ok(p) => p[0],
            Err((_, err)) => return Err(anyhow!("create_graphics_pipelines failed: {:?}", err)),
        };

        Ok(Self { device, pipeline })
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device
                .raw()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline)
        };
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.raw().destroy_pipeline(self.pipeline, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn defaults_match_forward_opaque_pass() {
        let c = PipelineConfig::default();
        assert_eq!(c.input_assembly.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(c.rasterization.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(c.depth_stencil.depth_compare_op, vk::CompareOp::LESS);
        assert_eq!(c.depth_stencil.depth_write_enable, vk::TRUE);
        assert_eq!(c.color_blend_attachment.blend_enable, vk::FALSE);
        assert_eq!(
            c.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(c.binding_descriptions.len(), 1);
        assert_eq!(c.attribute_descriptions.len(), 4);
    }

    #[test]
    fn alpha_blending_and_empty_vertex_input() {
        let mut c = PipelineConfig::default();
        c.enable_alpha_blending().clear_vertex_input();
        assert_eq!(c.color_blend_attachment.blend_enable, vk::TRUE);
        assert_eq!(
            c.color_blend_attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert!(c.binding_descriptions.is_empty());
        assert!(c.attribute_descriptions.is_empty());
    }

    #[test]
    fn config_without_layout_or_pass_is_rejected() {
        let mut c = PipelineConfig::default();
        assert!(matches!(
            c.validate(),
            Err(EngineError::InvalidPipelineConfig("no pipeline layout"))
        ));
        c.layout = vk::PipelineLayout::from_raw(1);
        assert!(matches!(
            c.validate(),
            Err(EngineError::InvalidPipelineConfig("no render pass"))
        ));
        c.render_pass = vk::RenderPass::from_raw(1);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn shader_dir_override_points_at_files() {
        let src = ShaderSource::resolve(Some(Path::new("/tmp/spv")), "a.vert.spv", &[]);
        assert!(matches!(src, ShaderSource::File(p) if p == Path::new("/tmp/spv/a.vert.spv")));
        let src = ShaderSource::resolve(None, "a.vert.spv", embedded::SIMPLE_VERT);
        assert!(matches!(src, ShaderSource::Embedded(_)));
    }

    #[test]
    fn embedded_spirv_parses() {
        for blob in [
            embedded::SIMPLE_VERT,
            embedded::SIMPLE_FRAG,
            embedded::POINT_LIGHT_VERT,
            embedded::POINT_LIGHT_FRAG,
        ] {
            let words = ShaderSource::Embedded(blob).read().unwrap();
            assert_eq!(words[0], 0x0723_0203, "SPIR-V magic");
        }
    }
}
