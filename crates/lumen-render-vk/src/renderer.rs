// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use lumen_core::EngineError;
use lumen_render::{FrameSlots, RenderSize, RenderTarget, MAX_FRAMES_IN_FLIGHT};
use tracing::{debug, info};

use crate::device::Device;
use crate::swapchain::{AcquireOutcome, PresentOutcome, SwapChain, SwapchainPreferences};

/// Drives the swapchain frame loop and owns one primary command buffer per
/// frame in flight.
pub struct Renderer {
    device: Rc<Device>,
    swapchain: SwapChain,
    prefs: SwapchainPreferences,
    command_buffers: Vec<vk::CommandBuffer>,
    clear_color: [f32; 4],

    frames: FrameSlots,
    current_image_index: u32,
    is_frame_started: bool,
    acquire_suboptimal: bool,
    // Set when a rebuild was deferred because the window had no area.
    pending_recreate: bool,
}

impl Renderer {
    pub fn new(
        device: Rc<Device>,
        target: &dyn RenderTarget,
        prefs: SwapchainPreferences,
    ) -> Result<Self> {
        let swapchain = SwapChain::new(device.clone(), to_extent(target.extent()), None, prefs)?;
        let command_buffers = allocate_command_buffers(&device)?;
        Ok(Self {
            device,
            swapchain,
            prefs,
            command_buffers,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            frames: FrameSlots::new(),
            current_image_index: 0,
            is_frame_started: false,
            acquire_suboptimal: false,
            pending_recreate: false,
        })
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn swapchain_render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.extent_aspect_ratio()
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.is_frame_started
    }

    pub fn frame_index(&self) -> usize {
        debug_assert!(self.is_frame_started, "no frame in progress");
        self.frames.current()
    }

    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        debug_assert!(self.is_frame_started, "no frame in progress");
        self.command_buffers[self.frames.current()]
    }

    /// Returns the command buffer to record into, or `None` when this frame
    /// has to be skipped (minimized window, swapchain just rebuilt).
    pub fn begin_frame(&mut self, target: &mut dyn RenderTarget) -> Result<Option<vk::CommandBuffer>> {
        debug_assert!(!self.is_frame_started, "begin_frame while a frame is in progress");

        if target.extent().is_zero() {
            return Ok(None);
        }
        if self.pending_recreate {
            self.recreate_swapchain(target)?;
            if self.pending_recreate {
                return Ok(None);
            }
        }

        match self.swapchain.acquire_next_image()? {
            AcquireOutcome::OutOfDate => {
                self.recreate_swapchain(target)?;
                return Ok(None);
            }
            // Suboptimal still presents; end_frame rebuilds afterwards.
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => {
                self.current_image_index = image_index;
                self.acquire_suboptimal = suboptimal;
            }
        }

        self.is_frame_started = true;
        let cmd = self.current_command_buffer();
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe { self.device.raw().begin_command_buffer(cmd, &begin) }
            .context("begin_command_buffer")?;
        Ok(Some(cmd))
    }

    pub fn end_frame(&mut self, target: &mut dyn RenderTarget) -> Result<()> {
        debug_assert!(self.is_frame_started, "end_frame without begin_frame");
        let cmd = self.current_command_buffer();
        self.is_frame_started = false;
        self.frames.advance();

        unsafe { self.device.raw().end_command_buffer(cmd) }.context("end_command_buffer")?;
        let outcome = self
            .swapchain
            .submit_command_buffers(cmd, self.current_image_index)?;

        let resized = target.was_resized();
        if should_recreate(self.acquire_suboptimal, outcome, resized) {
            debug!(
                "present {:?}, acquire suboptimal {}, resized {}",
                outcome, self.acquire_suboptimal, resized
            );
            self.acquire_suboptimal = false;
            target.reset_resized_flag();
            self.recreate_swapchain(target)?;
        }
        Ok(())
    }

    pub fn begin_swapchain_render_pass(&self, cmd: vk::CommandBuffer) {
        debug_assert!(self.is_frame_started, "render pass outside a frame");
        debug_assert_eq!(cmd, self.current_command_buffer());

        let extent = self.swapchain.extent();
        let clear_values = clear_values(self.clear_color);
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.swapchain.render_pass(),
            framebuffer: self.swapchain.framebuffer(self.current_image_index as usize),
            render_area: full_scissor(extent),
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        let d = self.device.raw();
        unsafe {
            d.cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE);
            d.cmd_set_viewport(cmd, 0, &[full_viewport(extent)]);
            d.cmd_set_scissor(cmd, 0, &[full_scissor(extent)]);
        }
    }

    pub fn end_swapchain_render_pass(&self, cmd: vk::CommandBuffer) {
        debug_assert!(self.is_frame_started, "render pass outside a frame");
        unsafe { self.device.raw().cmd_end_render_pass(cmd) };
    }

    /// Rebuilds the swapchain for the target's current size. Deferred while
    /// the window has no area; the next `begin_frame` with a real extent
    /// picks it up.
    pub fn recreate_swapchain(&mut self, target: &dyn RenderTarget) -> Result<()> {
        let size = target.extent();
        if size.is_zero() {
            self.pending_recreate = true;
            return Ok(());
        }

        self.device.wait_idle()?;
        let new = SwapChain::new(
            self.device.clone(),
            to_extent(size),
            Some(&self.swapchain),
            self.prefs,
        )?;
        if !new.compare_swap_formats(&self.swapchain) {
            return Err(EngineError::SwapchainFormatChanged.into());
        }
        // The retired chain is destroyed here, after its successor exists.
        drop(std::mem::replace(&mut self.swapchain, new));
        self.pending_recreate = false;

        let e = self.swapchain.extent();
        info!("swapchain recreated at {}x{}", e.width, e.height);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        unsafe {
            let d = self.device.raw();
            d.device_wait_idle().ok();
            d.free_command_buffers(self.device.command_pool(), &self.command_buffers);
        }
    }
}

/// Rebuild after presenting when either swapchain call flagged it or the
/// window changed size.
fn should_recreate(acquire_suboptimal: bool, outcome: PresentOutcome, resized: bool) -> bool {
    acquire_suboptimal || outcome.needs_recreate() || resized
}

fn allocate_command_buffers(device: &Device) -> Result<Vec<vk::CommandBuffer>> {
    let info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: device.command_pool(),
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: MAX_FRAMES_IN_FLIGHT as u32,
        ..Default::default()
    };
    unsafe { device.raw().allocate_command_buffers(&info) }.context("allocate_command_buffers")
}

fn to_extent(size: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

/// Color first, then depth cleared to the far plane.
fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ]
}

fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suboptimal_acquire_forces_rebuild_after_clean_present() {
        assert!(should_recreate(true, PresentOutcome::Presented, false));
    }

    #[test]
    fn rebuild_decision_covers_every_trigger() {
        assert!(!should_recreate(false, PresentOutcome::Presented, false));
        assert!(should_recreate(false, PresentOutcome::Suboptimal, false));
        assert!(should_recreate(false, PresentOutcome::OutOfDate, false));
        assert!(should_recreate(false, PresentOutcome::Presented, true));
        assert!(should_recreate(true, PresentOutcome::OutOfDate, true));
    }

    #[test]
    fn depth_clears_to_far_plane() {
        let values = clear_values([0.1, 0.2, 0.3, 1.0]);
        unsafe {
            assert_eq!(values[0].color.float32, [0.1, 0.2, 0.3, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
            assert_eq!(values[1].depth_stencil.stencil, 0);
        }
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let vp = full_viewport(extent);
        assert_eq!((vp.x, vp.y, vp.width, vp.height), (0.0, 0.0, 1280.0, 720.0));
        assert_eq!((vp.min_depth, vp.max_depth), (0.0, 1.0));
        let sc = full_scissor(extent);
        assert_eq!((sc.offset.x, sc.offset.y), (0, 0));
        assert_eq!(sc.extent, extent);
    }

    #[test]
    fn render_size_maps_to_extent() {
        let e = to_extent(RenderSize {
            width: 800,
            height: 600,
        });
        assert_eq!((e.width, e.height), (800, 600));
    }
}
