// SPDX-License-Identifier: CEPL-1.0
//! Presentable image chain, its depth buffers and render pass, and the
//! per-frame sync objects that pace CPU recording against the GPU.
//!
//! Frame protocol, per slot `current`:
//! 1. wait `in_flight[current]`, acquire an image signalling
//!    `image_available[current]`;
//! 2. on submit, wait on whatever fence last used that image, hand the image
//!    to `in_flight[current]`, reset the fence and submit;
//! 3. present after `render_finished[current]`, then advance the slot.

use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use lumen_core::EngineError;
use lumen_render::{FrameSlots, ImagesInFlight, MAX_FRAMES_IN_FLIGHT};
use tracing::{debug, info};

use crate::device::{Device, QueueFamilyIndices};

pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
        .ok_or_else(|| EngineError::Swapchain("surface reports no formats".into()).into())
}

/// MAILBOX when wanted and offered, else FIFO (always available).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], prefer_mailbox: bool) -> vk::PresentModeKHR {
    if prefer_mailbox && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// `min + 1`, capped by `max` unless `max == 0` (unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// CONCURRENT across both families when they differ, so no ownership
/// transfers are needed.
pub fn choose_sharing(families: QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    match (families.graphics, families.present) {
        (Some(g), Some(p)) if g != p => (vk::SharingMode::CONCURRENT, vec![g, p]),
        _ => (vk::SharingMode::EXCLUSIVE, Vec::new()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreate(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainPreferences {
    pub prefer_mailbox: bool,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        Self { prefer_mailbox: true }
    }
}

struct DepthAttachment {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

struct FrameSync {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

pub struct SwapChain {
    device: Rc<Device>,
    swapchain: vk::SwapchainKHR,
    image_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,

    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth: Vec<DepthAttachment>,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,

    sync: Vec<FrameSync>,
    images_in_flight: ImagesInFlight<vk::Fence>,
    frames: FrameSlots,
}

impl SwapChain {
    /// Builds a chain for `window_extent`. Passing the previous chain lets
    /// the presentation engine recycle its images; the caller drops it
    /// only after this returns.
    pub fn new(
        device: Rc<Device>,
        window_extent: vk::Extent2D,
        previous: Option<&SwapChain>,
        prefs: SwapchainPreferences,
    ) -> Result<Self> {
        // Null handles are fine to destroy, so a failure halfway through
        // unwinds through Drop.
        let mut sc = SwapChain {
            device,
            swapchain: vk::SwapchainKHR::null(),
            image_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            image_views: Vec::new(),
            depth: Vec::new(),
            framebuffers: Vec::new(),
            render_pass: vk::RenderPass::null(),
            sync: Vec::new(),
            images_in_flight: ImagesInFlight::new(0),
            frames: FrameSlots::new(),
        };
        let old = previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain);

        sc.create_swapchain(window_extent, old, prefs)?;
        sc.create_image_views()?;
        sc.create_render_pass()?;
        sc.create_depth_resources()?;
        sc.create_framebuffers()?;
        sc.create_sync_objects()?;
        Ok(sc)
    }

    fn create_swapchain(
        &mut self,
        window_extent: vk::Extent2D,
        old: vk::SwapchainKHR,
        prefs: SwapchainPreferences,
    ) -> Result<()> {
        let support = self.device.swapchain_support()?;
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, prefs.prefer_mailbox);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = choose_image_count(&support.capabilities);
        let (sharing_mode, family_indices) = choose_sharing(self.device.queue_families());

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.device.surface(),
            min_image_count: image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: family_indices.as_ptr(),
            pre_transform: support.capabilities.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };

        let loader = self.device.swapchain_loader();
        unsafe {
            self.swapchain = loader
                .create_swapchain(&info, None)
                .context("create_swapchain")?;
            // The driver may hand back more images than requested.
            self.images = loader.get_swapchain_images(self.swapchain)?;
        }
        self.image_format = surface_format.format;
        self.extent = extent;

        info!(
            "swapchain {}x{}, {} images (asked {}), {:?}, {:?}, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            image_count,
            surface_format.format,
            present_mode,
            sharing_mode
        );
        Ok(())
    }

    fn create_image_views(&mut self) -> Result<()> {
        for &image in &self.images {
            let view = create_view(
                self.device.raw(),
                image,
                self.image_format,
                vk::ImageAspectFlags::COLOR,
            )?;
            self.image_views.push(view);
        }
        Ok(())
    }

    fn create_render_pass(&mut self) -> Result<()> {
        self.depth_format = self.device.find_supported_format(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let attachments = [
            vk::AttachmentDescription {
                format: self.image_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            vk::AttachmentDescription {
                format: self.depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            p_depth_stencil_attachment: &depth_ref,
            ..Default::default()
        };

        // Rendering into the image may not start before the acquire
        // semaphore has been waited on at these stages.
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: stages,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: stages,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ..Default::default()
        };

        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        self.render_pass = unsafe { self.device.raw().create_render_pass(&info, None) }
            .context("create_render_pass")?;
        Ok(())
    }

    fn create_depth_resources(&mut self) -> Result<()> {
        for _ in 0..self.images.len() {
            let info = vk::ImageCreateInfo {
                s_type: vk::StructureType::IMAGE_CREATE_INFO,
                image_type: vk::ImageType::TYPE_2D,
                format: self.depth_format,
                extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            };
            let (image, memory) = self
                .device
                .create_image_with_info(&info, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
            // Track before the view so a failing view still frees the image.
            self.depth.push(DepthAttachment {
                image,
                memory,
                view: vk::ImageView::null(),
            });
            let view = create_view(
                self.device.raw(),
                image,
                self.depth_format,
                vk::ImageAspectFlags::DEPTH,
            )?;
            if let Some(last) = self.depth.last_mut() {
                last.view = view;
            }
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        for (color, depth) in self.image_views.iter().zip(&self.depth) {
            let attachments = [*color, depth.view];
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { self.device.raw().create_framebuffer(&info, None) }
                .context("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    fn create_sync_objects(&mut self) -> Result<()> {
        let sem_ci = vk::SemaphoreCreateInfo::default();
        // Signaled so the first wait of each slot returns immediately.
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let d = self.device.raw();
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            unsafe {
                let image_available = d.create_semaphore(&sem_ci, None)?;
                let render_finished = match d.create_semaphore(&sem_ci, None) {
                    Ok(s) => s,
                    Err(e) => {
                        d.destroy_semaphore(image_available, None);
                        return Err(e).context("create_semaphore");
                    }
                };
                let in_flight = match d.create_fence(&fence_ci, None) {
                    Ok(f) => f,
                    Err(e) => {
                        d.destroy_semaphore(image_available, None);
                        d.destroy_semaphore(render_finished, None);
                        return Err(e).context("create_fence");
                    }
                };
                self.sync.push(FrameSync {
                    image_available,
                    render_finished,
                    in_flight,
                });
            }
        }
        self.images_in_flight = ImagesInFlight::new(self.images.len());
        Ok(())
    }

    /// Blocks on the current slot's fence, then asks for the next image.
    pub fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
        let slot = &self.sync[self.frames.current()];
        unsafe {
            self.device
                .raw()
                .wait_for_fences(std::slice::from_ref(&slot.in_flight), true, u64::MAX)
                .context("wait_for_fences (frame slot)")?;

            match self.device.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                slot.image_available,
                vk::Fence::null(),
            ) {
                Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                    image_index,
                    suboptimal,
                }),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
                Err(e) => Err(e).context("acquire_next_image"),
            }
        }
    }

    /// Submits `cmd` for `image_index`, presents it and advances the slot.
    pub fn submit_command_buffers(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<PresentOutcome> {
        let d = self.device.raw();
        let slot = &self.sync[self.frames.current()];

        if let Some(previous) = self.images_in_flight.claim(image_index as usize, slot.in_flight) {
            unsafe { d.wait_for_fences(std::slice::from_ref(&previous), true, u64::MAX) }
                .context("wait_for_fences (image in flight)")?;
        }

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &slot.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &slot.render_finished,
            ..Default::default()
        };

        unsafe {
            // Only reset right before the submit that re-signals it.
            d.reset_fences(std::slice::from_ref(&slot.in_flight))?;
            d.queue_submit(
                self.device.graphics_queue(),
                std::slice::from_ref(&submit),
                slot.in_flight,
            )
            .context("queue_submit")?;
        }

        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &slot.render_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let result = unsafe {
            self.device
                .swapchain_loader()
                .queue_present(self.device.present_queue(), &present)
        };
        self.frames.advance();

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(e).context("queue_present"),
        }
    }

    /// Same color and depth formats, so render passes and pipelines built
    /// against `other` stay compatible.
    pub fn compare_swap_formats(&self, other: &SwapChain) -> bool {
        self.image_format == other.image_format && self.depth_format == other.depth_format
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn extent_aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }

    pub fn current_frame(&self) -> usize {
        self.frames.current()
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    unsafe { device.create_image_view(&info, None) }.context("create_image_view")
}

impl Drop for SwapChain {
    fn drop(&mut self) {
        let d = self.device.raw();
        unsafe {
            d.device_wait_idle().ok();

            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            for &iv in &self.image_views {
                d.destroy_image_view(iv, None);
            }
            for depth in &self.depth {
                d.destroy_image_view(depth.view, None);
                d.destroy_image(depth.image, None);
                d.free_memory(depth.memory, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            self.device
                .swapchain_loader()
                .destroy_swapchain(self.swapchain, None);

            for s in &self.sync {
                d.destroy_semaphore(s.render_finished, None);
                d.destroy_semaphore(s.image_available, None);
                d.destroy_fence(s.in_flight, None);
            }
        }
        debug!("swapchain destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn prefers_bgra_srgb_nonlinear() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn mailbox_when_available_and_wanted() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn fifo_when_mailbox_missing() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[], true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn defined_current_extent_wins() {
        let c = caps((1024, 768), (1, 1), (4096, 4096));
        let e = choose_extent(&c, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((e.width, e.height), (1024, 768));
    }

    #[test]
    fn sentinel_extent_clamps_window_size() {
        let c = caps((u32::MAX, u32::MAX), (200, 100), (1920, 1080));
        let e = choose_extent(&c, vk::Extent2D { width: 4000, height: 50 });
        assert_eq!((e.width, e.height), (1920, 100));
        let e = choose_extent(&c, vk::Extent2D { width: 800, height: 600 });
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn image_count_is_min_plus_one_capped() {
        let mut c = caps((1, 1), (1, 1), (1, 1));
        c.min_image_count = 2;
        c.max_image_count = 0;
        assert_eq!(choose_image_count(&c), 3, "0 means no upper bound");
        c.max_image_count = 8;
        assert_eq!(choose_image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(choose_image_count(&c), 2);
    }

    #[test]
    fn sharing_mode_follows_queue_families() {
        let same = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        assert_eq!(choose_sharing(same), (vk::SharingMode::EXCLUSIVE, vec![]));

        let split = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(2),
        };
        assert_eq!(choose_sharing(split), (vk::SharingMode::CONCURRENT, vec![0, 2]));
    }

    #[test]
    fn only_clean_presents_skip_recreation() {
        assert!(!PresentOutcome::Presented.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }
}
