// SPDX-License-Identifier: CEPL-1.0
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use lumen_core::EngineError;
use lumen_render::RenderTarget;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};

use crate::debug::{self, DebugMessenger};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn shared(&self) -> bool {
        self.is_complete() && self.graphics == self.present
    }
}

#[derive(Clone, Debug, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// What device selection knows about one physical device.
#[derive(Clone, Copy, Debug)]
pub struct DeviceCandidate {
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    pub swapchain_adequate: bool,
}

impl DeviceCandidate {
    /// 0 means unusable. Discrete GPUs, larger max textures and a shared
    /// graphics/present family score higher.
    pub fn score(&self) -> u32 {
        if !self.queue_families.is_complete()
            || !self.extensions_supported
            || !self.swapchain_adequate
        {
            return 0;
        }
        let mut score = 0;
        if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += 1000;
        }
        score += self.max_image_dimension_2d;
        if self.queue_families.shared() {
            score += 1000;
        }
        score
    }
}

pub struct Device {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    physical: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    device: ash::Device,
    swapchain_loader: swapchain::Device,

    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: vk::CommandPool,
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            if let Some(dbg) = self.debug.as_mut() {
                dbg.destroy();
            }
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

fn required_device_extensions() -> [&'static CStr; 1] {
    [swapchain::NAME]
}

unsafe fn create_instance(
    entry: &Entry,
    target: &dyn RenderTarget,
    app_name: &str,
    validation: bool,
) -> Result<Instance> {
    let app = CString::new(app_name).context("application name contains NUL")?;

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: c"Lumen".as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let display_raw = target.display_handle()?.as_raw();
    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    let layers = if validation {
        vec![debug::VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    // Chained so instance creation and destruction are covered too.
    let mut debug_ci = debug::messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    if validation {
        create_info = create_info.push_next(&mut debug_ci);
    }

    unsafe { entry.create_instance(&create_info, None) }.context("create_instance")
}

unsafe fn find_queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics.get_or_insert(i);
        }
        let present = unsafe {
            surface_loader
                .get_physical_device_surface_support(phys, i, surface)
                .unwrap_or(false)
        };
        if family.queue_count > 0 && present {
            // Prefer a family that can do both, so sharing stays EXCLUSIVE.
            if indices.present.is_none() || indices.graphics == Some(i) {
                indices.present = Some(i);
            }
        }
        if indices.shared() {
            break;
        }
    }
    indices
}

unsafe fn query_swapchain_support(
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<SwapchainSupport> {
    unsafe {
        Ok(SwapchainSupport {
            capabilities: surface_loader.get_physical_device_surface_capabilities(phys, surface)?,
            formats: surface_loader.get_physical_device_surface_formats(phys, surface)?,
            present_modes: surface_loader.get_physical_device_surface_present_modes(phys, surface)?,
        })
    }
}

unsafe fn check_device_extension_support(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    let available = match unsafe { instance.enumerate_device_extension_properties(phys) } {
        Ok(a) => a,
        Err(_) => return false,
    };
    required_device_extensions().iter().all(|req| {
        available
            .iter()
            .any(|e| e.extension_name_as_c_str().is_ok_and(|n| n == *req))
    })
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    info!("{} physical device(s)", devices.len());

    let mut best: Option<(u32, vk::PhysicalDevice, QueueFamilyIndices)> = None;
    for phys in devices {
        let props = unsafe { instance.get_physical_device_properties(phys) };
        let queue_families = unsafe { find_queue_families(instance, surface_loader, surface, phys) };
        let extensions_supported = unsafe { check_device_extension_support(instance, phys) };
        let swapchain_adequate = extensions_supported
            && unsafe { query_swapchain_support(surface_loader, surface, phys) }
                .map(|s| s.is_adequate())
                .unwrap_or(false);

        let score = DeviceCandidate {
            device_type: props.device_type,
            max_image_dimension_2d: props.limits.max_image_dimension2_d,
            queue_families,
            extensions_supported,
            swapchain_adequate,
        }
        .score();

        let name = props.device_name_as_c_str().unwrap_or(c"?").to_string_lossy();
        info!("  {} ({:?}) score {}", name, props.device_type, score);

        if score > 0 && best.map_or(true, |(s, _, _)| score > s) {
            best = Some((score, phys, queue_families));
        }
    }

    best.map(|(_, phys, q)| (phys, q))
        .ok_or_else(|| EngineError::NoSuitableGpu.into())
}

/// Runs its closure on drop unless disarmed. Guards declared later drop
/// first, so a chain of them unwinds a partial build in reverse.
struct Unwind<F: FnOnce()> {
    undo: Option<F>,
}

impl<F: FnOnce()> Unwind<F> {
    fn new(undo: F) -> Self {
        Self { undo: Some(undo) }
    }

    fn disarm(mut self) {
        self.undo = None;
    }
}

impl<F: FnOnce()> Drop for Unwind<F> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo();
        }
    }
}

impl Device {
    pub fn new(target: &dyn RenderTarget, app_name: &str) -> Result<Self> {
        let entry = Entry::linked();

        let validation = debug::validation_enabled() && debug::validation_layer_available(&entry);
        if debug::validation_enabled() && !validation {
            warn!("validation layer requested but not available");
        }

        unsafe {
            // Each guard undoes one creation step if a later step bails out.
            let instance = create_instance(&entry, target, app_name, validation)?;
            let instance_guard = Unwind::new({
                let instance = instance.clone();
                move || instance.destroy_instance(None)
            });

            let debug = if validation {
                Some(DebugMessenger::new(&entry, &instance)?)
            } else {
                None
            };
            let debug_guard = Unwind::new({
                let mut debug = debug.clone();
                move || {
                    if let Some(dbg) = debug.as_mut() {
                        dbg.destroy();
                    }
                }
            });

            let surface_loader = surface::Instance::new(&entry, &instance);
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                target.display_handle()?.as_raw(),
                target.window_handle()?.as_raw(),
                None,
            )
            .context("create_surface")?;
            let surface_guard = Unwind::new({
                let surface_loader = surface_loader.clone();
                move || surface_loader.destroy_surface(surface, None)
            });

            let (physical, queue_families) =
                pick_physical_device(&instance, &surface_loader, surface)?;
            let properties = instance.get_physical_device_properties(physical);
            let graphics = queue_families
                .graphics
                .ok_or(EngineError::MissingQueueFamily("graphics"))?;
            let present = queue_families
                .present
                .ok_or(EngineError::MissingQueueFamily("present"))?;

            let priorities = [1.0_f32];
            let unique: BTreeSet<u32> = [graphics, present].into_iter().collect();
            let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique
                .iter()
                .map(|&family| vk::DeviceQueueCreateInfo {
                    s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                    queue_family_index: family,
                    queue_count: 1,
                    p_queue_priorities: priorities.as_ptr(),
                    ..Default::default()
                })
                .collect();

            let supported = instance.get_physical_device_features(physical);
            let features = vk::PhysicalDeviceFeatures {
                sampler_anisotropy: supported.sampler_anisotropy,
                ..Default::default()
            };

            let device_exts: Vec<*const c_char> = required_device_extensions()
                .iter()
                .map(|e| e.as_ptr())
                .collect();
            let dinfo = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                queue_create_info_count: queue_infos.len() as u32,
                p_queue_create_infos: queue_infos.as_ptr(),
                enabled_extension_count: device_exts.len() as u32,
                pp_enabled_extension_names: device_exts.as_ptr(),
                p_enabled_features: &features,
                ..Default::default()
            };
            let device = instance
                .create_device(physical, &dinfo, None)
                .context("create_device")?;
            let device_guard = Unwind::new({
                let device = device.clone();
                move || device.destroy_device(None)
            });
            let graphics_queue = device.get_device_queue(graphics, 0);
            let present_queue = device.get_device_queue(present, 0);

            let pool_info = vk::CommandPoolCreateInfo {
                s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
                queue_family_index: graphics,
                flags: vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                ..Default::default()
            };
            let command_pool = device
                .create_command_pool(&pool_info, None)
                .context("create_command_pool")?;

            let swapchain_loader = swapchain::Device::new(&instance, &device);

            info!(
                "device: {} (graphics family {}, present family {})",
                properties
                    .device_name_as_c_str()
                    .unwrap_or(c"?")
                    .to_string_lossy(),
                graphics,
                present
            );

            // From here on Drop for Device owns the teardown.
            device_guard.disarm();
            surface_guard.disarm();
            debug_guard.disarm();
            instance_guard.disarm();

            Ok(Self {
                _entry: entry,
                instance,
                debug,
                surface_loader,
                surface,
                physical,
                properties,
                device,
                swapchain_loader,
                queue_families,
                graphics_queue,
                present_queue,
                command_pool,
            })
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn swapchain_support(&self) -> Result<SwapchainSupport> {
        unsafe { query_swapchain_support(&self.surface_loader, self.surface, self.physical) }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")
    }

    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        let mem = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical)
        };
        memory_type_index(&mem, type_filter, properties).ok_or_else(|| {
            EngineError::NoMemoryType {
                type_filter,
                properties: format!("{properties:?}"),
            }
            .into()
        })
    }

    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let props = unsafe {
                    self.instance
                        .get_physical_device_format_properties(self.physical, format)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| EngineError::UnsupportedFormat(format!("{candidates:?}")).into())
    }

    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buffer = self.device.create_buffer(&info, None).context("create_buffer")?;
            let req = self.device.get_buffer_memory_requirements(buffer);
            let alloc = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: self.find_memory_type(req.memory_type_bits, properties)?,
                ..Default::default()
            };
            let memory = self
                .device
                .allocate_memory(&alloc, None)
                .context("allocate_memory (buffer)")?;
            self.device.bind_buffer_memory(buffer, memory, 0)?;
            Ok((buffer, memory))
        }
    }

    pub fn create_image_with_info(
        &self,
        info: &vk::ImageCreateInfo,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Image, vk::DeviceMemory)> {
        unsafe {
            let image = self.device.create_image(info, None).context("create_image")?;
            let req = self.device.get_image_memory_requirements(image);
            let alloc = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: self.find_memory_type(req.memory_type_bits, properties)?,
                ..Default::default()
            };
            let memory = self
                .device
                .allocate_memory(&alloc, None)
                .context("allocate_memory (image)")?;
            self.device.bind_image_memory(image, memory, 0)?;
            Ok((image, memory))
        }
    }

    pub fn begin_single_time_commands(&self) -> Result<vk::CommandBuffer> {
        let alloc = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe {
            let cmd = self.device.allocate_command_buffers(&alloc)?[0];
            self.device.begin_command_buffer(cmd, &begin)?;
            Ok(cmd)
        }
    }

    /// Submits, blocks on the graphics queue, frees the buffer.
    pub fn end_single_time_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        unsafe {
            self.device.end_command_buffer(cmd)?;
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(&submit), vk::Fence::null())
                .context("queue_submit (single time)")?;
            self.device.queue_wait_idle(self.graphics_queue)?;
            self.device
                .free_command_buffers(self.command_pool, std::slice::from_ref(&cmd));
        }
        Ok(())
    }

    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> Result<()> {
        let cmd = self.begin_single_time_commands()?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(cmd, src, dst, std::slice::from_ref(&region))
        };
        self.end_single_time_commands(cmd)
    }
}

fn memory_type_index(
    mem: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..mem.memory_type_count).find(|&i| {
        (type_filter & (1 << i)) != 0
            && mem.memory_types[i as usize]
                .property_flags
                .contains(properties)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn unwind_guards_run_in_reverse_unless_disarmed() {
        let log = RefCell::new(Vec::new());
        {
            let _first = Unwind::new(|| log.borrow_mut().push("instance"));
            let _second = Unwind::new(|| log.borrow_mut().push("surface"));
        }
        assert_eq!(*log.borrow(), vec!["surface", "instance"]);

        log.borrow_mut().clear();
        {
            let kept = Unwind::new(|| log.borrow_mut().push("device"));
            kept.disarm();
        }
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn early_return_unwinds_what_was_built() {
        fn build(log: &RefCell<Vec<&'static str>>, fail_at_device: bool) -> Result<()> {
            let instance = Unwind::new(|| log.borrow_mut().push("instance"));
            let surface = Unwind::new(|| log.borrow_mut().push("surface"));
            if fail_at_device {
                anyhow::bail!("create_device");
            }
            surface.disarm();
            instance.disarm();
            Ok(())
        }

        let log = RefCell::new(Vec::new());
        assert!(build(&log, true).is_err());
        assert_eq!(*log.borrow(), vec!["surface", "instance"]);

        log.borrow_mut().clear();
        assert!(build(&log, false).is_ok());
        assert!(log.borrow().is_empty());
    }

    fn candidate() -> DeviceCandidate {
        DeviceCandidate {
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            max_image_dimension_2d: 8192,
            queue_families: QueueFamilyIndices {
                graphics: Some(0),
                present: Some(1),
            },
            extensions_supported: true,
            swapchain_adequate: true,
        }
    }

    #[test]
    fn incomplete_devices_score_zero() {
        let mut c = candidate();
        c.queue_families.present = None;
        assert_eq!(c.score(), 0);

        let mut c = candidate();
        c.extensions_supported = false;
        assert_eq!(c.score(), 0);

        let mut c = candidate();
        c.swapchain_adequate = false;
        assert_eq!(c.score(), 0);
    }

    #[test]
    fn discrete_and_shared_family_bonuses() {
        let base = candidate();
        assert_eq!(base.score(), 8192);

        let mut discrete = base;
        discrete.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        assert_eq!(discrete.score(), 9192);

        let mut shared = discrete;
        shared.queue_families.present = Some(0);
        assert_eq!(shared.score(), 10192);
    }

    #[test]
    fn swapchain_support_needs_format_and_mode() {
        let mut s = SwapchainSupport::default();
        assert!(!s.is_adequate());
        s.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!s.is_adequate());
        s.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(s.is_adequate());
    }

    #[test]
    fn memory_type_respects_filter_and_flags() {
        let mut mem = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        mem.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        mem.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        mem.memory_types[2].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;

        let host = vk::MemoryPropertyFlags::HOST_VISIBLE;
        assert_eq!(memory_type_index(&mem, 0b111, host), Some(1));
        assert_eq!(memory_type_index(&mem, 0b100, host), Some(2));
        assert_eq!(
            memory_type_index(&mem, 0b001, host),
            None,
            "filter excludes the only host-visible types"
        );
    }
}
