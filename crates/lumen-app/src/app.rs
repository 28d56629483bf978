// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::Vec3;
use lumen_math::{Camera, KeyboardMovementController, TransformComponent};
use lumen_platform::winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};
use lumen_platform::{KeyState, Window};
use lumen_render::MAX_FRAMES_IN_FLIGHT;
use lumen_render_vk::{
    vk, Buffer, DescriptorPool, DescriptorSetLayout, DescriptorWriter, Device, FrameInfo,
    GameObjectMap, GlobalUbo, PointLightSystem, Renderer, SimpleRenderSystem,
    SwapchainPreferences,
};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::scene::build_scene;

/// Longest step fed to the controller, so a stall (debugger, window drag)
/// does not teleport the camera.
pub const MAX_FRAME_TIME: f32 = 0.25;

/// Everything that only exists while there is a window. Fields drop top to
/// bottom: GPU objects first, the device after its last user, the window
/// (which backs the surface) last.
struct Gpu {
    point_light_system: PointLightSystem,
    simple_system: SimpleRenderSystem,
    global_sets: Vec<vk::DescriptorSet>,
    ubo_buffers: Vec<Buffer>,
    global_set_layout: DescriptorSetLayout,
    global_pool: DescriptorPool,
    game_objects: GameObjectMap,
    renderer: Renderer,
    device: Rc<Device>,
    window: Window,
}

impl Gpu {
    fn new(window: Window, config: &AppConfig) -> Result<Self> {
        let device = Rc::new(Device::new(&window, &config.window.title)?);
        let mut renderer = Renderer::new(
            device.clone(),
            &window,
            SwapchainPreferences {
                prefer_mailbox: config.render.prefer_mailbox,
            },
        )?;
        renderer.set_clear_color(config.render.clear_color);

        let global_pool = DescriptorPool::builder(device.clone())
            .set_max_sets(MAX_FRAMES_IN_FLIGHT as u32)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, MAX_FRAMES_IN_FLIGHT as u32)
            .build()?;

        let min_align = device.properties().limits.min_uniform_buffer_offset_alignment;
        let ubo_buffers = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                let mut buffer = Buffer::new(
                    device.clone(),
                    size_of::<GlobalUbo>() as vk::DeviceSize,
                    1,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE,
                    min_align,
                )?;
                buffer.map_whole()?;
                Ok(buffer)
            })
            .collect::<Result<Vec<_>>>()?;

        let global_set_layout = DescriptorSetLayout::builder(device.clone())
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::ALL_GRAPHICS,
                1,
            )
            .build()?;

        let global_sets = ubo_buffers
            .iter()
            .map(|buffer| {
                DescriptorWriter::new(&global_set_layout, &global_pool)
                    .write_buffer(0, buffer.descriptor_info(vk::WHOLE_SIZE, 0))
                    .build()
            })
            .collect::<Result<Vec<_>>>()
            .context("allocating global descriptor sets")?;

        let shader_dir = config.render.shader_dir.as_deref();
        let simple_system = SimpleRenderSystem::new(
            device.clone(),
            renderer.swapchain_render_pass(),
            global_set_layout.raw(),
            shader_dir,
        )?;
        let point_light_system = PointLightSystem::new(
            device.clone(),
            renderer.swapchain_render_pass(),
            global_set_layout.raw(),
            shader_dir,
        )?;

        let game_objects = build_scene(&device, &config.scene)?;

        Ok(Self {
            point_light_system,
            simple_system,
            global_sets,
            ubo_buffers,
            global_set_layout,
            global_pool,
            game_objects,
            renderer,
            device,
            window,
        })
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("wait_idle on shutdown: {e:#}");
        }
    }
}

pub struct FirstApp {
    config: AppConfig,
    gpu: Option<Gpu>,
    keys: KeyState,
    controller: KeyboardMovementController,
    viewer: TransformComponent,
    camera: Camera,
    last_frame: Instant,

    frames: u32,
    last_fps_instant: Instant,
    error: Option<anyhow::Error>,
}

impl FirstApp {
    pub fn new(config: AppConfig) -> Self {
        let mut camera = Camera::default();
        camera.set_view_target(
            Vec3::new(-1.0, -2.0, 2.0),
            Vec3::new(0.0, 0.0, 2.5),
            Camera::DEFAULT_UP,
        );
        let mut viewer = TransformComponent::default();
        viewer.translation.z = -2.5;

        let now = Instant::now();
        Self {
            config,
            gpu: None,
            keys: KeyState::default(),
            controller: KeyboardMovementController::default(),
            viewer,
            camera,
            last_frame: now,
            frames: 0,
            last_fps_instant: now,
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: anyhow::Error) {
        error!("{e:#}");
        self.error.get_or_insert(e);
        self.gpu = None;
        event_loop.exit();
    }

    fn draw_frame(&mut self) -> Result<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };

        let now = Instant::now();
        let frame_time = now
            .duration_since(self.last_frame)
            .as_secs_f32()
            .min(MAX_FRAME_TIME);
        self.last_frame = now;

        self.controller
            .move_in_plane_xz(self.keys.movement(), frame_time, &mut self.viewer);
        self.camera
            .set_view_yxz(self.viewer.translation, self.viewer.rotation);
        self.camera.set_perspective_projection(
            50f32.to_radians(),
            gpu.renderer.aspect_ratio(),
            0.1,
            100.0,
        );

        let Some(cmd) = gpu.renderer.begin_frame(&mut gpu.window)? else {
            return Ok(());
        };
        let frame_index = gpu.renderer.frame_index();
        let frame = FrameInfo {
            frame_index,
            frame_time,
            command_buffer: cmd,
            camera: &self.camera,
            global_descriptor_set: gpu.global_sets[frame_index],
        };

        let mut ubo = GlobalUbo::default();
        ubo.set_camera(&self.camera);
        gpu.point_light_system
            .update(&frame, &mut gpu.game_objects, &mut ubo);
        let ubo_buffer = &mut gpu.ubo_buffers[frame_index];
        ubo_buffer.write_pod(&ubo, 0)?;
        ubo_buffer.flush(vk::WHOLE_SIZE, 0)?;

        gpu.renderer.begin_swapchain_render_pass(cmd);
        gpu.simple_system
            .render_game_objects(&frame, &gpu.game_objects);
        gpu.point_light_system.render(&frame, &gpu.game_objects);
        gpu.renderer.end_swapchain_render_pass(cmd);
        gpu.renderer.end_frame(&mut gpu.window)?;

        self.frames = self.frames.saturating_add(1);
        Ok(())
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;
        if code == KeyCode::Escape && pressed {
            info!("escape pressed, exiting");
            event_loop.exit();
            return;
        }
        self.keys.on_key(code, pressed);
    }
}

impl ApplicationHandler for FirstApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let w = &self.config.window;
        let created = Window::new(event_loop, w.width, w.height, &w.title)
            .and_then(|window| Gpu::new(window, &self.config));
        match created {
            Ok(gpu) => {
                info!("{} objects, {} frames in flight", gpu.game_objects.len(), MAX_FRAMES_IN_FLIGHT);
                gpu.window.request_redraw();
                self.gpu = Some(gpu);
                self.last_frame = Instant::now();
            }
            Err(e) => self.fail(event_loop, e.context("startup")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(gpu) = &self.gpu {
            if window_id != gpu.window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.window.on_resized(size);
                    gpu.window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.on_key(event_loop, &event),
            WindowEvent::Focused(false) => self.keys.release_all(),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.draw_frame() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = &self.gpu else { return };

        // Nothing to present into while minimized; sleep until a resize.
        if gpu.window.is_minimized() {
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        gpu.window.request_redraw();

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Gpu::drop waits for the device before anything is destroyed.
        self.gpu = None;
        info!("shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_starts_behind_origin() {
        let app = FirstApp::new(AppConfig::default());
        assert_eq!(app.viewer.translation, Vec3::new(0.0, 0.0, -2.5));
        assert_eq!(app.viewer.rotation, Vec3::ZERO);
        assert!(app.gpu.is_none());
    }

    #[test]
    fn initial_camera_sits_at_eye_point() {
        let app = FirstApp::new(AppConfig::default());
        assert!(app
            .camera
            .position()
            .abs_diff_eq(Vec3::new(-1.0, -2.0, 2.0), 1e-5));
    }
}
