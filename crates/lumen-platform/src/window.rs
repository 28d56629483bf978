// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use lumen_render::{RenderSize, RenderTarget};
use tracing::{debug, info};
use winit::{
    dpi::{LogicalSize, PhysicalSize},
    event_loop::ActiveEventLoop,
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window as WinitWindow, WindowId},
};

/// OS window plus the resize flag the renderer polls after presenting.
pub struct Window {
    inner: WinitWindow,
    size: RenderSize,
    framebuffer_resized: bool,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WinitWindow::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(width, height))
            .with_resizable(true);
        let inner = event_loop.create_window(attrs).context("create_window")?;
        let size = to_render_size(inner.inner_size());
        info!("window \"{}\" {}x{}", title, size.width, size.height);
        Ok(Self {
            inner,
            size,
            framebuffer_resized: false,
        })
    }

    pub fn id(&self) -> WindowId {
        self.inner.id()
    }

    pub fn on_resized(&mut self, size: PhysicalSize<u32>) {
        self.size = to_render_size(size);
        self.framebuffer_resized = true;
        debug!("resized -> {}x{}", self.size.width, self.size.height);
    }

    pub fn is_minimized(&self) -> bool {
        self.size.is_zero()
    }

    pub fn request_redraw(&self) {
        self.inner.request_redraw();
    }
}

fn to_render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize {
        width: size.width,
        height: size.height,
    }
}

impl RenderTarget for Window {
    fn extent(&self) -> RenderSize {
        self.size
    }

    fn was_resized(&self) -> bool {
        self.framebuffer_resized
    }

    fn reset_resized_flag(&mut self) {
        self.framebuffer_resized = false;
    }
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.inner.window_handle()
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.inner.display_handle()
    }
}
