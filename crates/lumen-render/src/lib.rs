// SPDX-License-Identifier: CEPL-1.0
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod frame;

pub use frame::{FrameSlots, ImagesInFlight, MAX_FRAMES_IN_FLIGHT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

/// Something a backend can present into.
///
/// The window owns the resize flag; the backend only reads it after
/// presenting and clears it once the swapchain has been rebuilt.
pub trait RenderTarget: HasWindowHandle + HasDisplayHandle {
    fn extent(&self) -> RenderSize;
    fn was_resized(&self) -> bool;
    fn reset_resized_flag(&mut self);
}
