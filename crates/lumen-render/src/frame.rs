// SPDX-License-Identifier: CEPL-1.0
//! Frame pacing bookkeeping that does not touch the GPU.
//!
//! A backend keeps `MAX_FRAMES_IN_FLIGHT` sets of sync objects and walks
//! through them with [`FrameSlots`]. Swapchain images are a separate ring
//! whose length the driver picks, so [`ImagesInFlight`] remembers which
//! slot's fence last rendered into each image.

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSlots {
    current: usize,
}

impl FrameSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Moves to the next slot and returns it.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
        self.current
    }
}

/// Image index -> fence of the frame that last submitted work for it.
///
/// When the driver hands back an image whose previous frame has not
/// retired yet (image count > frames in flight), the caller must wait on
/// the fence returned by [`ImagesInFlight::claim`] before submitting.
#[derive(Clone, Debug)]
pub struct ImagesInFlight<F> {
    owners: Vec<Option<F>>,
}

impl<F: Copy + Eq> ImagesInFlight<F> {
    pub fn new(image_count: usize) -> Self {
        Self { owners: vec![None; image_count] }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn owner(&self, image: usize) -> Option<F> {
        self.owners.get(image).copied().flatten()
    }

    /// Records `fence` as the new owner of `image` and hands back the fence
    /// that must be waited on first, if any. Reclaiming with the same fence
    /// returns it too: the slot's previous submission is still pending.
    pub fn claim(&mut self, image: usize, fence: F) -> Option<F> {
        if image >= self.owners.len() {
            self.owners.resize(image + 1, None);
        }
        self.owners[image].replace(fence)
    }

    /// Drops every owner, e.g. after `device_wait_idle`.
    pub fn clear(&mut self) {
        self.owners.iter_mut().for_each(|o| *o = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cycle_modulo_frames_in_flight() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.current(), 0);
        let seen: Vec<usize> = (0..5).map(|_| slots.advance()).collect();
        assert_eq!(seen, vec![1, 0, 1, 0, 1]);
        assert!(seen.iter().all(|&s| s < MAX_FRAMES_IN_FLIGHT));
    }

    #[test]
    fn first_claim_has_nothing_to_wait_on() {
        let mut map = ImagesInFlight::<u64>::new(3);
        assert_eq!(map.claim(0, 10), None);
        assert_eq!(map.claim(1, 11), None);
        assert_eq!(map.owner(0), Some(10));
        assert_eq!(map.owner(2), None);
    }

    #[test]
    fn three_images_two_slots_serialises_reuse() {
        // Fences 100 and 101 belong to frame slots 0 and 1.
        let fences = [100u64, 101];
        let mut map = ImagesInFlight::new(3);
        let mut slots = FrameSlots::new();
        let mut waits = Vec::new();

        // Driver hands back images 0,1,2,0,1 in order.
        for image in [0usize, 1, 2, 0, 1] {
            let fence = fences[slots.current()];
            waits.push(map.claim(image, fence));
            slots.advance();
        }

        // Image 2 was never used before; image 0 was last drawn by slot 0,
        // now reused by slot 1, so slot 0's fence must be waited on.
        assert_eq!(waits, vec![None, None, None, Some(100), Some(101)]);
        assert_eq!(map.owner(0), Some(101));
        assert_eq!(map.owner(1), Some(100));
        assert_eq!(map.owner(2), Some(100));
    }

    #[test]
    fn clear_forgets_owners_but_keeps_length() {
        let mut map = ImagesInFlight::new(2);
        map.claim(1, 7u32);
        map.clear();
        assert_eq!(map.len(), 2);
        assert_eq!(map.owner(1), None);
        assert_eq!(map.claim(1, 8), None);
    }

    #[test]
    fn claim_past_end_grows() {
        let mut map = ImagesInFlight::new(0);
        assert!(map.is_empty());
        assert_eq!(map.claim(3, 1u8), None);
        assert_eq!(map.len(), 4);
    }
}
