// SPDX-License-Identifier: CEPL-1.0
use std::ffi::c_void;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use ash::vk;
use bytemuck::Pod;

use crate::device::Device;

/// Rounds `instance_size` up to a multiple of `min_offset_alignment`
/// (a power of two, or 0 for "no requirement").
pub fn get_alignment(
    instance_size: vk::DeviceSize,
    min_offset_alignment: vk::DeviceSize,
) -> vk::DeviceSize {
    if min_offset_alignment > 0 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Byte range `[start, end)` a write of `len` bytes at `offset` touches,
/// or an error if it leaves `[0, buffer_size)`.
fn write_range(
    offset: vk::DeviceSize,
    len: vk::DeviceSize,
    buffer_size: vk::DeviceSize,
) -> Result<(vk::DeviceSize, vk::DeviceSize)> {
    let start = if offset == vk::WHOLE_SIZE { 0 } else { offset };
    match start.checked_add(len) {
        Some(end) if end <= buffer_size => Ok((start, end)),
        _ => bail!(
            "write of {} bytes at {} overruns buffer of {} bytes",
            len,
            start,
            buffer_size
        ),
    }
}

/// A `vk::Buffer` with its own allocation, laid out as `instance_count`
/// slots of `alignment_size` bytes each.
pub struct Buffer {
    device: Rc<Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut c_void,

    buffer_size: vk::DeviceSize,
    instance_count: u32,
    instance_size: vk::DeviceSize,
    alignment_size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
}

impl Buffer {
    pub fn new(
        device: Rc<Device>,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> Result<Self> {
        let alignment_size = get_alignment(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count as vk::DeviceSize;
        let (buffer, memory) = device.create_buffer(buffer_size, usage, memory_properties)?;
        Ok(Self {
            device,
            buffer,
            memory,
            mapped: std::ptr::null_mut(),
            buffer_size,
            instance_count,
            instance_size,
            alignment_size,
            usage,
            memory_properties,
        })
    }

    /// Maps `[offset, offset + size)`; pass `vk::WHOLE_SIZE` for everything.
    pub fn map(&mut self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        debug_assert!(
            self.memory_properties
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE),
            "mapping memory that is not host visible"
        );
        if !self.mapped.is_null() {
            return Ok(());
        }
        self.mapped = unsafe {
            self.device
                .raw()
                .map_memory(self.memory, offset, size, vk::MemoryMapFlags::empty())
        }
        .context("map_memory")?;
        Ok(())
    }

    pub fn map_whole(&mut self) -> Result<()> {
        self.map(vk::WHOLE_SIZE, 0)
    }

    pub fn unmap(&mut self) {
        if !self.mapped.is_null() {
            unsafe { self.device.raw().unmap_memory(self.memory) };
            self.mapped = std::ptr::null_mut();
        }
    }

    pub fn is_mapped(&self) -> bool {
        !self.mapped.is_null()
    }

    /// Copies `data` into the mapped range at `offset` bytes. `vk::WHOLE_SIZE`
    /// as the offset means "from the start".
    pub fn write_to_buffer(&mut self, data: &[u8], offset: vk::DeviceSize) -> Result<()> {
        if self.mapped.is_null() {
            bail!("write_to_buffer on an unmapped buffer");
        }
        let (start, _) = write_range(offset, data.len() as vk::DeviceSize, self.buffer_size)?;
        // SAFETY: mapped points at host-visible memory of buffer_size bytes,
        // and write_range keeps [start, start + len) inside it.
        unsafe {
            let dst = (self.mapped as *mut u8).add(start as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    pub fn write_pod<T: Pod>(&mut self, value: &T, offset: vk::DeviceSize) -> Result<()> {
        self.write_to_buffer(bytemuck::bytes_of(value), offset)
    }

    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        let range = self.mapped_range(size, offset);
        unsafe {
            self.device
                .raw()
                .flush_mapped_memory_ranges(std::slice::from_ref(&range))
        }
        .context("flush_mapped_memory_ranges")
    }

    pub fn invalidate(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        let range = self.mapped_range(size, offset);
        unsafe {
            self.device
                .raw()
                .invalidate_mapped_memory_ranges(std::slice::from_ref(&range))
        }
        .context("invalidate_mapped_memory_ranges")
    }

    fn mapped_range(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> vk::MappedMemoryRange<'static> {
        vk::MappedMemoryRange {
            s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
            memory: self.memory,
            offset,
            size,
            ..Default::default()
        }
    }

    pub fn descriptor_info(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset,
            range: size,
        }
    }

    pub fn write_to_index(&mut self, data: &[u8], index: u32) -> Result<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.instance_size);
        self.write_to_buffer(data, self.index_offset(index))
    }

    pub fn flush_index(&self, index: u32) -> Result<()> {
        self.flush(self.alignment_size, self.index_offset(index))
    }

    pub fn invalidate_index(&self, index: u32) -> Result<()> {
        self.invalidate(self.alignment_size, self.index_offset(index))
    }

    pub fn descriptor_info_for_index(&self, index: u32) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.alignment_size, self.index_offset(index))
    }

    fn index_offset(&self, index: u32) -> vk::DeviceSize {
        debug_assert!(index < self.instance_count, "instance index out of range");
        index as vk::DeviceSize * self.alignment_size
    }

    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    pub fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.memory_properties
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            let d = self.device.raw();
            d.destroy_buffer(self.buffer, None);
            d.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up_to_power_of_two() {
        assert_eq!(get_alignment(1, 256), 256);
        assert_eq!(get_alignment(256, 256), 256);
        assert_eq!(get_alignment(257, 256), 512);
        assert_eq!(get_alignment(100, 64), 128);
    }

    #[test]
    fn zero_alignment_is_identity() {
        assert_eq!(get_alignment(1234, 0), 1234);
        assert_eq!(get_alignment(0, 0), 0);
    }

    #[test]
    fn whole_size_offset_writes_from_start() {
        assert_eq!(write_range(vk::WHOLE_SIZE, 16, 64).unwrap(), (0, 16));
        assert!(write_range(vk::WHOLE_SIZE, 65, 64).is_err());
    }

    #[test]
    fn write_range_rejects_overflow_and_overrun() {
        assert!(write_range(u64::MAX - 1, 16, 64).is_err());
        assert!(write_range(60, 8, 64).is_err());
        assert_eq!(write_range(48, 16, 64).unwrap(), (48, 64));
        assert_eq!(write_range(64, 0, 64).unwrap(), (64, 64));
    }

    #[test]
    fn alignment_of_one_is_identity() {
        assert_eq!(get_alignment(37, 1), 37);
    }
}
