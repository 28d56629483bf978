// SPDX-License-Identifier: CEPL-1.0
//! Builders for set layouts, pools and descriptor writes.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use lumen_core::EngineError;

use crate::device::Device;

/// Binding number -> layout binding, shared by the layout builder and the
/// writer's sanity checks.
#[derive(Clone, Debug, Default)]
pub struct BindingTable {
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl BindingTable {
    pub fn insert(
        &mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Result<(), EngineError> {
        if self.bindings.contains_key(&binding) {
            return Err(EngineError::Descriptor(format!(
                "binding {binding} already in use"
            )));
        }
        self.bindings.insert(
            binding,
            vk::DescriptorSetLayoutBinding {
                binding,
                descriptor_type,
                descriptor_count: count,
                stage_flags,
                ..Default::default()
            },
        );
        Ok(())
    }

    pub fn get(&self, binding: u32) -> Option<&vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings.get(&binding)
    }

    /// Single-descriptor binding lookup used by the writer.
    pub fn single(&self, binding: u32) -> Result<vk::DescriptorType, EngineError> {
        let b = self.get(binding).ok_or_else(|| {
            EngineError::Descriptor(format!("layout does not contain binding {binding}"))
        })?;
        if b.descriptor_count != 1 {
            return Err(EngineError::Descriptor(format!(
                "binding {binding} expects {} descriptors, writer handles one",
                b.descriptor_count
            )));
        }
        Ok(b.descriptor_type)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn to_vec(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings.values().copied().collect()
    }
}

pub struct DescriptorSetLayout {
    device: Rc<Device>,
    layout: vk::DescriptorSetLayout,
    bindings: BindingTable,
}

pub struct DescriptorSetLayoutBuilder {
    device: Rc<Device>,
    bindings: BindingTable,
    error: Option<EngineError>,
}

impl DescriptorSetLayout {
    pub fn builder(device: Rc<Device>) -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder {
            device,
            bindings: BindingTable::default(),
            error: None,
        }
    }

    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }
}

impl DescriptorSetLayoutBuilder {
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        if let Err(e) = self.bindings.insert(binding, descriptor_type, stage_flags, count) {
            debug_assert!(false, "{e}");
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn build(self) -> Result<DescriptorSetLayout> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        let bindings = self.bindings.to_vec();
        let info = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: bindings.len() as u32,
            p_bindings: bindings.as_ptr(),
            ..Default::default()
        };
        let layout = unsafe { self.device.raw().create_descriptor_set_layout(&info, None) }
            .context("create_descriptor_set_layout")?;
        Ok(DescriptorSetLayout {
            device: self.device,
            layout,
            bindings: self.bindings,
        })
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .raw()
                .destroy_descriptor_set_layout(self.layout, None)
        };
    }
}

pub struct DescriptorPool {
    device: Rc<Device>,
    pool: vk::DescriptorPool,
}

pub struct DescriptorPoolBuilder {
    device: Rc<Device>,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl DescriptorPool {
    pub fn builder(device: Rc<Device>) -> DescriptorPoolBuilder {
        DescriptorPoolBuilder {
            device,
            pool_sizes: Vec::new(),
            max_sets: 1000,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }

    pub fn allocate_descriptor(&self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let info = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: 1,
            p_set_layouts: &layout,
            ..Default::default()
        };
        // A full pool is fatal; callers size it up front.
        let sets = unsafe { self.device.raw().allocate_descriptor_sets(&info) }
            .context("allocate_descriptor_sets")?;
        Ok(sets[0])
    }

    /// Needs the pool to have been built with `FREE_DESCRIPTOR_SET`.
    pub fn free_descriptors(&self, sets: &[vk::DescriptorSet]) -> Result<()> {
        unsafe { self.device.raw().free_descriptor_sets(self.pool, sets) }
            .context("free_descriptor_sets")
    }

    pub fn reset_pool(&self) -> Result<()> {
        unsafe {
            self.device
                .raw()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
        }
        .context("reset_descriptor_pool")
    }

    fn update(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.device.raw().update_descriptor_sets(writes, &[]) };
    }
}

impl DescriptorPoolBuilder {
    pub fn add_pool_size(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty,
            descriptor_count: count,
        });
        self
    }

    pub fn set_pool_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_max_sets(mut self, count: u32) -> Self {
        self.max_sets = count;
        self
    }

    pub fn build(self) -> Result<DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            flags: self.flags,
            max_sets: self.max_sets,
            pool_size_count: self.pool_sizes.len() as u32,
            p_pool_sizes: self.pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = unsafe { self.device.raw().create_descriptor_pool(&info, None) }
            .context("create_descriptor_pool")?;
        Ok(DescriptorPool {
            device: self.device,
            pool,
        })
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.raw().destroy_descriptor_pool(self.pool, None) };
    }
}

#[derive(Clone, Copy, Debug)]
enum WriteInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: WriteInfo,
}

/// Collects buffer/image writes for one set, then allocates (`build`) or
/// updates an existing set (`overwrite`).
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    writes: Vec<PendingWrite>,
    error: Option<EngineError>,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            writes: Vec::new(),
            error: None,
        }
    }

    fn push(&mut self, binding: u32, info: WriteInfo) {
        match self.layout.bindings.single(binding) {
            Ok(descriptor_type) => self.writes.push(PendingWrite {
                binding,
                descriptor_type,
                info,
            }),
            Err(e) => {
                debug_assert!(false, "{e}");
                self.error.get_or_insert(e);
            }
        }
    }

    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.push(binding, WriteInfo::Buffer(info));
        self
    }

    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.push(binding, WriteInfo::Image(info));
        self
    }

    pub fn build(self) -> Result<vk::DescriptorSet> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        let set = self.pool.allocate_descriptor(self.layout.raw())?;
        self.apply(set);
        Ok(set)
    }

    pub fn overwrite(self, set: vk::DescriptorSet) -> Result<()> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        self.apply(set);
        Ok(())
    }

    fn apply(&self, set: vk::DescriptorSet) {
        let vk_writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|w| {
                let mut write = vk::WriteDescriptorSet {
                    s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                    dst_set: set,
                    dst_binding: w.binding,
                    dst_array_element: 0,
                    descriptor_count: 1,
                    descriptor_type: w.descriptor_type,
                    ..Default::default()
                };
                match &w.info {
                    WriteInfo::Buffer(b) => write.p_buffer_info = b,
                    WriteInfo::Image(i) => write.p_image_info = i,
                }
                write
            })
            .collect();
        self.pool.update(&vk_writes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_binding_is_rejected() {
        let mut t = BindingTable::default();
        t.insert(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::ALL_GRAPHICS, 1)
            .unwrap();
        let err = t
            .insert(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT, 1)
            .unwrap_err();
        assert!(err.to_string().contains("binding 0 already in use"));
        assert_eq!(t.len(), 1);
        assert_eq!(
            t.get(0).unwrap().descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
    }

    #[test]
    fn bindings_come_out_sorted() {
        let mut t = BindingTable::default();
        for b in [3, 1, 2] {
            t.insert(b, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX, 1)
                .unwrap();
        }
        let order: Vec<u32> = t.to_vec().iter().map(|b| b.binding).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn writer_lookup_requires_single_descriptor() {
        let mut t = BindingTable::default();
        t.insert(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::ALL_GRAPHICS, 1)
            .unwrap();
        t.insert(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT, 4)
            .unwrap();

        assert_eq!(t.single(0).unwrap(), vk::DescriptorType::UNIFORM_BUFFER);
        assert!(t.single(1).is_err());
        assert!(t.single(7).unwrap_err().to_string().contains("binding 7"));
    }
}
