// SPDX-License-Identifier: CEPL-1.0
use std::collections::HashMap;
use std::mem::{offset_of, size_of};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use lumen_core::EngineError;
use tracing::debug;

use crate::buffer::Buffer;
use crate::device::Device;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const BINDINGS_DESC: [vk::VertexInputBindingDescription; 1] =
        [vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }];

    pub const ATTRIBUTES_DESC: [vk::VertexInputAttributeDescription; 4] = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, color) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, normal) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 3,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: offset_of!(Vertex, uv) as u32,
        },
    ];

    pub fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            color,
            ..Default::default()
        }
    }

    // Bitwise identity; -0.0 and 0.0 stay distinct, which only costs a duplicate.
    fn key(&self) -> [u32; 11] {
        bytemuck::cast(*self)
    }
}

/// CPU-side geometry waiting to be uploaded.
#[derive(Clone, Debug, Default)]
pub struct Builder {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Builder {
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("loading {}", path.display()))?;
        let builder = Self::from_obj_models(&models);
        debug!(
            "{}: {} unique vertices, {} indices",
            path.display(),
            builder.vertices.len(),
            builder.indices.len()
        );
        Ok(builder)
    }

    /// Flattens tobj meshes into one indexed vertex list, merging vertices
    /// that are identical in every attribute.
    pub fn from_obj_models(models: &[tobj::Model]) -> Self {
        let mut builder = Self::default();
        let mut unique: HashMap<[u32; 11], u32> = HashMap::new();

        for model in models {
            let mesh = &model.mesh;
            for (i, &pi) in mesh.indices.iter().enumerate() {
                let p = pi as usize;
                let mut vertex = Vertex {
                    position: [
                        mesh.positions[3 * p],
                        mesh.positions[3 * p + 1],
                        mesh.positions[3 * p + 2],
                    ],
                    color: [1.0, 1.0, 1.0],
                    ..Default::default()
                };
                if mesh.vertex_color.len() >= 3 * (p + 1) {
                    vertex.color = [
                        mesh.vertex_color[3 * p],
                        mesh.vertex_color[3 * p + 1],
                        mesh.vertex_color[3 * p + 2],
                    ];
                }
                if let Some(&ni) = mesh.normal_indices.get(i) {
                    let n = ni as usize;
                    vertex.normal = [
                        mesh.normals[3 * n],
                        mesh.normals[3 * n + 1],
                        mesh.normals[3 * n + 2],
                    ];
                }
                if let Some(&ti) = mesh.texcoord_indices.get(i) {
                    let t = ti as usize;
                    vertex.uv = [mesh.texcoords[2 * t], mesh.texcoords[2 * t + 1]];
                }

                let index = *unique.entry(vertex.key()).or_insert_with(|| {
                    builder.vertices.push(vertex);
                    (builder.vertices.len() - 1) as u32
                });
                builder.indices.push(index);
            }
        }
        builder
    }
}

/// Device-local vertex buffer plus an optional 32-bit index buffer.
pub struct Model {
    vertex_buffer: Buffer,
    vertex_count: u32,
    index_buffer: Option<Buffer>,
    index_count: u32,
}

impl Model {
    pub fn new(device: Rc<Device>, builder: &Builder) -> Result<Self> {
        if builder.vertices.len() < 3 {
            return Err(EngineError::InvalidModel(format!(
                "vertex count must be at least 3, got {}",
                builder.vertices.len()
            ))
            .into());
        }
        let vertex_buffer = upload(
            &device,
            bytemuck::cast_slice(&builder.vertices),
            size_of::<Vertex>(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = if builder.indices.is_empty() {
            None
        } else {
            Some(upload(
                &device,
                bytemuck::cast_slice(&builder.indices),
                size_of::<u32>(),
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        };
        Ok(Self {
            vertex_buffer,
            vertex_count: builder.vertices.len() as u32,
            index_buffer,
            index_count: builder.indices.len() as u32,
        })
    }

    pub fn from_file(device: Rc<Device>, path: impl AsRef<Path>) -> Result<Self> {
        let builder = Builder::load_obj(path)?;
        Self::new(device, &builder)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.raw()], &[0]);
            if let Some(ib) = &self.index_buffer {
                device.cmd_bind_index_buffer(cmd, ib.raw(), 0, vk::IndexType::UINT32);
            }
        }
    }

    pub fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            } else {
                device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
            }
        }
    }
}

/// host -> staging -> device-local, blocking until the copy retires.
fn upload(
    device: &Rc<Device>,
    bytes: &[u8],
    stride: usize,
    usage: vk::BufferUsageFlags,
) -> Result<Buffer> {
    let count = (bytes.len() / stride) as u32;
    let mut staging = Buffer::new(
        Rc::clone(device),
        stride as vk::DeviceSize,
        count,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        0,
    )?;
    staging.map_whole()?;
    staging.write_to_buffer(bytes, 0)?;

    let target = Buffer::new(
        Rc::clone(device),
        stride as vk::DeviceSize,
        count,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        0,
    )?;
    device.copy_buffer(staging.raw(), target.raw(), bytes.len() as vk::DeviceSize)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 44);
        assert_eq!(Vertex::BINDINGS_DESC[0].stride, 44);
        let offsets: Vec<u32> = Vertex::ATTRIBUTES_DESC.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36]);
        let locations: Vec<u32> = Vertex::ATTRIBUTES_DESC.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2, 3]);
    }

    fn write_obj(body: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn quad_shares_corner_vertices() {
        let obj = write_obj(
            "v -1 0 -1\nv 1 0 -1\nv 1 0 1\nv -1 0 1\n\
             vn 0 -1 0\n\
             f 1//1 2//1 3//1\nf 1//1 3//1 4//1\n",
        );
        let b = Builder::load_obj(obj.path()).unwrap();

        assert_eq!(b.vertices.len(), 4);
        assert_eq!(b.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(b.vertices.iter().all(|v| v.normal == [0.0, -1.0, 0.0]));
        assert!(b.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
    }

    #[test]
    fn polygons_are_triangulated_and_uvs_kept() {
        let obj = write_obj(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3 4/4\n",
        );
        let b = Builder::load_obj(obj.path()).unwrap();

        assert_eq!(b.indices.len(), 6);
        assert_eq!(b.vertices.len(), 4);
        assert_eq!(b.vertices[2].uv, [1.0, 1.0]);
    }

    #[test]
    fn same_position_different_normal_stays_split() {
        let obj = write_obj(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vn 0 0 1\nvn 0 0 -1\n\
             f 1//1 2//1 3//1\nf 1//2 3//2 2//2\n",
        );
        let b = Builder::load_obj(obj.path()).unwrap();

        assert_eq!(b.vertices.len(), 6);
        assert_eq!(b.indices.len(), 6);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Builder::load_obj("/definitely/not/here.obj").is_err());
    }
}
