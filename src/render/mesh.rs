use std::mem::size_of;

use wgpu::util::DeviceExt;

use crate::assets::DemoAssets;
use crate::mesh::{MeshData, VERTEX_STRIDE};
use crate::scene::MeshId;

const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Interleaved position + normal layout shared by both programs.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (VERTEX_STRIDE * size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Mesh uploaded to vertex and index buffers.
pub struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    pub fn from_mesh(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Binds the buffers and issues one indexed draw.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Every mesh the scene can reference.
pub struct MeshSet {
    cube: GpuMesh,
    plane: GpuMesh,
}

impl MeshSet {
    pub fn upload(device: &wgpu::Device, assets: &DemoAssets) -> Self {
        Self {
            cube: GpuMesh::from_mesh(device, &assets.cube, MeshId::Cube.name()),
            plane: GpuMesh::from_mesh(device, &assets.plane, MeshId::Plane.name()),
        }
    }

    pub fn get(&self, id: MeshId) -> &GpuMesh {
        match id {
            MeshId::Cube => &self.cube,
            MeshId::Plane => &self.plane,
        }
    }
}
