//! Compiled programs together with the uniforms they declare.
//!
//! Which uniforms a program has is fixed by its [`UniformSet`]: the shaded
//! program carries colors and a normal matrix per object, the depth-only
//! program nothing but the model matrix.

use std::marker::PhantomData;
use std::mem::size_of;
use std::num::NonZeroU64;

use bytemuck::Pod;

use crate::assets::ShaderSources;
use crate::error::InitError;
use crate::scene::{MeshId, ObjectDraw, Scene};
use crate::transform::MatrixStack;

use super::mesh::{vertex_layout, MeshSet};
use super::program::{compile_program, ProgramDesc};
use super::target::{DepthBuffer, DepthTarget};
use super::uniforms::{
    mat3_to_3x4, DepthFrameUniform, DepthObjectUniform, ShadedFrameUniform, ShadedObjectUniform,
};
use super::Capabilities;

/// Bind group slots shared by both programs.
pub const FRAME_GROUP: u32 = 0;
pub const OBJECT_GROUP: u32 = 1;
/// Shadow map texture (binding 0) and sampler (binding 1).
pub const SHADOW_MAP_GROUP: u32 = 2;

/// Static description of a program's uniforms.
pub trait UniformSet {
    const NAME: &'static str;
    type Frame: Pod;
    type Object: Pod;

    fn object(draw: &ObjectDraw) -> Self::Object;
}

/// Lit program sampling the shadow map.
#[derive(Debug, Clone, Copy)]
pub enum Shaded {}

/// Program rendering the scene into the shadow map.
#[derive(Debug, Clone, Copy)]
pub enum DepthOnly {}

impl UniformSet for Shaded {
    const NAME: &'static str = "shaded";
    type Frame = ShadedFrameUniform;
    type Object = ShadedObjectUniform;

    fn object(draw: &ObjectDraw) -> ShadedObjectUniform {
        ShadedObjectUniform {
            model: draw.model.to_cols_array_2d(),
            normal: mat3_to_3x4(draw.normal_matrix()),
            diffuse: draw.material.diffuse.into(),
            ambient: draw.material.ambient.into(),
        }
    }
}

impl UniformSet for DepthOnly {
    const NAME: &'static str = "depth";
    type Frame = DepthFrameUniform;
    type Object = DepthObjectUniform;

    fn object(draw: &ObjectDraw) -> DepthObjectUniform {
        DepthObjectUniform::from(draw.model)
    }
}

/// Meshes to draw in order, each with the object uniforms of set `U`.
pub struct DrawList<U: UniformSet> {
    pub entries: Vec<(MeshId, U::Object)>,
}

impl<U: UniformSet> DrawList<U> {
    /// Walks the scene once, recording every object in draw order.
    pub fn build(scene: &Scene) -> Self {
        let mut stack = MatrixStack::new();
        let mut entries = Vec::with_capacity(scene.object_count());
        scene.draw(&mut stack, |object, draw| {
            entries.push((object.mesh, U::object(&draw)));
        });
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rounds `size` up to the next multiple of `alignment` (a power of two).
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    (size + alignment - 1) & !(alignment - 1)
}

/// Per-object uniforms packed at aligned offsets of one buffer and
/// selected with a dynamic offset per draw.
struct ObjectUniforms {
    layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    group: wgpu::BindGroup,
    element_size: u64,
    stride: u64,
    capacity: usize,
    label: &'static str,
}

impl ObjectUniforms {
    const INITIAL_CAPACITY: usize = 16;

    fn new(device: &wgpu::Device, label: &'static str, element_size: u64) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[uniform_entry(0, element_size, true)],
        });
        let stride = aligned_stride(
            element_size,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let (buffer, group) =
            Self::allocate(device, &layout, label, element_size, stride, Self::INITIAL_CAPACITY);
        Self {
            layout,
            buffer,
            group,
            element_size,
            stride,
            capacity: Self::INITIAL_CAPACITY,
            label,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        element_size: u64,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(element_size),
                }),
            }],
        });
        (buffer, group)
    }

    fn write<T: Pod>(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, objects: &[T]) {
        if objects.len() > self.capacity {
            self.capacity = objects.len().next_power_of_two();
            let (buffer, group) = Self::allocate(
                device,
                &self.layout,
                self.label,
                self.element_size,
                self.stride,
                self.capacity,
            );
            self.buffer = buffer;
            self.group = group;
        }

        let mut bytes = vec![0u8; self.stride as usize * objects.len()];
        for (slot, object) in bytes.chunks_exact_mut(self.stride as usize).zip(objects) {
            let data = bytemuck::bytes_of(object);
            slot[..data.len()].copy_from_slice(data);
        }
        queue.write_buffer(&self.buffer, 0, &bytes);
    }

    fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }
}

fn uniform_entry(binding: u32, size: u64, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size),
        },
        count: None,
    }
}

/// A compiled program and the buffers backing its uniform set.
pub struct ShaderBinding<U: UniformSet> {
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_group: wgpu::BindGroup,
    objects: ObjectUniforms,
    shadow_map_group: Option<wgpu::BindGroup>,
    _set: PhantomData<U>,
}

impl ShaderBinding<Shaded> {
    /// Builds the shaded program with `shadow_map` bound at
    /// [`SHADOW_MAP_GROUP`] for its whole lifetime.
    pub async fn shaded(
        device: &wgpu::Device,
        shaders: &ShaderSources,
        shadow_map: &DepthTarget,
        color_format: wgpu::TextureFormat,
        capabilities: Capabilities,
    ) -> Result<Self, InitError> {
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow-map-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });
        let shadow_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-map-group"),
            layout: &shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(shadow_map.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_map.sampler()),
                },
            ],
        });

        Self::build(
            device,
            (&shaders.shaded_vertex, &shaders.shaded_fragment),
            Some((shadow_layout, shadow_group)),
            Some(color_format),
            DepthBuffer::FORMAT,
            capabilities,
        )
        .await
    }
}

impl ShaderBinding<DepthOnly> {
    pub async fn depth_only(
        device: &wgpu::Device,
        shaders: &ShaderSources,
        capabilities: Capabilities,
    ) -> Result<Self, InitError> {
        Self::build(
            device,
            (&shaders.depth_vertex, &shaders.depth_fragment),
            None,
            None,
            DepthTarget::FORMAT,
            capabilities,
        )
        .await
    }
}

impl<U: UniformSet> ShaderBinding<U> {
    async fn build(
        device: &wgpu::Device,
        (vertex_source, fragment_source): (&str, &str),
        shadow_map: Option<(wgpu::BindGroupLayout, wgpu::BindGroup)>,
        color_format: Option<wgpu::TextureFormat>,
        depth_format: wgpu::TextureFormat,
        capabilities: Capabilities,
    ) -> Result<Self, InitError> {
        let frame_size = size_of::<U::Frame>() as u64;
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}-frame-layout", U::NAME)),
            entries: &[uniform_entry(0, frame_size, false)],
        });
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}-frame-uniform", U::NAME)),
            size: frame_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}-frame-group", U::NAME)),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });
        let objects = ObjectUniforms::new(device, U::NAME, size_of::<U::Object>() as u64);

        let mut layouts = vec![&frame_layout, &objects.layout];
        if let Some((layout, _)) = &shadow_map {
            layouts.push(layout);
        }
        let pipeline = compile_program(
            device,
            &ProgramDesc {
                name: U::NAME,
                vertex_source,
                fragment_source,
                bind_group_layouts: &layouts,
                vertex_layout: vertex_layout(),
                color_format,
                depth_format,
                capabilities,
            },
        )
        .await?;

        Ok(Self {
            pipeline,
            frame_buffer,
            frame_group,
            objects,
            shadow_map_group: shadow_map.map(|(_, group)| group),
            _set: PhantomData,
        })
    }

    /// Writes the pass uniforms and every object's uniforms for this frame.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &U::Frame,
        draws: &DrawList<U>,
    ) {
        queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));
        let objects: Vec<U::Object> = draws.entries.iter().map(|(_, object)| *object).collect();
        self.objects.write(device, queue, &objects);
    }

    /// Records one draw per entry. [`Self::upload`] must have been called
    /// with the same list.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>, draws: &DrawList<U>, meshes: &MeshSet) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(FRAME_GROUP, &self.frame_group, &[]);
        if let Some(group) = &self.shadow_map_group {
            pass.set_bind_group(SHADOW_MAP_GROUP, group, &[]);
        }
        for (index, (mesh, _)) in draws.entries.iter().enumerate() {
            pass.set_bind_group(OBJECT_GROUP, &self.objects.group, &[self.objects.offset(index)]);
            meshes.get(*mesh).render(pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3, Vec4};

    use super::*;

    #[test]
    fn both_sets_see_the_same_models_in_the_same_order() {
        let scene = Scene::demo();
        let shaded = DrawList::<Shaded>::build(&scene);
        let depth = DrawList::<DepthOnly>::build(&scene);
        assert_eq!(shaded.len(), 4);
        assert_eq!(depth.len(), 4);
        for ((mesh_a, a), (mesh_b, b)) in shaded.entries.iter().zip(&depth.entries) {
            assert_eq!(mesh_a, mesh_b);
            assert_eq!(a.model, b.model);
        }
        assert_eq!(depth.entries[3].0, MeshId::Plane);
    }

    #[test]
    fn shaded_objects_carry_material_and_normal_matrix() {
        let draws = DrawList::<Shaded>::build(&Scene::demo());
        let (_, ground) = draws.entries[3];
        assert_eq!(Vec4::from(ground.diffuse), Vec4::new(0.9, 0.9, 0.0, 1.0));
        assert_eq!(ground.ambient[3], 0.0);

        // Uniform scale by 5: normals shrink by 1/5 but keep their direction.
        let model = Mat4::from_cols_array_2d(&ground.model);
        let normal = Vec3::new(ground.normal[1][0], ground.normal[1][1], ground.normal[1][2]);
        assert!((normal - Vec3::Y * 0.2).length() < 1e-5);
        assert!((model.transform_point3(Vec3::ZERO).y + 1.01).abs() < 1e-5);
    }

    #[test]
    fn object_stride_honours_offset_alignment() {
        assert_eq!(aligned_stride(size_of::<ShadedObjectUniform>() as u64, 256), 256);
        assert_eq!(aligned_stride(size_of::<DepthObjectUniform>() as u64, 64), 64);
        assert_eq!(aligned_stride(144, 32), 160);
    }
}
