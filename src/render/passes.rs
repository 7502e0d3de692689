//! The two render passes of a frame, recorded into one encoder with the
//! depth pass first.

use super::binding::{DepthOnly, DrawList, ShaderBinding, Shaded};
use super::mesh::MeshSet;
use super::target::{DepthBuffer, DepthTarget};
use super::uniforms::{DepthFrameUniform, ShadedFrameUniform};

/// Handles shared by both passes.
pub struct PassContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub meshes: &'a MeshSet,
}

/// Renders the scene from the light into `target`. The target is cleared
/// to the far plane first, so afterwards every texel holds the nearest
/// depth seen from the light.
pub fn depth_pass(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    target: &DepthTarget,
    binding: &mut ShaderBinding<DepthOnly>,
    frame: &DepthFrameUniform,
    draws: &DrawList<DepthOnly>,
) {
    binding.upload(ctx.device, ctx.queue, frame, draws);

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("depth-pass"),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: target.view(),
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    binding.encode(&mut pass, draws, ctx.meshes);
}

/// Renders the scene into the window, classifying each fragment against
/// the shadow map the binding was built with.
pub fn shaded_pass(
    ctx: &PassContext<'_>,
    encoder: &mut wgpu::CommandEncoder,
    color: &wgpu::TextureView,
    depth: &DepthBuffer,
    binding: &mut ShaderBinding<Shaded>,
    frame: &ShadedFrameUniform,
    draws: &DrawList<Shaded>,
) {
    binding.upload(ctx.device, ctx.queue, frame, draws);

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("shaded-pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth.view(),
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    binding.encode(&mut pass, draws, ctx.meshes);
}
