use std::borrow::Cow;

use log::debug;

use crate::error::InitError;

use super::Capabilities;

/// Inputs of one vertex/fragment program and the fixed pipeline state
/// around it.
pub struct ProgramDesc<'a> {
    pub name: &'static str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    pub bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    pub vertex_layout: wgpu::VertexBufferLayout<'a>,
    /// `None` for depth-only programs.
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: wgpu::TextureFormat,
    pub capabilities: Capabilities,
}

/// Rasterizer state shared by both programs: counter-clockwise front
/// faces, back faces culled, depth clamped when the device allows it.
pub fn primitive_state(capabilities: Capabilities) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: Some(wgpu::Face::Back),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: capabilities.depth_clamp,
        ..Default::default()
    }
}

/// Compiles both shader stages and links them into a render pipeline.
/// Validation errors from either step surface as a shader compile error
/// naming the program.
pub async fn compile_program(
    device: &wgpu::Device,
    desc: &ProgramDesc<'_>,
) -> Result<wgpu::RenderPipeline, InitError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{}-vertex", desc.name)),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.vertex_source)),
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{}-fragment", desc.name)),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.fragment_source)),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}-layout", desc.name)),
        bind_group_layouts: desc.bind_group_layouts,
        push_constant_ranges: &[],
    });

    let color_targets = [desc.color_format.map(|format| wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let targets: &[Option<wgpu::ColorTargetState>] = if desc.color_format.is_some() {
        &color_targets
    } else {
        &[]
    };

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.name),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[desc.vertex_layout.clone()],
        },
        primitive: primitive_state(desc.capabilities),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: desc.depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets,
        }),
        multiview: None,
        cache: None,
    });

    if let Some(err) = device.pop_error_scope().await {
        return Err(InitError::ShaderCompile {
            program: desc.name.to_string(),
            message: err.to_string(),
        });
    }
    debug!("compiled program {}", desc.name);
    Ok(pipeline)
}
