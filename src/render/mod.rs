//! GPU side of the demo: wgpu setup, the two shader bindings and the
//! per-frame pass recording.

pub mod binding;
pub mod mesh;
pub mod passes;
pub mod program;
pub mod target;
pub mod uniforms;

use std::sync::Arc;

use glam::Vec4;
use log::info;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::assets::DemoAssets;
use crate::config::DemoConfig;
use crate::controller::CameraMatrices;
use crate::error::InitError;
use crate::light::LightSpace;
use crate::scene::Scene;

pub use binding::{DepthOnly, DrawList, ShaderBinding, Shaded, UniformSet};
pub use mesh::{GpuMesh, MeshSet};
pub use target::{DepthBuffer, DepthTarget};

use passes::PassContext;
use uniforms::{DepthFrameUniform, ShadedFrameUniform};

/// Optional device features the demo takes advantage of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Fragments beyond the near/far planes are clamped instead of
    /// clipped.
    pub depth_clamp: bool,
}

impl Capabilities {
    pub fn probe(features: wgpu::Features) -> Self {
        Self {
            depth_clamp: features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
        }
    }

    pub fn required_features(&self) -> wgpu::Features {
        if self.depth_clamp {
            wgpu::Features::DEPTH_CLIP_CONTROL
        } else {
            wgpu::Features::empty()
        }
    }
}

/// Everything one frame needs besides the GPU state.
pub struct FrameState<'a> {
    pub scene: &'a Scene,
    pub light_space: LightSpace,
    /// World-space light direction, `w == 0`.
    pub light_direction: Vec4,
    pub camera: CameraMatrices,
    pub depth_bias: f32,
}

/// Window surface plus the shadow-mapping pipelines.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    capabilities: Capabilities,
    depth: DepthBuffer,
    shadow_map: DepthTarget,
    shaded: ShaderBinding<Shaded>,
    depth_only: ShaderBinding<DepthOnly>,
    meshes: MeshSet,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        assets: &DemoAssets,
        demo: &DemoConfig,
    ) -> Result<Self, InitError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(|err| InitError::Surface(err.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| InitError::Adapter(err.to_string()))?;
        let capabilities = Capabilities::probe(adapter.features());
        info!(
            "using adapter {} ({:?}), depth clamp: {}",
            adapter.get_info().name,
            adapter.get_info().backend,
            capabilities.depth_clamp
        );

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("shadow-demo-device"),
            required_features: capabilities.required_features(),
            required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .map_err(|err| InitError::Device(err.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| InitError::Surface("surface reports no formats".to_string()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let shadow_map = DepthTarget::new(&device, demo.shadow.resolution).await?;
        let shaded = ShaderBinding::shaded(
            &device,
            &assets.shaders,
            &shadow_map,
            surface_format,
            capabilities,
        )
        .await?;
        let depth_only = ShaderBinding::depth_only(&device, &assets.shaders, capabilities).await?;
        let meshes = MeshSet::upload(&device, assets);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            capabilities,
            depth,
            shadow_map,
            shaded,
            depth_only,
            meshes,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Width over height of the window surface.
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    /// Reconfigures the surface and window depth buffer. The shadow map
    /// keeps its resolution.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Records the depth pass and the shaded pass and presents the frame.
    pub fn render(&mut self, frame: &FrameState<'_>) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let ctx = PassContext {
            device: &self.device,
            queue: &self.queue,
            meshes: &self.meshes,
        };
        passes::depth_pass(
            &ctx,
            &mut encoder,
            &self.shadow_map,
            &mut self.depth_only,
            &DepthFrameUniform::new(&frame.light_space),
            &DrawList::build(frame.scene),
        );
        passes::shaded_pass(
            &ctx,
            &mut encoder,
            &view,
            &self.depth,
            &mut self.shaded,
            &ShadedFrameUniform::new(
                &frame.camera,
                &frame.light_space,
                frame.light_direction,
                frame.depth_bias,
            ),
            &DrawList::build(frame.scene),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_clamp_is_requested_only_when_supported() {
        let supported = Capabilities::probe(wgpu::Features::DEPTH_CLIP_CONTROL);
        assert!(supported.depth_clamp);
        assert_eq!(
            supported.required_features(),
            wgpu::Features::DEPTH_CLIP_CONTROL
        );

        let missing = Capabilities::probe(wgpu::Features::empty());
        assert!(!missing.depth_clamp);
        assert!(missing.required_features().is_empty());
    }
}
