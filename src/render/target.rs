use log::info;

use crate::error::InitError;

/// Off-screen depth texture rendered from the light and sampled by the
/// shaded pass.
pub struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

impl DepthTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Allocates the target. Sizes beyond the device limits and any
    /// validation error raised while creating it are reported as an
    /// incomplete target.
    pub async fn new(device: &wgpu::Device, (width, height): (u32, u32)) -> Result<Self, InitError> {
        check_size((width, height), device.limits().max_texture_dimension_2d)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-map-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        if let Some(err) = device.pop_error_scope().await {
            return Err(InitError::IncompleteDepthTarget(err.to_string()));
        }

        info!("shadow map target {width}x{height} ({:?})", Self::FORMAT);
        Ok(Self {
            _texture: texture,
            view,
            sampler,
            width,
            height,
        })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Rejects shadow map sizes the device cannot allocate.
pub fn check_size((width, height): (u32, u32), max_dimension: u32) -> Result<(), InitError> {
    if width == 0 || height == 0 {
        return Err(InitError::IncompleteDepthTarget(format!(
            "{width}x{height} has zero area"
        )));
    }
    if width > max_dimension || height > max_dimension {
        return Err(InitError::IncompleteDepthTarget(format!(
            "{width}x{height} exceeds the device limit of {max_dimension}"
        )));
    }
    Ok(())
}

/// Depth attachment of the window, recreated on resize.
pub struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("window-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}
