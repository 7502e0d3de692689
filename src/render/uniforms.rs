//! Uniform block layouts shared with the WGSL programs.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

use crate::controller::CameraMatrices;
use crate::light::LightSpace;

/// Pass uniforms of the shaded program (`FrameUniform` in `shaded.*.wgsl`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadedFrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_view: [[f32; 4]; 4],
    pub light_projection: [[f32; 4]; 4],
    /// Light direction in camera view space, `w == 0`.
    pub light_direction: [f32; 4],
    /// `x` holds the depth bias, the rest is padding.
    pub shadow_params: [f32; 4],
}

impl ShadedFrameUniform {
    /// The light matrices are always written, whichever camera is active.
    pub fn new(
        camera: &CameraMatrices,
        light: &LightSpace,
        light_direction: Vec4,
        depth_bias: f32,
    ) -> Self {
        let view_direction = camera.view * light_direction.truncate().extend(0.0);
        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            light_view: light.view.to_cols_array_2d(),
            light_projection: light.projection.to_cols_array_2d(),
            light_direction: view_direction.into(),
            shadow_params: [depth_bias, 0.0, 0.0, 0.0],
        }
    }
}

/// Per-object uniforms of the shaded program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShadedObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
}

/// Pass uniforms of the depth-only program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DepthFrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl DepthFrameUniform {
    pub fn new(light: &LightSpace) -> Self {
        Self {
            view: light.view.to_cols_array_2d(),
            projection: light.projection.to_cols_array_2d(),
        }
    }
}

/// Per-object uniforms of the depth-only program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DepthObjectUniform {
    pub model: [[f32; 4]; 4],
}

impl From<Mat4> for DepthObjectUniform {
    fn from(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }
}

/// WGSL `mat3x4<f32>`: three columns padded to 16 bytes.
pub fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}
