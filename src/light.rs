//! Light-space setup shared by the depth pass, the shaded pass and the
//! software shadow map.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Distance from the origin to the point the light looks from.
pub const LIGHT_DISTANCE: f32 = 5.0;

/// A single directional light. `direction` points from the light into the
/// scene and always has `w == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub direction: Vec4,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(-1.0, -1.0, 0.5))
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: direction.extend(0.0),
        }
    }

    /// Look-from point, [`LIGHT_DISTANCE`] units behind the direction.
    pub fn eye(&self) -> Vec3 {
        self.direction.truncate() * -LIGHT_DISTANCE
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    /// Light direction expressed in the space described by `view`.
    pub fn direction_in(&self, view: Mat4) -> Vec4 {
        view * self.direction
    }
}

/// Orthographic box in light view space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightProjection {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for LightProjection {
    fn default() -> Self {
        Self {
            left: -5.0,
            right: 5.0,
            bottom: -4.0,
            top: 3.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl LightProjection {
    pub fn matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        )
    }
}

/// View and projection used to render and sample the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub view: Mat4,
    pub projection: Mat4,
}

impl LightSpace {
    pub fn new(light: &DirectionalLight, projection: &LightProjection) -> Self {
        Self {
            view: light.view_matrix(),
            projection: projection.matrix(),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Reprojects a world-space point into shadow-map coordinates.
    pub fn project(&self, world: Vec3) -> ShadowCoord {
        ShadowCoord::from_clip(self.view_projection() * world.extend(1.0))
    }
}

/// Position of a point inside the shadow map: texture coordinates with V
/// pointing down and depth in the target's [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCoord {
    pub uv: Vec2,
    pub depth: f32,
}

impl ShadowCoord {
    pub fn from_clip(clip: Vec4) -> Self {
        let ndc = clip.truncate() / clip.w;
        Self {
            uv: Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5),
            depth: ndc.z,
        }
    }

    /// Points outside the light frustum have no stored depth to compare
    /// against and are treated as lit.
    pub fn in_frustum(&self) -> bool {
        (0.0..=1.0).contains(&self.uv.x)
            && (0.0..=1.0).contains(&self.uv.y)
            && (0.0..=1.0).contains(&self.depth)
    }

    pub fn is_occluded(&self, stored_depth: f32, bias: f32) -> bool {
        self.in_frustum() && self.depth - bias > stored_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_space() -> LightSpace {
        LightSpace::new(&DirectionalLight::default(), &LightProjection::default())
    }

    #[test]
    fn light_matrices_are_pure() {
        let a = default_space();
        let b = default_space();
        assert_eq!(
            a.view.to_cols_array().map(f32::to_bits),
            b.view.to_cols_array().map(f32::to_bits)
        );
        assert_eq!(
            a.projection.to_cols_array().map(f32::to_bits),
            b.projection.to_cols_array().map(f32::to_bits)
        );
    }

    #[test]
    fn eye_sits_behind_the_direction() {
        let light = DirectionalLight::default();
        assert_eq!(light.eye(), Vec3::new(5.0, 5.0, -2.5));
        let origin = light.view_matrix().transform_point3(Vec3::ZERO);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
        assert!((origin.z + light.eye().length()).abs() < 1e-4);
    }

    #[test]
    fn origin_projects_to_box_center_horizontally() {
        let coord = default_space().project(Vec3::ZERO);
        assert!((coord.uv.x - 0.5).abs() < 1e-5);
        // y spans [-4, 3], so the origin sits 4/7 of the way up.
        assert!((coord.uv.y - (1.0 - 4.0 / 7.0)).abs() < 1e-5);
        let expected_depth = (DirectionalLight::default().eye().length() - 1.0) / 999.0;
        assert!((coord.depth - expected_depth).abs() < 1e-5);
        assert!(coord.in_frustum());
    }

    #[test]
    fn closer_points_have_smaller_depth() {
        let space = default_space();
        let light = DirectionalLight::default();
        let toward_light = -light.direction.truncate().normalize();
        let near = space.project(toward_light);
        let far = space.project(-toward_light);
        assert!(near.depth < far.depth);
    }

    #[test]
    fn occlusion_respects_bias_and_frustum() {
        let inside = ShadowCoord {
            uv: Vec2::splat(0.5),
            depth: 0.5,
        };
        assert!(inside.is_occluded(0.4, 0.001));
        assert!(!inside.is_occluded(0.4995, 0.001));
        assert!(!inside.is_occluded(0.6, 0.001));

        let outside = ShadowCoord {
            uv: Vec2::new(1.2, 0.5),
            depth: 0.5,
        };
        assert!(!outside.is_occluded(0.0, 0.0));
    }

    #[test]
    fn view_space_direction_keeps_zero_w() {
        let light = DirectionalLight::default();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0))
            * Mat4::from_rotation_x(0.3)
            * Mat4::from_rotation_y(1.1);
        let direction = light.direction_in(view);
        assert_eq!(direction.w, 0.0);
        assert!((direction.truncate().length() - light.direction.truncate().length()).abs() < 1e-5);
    }
}
