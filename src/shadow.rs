//! CPU rendition of the depth pass and of the shaded pass's shadow test.
//!
//! The rasterizer follows the GPU pipeline state used for the depth pass:
//! counter-clockwise front faces, back faces culled, nearest depth kept.
//! Fragments outside [0, 1] depth are clamped when the device supports
//! depth clamping and dropped otherwise, as the GPU would clip them. It
//! backs the headless report and lets the shadow classification be
//! checked without a GPU.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::light::{LightSpace, ShadowCoord};
use crate::mesh::MeshData;
use crate::render::Capabilities;

/// Depth image rendered from the light.
#[derive(Debug, Clone)]
pub struct SoftwareShadowMap {
    width: u32,
    height: u32,
    depth: Vec<f32>,
    space: LightSpace,
    depth_clamp: bool,
}

impl SoftwareShadowMap {
    /// Allocates a map cleared to the far plane, with depth clamping on.
    pub fn new(space: LightSpace, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            depth: vec![1.0; width as usize * height as usize],
            space,
            depth_clamp: true,
        }
    }

    pub fn with_depth_clamp(mut self, depth_clamp: bool) -> Self {
        self.depth_clamp = depth_clamp;
        self
    }

    /// Renders every caster into a fresh map the way a device with
    /// `capabilities` would.
    pub fn render<'a>(
        space: LightSpace,
        (width, height): (u32, u32),
        capabilities: Capabilities,
        casters: impl IntoIterator<Item = (&'a MeshData, Mat4)>,
    ) -> Self {
        let mut map =
            Self::new(space, width, height).with_depth_clamp(capabilities.depth_clamp);
        for (mesh, model) in casters {
            map.draw_mesh(mesh, model);
        }
        map
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn space(&self) -> &LightSpace {
        &self.space
    }

    pub fn draw_mesh(&mut self, mesh: &MeshData, model: Mat4) {
        let mvp = self.space.view_projection() * model;
        for triangle in mesh.triangles() {
            let clip = triangle.map(|p| mvp * p.extend(1.0));
            self.rasterize(clip);
        }
    }

    fn rasterize(&mut self, clip: [Vec4; 3]) {
        let ndc = clip.map(|c| c.truncate() / c.w);
        let ndc_area = edge(ndc[0].truncate(), ndc[1].truncate(), ndc[2].truncate());
        if ndc_area <= 0.0 {
            return;
        }

        let size = Vec2::new(self.width as f32, self.height as f32);
        let screen = ndc.map(|p| Vec2::new(p.x * 0.5 + 0.5, 0.5 - p.y * 0.5) * size);
        let depth = ndc.map(|p| p.z);
        let area = edge(screen[0], screen[1], screen[2]);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let min = screen[0].min(screen[1]).min(screen[2]).floor().max(Vec2::ZERO);
        let max = screen[0]
            .max(screen[1])
            .max(screen[2])
            .ceil()
            .min(size - Vec2::ONE);
        if min.x > max.x || min.y > max.y {
            return;
        }

        for y in min.y as u32..=max.y as u32 {
            for x in min.x as u32..=max.x as u32 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(screen[1], screen[2], p) / area;
                let w1 = edge(screen[2], screen[0], p) / area;
                let w2 = edge(screen[0], screen[1], p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let mut z = w0 * depth[0] + w1 * depth[1] + w2 * depth[2];
                if self.depth_clamp {
                    z = z.clamp(0.0, 1.0);
                } else if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                let idx = self.index(x, y);
                let texel = &mut self.depth[idx];
                if z < *texel {
                    *texel = z;
                }
            }
        }
    }

    /// Nearest-texel lookup with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2) -> f32 {
        let x = ((uv.x * self.width as f32).floor() as i64).clamp(0, self.width as i64 - 1);
        let y = ((uv.y * self.height as f32).floor() as i64).clamp(0, self.height as i64 - 1);
        self.depth[self.index(x as u32, y as u32)]
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn coord(&self, world: Vec3) -> ShadowCoord {
        self.space.project(world)
    }

    pub fn is_shadowed(&self, world: Vec3, bias: f32) -> bool {
        let coord = self.coord(world);
        coord.is_occluded(self.sample(coord.uv), bias)
    }

    /// Texels holding geometry, i.e. not left at the cleared far depth.
    pub fn covered_texels(&self) -> usize {
        self.depth.iter().filter(|&&d| d < 1.0).count()
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

/// Lit/shadowed tally over a grid of surface samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowCoverage {
    pub samples: usize,
    pub shadowed: usize,
}

impl ShadowCoverage {
    pub fn fraction(&self) -> f32 {
        if self.samples == 0 {
            0.0
        } else {
            self.shadowed as f32 / self.samples as f32
        }
    }
}

/// Samples the unit square `[-1, 1]²` of a plane mesh's local XZ space on
/// a `steps × steps` grid, transformed by `model`, and counts how many
/// samples the map classifies as shadowed.
pub fn plane_coverage(
    map: &SoftwareShadowMap,
    model: Mat4,
    steps: u32,
    bias: f32,
) -> ShadowCoverage {
    let steps = steps.max(2);
    let mut coverage = ShadowCoverage::default();
    for i in 0..steps {
        for j in 0..steps {
            let u = -1.0 + 2.0 * i as f32 / (steps - 1) as f32;
            let v = -1.0 + 2.0 * j as f32 / (steps - 1) as f32;
            let world = model.transform_point3(Vec3::new(u, 0.0, v));
            coverage.samples += 1;
            if map.is_shadowed(world, bias) {
                coverage.shadowed += 1;
            }
        }
    }
    coverage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLoader;
    use crate::config::ShadowConfig;
    use crate::light::{DirectionalLight, LightProjection};
    use crate::scene::{MeshId, Scene};

    const RESOLUTION: (u32, u32) = (400, 300);
    const BIAS: f32 = 1.0e-4;

    fn meshes() -> (MeshData, MeshData) {
        let loader = AssetLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"));
        (
            loader.mesh(MeshId::Cube).unwrap(),
            loader.mesh(MeshId::Plane).unwrap(),
        )
    }

    fn render(scene: &Scene, space: LightSpace) -> SoftwareShadowMap {
        let (cube, plane) = meshes();
        let draws = scene.model_matrices();
        SoftwareShadowMap::render(
            space,
            RESOLUTION,
            Capabilities { depth_clamp: true },
            draws.iter().map(|(mesh, model)| {
                let data = match mesh {
                    MeshId::Cube => &cube,
                    MeshId::Plane => &plane,
                };
                (data, *model)
            }),
        )
    }

    fn ground_model(scene: &Scene) -> Mat4 {
        scene
            .model_matrices()
            .into_iter()
            .find(|(mesh, _)| *mesh == MeshId::Plane)
            .map(|(_, model)| model)
            .unwrap()
    }

    fn default_space() -> LightSpace {
        let config = ShadowConfig::default();
        LightSpace::new(&config.light(), &config.projection)
    }

    #[test]
    fn plane_alone_is_never_shadowed() {
        let scene = Scene::demo().filtered(|o| o.mesh == MeshId::Plane);
        let map = render(&scene, default_space());
        assert!(map.covered_texels() > 0);
        let coverage = plane_coverage(&map, ground_model(&scene), 101, BIAS);
        assert_eq!(coverage.shadowed, 0, "{coverage:?}");
    }

    #[test]
    fn demo_scene_casts_shadows_on_the_ground() {
        let scene = Scene::demo();
        let map = render(&scene, default_space());
        let coverage = plane_coverage(&map, ground_model(&scene), 101, BIAS);
        assert!(coverage.shadowed > 0);
        assert!(coverage.shadowed < coverage.samples);
    }

    #[test]
    fn cube_outside_the_light_box_casts_no_shadow() {
        let scene =
            Scene::demo().filtered(|o| o.name == "floating cube" || o.mesh == MeshId::Plane);
        let light = DirectionalLight::default();
        let projection = LightProjection::default();

        let inside = render(&scene, LightSpace::new(&light, &projection));
        let ground = ground_model(&scene);
        assert!(plane_coverage(&inside, ground, 101, BIAS).shadowed > 0);

        let (cube, _) = meshes();
        let (_, cube_model) = scene.model_matrices()[0];
        let light_view = light.view_matrix() * cube_model;
        let max_x = (0..cube.vertex_count() as u32)
            .map(|i| light_view.transform_point3(cube.position(i)).x)
            .fold(f32::MIN, f32::max);
        let shifted = LightProjection {
            left: max_x + 0.5,
            right: max_x + 10.5,
            ..projection
        };
        let outside = render(&scene, LightSpace::new(&light, &shifted));
        assert_eq!(plane_coverage(&outside, ground, 101, BIAS).shadowed, 0);
    }

    #[test]
    fn back_facing_triangles_are_culled() {
        let space = default_space();
        let mut map = SoftwareShadowMap::new(space, 64, 64);
        let target = Vec3::ZERO;
        let light = DirectionalLight::default();
        let view = light.view_matrix();
        let inverse = view.inverse();
        let right = inverse.transform_vector3(Vec3::X);
        let up = inverse.transform_vector3(Vec3::Y);
        // Clockwise as seen from the light.
        let mesh = MeshData {
            vertices: [target, target + up, target + right]
                .iter()
                .flat_map(|p| [p.x, p.y, p.z, 0.0, 0.0, 1.0])
                .collect(),
            indices: vec![0, 1, 2],
        };
        map.draw_mesh(&mesh, Mat4::IDENTITY);
        assert_eq!(map.covered_texels(), 0);

        let flipped = MeshData {
            indices: vec![0, 2, 1],
            ..mesh
        };
        map.draw_mesh(&flipped, Mat4::IDENTITY);
        assert!(map.covered_texels() > 0);
    }

    #[test]
    fn sampling_clamps_to_edge() {
        let map = SoftwareShadowMap::new(default_space(), 4, 4);
        assert_eq!(map.sample(Vec2::new(-3.0, 9.0)), 1.0);
    }

    #[test]
    fn depth_clamp_keeps_casters_in_front_of_the_near_plane() {
        let light = DirectionalLight::default();
        let inverse = light.view_matrix().inverse();
        let right = inverse.transform_vector3(Vec3::X);
        let up = inverse.transform_vector3(Vec3::Y);
        // Half a unit from the eye, inside the near plane at 1.0.
        let target = light.eye() * (1.0 - 0.5 / light.eye().length());
        let mesh = MeshData {
            vertices: [target, target + right, target + up]
                .iter()
                .flat_map(|p| [p.x, p.y, p.z, 0.0, 0.0, 1.0])
                .collect(),
            indices: vec![0, 1, 2],
        };

        let casters = || [(&mesh, Mat4::IDENTITY)];
        let clamped = SoftwareShadowMap::render(
            default_space(),
            (64, 64),
            Capabilities { depth_clamp: true },
            casters(),
        );
        assert!(clamped.covered_texels() > 0);
        let centroid = target + (right + up) / 3.0;
        assert_eq!(clamped.sample(clamped.coord(centroid).uv), 0.0);

        let clipped = SoftwareShadowMap::render(
            default_space(),
            (64, 64),
            Capabilities { depth_clamp: false },
            casters(),
        );
        assert_eq!(clipped.covered_texels(), 0);
    }
}
