//! Demo state shared by the windowed loop and the headless report.

use std::fmt;

use anyhow::Result;
use glam::{Mat4, Vec4};

use crate::assets::DemoAssets;
use crate::config::DemoConfig;
use crate::controller::{ControllerEvent, InteractionController};
use crate::input::{FrameInput, KeyCode};
use crate::light::{DirectionalLight, LightProjection, LightSpace};
use crate::render::{Capabilities, FrameState};
use crate::scene::{MeshId, Scene};
use crate::shadow::{plane_coverage, ShadowCoverage, SoftwareShadowMap};

/// Grid resolution used to sample the ground plane in reports.
pub const COVERAGE_STEPS: u32 = 101;

/// Device the headless report models. Depth clamping is on so casters
/// crossing the light's near plane still land in the map.
pub const REPORT_CAPABILITIES: Capabilities = Capabilities { depth_clamp: true };

/// Scene, light and camera controller driven by the frame loop through
/// `update`, `frame` and `key_pressed`.
#[derive(Debug, Clone)]
pub struct ShadowDemo {
    config: DemoConfig,
    scene: Scene,
    light: DirectionalLight,
    projection: LightProjection,
    controller: InteractionController,
}

impl ShadowDemo {
    pub fn new(config: DemoConfig) -> Result<Self> {
        let keys = config.controls.key_bindings()?;
        Ok(Self {
            scene: Scene::demo(),
            light: config.shadow.light(),
            projection: config.shadow.projection,
            controller: InteractionController::new(&config.controls, keys),
            config,
        })
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Recomputed on every call from the fixed light.
    pub fn light_space(&self) -> LightSpace {
        LightSpace::new(&self.light, &self.projection)
    }

    pub fn update(&mut self, input: &FrameInput) -> Vec<ControllerEvent> {
        self.controller.update(input)
    }

    pub fn key_pressed(&mut self, key: KeyCode) -> Option<ControllerEvent> {
        self.controller.key_pressed(key)
    }

    /// Inputs of the next rendered frame for a viewport of `aspect`.
    pub fn frame(&self, aspect: f32) -> FrameState<'_> {
        let light_space = self.light_space();
        FrameState {
            scene: &self.scene,
            camera: self.controller.camera_matrices(&light_space, aspect),
            light_space,
            light_direction: self.light.direction,
            depth_bias: self.config.shadow.depth_bias,
        }
    }

    /// Renders the depth pass in software and classifies the ground.
    pub fn report(&self, assets: &DemoAssets) -> HeadlessReport {
        let light_space = self.light_space();
        let models = self.scene.model_matrices();
        let map = SoftwareShadowMap::render(
            light_space,
            self.config.shadow.resolution,
            REPORT_CAPABILITIES,
            models.iter().map(|(mesh, model)| (assets.mesh(*mesh), *model)),
        );
        let bias = self.config.shadow.depth_bias;
        let ground = models
            .iter()
            .find(|(mesh, _)| *mesh == MeshId::Plane)
            .map(|(_, model)| plane_coverage(&map, *model, COVERAGE_STEPS, bias))
            .unwrap_or_default();

        HeadlessReport {
            objects: self
                .scene
                .objects()
                .map(|object| (object.name, object.mesh))
                .collect(),
            light_direction: self.light.direction,
            light_space,
            resolution: map.size(),
            covered_texels: map.covered_texels(),
            ground,
        }
    }
}

/// Text summary printed by `--headless`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessReport {
    pub objects: Vec<(&'static str, MeshId)>,
    pub light_direction: Vec4,
    pub light_space: LightSpace,
    pub resolution: (u32, u32),
    pub covered_texels: usize,
    pub ground: ShadowCoverage,
}

impl fmt::Display for HeadlessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Loaded scene with {} objects", self.objects.len())?;
        for (name, mesh) in &self.objects {
            writeln!(f, " - {name} ({})", mesh.name())?;
        }
        let d = self.light_direction;
        writeln!(f, "Light direction: ({:.2}, {:.2}, {:.2})", d.x, d.y, d.z)?;
        write_matrix(f, "Light view", &self.light_space.view)?;
        write_matrix(f, "Light projection", &self.light_space.projection)?;
        let (width, height) = self.resolution;
        writeln!(
            f,
            "Shadow map {width}x{height}: {} texels covered",
            self.covered_texels
        )?;
        write!(
            f,
            "Ground plane: shadowed {} of {} samples ({:.1}%)",
            self.ground.shadowed,
            self.ground.samples,
            self.ground.fraction() * 100.0
        )
    }
}

fn write_matrix(f: &mut fmt::Formatter<'_>, label: &str, matrix: &Mat4) -> fmt::Result {
    writeln!(f, "{label}:")?;
    for row in 0..4 {
        let r = matrix.row(row);
        writeln!(f, "  [{:9.4} {:9.4} {:9.4} {:9.4}]", r.x, r.y, r.z, r.w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLoader;

    fn demo() -> ShadowDemo {
        let mut config = DemoConfig::default();
        config.shadow.resolution = (400, 300);
        ShadowDemo::new(config).unwrap()
    }

    fn assets() -> DemoAssets {
        AssetLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))
            .load_all()
            .unwrap()
    }

    #[test]
    fn report_lists_objects_and_finds_a_shadow() {
        let report = demo().report(&assets());
        assert_eq!(report.objects.len(), 4);
        assert_eq!(report.resolution, (400, 300));
        assert!(report.covered_texels > 0);
        assert!(report.ground.shadowed > 0);
        assert_eq!(report.ground.samples, (COVERAGE_STEPS * COVERAGE_STEPS) as usize);

        let text = report.to_string();
        assert!(text.starts_with("Loaded scene with 4 objects"));
        assert!(text.contains(" - ground (plane)"));
        assert!(text.contains("Light projection:"));
    }

    #[test]
    fn frame_uses_light_matrices_when_toggled() {
        let mut demo = demo();
        let orbit = demo.frame(4.0 / 3.0).camera;
        assert_ne!(orbit.view, demo.light_space().view);

        demo.key_pressed(KeyCode::Character('C'));
        let frame = demo.frame(4.0 / 3.0);
        assert_eq!(frame.camera.view, frame.light_space.view);
        assert_eq!(frame.camera.projection, frame.light_space.projection);
        assert_eq!(frame.depth_bias, demo.config().shadow.depth_bias);
    }

    #[test]
    fn update_moves_the_orbit_camera() {
        let mut demo = demo();
        let mut input = FrameInput::new();
        input.add_pointer_motion(20.0, 0.0);
        demo.update(&input.take());
        assert_eq!(demo.controller().camera.x_rot, 10.0);
    }
}
