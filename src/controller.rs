//! Orbit camera state and the input transitions that drive it.

use glam::{Mat4, Vec3};

use crate::config::{ControlsConfig, KeyBindings};
use crate::input::{FrameInput, KeyCode};
use crate::light::LightSpace;

/// Vertical field of view of the orbit camera, in degrees.
pub const FIELD_OF_VIEW_DEG: f32 = 90.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 1000.0;
/// Radius is stored as a translation along -Z, so this is the closest the
/// camera may get to the origin.
pub const MAX_RADIUS: f32 = -4.0;
pub const PITCH_LIMIT_DEG: f32 = 90.0;

/// Orbit angles in degrees plus the (negative) orbit radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub x_rot: f32,
    pub y_rot: f32,
    pub radius: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            x_rot: 0.0,
            y_rot: 0.0,
            radius: MAX_RADIUS,
        }
    }
}

impl OrbitCamera {
    pub fn clamp(&mut self) {
        self.y_rot = self.y_rot.clamp(-PITCH_LIMIT_DEG, PITCH_LIMIT_DEG);
        self.radius = self.radius.min(MAX_RADIUS);
    }

    /// Translate back by the radius, then pitch, then yaw.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, self.radius))
            * Mat4::from_rotation_x(self.y_rot.to_radians())
            * Mat4::from_rotation_y(self.x_rot.to_radians())
    }
}

pub fn perspective(aspect: f32) -> Mat4 {
    Mat4::perspective_rh(
        FIELD_OF_VIEW_DEG.to_radians(),
        aspect.max(0.01),
        CAMERA_NEAR,
        CAMERA_FAR,
    )
}

/// View and projection handed to the shaded pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Side effects the frame loop has to carry out after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    PointerGrabChanged(bool),
    ViewToggled(bool),
    Quit,
}

/// Maps pointer, wheel and key input onto the camera and view flags.
#[derive(Debug, Clone)]
pub struct InteractionController {
    pub camera: OrbitCamera,
    pub pointer_grabbed: bool,
    pub show_light_perspective: bool,
    rotate_speed: f32,
    zoom_step: f32,
    keys: KeyBindings,
}

impl InteractionController {
    pub fn new(controls: &ControlsConfig, keys: KeyBindings) -> Self {
        Self {
            camera: OrbitCamera::default(),
            pointer_grabbed: true,
            show_light_perspective: false,
            rotate_speed: controls.rotate_speed,
            zoom_step: controls.zoom_step,
            keys,
        }
    }

    /// Applies one frame of input. Key presses are handled in order and
    /// the events they cause are returned.
    pub fn update(&mut self, input: &FrameInput) -> Vec<ControllerEvent> {
        let events: Vec<_> = input
            .pressed
            .iter()
            .filter_map(|&key| self.key_pressed(key))
            .collect();

        self.camera.x_rot += input.pointer_delta.x * self.rotate_speed;
        // Device Y grows downward, which already inverts the pitch.
        self.camera.y_rot += input.pointer_delta.y * self.rotate_speed;
        self.camera.radius += input.wheel_ticks * self.zoom_step;
        self.camera.clamp();
        events
    }

    pub fn key_pressed(&mut self, key: KeyCode) -> Option<ControllerEvent> {
        if key == self.keys.grab {
            self.pointer_grabbed = !self.pointer_grabbed;
            Some(ControllerEvent::PointerGrabChanged(self.pointer_grabbed))
        } else if key == self.keys.toggle_view {
            self.show_light_perspective = !self.show_light_perspective;
            Some(ControllerEvent::ViewToggled(self.show_light_perspective))
        } else if key == self.keys.quit {
            Some(ControllerEvent::Quit)
        } else {
            None
        }
    }

    /// Picks the camera for the shaded pass: the light's own matrices when
    /// viewing from the light, otherwise the orbit camera.
    pub fn camera_matrices(&self, light: &LightSpace, aspect: f32) -> CameraMatrices {
        if self.show_light_perspective {
            CameraMatrices {
                view: light.view,
                projection: light.projection,
            }
        } else {
            CameraMatrices {
                view: self.camera.view_matrix(),
                projection: perspective(aspect),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::config::DemoConfig;
    use crate::input::NamedKey;
    use crate::light::{DirectionalLight, LightProjection};

    fn controller() -> InteractionController {
        let controls = DemoConfig::default().controls;
        let keys = controls.key_bindings().unwrap();
        InteractionController::new(&controls, keys)
    }

    fn motion(dx: f32, dy: f32) -> FrameInput {
        FrameInput {
            pointer_delta: Vec2::new(dx, dy),
            ..FrameInput::default()
        }
    }

    #[test]
    fn pointer_motion_is_scaled_by_half() {
        let mut c = controller();
        c.update(&motion(10.0, 4.0));
        assert_eq!(c.camera.x_rot, 5.0);
        assert_eq!(c.camera.y_rot, 2.0);
    }

    #[test]
    fn pitch_stays_within_limits_for_any_motion() {
        let mut c = controller();
        for dy in [-1.0e6, -500.0, -3.0, 0.0, 7.5, 250.0, 1.0e6] {
            c.update(&motion(0.0, dy));
            assert!((-90.0..=90.0).contains(&c.camera.y_rot), "y_rot {}", c.camera.y_rot);
            let once = c.camera;
            c.camera.clamp();
            assert_eq!(c.camera, once);
        }
    }

    #[test]
    fn radius_never_exceeds_minimum_distance() {
        let mut c = controller();
        for ticks in [1.0, 50.0, -3.0, -1.0e4, 2.0, 1.0e4] {
            c.update(&FrameInput {
                wheel_ticks: ticks,
                ..FrameInput::default()
            });
            assert!(c.camera.radius <= MAX_RADIUS, "radius {}", c.camera.radius);
        }
    }

    #[test]
    fn each_wheel_tick_moves_half_a_unit() {
        let mut c = controller();
        c.update(&FrameInput {
            wheel_ticks: -3.0,
            ..FrameInput::default()
        });
        assert_eq!(c.camera.radius, -5.5);
        c.update(&FrameInput {
            wheel_ticks: 1.0,
            ..FrameInput::default()
        });
        assert_eq!(c.camera.radius, -5.0);
    }

    #[test]
    fn keys_toggle_grab_and_view() {
        let mut c = controller();
        let events = c.update(&FrameInput {
            pressed: vec![
                KeyCode::Named(NamedKey::Space),
                KeyCode::Character('C'),
                KeyCode::Character('Q'),
            ],
            ..FrameInput::default()
        });
        assert_eq!(
            events,
            vec![
                ControllerEvent::PointerGrabChanged(false),
                ControllerEvent::ViewToggled(true),
            ]
        );
        assert!(!c.pointer_grabbed);
        assert!(c.show_light_perspective);
    }

    #[test]
    fn light_perspective_reuses_light_matrices_exactly() {
        let light = LightSpace::new(&DirectionalLight::default(), &LightProjection::default());
        let mut c = controller();
        c.update(&motion(37.0, -12.0));
        let orbit = c.camera_matrices(&light, 4.0 / 3.0);
        assert_ne!(orbit.view, light.view);

        c.key_pressed(KeyCode::Character('C'));
        let from_light = c.camera_matrices(&light, 4.0 / 3.0);
        assert_eq!(from_light.view, light.view);
        assert_eq!(from_light.projection, light.projection);
    }

    #[test]
    fn orbit_view_places_camera_at_radius() {
        let camera = OrbitCamera {
            x_rot: 30.0,
            y_rot: -20.0,
            radius: -6.0,
        };
        let eye = camera.view_matrix().inverse().transform_point3(Vec3::ZERO);
        assert!((eye.length() - 6.0).abs() < 1e-4);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -6.0)).length() < 1e-5);
    }
}
