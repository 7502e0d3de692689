//! Shadow-mapping demo.
//!
//! A depth pass renders the scene from a directional light into an
//! off-screen depth texture; a shaded pass renders it again from an orbit
//! camera and compares each fragment's light-space depth with the stored
//! one. Everything above the GPU layer (scene, light space, camera
//! controller, software depth pass) is plain data and can be used
//! without a window.

pub mod app;
pub mod assets;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod light;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod shadow;
pub mod transform;

pub use app::{HeadlessReport, ShadowDemo};
pub use assets::{AssetLoader, DemoAssets, ShaderSources};
pub use config::{CliOptions, DemoConfig};
pub use controller::{CameraMatrices, ControllerEvent, InteractionController, OrbitCamera};
pub use error::{InitError, ResourceError};
pub use input::{FrameInput, KeyCode, NamedKey};
pub use light::{DirectionalLight, LightProjection, LightSpace, ShadowCoord};
pub use mesh::MeshData;
pub use render::{Capabilities, FrameState, Renderer};
pub use scene::{Material, MeshId, Scene, SceneObject};
pub use shadow::SoftwareShadowMap;
pub use transform::{MatrixStack, TransformOp};
