//! Demo configuration: built-in defaults, an optional RON file and
//! command-line overrides, applied in that order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::input::KeyCode;
use crate::light::{DirectionalLight, LightProjection};

pub const USAGE: &str = "Usage: shadow-demo [--config FILE.ron] [--assets DIR] \
[--shadow-resolution WxH] [--fps N] [--headless] [--help]";

/// Largest accepted shadow map side, matching common GPU 2D texture limits.
pub const MAX_SHADOW_DIMENSION: u32 = 16384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub assets_dir: PathBuf,
    pub window: WindowConfig,
    pub shadow: ShadowConfig,
    pub controls: ControlsConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            window: WindowConfig::default(),
            shadow: ShadowConfig::default(),
            controls: ControlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Frame-rate cap; 0 renders as fast as possible.
    pub fps: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Shadow Test".to_string(),
            width: 800,
            height: 600,
            fps: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Shadow map size in texels (width, height).
    pub resolution: (u32, u32),
    /// Tolerance, in shadow-map depth units, subtracted from a fragment's
    /// light-space depth before comparing it with the stored depth.
    pub depth_bias: f32,
    pub light_direction: Vec3,
    pub projection: LightProjection,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: (1600, 1200),
            depth_bias: 1.0e-4,
            light_direction: Vec3::new(-1.0, -1.0, 0.5),
            projection: LightProjection::default(),
        }
    }
}

impl ShadowConfig {
    pub fn light(&self) -> DirectionalLight {
        DirectionalLight::new(self.light_direction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Degrees of orbit per unit of pointer motion.
    pub rotate_speed: f32,
    /// Radius change per wheel tick.
    pub zoom_step: f32,
    pub grab_key: String,
    pub toggle_view_key: String,
    pub quit_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.5,
            zoom_step: 0.5,
            grab_key: "Space".to_string(),
            toggle_view_key: "C".to_string(),
            quit_key: "Escape".to_string(),
        }
    }
}

/// Key bindings resolved from [`ControlsConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub grab: KeyCode,
    pub toggle_view: KeyCode,
    pub quit: KeyCode,
}

impl ControlsConfig {
    pub fn key_bindings(&self) -> Result<KeyBindings> {
        let resolve = |name: &str| {
            KeyCode::from_name(name).ok_or_else(|| anyhow!("unknown key name {name:?}"))
        };
        Ok(KeyBindings {
            grab: resolve(&self.grab_key)?,
            toggle_view: resolve(&self.toggle_view_key)?,
            quit: resolve(&self.quit_key)?,
        })
    }
}

impl DemoConfig {
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).context("invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        Self::from_ron_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Rejects values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.shadow.resolution;
        if width == 0 || height == 0 {
            bail!("shadow resolution must be non-zero, got {width}x{height}");
        }
        if width > MAX_SHADOW_DIMENSION || height > MAX_SHADOW_DIMENSION {
            bail!(
                "shadow resolution {width}x{height} exceeds the {MAX_SHADOW_DIMENSION} texel limit per side"
            );
        }
        if self.window.width == 0 || self.window.height == 0 {
            bail!("window size must be non-zero");
        }
        if self.shadow.light_direction.length_squared() <= f32::EPSILON {
            bail!("light direction must not be zero");
        }
        let p = &self.shadow.projection;
        if p.left >= p.right || p.bottom >= p.top || p.near >= p.far {
            bail!("light projection bounds are empty: {p:?}");
        }
        if !(self.shadow.depth_bias >= 0.0) {
            bail!("depth bias must be non-negative");
        }
        self.controls.key_bindings()?;
        Ok(())
    }
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: DemoConfig,
    pub headless: bool,
    /// `--help` was given; the caller prints `USAGE` and exits.
    pub help: bool,
}

impl CliOptions {
    pub fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut config_path = None;
        let mut assets_dir = None;
        let mut resolution = None;
        let mut fps = None;
        let mut headless = false;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--config" => config_path = Some(PathBuf::from(value("--config")?)),
                "--assets" => assets_dir = Some(PathBuf::from(value("--assets")?)),
                "--shadow-resolution" => {
                    resolution = Some(parse_resolution(&value("--shadow-resolution")?)?)
                }
                "--fps" => {
                    let raw = value("--fps")?;
                    fps = Some(
                        raw.parse::<u32>()
                            .with_context(|| format!("invalid --fps value {raw:?}"))?,
                    );
                }
                "--headless" => headless = true,
                "--help" | "-h" => {
                    return Ok(Self {
                        config: DemoConfig::default(),
                        headless,
                        help: true,
                    })
                }
                other => bail!("Unknown argument: {other}\n{USAGE}"),
            }
        }

        let mut config = match config_path {
            Some(path) => DemoConfig::load(&path)?,
            None => DemoConfig::default(),
        };
        if let Some(dir) = assets_dir {
            config.assets_dir = dir;
        }
        if let Some(resolution) = resolution {
            config.shadow.resolution = resolution;
        }
        if let Some(fps) = fps {
            config.window.fps = fps;
        }
        config.validate()?;

        Ok(Self {
            config,
            headless,
            help: false,
        })
    }
}

fn parse_resolution(text: &str) -> Result<(u32, u32)> {
    let (width, height) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("resolution must look like 1600x1200, got {text:?}"))?;
    let width = width
        .trim()
        .parse()
        .with_context(|| format!("invalid resolution width in {text:?}"))?;
    let height = height
        .trim()
        .parse()
        .with_context(|| format!("invalid resolution height in {text:?}"))?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::input::NamedKey;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_the_demo() {
        let config = DemoConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.shadow.resolution, (1600, 1200));
        assert_eq!(config.shadow.projection, LightProjection::default());
        let keys = config.controls.key_bindings().unwrap();
        assert_eq!(keys.grab, KeyCode::Named(NamedKey::Space));
        assert_eq!(keys.toggle_view, KeyCode::Character('C'));
        config.validate().unwrap();
    }

    #[test]
    fn command_line_overrides_defaults() {
        let options = CliOptions::parse_from(args(&[
            "--assets",
            "/tmp/demo-assets",
            "--shadow-resolution",
            "3200x2400",
            "--fps",
            "60",
            "--headless",
        ]))
        .unwrap();
        assert!(options.headless);
        assert_eq!(options.config.assets_dir, PathBuf::from("/tmp/demo-assets"));
        assert_eq!(options.config.shadow.resolution, (3200, 2400));
        assert_eq!(options.config.window.fps, 60);
    }

    #[test]
    fn rejects_unknown_flags_and_bad_values() {
        assert!(CliOptions::parse_from(args(&["--bogus"])).is_err());
        assert!(CliOptions::parse_from(args(&["--shadow-resolution", "big"])).is_err());
        assert!(CliOptions::parse_from(args(&["--shadow-resolution", "0x10"])).is_err());
        assert!(CliOptions::parse_from(args(&["--fps"])).is_err());
        let err = CliOptions::parse_from(args(&[
            "--headless",
            "--shadow-resolution",
            "70000x70000",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("16384"), "{err}");
        assert!(CliOptions::parse_from(args(&["--shadow-resolution", "16385x16"])).is_err());
        assert!(CliOptions::parse_from(args(&["--shadow-resolution", "16384x16"])).is_ok());
    }

    #[test]
    fn help_flag_is_not_an_error() {
        let options = CliOptions::parse_from(args(&["--headless", "--help", "--bogus"])).unwrap();
        assert!(options.help);
        assert!(!CliOptions::parse_from(args(&["--headless"])).unwrap().help);
    }

    #[test]
    fn ron_file_sets_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(
                shadow: (
                    resolution: (800, 600),
                    depth_bias: 0.0005,
                ),
                controls: (toggle_view_key: "V"),
            )"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();
        let options = CliOptions::parse_from(args(&["--config", &path])).unwrap();
        let config = options.config;
        assert_eq!(config.shadow.resolution, (800, 600));
        assert_eq!(config.shadow.depth_bias, 0.0005);
        assert_eq!(config.shadow.light_direction, Vec3::new(-1.0, -1.0, 0.5));
        assert_eq!(
            config.controls.key_bindings().unwrap().toggle_view,
            KeyCode::Character('V')
        );
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn empty_projection_box_is_invalid() {
        let mut config = DemoConfig::default();
        config.shadow.projection.left = 5.0;
        assert!(config.validate().is_err());
    }
}
