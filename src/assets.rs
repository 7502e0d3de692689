use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::ResourceError;
use crate::mesh::MeshData;
use crate::scene::MeshId;

/// WGSL sources for the two programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub shaded_vertex: String,
    pub shaded_fragment: String,
    pub depth_vertex: String,
    pub depth_fragment: String,
}

/// Everything read from disk at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoAssets {
    pub cube: MeshData,
    pub plane: MeshData,
    pub shaders: ShaderSources,
}

impl DemoAssets {
    pub fn mesh(&self, id: MeshId) -> &MeshData {
        match id {
            MeshId::Cube => &self.cube,
            MeshId::Plane => &self.plane,
        }
    }
}

/// Reads meshes from `<root>/meshes` and shaders from `<root>/shaders`.
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads every asset the demo needs. Any failure is fatal to the caller.
    pub fn load_all(&self) -> Result<DemoAssets, ResourceError> {
        Ok(DemoAssets {
            cube: self.mesh(MeshId::Cube)?,
            plane: self.mesh(MeshId::Plane)?,
            shaders: ShaderSources {
                shaded_vertex: self.shader("shaded.vert.wgsl")?,
                shaded_fragment: self.shader("shaded.frag.wgsl")?,
                depth_vertex: self.shader("depth.vert.wgsl")?,
                depth_fragment: self.shader("depth.frag.wgsl")?,
            },
        })
    }

    /// Loads `meshes/<name>.xml`, falling back to `meshes/<name>.obj`.
    pub fn mesh(&self, id: MeshId) -> Result<MeshData, ResourceError> {
        let dir = self.root.join("meshes");
        let xml = dir.join(format!("{}.xml", id.name()));
        let path = if xml.exists() {
            xml
        } else {
            dir.join(format!("{}.obj", id.name()))
        };
        load_mesh(&path)
    }

    pub fn shader(&self, file_name: &str) -> Result<String, ResourceError> {
        read_text(&self.root.join("shaders").join(file_name))
    }
}

/// Parses a mesh file, choosing the format from its extension.
pub fn load_mesh(path: &Path) -> Result<MeshData, ResourceError> {
    let parse: fn(&str) -> anyhow::Result<MeshData> =
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("xml") => MeshData::from_xml,
            Some("obj") => MeshData::from_obj,
            _ => return Err(ResourceError::UnsupportedFormat(path.to_path_buf())),
        };
    let text = read_text(path)?;
    let mesh = parse(&text).map_err(|err| ResourceError::Mesh {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    })?;
    debug!(
        "loaded mesh {} ({} vertices, {} triangles)",
        path.display(),
        mesh.vertex_count(),
        mesh.indices.len() / 3
    );
    Ok(mesh)
}

fn read_text(path: &Path) -> Result<String, ResourceError> {
    fs::read_to_string(path).map_err(|source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
