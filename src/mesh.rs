use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};

/// Floats per interleaved vertex: `position.xyz` followed by `normal.xyz`.
pub const VERTEX_STRIDE: usize = 6;

/// Indexed triangle list with interleaved position/normal vertices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn position(&self, index: u32) -> Vec3 {
        let start = index as usize * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    pub fn normal(&self, index: u32) -> Vec3 {
        let start = index as usize * VERTEX_STRIDE + 3;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    /// Iterates the triangles as vertex positions.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|tri| {
            [
                self.position(tri[0]),
                self.position(tri[1]),
                self.position(tri[2]),
            ]
        })
    }

    /// Parses the XML mesh format: `<attribute index=".." size="3">`
    /// float arrays (index 0 = position, 1 = normal) and an
    /// `<indices cmd="triangles">` list.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid mesh XML")?;
        let root = document.root_element();
        if !root.has_tag_name("mesh") {
            bail!("root element must be <mesh>, found <{}>", root.tag_name().name());
        }

        let mut positions = None;
        let mut normals = None;
        let mut indices = Vec::new();

        for node in root.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "attribute" => {
                    let index: u32 = attribute_value(&node, "index")?
                        .parse()
                        .context("attribute index is not an integer")?;
                    let size: usize = attribute_value(&node, "size")?
                        .parse()
                        .context("attribute size is not an integer")?;
                    if size != 3 {
                        bail!("attribute {index} has size {size}, expected 3");
                    }
                    let values = parse_floats(node.text().unwrap_or_default())
                        .with_context(|| format!("attribute {index} has invalid data"))?;
                    if values.len() % 3 != 0 {
                        bail!("attribute {index} length is not a multiple of 3");
                    }
                    let values: Vec<Vec3> = values.chunks_exact(3).map(Vec3::from_slice).collect();
                    match index {
                        0 => positions = Some(values),
                        1 => normals = Some(values),
                        _ => {}
                    }
                }
                "indices" => {
                    let cmd = attribute_value(&node, "cmd")?;
                    if cmd != "triangles" {
                        bail!("unsupported primitive command {cmd:?}");
                    }
                    for token in node.text().unwrap_or_default().split_whitespace() {
                        indices.push(
                            token
                                .parse::<u32>()
                                .with_context(|| format!("invalid index {token:?}"))?,
                        );
                    }
                }
                _ => {}
            }
        }

        let positions = positions.ok_or_else(|| anyhow!("mesh has no position attribute"))?;
        let normals = normals.ok_or_else(|| anyhow!("mesh has no normal attribute"))?;
        if positions.len() != normals.len() {
            bail!(
                "position and normal counts differ ({} vs {})",
                positions.len(),
                normals.len()
            );
        }
        if indices.len() % 3 != 0 {
            bail!("index count {} is not a multiple of 3", indices.len());
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            bail!("index {bad} is out of range for {} vertices", positions.len());
        }

        let mut vertices = Vec::with_capacity(positions.len() * VERTEX_STRIDE);
        for (position, normal) in positions.iter().zip(&normals) {
            vertices.extend_from_slice(&position.to_array());
            vertices.extend_from_slice(&normal.to_array());
        }
        Ok(Self { vertices, indices })
    }

    /// Parses a Wavefront OBJ file. Missing normals are computed from the
    /// face geometry.
    pub fn from_obj(data: &str) -> Result<Self> {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut corners: Vec<ObjCorner> = Vec::new();

        for (line_no, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => positions.push(
                    parse_obj_vec3(parts)
                        .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
                ),
                Some("vn") => normals.push(
                    parse_obj_vec3(parts)
                        .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
                ),
                Some("f") => {
                    let polygon = parts
                        .map(ObjCorner::parse)
                        .collect::<Result<Vec<_>>>()
                        .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                    if polygon.len() < 3 {
                        bail!("face on line {} has fewer than 3 corners", line_no + 1);
                    }
                    for i in 1..polygon.len() - 1 {
                        corners.extend([polygon[0], polygon[i], polygon[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if positions.is_empty() {
            bail!("OBJ file does not define any vertices");
        }

        let mut lookup: HashMap<(usize, Option<usize>), u32> = HashMap::new();
        let mut mesh = Self::default();
        for corner in corners {
            let position = resolve_obj_index(corner.position, positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", corner.position))?;
            let normal = resolve_obj_index(corner.normal, normals.len());
            let next = mesh.vertex_count() as u32;
            let index = *lookup.entry((position, normal)).or_insert_with(|| {
                mesh.vertices.extend_from_slice(&positions[position].to_array());
                let n = normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                mesh.vertices.extend_from_slice(&n.to_array());
                next
            });
            mesh.indices.push(index);
        }

        if (0..mesh.vertex_count() as u32).any(|i| mesh.normal(i) == Vec3::ZERO) {
            mesh.compute_normals();
        }
        Ok(mesh)
    }

    /// Fills in the vertices left without a normal; supplied ones are kept.
    fn compute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertex_count()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| self.position(i));
            let face = (b - a).cross(c - a);
            if face.length_squared() > f32::EPSILON {
                let face = face.normalize();
                for &i in tri {
                    accum[i as usize] += face;
                }
            }
        }
        for (i, normal) in accum.into_iter().enumerate() {
            if self.normal(i as u32) != Vec3::ZERO {
                continue;
            }
            let start = i * VERTEX_STRIDE + 3;
            self.vertices[start..start + 3].copy_from_slice(&normal.normalize_or_zero().to_array());
        }
    }
}

fn attribute_value<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name)
        .ok_or_else(|| anyhow!("<{}> is missing the {name:?} attribute", node.tag_name().name()))
}

fn parse_floats(text: &str) -> Result<Vec<f32>> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .with_context(|| format!("invalid float {token:?}"))
        })
        .collect()
}

fn parse_obj_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

#[derive(Debug, Clone, Copy)]
struct ObjCorner {
    position: i32,
    normal: i32,
}

impl ObjCorner {
    /// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`.
    fn parse(token: &str) -> Result<Self> {
        let mut fields = token.split('/');
        let position = fields
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let _texcoord = fields.next();
        let normal = match fields.next() {
            Some(field) if !field.is_empty() => field.parse::<i32>()?,
            _ => 0,
        };
        Ok(Self { position, normal })
    }
}

/// OBJ indices are 1-based; negative values count back from the end.
fn resolve_obj_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }
}
