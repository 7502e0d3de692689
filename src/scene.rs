use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::transform::{MatrixStack, TransformOp};

/// Meshes the demo knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshId {
    Cube,
    Plane,
}

impl MeshId {
    pub const ALL: [MeshId; 2] = [MeshId::Cube, MeshId::Plane];

    /// File stem of the mesh under the assets directory.
    pub fn name(self) -> &'static str {
        match self {
            MeshId::Cube => "cube",
            MeshId::Plane => "plane",
        }
    }
}

/// Surface colors of an object. The ambient term is a tenth of the diffuse
/// color with a zero alpha so that lit and ambient contributions add up to
/// an opaque result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: Vec4,
    pub ambient: Vec4,
}

impl Material {
    pub fn from_rgb(rgb: Vec3) -> Self {
        Self {
            diffuse: rgb.extend(1.0),
            ambient: (rgb * 0.1).extend(0.0),
        }
    }
}

/// One drawable instance: which mesh, where, and with which colors.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: &'static str,
    pub mesh: MeshId,
    pub transform: Vec<TransformOp>,
    pub material: Material,
}

/// Objects sharing a parent transform.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneGroup {
    pub transform: Vec<TransformOp>,
    pub objects: Vec<SceneObject>,
}

/// Fixed scene description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub groups: Vec<SceneGroup>,
}

/// Everything a shader binding may need to know about an object at draw
/// time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDraw {
    pub model: Mat4,
    pub material: Material,
}

impl ObjectDraw {
    /// Inverse-transpose of the upper-left 3x3 of the model matrix.
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.model).inverse().transpose()
    }
}

impl Scene {
    /// Three blue cubes and a yellow ground plane.
    pub fn demo() -> Self {
        let cube = Material::from_rgb(Vec3::new(0.1, 0.3, 0.9));
        let plane = Material::from_rgb(Vec3::new(0.9, 0.9, 0.0));
        Self {
            groups: vec![
                SceneGroup {
                    transform: vec![TransformOp::Translate(Vec3::new(0.0, 0.0, -1.0))],
                    objects: vec![
                        SceneObject {
                            name: "center cube",
                            mesh: MeshId::Cube,
                            transform: Vec::new(),
                            material: cube,
                        },
                        SceneObject {
                            name: "side cube",
                            mesh: MeshId::Cube,
                            transform: vec![
                                TransformOp::Translate(Vec3::new(2.0, 0.0, 2.0)),
                                TransformOp::RotateDeg {
                                    angle: 45.0,
                                    axis: Vec3::Y,
                                },
                            ],
                            material: cube,
                        },
                        SceneObject {
                            name: "floating cube",
                            mesh: MeshId::Cube,
                            transform: vec![
                                TransformOp::Translate(Vec3::new(1.0, 2.0, 1.0)),
                                TransformOp::RotateDeg {
                                    angle: 20.0,
                                    axis: Vec3::Y,
                                },
                            ],
                            material: cube,
                        },
                    ],
                },
                SceneGroup {
                    transform: Vec::new(),
                    objects: vec![SceneObject {
                        name: "ground",
                        mesh: MeshId::Plane,
                        transform: vec![
                            TransformOp::Translate(Vec3::new(0.0, -1.01, 0.0)),
                            TransformOp::Scale(Vec3::splat(5.0)),
                        ],
                        material: plane,
                    }],
                },
            ],
        }
    }

    /// Same scene with only the objects accepted by `keep`.
    pub fn filtered(&self, keep: impl Fn(&SceneObject) -> bool) -> Self {
        Self {
            groups: self
                .groups
                .iter()
                .map(|group| SceneGroup {
                    transform: group.transform.clone(),
                    objects: group.objects.iter().filter(|o| keep(o)).cloned().collect(),
                })
                .filter(|group| !group.objects.is_empty())
                .collect(),
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.groups.iter().flat_map(|group| group.objects.iter())
    }

    pub fn object_count(&self) -> usize {
        self.groups.iter().map(|group| group.objects.len()).sum()
    }

    /// Walks every object with its accumulated model matrix. Each object
    /// is visited inside its own push/pop scope nested in its group's
    /// scope; the stack depth seen before and after every object is the
    /// same.
    pub fn draw(&self, stack: &mut MatrixStack, mut visit: impl FnMut(&SceneObject, ObjectDraw)) {
        for group in &self.groups {
            stack.scope(|stack| {
                for op in &group.transform {
                    stack.apply(op);
                }
                for object in &group.objects {
                    let depth = stack.depth();
                    stack.scope(|stack| {
                        for op in &object.transform {
                            stack.apply(op);
                        }
                        visit(
                            object,
                            ObjectDraw {
                                model: stack.top(),
                                material: object.material,
                            },
                        );
                    });
                    debug_assert_eq!(stack.depth(), depth);
                }
            });
        }
    }

    /// Model matrices in draw order.
    pub fn model_matrices(&self) -> Vec<(MeshId, Mat4)> {
        let mut stack = MatrixStack::new();
        let mut out = Vec::with_capacity(self.object_count());
        self.draw(&mut stack, |object, draw| out.push((object.mesh, draw.model)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scene_has_three_cubes_and_a_plane() {
        let scene = Scene::demo();
        assert_eq!(scene.object_count(), 4);
        let cubes = scene.objects().filter(|o| o.mesh == MeshId::Cube).count();
        assert_eq!(cubes, 3);
    }

    #[test]
    fn ambient_is_a_tenth_of_diffuse_with_zero_alpha() {
        let material = Material::from_rgb(Vec3::new(0.1, 0.3, 0.9));
        assert_eq!(material.diffuse.w, 1.0);
        assert_eq!(material.ambient.w, 0.0);
        assert!((material.ambient.truncate() - material.diffuse.truncate() * 0.1).length() < 1e-6);
    }

    #[test]
    fn stack_depth_is_balanced_around_every_object() {
        let scene = Scene::demo();
        let mut stack = MatrixStack::new();
        stack.translate(Vec3::new(3.0, 0.0, 0.0));
        stack.push();
        stack.push();
        let outer = stack.top();
        let mut visited = 0;
        scene.draw(&mut stack, |_, _| visited += 1);
        assert_eq!(visited, 4);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top(), outer);
    }

    #[test]
    fn siblings_do_not_inherit_transforms() {
        let matrices = Scene::demo().model_matrices();
        let center = matrices[0].1.transform_point3(Vec3::ZERO);
        let side = matrices[1].1.transform_point3(Vec3::ZERO);
        let floating = matrices[2].1.transform_point3(Vec3::ZERO);
        let ground = matrices[3].1.transform_point3(Vec3::ZERO);
        assert!((center - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert!((side - Vec3::new(2.0, 0.0, 1.0)).length() < 1e-5);
        assert!((floating - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
        assert!((ground - Vec3::new(0.0, -1.01, 0.0)).length() < 1e-5);
    }

    #[test]
    fn normal_matrix_handles_non_uniform_scale() {
        let draw = ObjectDraw {
            model: Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0)),
            material: Material::from_rgb(Vec3::ONE),
        };
        // A 45 degree slope stretched along X must tilt toward +Y.
        let normal = (draw.normal_matrix() * Vec3::new(1.0, 1.0, 0.0)).normalize();
        assert!(normal.y > normal.x);
        let tangent = draw.model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(normal.dot(tangent).abs() < 1e-5);
    }

    #[test]
    fn filtered_scene_drops_empty_groups() {
        let plane_only = Scene::demo().filtered(|o| o.mesh == MeshId::Plane);
        assert_eq!(plane_only.object_count(), 1);
        assert_eq!(plane_only.groups.len(), 1);
    }
}
