use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};
use crate::assets::Material;

/// Camera matrices written to the per-frame uniform buffer at set 0
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Packed material constants, one record per stride in the dynamic uniform buffer
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    pub ambient_color: Vec4,
    pub diffuse_color: Vec4,
    pub specular_color: Vec4,
    pub has_diffuse_texture: u32,
    _padding: [u32; 3],
}

impl MaterialUniform {
    pub fn from_material(material: &Material) -> Self {
        Self {
            ambient_color: Vec4::from((material.ambient, 1.0)),
            diffuse_color: Vec4::from((material.diffuse, 1.0)),
            specular_color: Vec4::from((material.specular, 1.0)),
            has_diffuse_texture: material.diffuse_texture.is_some() as u32,
            _padding: [0; 3],
        }
    }
}

/// Per-draw data passed as a push constant to the geometry pipeline
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GeometryPushConstants {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl GeometryPushConstants {
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            normal_matrix: normal_matrix(model),
        }
    }
}

/// Inverse transpose of the upper 3x3 block of `model`
pub fn normal_matrix(model: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(model).inverse().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn normal_matrix_ignores_translation() {
        let model = Mat4::from_translation(Vec3::new(4.0, -2.0, 9.0));
        assert!(normal_matrix(model).abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 4.0));
        let n = normal_matrix(model).transform_vector3(Vec3::X);
        assert!(n.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn uniform_sizes_match_shader_blocks() {
        assert_eq!(size_of::<CameraUniform>(), 128);
        assert_eq!(size_of::<MaterialUniform>(), 64);
        assert_eq!(size_of::<GeometryPushConstants>(), 128);
    }

    #[test]
    fn material_uniform_carries_every_colour() {
        let material = Material {
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::new(0.9, 0.3, 0.2),
            specular: Vec3::splat(0.5),
            diffuse_texture: None,
        };
        let uniform = MaterialUniform::from_material(&material);
        assert_eq!(uniform.ambient_color, Vec4::new(0.1, 0.1, 0.1, 1.0));
        assert_eq!(uniform.diffuse_color, Vec4::new(0.9, 0.3, 0.2, 1.0));
        assert_eq!(uniform.specular_color, Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(uniform.has_diffuse_texture, 0);
    }
}
