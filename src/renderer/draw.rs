use glam::Mat4;
use crate::assets::{AssetHandle, Material, Mesh};

/// One mesh instance to draw this frame
#[derive(Debug, Clone, Copy)]
pub struct DrawCommand {
    pub mesh: AssetHandle<Mesh>,
    /// Overrides the mesh's own material when set
    pub material: Option<AssetHandle<Material>>,
    pub transform: Mat4,
}

impl DrawCommand {
    pub fn new(mesh: AssetHandle<Mesh>, transform: Mat4) -> Self {
        Self {
            mesh,
            material: None,
            transform,
        }
    }

    pub fn with_material(mut self, material: AssetHandle<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn resolve_material(
        &self,
        mesh_material: Option<AssetHandle<Material>>,
    ) -> Option<AssetHandle<Material>> {
        self.material.or(mesh_material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_material_overrides_mesh_material() {
        let draw = DrawCommand::new(AssetHandle::new(0), Mat4::IDENTITY)
            .with_material(AssetHandle::new(3));
        assert_eq!(draw.resolve_material(Some(AssetHandle::new(1))), Some(AssetHandle::new(3)));
    }

    #[test]
    fn mesh_material_is_the_fallback() {
        let draw = DrawCommand::new(AssetHandle::new(0), Mat4::IDENTITY);
        assert_eq!(draw.resolve_material(Some(AssetHandle::new(1))), Some(AssetHandle::new(1)));
        assert_eq!(draw.resolve_material(None), None);
    }
}
