use std::path::Path;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use glam::{Mat4, Quat, Vec2, Vec3};
use crate::assets::{AssetCollection, AssetHandle, Image, Material, Mesh, Skybox, Vertex};
use crate::renderer::draw::DrawCommand;

const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;
const SKYBOX_FACE_SIZE: u32 = 4;

/// The built-in scene: a spinning textured cube, a tinted copy of it and a plain skybox
pub struct DemoScene {
    pub assets: AssetCollection,
    pub skybox: Option<AssetHandle<Skybox>>,
    cube: AssetHandle<Mesh>,
    tint: AssetHandle<Material>,
    spin_radians: f32,
}

impl DemoScene {
    pub fn new(texture_path: Option<&Path>) -> Result<Self> {
        let mut assets = AssetCollection::new();

        let texture = match texture_path {
            Some(path) => load_image(path)?,
            None => checkerboard(CHECKER_SIZE, CHECKER_CELL),
        };
        let texture = assets.images.add(texture);
        let textured = assets.materials.add(Material {
            diffuse_texture: Some(texture),
            ..Material::default()
        });
        let tint = assets.materials.add(Material {
            diffuse: Vec3::new(0.9, 0.3, 0.2),
            specular: Vec3::splat(0.4),
            ..Material::default()
        });
        let cube = assets.meshes.add(cube_mesh(Some(textured)));

        let face = |rgba| Image::solid(SKYBOX_FACE_SIZE, SKYBOX_FACE_SIZE, rgba);
        let skybox = assets.skyboxes.add(Skybox {
            name: "dusk".into(),
            faces: [
                face([70, 80, 120, 255]),
                face([70, 80, 120, 255]),
                face([120, 140, 190, 255]),
                face([30, 30, 40, 255]),
                face([80, 90, 130, 255]),
                face([80, 90, 130, 255]),
            ],
        });

        Ok(Self {
            assets,
            skybox: Some(skybox),
            cube,
            tint,
            spin_radians: 0.0,
        })
    }

    /// Drops the CPU copies of the textures once the renderer holds them.
    /// Material handles keep pointing at the uploaded images.
    pub fn release_pixels(&mut self) {
        self.assets.images.clear();
    }

    pub fn update(&mut self, delta_time_secs: f32) {
        self.spin_radians = (self.spin_radians + delta_time_secs * 0.5) % std::f32::consts::TAU;
    }

    pub fn draws(&self) -> Vec<DrawCommand> {
        let spin = Quat::from_rotation_y(self.spin_radians);
        vec![
            DrawCommand::new(self.cube, Mat4::from_quat(spin)),
            DrawCommand::new(
                self.cube,
                Mat4::from_scale_rotation_translation(
                    Vec3::splat(0.5),
                    spin.inverse(),
                    Vec3::new(2.0, 0.0, 0.0),
                ),
            )
            .with_material(self.tint),
        ]
    }
}

pub fn load_image(path: &Path) -> Result<Image> {
    let decoded = image::open(path)
        .wrap_err_with(|| format!("Failed to load texture {}", path.display()))?
        .into_rgba8();
    log::info!("Loaded {} ({}x{})", path.display(), decoded.width(), decoded.height());
    Ok(Image::new(decoded.width(), decoded.height(), decoded.into_raw()))
}

pub fn checkerboard(size: u32, cell: u32) -> Image {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let v = if light { 230 } else { 40 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Image::new(size, size, data)
}

/// Unit cube centred on the origin with outward, counter-clockwise faces
pub fn cube_mesh(material: Option<AssetHandle<Material>>) -> Mesh {
    // (normal, u, v) with u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let corners = [
        Vec2::new(-0.5, -0.5),
        Vec2::new(0.5, -0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(-0.5, 0.5),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for corner in corners {
            let position = normal * 0.5 + u * corner.x + v * corner.y;
            // Texture v runs downwards
            let uv = Vec2::new(corner.x + 0.5, 0.5 - corner.y);
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    Mesh {
        vertices,
        indices,
        material,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_triangles_face_outwards() {
        let cube = cube_mesh(None);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| cube.vertices[tri[i] as usize]);
            let face_normal = (b.position - a.position).cross(c.position - a.position);
            assert!(face_normal.dot(a.normal) > 0.0);
            assert!(a.position.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let image = checkerboard(16, 8);
        assert_eq!(image.data.len() as u64, image.byte_len());
        let texel = |x: u32, y: u32| image.data[((y * 16 + x) * 4) as usize];
        assert_ne!(texel(0, 0), texel(8, 0));
        assert_eq!(texel(0, 0), texel(8, 8));
    }

    #[test]
    fn demo_scene_draws_reference_uploaded_assets() {
        let scene = DemoScene::new(None).unwrap();
        for draw in scene.draws() {
            let mesh = scene.assets.meshes.get(draw.mesh).unwrap();
            let material = draw.resolve_material(mesh.material).unwrap();
            assert!(scene.assets.materials.get(material).is_some());
        }
        let skybox = scene.assets.skyboxes.get(scene.skybox.unwrap()).unwrap();
        assert_eq!(skybox.face_extent().unwrap(), (SKYBOX_FACE_SIZE, SKYBOX_FACE_SIZE));
    }

    #[test]
    fn released_pixels_leave_draws_intact() {
        let mut scene = DemoScene::new(None).unwrap();
        scene.release_pixels();
        assert!(scene.assets.images.is_empty());
        for draw in scene.draws() {
            assert!(scene.assets.meshes.get(draw.mesh).is_some());
        }
    }
}
