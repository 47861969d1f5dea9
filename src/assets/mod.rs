//! Decoded, CPU-side assets handed to the renderer.
//! Loading them from disk is the job of whoever builds the collection.

pub mod handle;
pub mod storage;

use bytemuck::{Pod, Zeroable};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use glam::{Vec2, Vec3};

pub use handle::AssetHandle;
pub use storage::AssetStorage;

/// RGBA8 pixels, row-major, no padding between rows
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self { width, height, data }
    }

    pub fn byte_len(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }

    /// Non-zero extent and exactly `byte_len` bytes of pixel data
    pub fn check_extent(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(eyre!("Image has zero extent {}x{}", self.width, self.height));
        }
        if self.data.len() as u64 != self.byte_len() {
            return Err(eyre!(
                "Image is {}x{} but holds {} bytes, expected {}",
                self.width,
                self.height,
                self.data.len(),
                self.byte_len(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub diffuse_texture: Option<AssetHandle<Image>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.15),
            diffuse: Vec3::ONE,
            specular: Vec3::ZERO,
            diffuse_texture: None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Option<AssetHandle<Material>>,
}

/// Cubemap faces in +X, -X, +Y, -Y, +Z, -Z order
#[derive(Debug, Clone)]
pub struct Skybox {
    pub name: String,
    pub faces: [Image; 6],
}

impl Skybox {
    /// Shared extent of the six faces. Cubemap faces must be non-empty and all the same size.
    pub fn face_extent(&self) -> Result<(u32, u32)> {
        let extent = (self.faces[0].width, self.faces[0].height);
        for (i, face) in self.faces.iter().enumerate() {
            face.check_extent()
                .map_err(|e| eyre!("Skybox '{}' face {i}: {e}", self.name))?;
            if (face.width, face.height) != extent {
                return Err(eyre!(
                    "Skybox '{}' face {i} is {}x{}, face 0 is {}x{}",
                    self.name,
                    face.width,
                    face.height,
                    extent.0,
                    extent.1,
                ));
            }
        }
        Ok(extent)
    }
}

/// Everything the renderer uploads in one go
#[derive(Default)]
pub struct AssetCollection {
    pub images: AssetStorage<Image>,
    pub materials: AssetStorage<Material>,
    pub meshes: AssetStorage<Mesh>,
    pub skyboxes: AssetStorage<Skybox>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_image_repeats_texel() {
        let image = Image::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(image.data.len() as u64, image.byte_len());
        assert!(image.data.chunks(4).all(|texel| texel == [1, 2, 3, 4]));
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    fn skybox(faces: [Image; 6]) -> Skybox {
        Skybox { name: "night".into(), faces }
    }

    #[test]
    fn image_extent_must_match_its_data() {
        assert!(Image::solid(2, 2, [0; 4]).check_extent().is_ok());
        assert!(Image::new(0, 4, Vec::new()).check_extent().is_err());
        assert!(Image::new(2, 2, vec![0; 15]).check_extent().is_err());
    }

    #[test]
    fn matching_skybox_faces_report_their_extent() {
        let sky = skybox(std::array::from_fn(|_| Image::solid(4, 4, [0, 0, 0, 255])));
        assert_eq!(sky.face_extent().unwrap(), (4, 4));
    }

    #[test]
    fn empty_skybox_faces_are_rejected() {
        let sky = skybox(std::array::from_fn(|_| Image::solid(0, 0, [0, 0, 0, 255])));
        let err = sky.face_extent().unwrap_err();
        assert!(err.to_string().contains("zero extent"));
    }

    #[test]
    fn mismatched_skybox_faces_are_rejected() {
        let mut faces: [Image; 6] = std::array::from_fn(|_| Image::solid(4, 4, [0, 0, 0, 255]));
        faces[3] = Image::solid(2, 4, [0, 0, 0, 255]);
        let err = skybox(faces).face_extent().unwrap_err();
        assert!(err.to_string().contains("face 3 is 2x4"));
    }
}
