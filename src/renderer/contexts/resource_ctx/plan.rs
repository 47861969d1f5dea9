//! Device-independent layout decisions for the resource cache.
//! Everything here is computed before any GPU object is created.

use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::assets::{AssetHandle, AssetStorage, Image, Material, Mesh, Vertex};
use crate::renderer::contexts::resource_ctx::map::GpuResourceMap;
use crate::renderer::internals::memory::align_stride;
use crate::renderer::shader_data::MaterialUniform;

/// Where one mesh lives inside the shared vertex and index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub material: Option<AssetHandle<Material>>,
}

pub struct MeshLayout {
    pub meshes: Vec<(AssetHandle<Mesh>, GpuMesh)>,
    pub total_vertices: u32,
    pub total_indices: u32,
}

impl MeshLayout {
    /// Packs every mesh back to back, in handle order
    pub fn plan(meshes: &AssetStorage<Mesh>) -> Self {
        let mut layout = Self {
            meshes: Vec::with_capacity(meshes.len()),
            total_vertices: 0,
            total_indices: 0,
        };
        for (handle, mesh) in meshes.iter() {
            let gpu_mesh = GpuMesh {
                vertex_offset: layout.total_vertices,
                vertex_count: mesh.vertices.len() as u32,
                index_offset: layout.total_indices,
                index_count: mesh.indices.len() as u32,
                material: mesh.material,
            };
            layout.total_vertices += gpu_mesh.vertex_count;
            layout.total_indices += gpu_mesh.index_count;
            layout.meshes.push((handle, gpu_mesh));
        }
        layout
    }

    pub fn vertex_bytes(&self) -> u64 {
        self.total_vertices as u64 * size_of::<Vertex>() as u64
    }

    pub fn index_bytes(&self) -> u64 {
        self.total_indices as u64 * size_of::<u32>() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.total_vertices == 0 || self.total_indices == 0
    }
}

/// Which image a material's combined image sampler points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialImage {
    Texture(AssetHandle<Image>),
    Fallback,
}

pub struct MaterialSlot {
    pub handle: AssetHandle<Material>,
    pub offset: u64,
    pub image: MaterialImage,
    pub uniform: MaterialUniform,
}

pub struct MaterialLayout {
    pub stride: u64,
    pub slots: Vec<MaterialSlot>,
}

impl MaterialLayout {
    pub fn plan(materials: &AssetStorage<Material>, min_uniform_alignment: u64) -> Self {
        let stride = align_stride(size_of::<MaterialUniform>() as u64, min_uniform_alignment);
        let slots = materials
            .iter()
            .enumerate()
            .map(|(i, (handle, material))| {
                let image = match material.diffuse_texture {
                    Some(texture) => MaterialImage::Texture(texture),
                    None => MaterialImage::Fallback,
                };
                MaterialSlot {
                    handle,
                    offset: i as u64 * stride,
                    image,
                    uniform: MaterialUniform::from_material(material),
                }
            })
            .collect();
        Self { stride, slots }
    }

    /// Size of one frame's dynamic uniform buffer. Never zero so the buffer can always be created.
    pub fn buffer_size(&self) -> u64 {
        self.stride * self.slots.len().max(1) as u64
    }
}

/// A material's dynamic uniform offset and its descriptor set for every frame in flight
#[derive(Debug, Clone)]
pub struct GpuMaterial {
    pub offset: u32,
    pub image: MaterialImage,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Hands out `frames_in_flight` consecutive sets to each material slot, in slot order
pub fn assign_material_sets(
    layout: &MaterialLayout,
    sets: &[vk::DescriptorSet],
    frames_in_flight: usize,
) -> Result<GpuResourceMap<Material, GpuMaterial>> {
    if frames_in_flight == 0 {
        return Err(eyre!("Material descriptor sets need at least one frame in flight"));
    }
    let expected = layout.slots.len() * frames_in_flight;
    if sets.len() != expected {
        return Err(eyre!(
            "Expected {} material descriptor sets, got {}",
            expected,
            sets.len(),
        ));
    }

    let mut materials = GpuResourceMap::new("Material");
    for (slot, chunk) in layout.slots.iter().zip(sets.chunks(frames_in_flight)) {
        materials.insert(slot.handle, GpuMaterial {
            offset: u32::try_from(slot.offset)?,
            image: slot.image,
            descriptor_sets: chunk.to_vec(),
        });
    }
    Ok(materials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use glam::{Vec2, Vec3};
    use crate::assets::AssetCollection;

    fn quad(material: Option<AssetHandle<Material>>) -> Mesh {
        let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::new(x, y));
        Mesh {
            vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)],
            indices: vec![0, 1, 2, 2, 3, 0],
            material,
        }
    }

    fn fake_sets(count: usize) -> Vec<vk::DescriptorSet> {
        (1..=count as u64).map(vk::DescriptorSet::from_raw).collect()
    }

    #[test]
    fn single_quad_without_texture_uses_fallback() {
        let mut assets = AssetCollection::new();
        let material = assets.materials.add(Material::default());
        let mesh = assets.meshes.add(quad(Some(material)));

        let meshes = MeshLayout::plan(&assets.meshes);
        let (handle, gpu_mesh) = meshes.meshes[0];
        assert_eq!(handle, mesh);
        assert_eq!(gpu_mesh.vertex_count, 4);
        assert_eq!(gpu_mesh.index_count, 6);
        assert_eq!(gpu_mesh.material, Some(material));

        let materials = MaterialLayout::plan(&assets.materials, 256);
        let gpu_materials = assign_material_sets(&materials, &fake_sets(2), 2).unwrap();
        let gpu_material = gpu_materials.get(material).unwrap();
        assert_eq!(gpu_material.image, MaterialImage::Fallback);
        assert_eq!(gpu_material.descriptor_sets.len(), 2);
    }

    #[test]
    fn zero_frames_in_flight_is_an_error_not_an_empty_map() {
        let mut assets = AssetCollection::new();
        assets.materials.add(Material::default());
        let materials = MaterialLayout::plan(&assets.materials, 256);

        let err = assign_material_sets(&materials, &[], 0).unwrap_err();
        assert!(err.to_string().contains("at least one frame in flight"));
    }

    #[test]
    fn meshes_stay_inside_shared_buffers() {
        let mut assets = AssetCollection::new();
        for n in 1..5 {
            let mut mesh = quad(None);
            mesh.vertices.truncate(n);
            mesh.indices.truncate(n + 1);
            assets.meshes.add(mesh);
        }
        let layout = MeshLayout::plan(&assets.meshes);

        let mut expected_vertex_offset = 0;
        for (_, mesh) in &layout.meshes {
            assert_eq!(mesh.vertex_offset, expected_vertex_offset);
            assert!(mesh.vertex_offset + mesh.vertex_count <= layout.total_vertices);
            assert!(mesh.index_offset + mesh.index_count <= layout.total_indices);
            expected_vertex_offset += mesh.vertex_count;
        }
        assert_eq!(layout.total_vertices, 1 + 2 + 3 + 4);
        assert_eq!(layout.vertex_bytes(), 10 * 32);
        assert_eq!(layout.index_bytes(), (2 + 3 + 4 + 5) * 4);
    }

    #[test]
    fn material_offsets_step_by_aligned_stride() {
        let mut assets = AssetCollection::new();
        let image = assets.images.add(Image::solid(1, 1, [0, 0, 0, 255]));
        assets.materials.add(Material::default());
        assets.materials.add(Material {
            diffuse_texture: Some(image),
            ..Material::default()
        });
        assets.materials.add(Material::default());

        let layout = MaterialLayout::plan(&assets.materials, 64);
        assert_eq!(layout.stride, 64);
        for pair in layout.slots.windows(2) {
            assert_eq!(pair[1].offset - pair[0].offset, layout.stride);
        }
        assert_eq!(layout.slots[1].image, MaterialImage::Texture(image));
        assert_eq!(layout.slots[1].uniform.has_diffuse_texture, 1);
        assert_eq!(layout.buffer_size(), 192);
    }

    #[test]
    fn every_material_gets_one_set_per_frame() {
        let mut assets = AssetCollection::new();
        let handles: Vec<_> = (0..3).map(|_| assets.materials.add(Material::default())).collect();
        let layout = MaterialLayout::plan(&assets.materials, 256);

        let frames = 3;
        let sets = fake_sets(handles.len() * frames);
        let gpu_materials = assign_material_sets(&layout, &sets, frames).unwrap();
        for (i, handle) in handles.iter().enumerate() {
            let material = gpu_materials.get(*handle).unwrap();
            assert_eq!(material.descriptor_sets, sets[i * frames..(i + 1) * frames]);
            assert_eq!(material.offset as u64, i as u64 * layout.stride);
        }
    }

    #[test]
    fn set_count_mismatch_is_an_error() {
        let mut assets = AssetCollection::new();
        assets.materials.add(Material::default());
        let layout = MaterialLayout::plan(&assets.materials, 256);
        assert!(assign_material_sets(&layout, &fake_sets(1), 2).is_err());
    }

    #[test]
    fn empty_collection_still_sizes_a_buffer() {
        let assets = AssetCollection::new();
        let layout = MaterialLayout::plan(&assets.materials, 256);
        assert_eq!(layout.buffer_size(), 256);
        assert!(MeshLayout::plan(&assets.meshes).is_empty());
    }
}
