pub mod layouts;
pub mod map;
pub mod plan;

use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use gpu_descriptor::DescriptorSet;
use crate::assets::{self, AssetCollection, AssetHandle, Material, Mesh, Skybox};
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::resource_ctx::layouts::DescriptorLayouts;
use crate::renderer::contexts::resource_ctx::map::GpuResourceMap;
use crate::renderer::contexts::resource_ctx::plan::{
    assign_material_sets, GpuMaterial, GpuMesh, MaterialImage, MaterialLayout, MeshLayout,
};
use crate::renderer::internals::buffer::Buffer;
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayout;
use crate::renderer::resources::image::{Image, Sampler};
use crate::renderer::shader_data::MaterialUniform;

/// Opaque white, so untextured materials sample their diffuse colour unchanged
const FALLBACK_TEXEL: [u8; 4] = [255, 255, 255, 255];

pub struct GpuImage {
    pub image: Image,
    pub sampler: Sampler,
}

impl GpuImage {
    fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.sampler,
            image_view: self.image.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

pub struct GpuSkybox {
    pub cubemap: GpuImage,
    /// One per frame in flight
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Responsibilities:
/// - Upload a decoded asset collection to the GPU, once
/// - Own the shared vertex/index buffers, images, material uniforms and descriptor sets
/// - Resolve asset handles to their GPU counterparts
///
/// Lookups of handles that were not part of the uploaded collection fail instead of defaulting.
pub struct ResourceCache {
    images: GpuResourceMap<assets::Image, GpuImage>,
    materials: GpuResourceMap<Material, GpuMaterial>,
    meshes: GpuResourceMap<Mesh, GpuMesh>,
    skyboxes: GpuResourceMap<Skybox, GpuSkybox>,
    fallback_image: GpuImage,

    vertex_buffer: Option<Buffer>,
    index_buffer: Option<Buffer>,
    /// One dynamic uniform buffer per frame in flight
    material_buffers: Vec<Buffer>,

    descriptor_sets: Vec<DescriptorSet<vk::DescriptorSet>>,
    device: Arc<RenderDevice>,
}

impl ResourceCache {
    pub fn new(
        collection: &AssetCollection,
        layouts: &DescriptorLayouts,
        frames_in_flight: usize,
        device: Arc<RenderDevice>,
    ) -> Result<Self> {
        log::info!(
            "Uploading {} images, {} materials, {} meshes, {} skyboxes",
            collection.images.len(),
            collection.materials.len(),
            collection.meshes.len(),
            collection.skyboxes.len(),
        );

        let fallback_image = GpuImage {
            image: Image::new_color_image(&FALLBACK_TEXEL, 1, 1, "Fallback Image", &device)?,
            sampler: Sampler::linear_repeat(device.logical.clone())?,
        };

        let mut cache = Self {
            images: GpuResourceMap::new("Image"),
            materials: GpuResourceMap::new("Material"),
            meshes: GpuResourceMap::new("Mesh"),
            skyboxes: GpuResourceMap::new("Skybox"),
            fallback_image,

            vertex_buffer: None,
            index_buffer: None,
            material_buffers: Vec::with_capacity(frames_in_flight),

            descriptor_sets: Vec::new(),
            device,
        };

        cache.upload_images(collection)?;
        cache.upload_meshes(collection)?;
        cache.upload_materials(collection, layouts, frames_in_flight)?;
        cache.upload_skyboxes(collection, layouts, frames_in_flight)?;

        Ok(cache)
    }

    pub fn gpu_image(&self, handle: AssetHandle<assets::Image>) -> Result<&GpuImage> {
        self.images.get(handle)
    }

    pub fn gpu_material(&self, handle: AssetHandle<Material>) -> Result<&GpuMaterial> {
        self.materials.get(handle)
    }

    pub fn gpu_mesh(&self, handle: AssetHandle<Mesh>) -> Result<&GpuMesh> {
        self.meshes.get(handle)
    }

    pub fn gpu_skybox(&self, handle: AssetHandle<Skybox>) -> Result<&GpuSkybox> {
        self.skyboxes.get(handle)
    }

    /// `None` when the collection had no geometry
    pub fn geometry_buffers(&self) -> Option<(vk::Buffer, vk::Buffer)> {
        match (&self.vertex_buffer, &self.index_buffer) {
            (Some(vertices), Some(indices)) => Some((vertices.buffer, indices.buffer)),
            _ => None,
        }
    }

    fn upload_images(&mut self, collection: &AssetCollection) -> Result<()> {
        for (handle, image) in collection.images.iter() {
            image
                .check_extent()
                .wrap_err_with(|| format!("Image handle {} cannot be uploaded", handle.index()))?;
            let gpu_image = GpuImage {
                image: Image::new_color_image(
                    &image.data,
                    image.width,
                    image.height,
                    &format!("Image {}", handle.index()),
                    &self.device,
                )?,
                sampler: Sampler::nearest_clamp(self.device.logical.clone())?,
            };
            self.images.insert(handle, gpu_image);
        }
        Ok(())
    }

    /// Concatenates every mesh into one staging buffer, then copies it into the
    /// shared vertex and index buffers with one copy each
    fn upload_meshes(&mut self, collection: &AssetCollection) -> Result<()> {
        let layout = MeshLayout::plan(&collection.meshes);
        for (handle, gpu_mesh) in &layout.meshes {
            self.meshes.insert(*handle, *gpu_mesh);
        }
        if layout.is_empty() {
            log::warn!("Asset collection has no geometry");
            return Ok(());
        }

        let vertex_bytes = layout.vertex_bytes();
        let index_bytes = layout.index_bytes();
        let mut staging_buffer = Buffer::new(
            vertex_bytes + index_bytes,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "Mesh staging buffer",
            MemoryLocation::CpuToGpu,
            self.device.memory_allocator(),
            self.device.logical.clone(),
        )?;
        let vertex_stride = size_of::<assets::Vertex>();
        let index_stride = size_of::<u32>();
        for (handle, gpu_mesh) in &layout.meshes {
            let mesh = collection
                .meshes
                .get(*handle)
                .ok_or_else(|| eyre!("Mesh handle {} missing from collection", handle.index()))?;
            if !mesh.vertices.is_empty() {
                staging_buffer.write(
                    &mesh.vertices,
                    gpu_mesh.vertex_offset as usize * vertex_stride,
                )?;
            }
            if !mesh.indices.is_empty() {
                staging_buffer.write(
                    &mesh.indices,
                    vertex_bytes as usize + gpu_mesh.index_offset as usize * index_stride,
                )?;
            }
        }

        let vertex_buffer = Buffer::new(
            vertex_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            "Shared vertex buffer",
            MemoryLocation::GpuOnly,
            self.device.memory_allocator(),
            self.device.logical.clone(),
        )?;
        let index_buffer = Buffer::new(
            index_bytes,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            "Shared index buffer",
            MemoryLocation::GpuOnly,
            self.device.memory_allocator(),
            self.device.logical.clone(),
        )?;

        self.device.immediate_submit(|cmd, device| {
            unsafe {
                device.cmd_copy_buffer(
                    cmd,
                    staging_buffer.buffer,
                    vertex_buffer.buffer,
                    &[vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size: vertex_bytes,
                    }],
                );
                device.cmd_copy_buffer(
                    cmd,
                    staging_buffer.buffer,
                    index_buffer.buffer,
                    &[vk::BufferCopy {
                        src_offset: vertex_bytes,
                        dst_offset: 0,
                        size: index_bytes,
                    }],
                );
            }
            Ok(())
        })?;

        log::debug!(
            "Uploaded {} vertices and {} indices across {} meshes",
            layout.total_vertices,
            layout.total_indices,
            layout.meshes.len(),
        );
        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
        Ok(())
    }

    fn upload_materials(
        &mut self,
        collection: &AssetCollection,
        layouts: &DescriptorLayouts,
        frames_in_flight: usize,
    ) -> Result<()> {
        let min_alignment = self.device.limits().min_uniform_buffer_offset_alignment;
        let layout = MaterialLayout::plan(&collection.materials, min_alignment);

        for frame in 0..frames_in_flight {
            let mut buffer = Buffer::new(
                layout.buffer_size(),
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                &format!("Material Uniforms {frame}"),
                MemoryLocation::CpuToGpu,
                self.device.memory_allocator(),
                self.device.logical.clone(),
            )?;
            for slot in &layout.slots {
                buffer.write(&[slot.uniform], slot.offset as usize)?;
            }
            self.material_buffers.push(buffer);
        }

        if collection.materials.is_empty() {
            return Ok(());
        }

        let raw_sets = self.allocate_sets(&layouts.material, layout.slots.len() * frames_in_flight)?;
        self.materials = assign_material_sets(&layout, &raw_sets, frames_in_flight)?;

        for gpu_material in self.materials.values() {
            let image_info = [match gpu_material.image {
                MaterialImage::Texture(handle) => self.gpu_image(handle)?.descriptor_info(),
                MaterialImage::Fallback => self.fallback_image.descriptor_info(),
            }];
            for (frame, set) in gpu_material.descriptor_sets.iter().enumerate() {
                let buffer_info = [vk::DescriptorBufferInfo {
                    buffer: self.material_buffers[frame].buffer,
                    offset: 0,
                    range: size_of::<MaterialUniform>() as u64,
                }];
                let writes = [
                    vk::WriteDescriptorSet::default()
                        .dst_set(*set)
                        .dst_binding(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                        .buffer_info(&buffer_info),
                    vk::WriteDescriptorSet::default()
                        .dst_set(*set)
                        .dst_binding(1)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(&image_info),
                ];
                unsafe { self.device.logical.update_descriptor_sets(&writes, &[]) };
            }
        }
        Ok(())
    }

    fn upload_skyboxes(
        &mut self,
        collection: &AssetCollection,
        layouts: &DescriptorLayouts,
        frames_in_flight: usize,
    ) -> Result<()> {
        for (handle, skybox) in collection.skyboxes.iter() {
            let (width, height) = skybox.face_extent()?;
            let faces = skybox.faces.each_ref().map(|face| face.data.as_slice());
            let cubemap = GpuImage {
                image: Image::new_cubemap(
                    faces,
                    width,
                    height,
                    &format!("Skybox {}", skybox.name),
                    &self.device,
                )?,
                sampler: Sampler::linear_clamp(self.device.logical.clone())?,
            };

            let descriptor_sets = self.allocate_sets(&layouts.skybox, frames_in_flight)?;
            let image_info = [cubemap.descriptor_info()];
            for set in &descriptor_sets {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info);
                unsafe { self.device.logical.update_descriptor_sets(&[write], &[]) };
            }

            log::debug!("Uploaded skybox '{}' ({width}x{height})", skybox.name);
            self.skyboxes.insert(handle, GpuSkybox {
                cubemap,
                descriptor_sets,
            });
        }
        Ok(())
    }

    /// Allocates `count` sets, keeping ownership here so they are freed with the cache
    fn allocate_sets(
        &mut self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> Result<Vec<vk::DescriptorSet>> {
        let sets = self.device.allocate_descriptor_sets(layout, count as u32)?;
        let raw = sets.iter().map(|set| *set.raw()).collect();
        self.descriptor_sets.extend(sets);
        Ok(raw)
    }
}

impl Drop for ResourceCache {
    fn drop(&mut self) {
        self.device.free_descriptor_sets(self.descriptor_sets.drain(..));
    }
}
