use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, Result};
use gpu_allocator::{
    vulkan::{Allocation, AllocationScheme},
    MemoryLocation,
};
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::internals::barrier::ImageTransition;
use crate::renderer::internals::buffer::Buffer;
use crate::renderer::internals::memory::MemoryAllocator;

pub const CUBE_FACE_COUNT: u32 = 6;

pub struct ImageCreateInfo {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    pub array_layers: u32,
    pub flags: vk::ImageCreateFlags,
    pub view_type: vk::ImageViewType,
    pub name: String,
}

/// Device-local image, its memory and a view covering every layer
pub struct Image {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent3D,
    pub array_layers: u32,

    allocation: Option<Allocation>,
    memory_allocator: MemoryAllocator,
    device: Arc<ash::Device>,
}

impl Image {
    // The returned image has undefined contents. Sampled images still need `upload()`.
    fn new(
        create_info: &ImageCreateInfo,
        memory_allocator: MemoryAllocator,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let image = {
            let info = vk::ImageCreateInfo::default()
                .flags(create_info.flags)
                .format(create_info.format)
                .usage(create_info.usage)
                .extent(create_info.extent)
                .image_type(vk::ImageType::TYPE_2D)
                .mip_levels(1)
                .array_layers(create_info.array_layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .tiling(vk::ImageTiling::OPTIMAL);
            unsafe { device.create_image(&info, None)? }
        };
        let reqs = unsafe { device.get_image_memory_requirements(image) };
        let allocation = match memory_allocator.allocate(
            &create_info.name,
            reqs,
            MemoryLocation::GpuOnly,
            AllocationScheme::DedicatedImage(image),
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };
        // From here on Drop releases whatever has been created
        let mut created = Self {
            image,
            view: vk::ImageView::null(),
            extent: create_info.extent,
            array_layers: create_info.array_layers,

            allocation: Some(allocation),
            memory_allocator,
            device,
        };
        if let Some(allocation) = created.allocation.as_ref() {
            unsafe {
                created
                    .device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())?;
            }
        }
        created.view = {
            let info = vk::ImageViewCreateInfo::default()
                .view_type(create_info.view_type)
                .image(image)
                .format(create_info.format)
                .subresource_range(vk::ImageSubresourceRange {
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: create_info.array_layers,
                    aspect_mask: create_info.aspect,
                });
            unsafe { created.device.create_image_view(&info, None)? }
        };

        Ok(created)
    }

    /// Shader-readable RGBA8 image filled from `data`
    pub fn new_color_image(
        data: &[u8],
        width: u32,
        height: u32,
        name: &str,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let create_info = ImageCreateInfo {
            format: vk::Format::R8G8B8A8_SRGB,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            view_type: vk::ImageViewType::TYPE_2D,
            name: name.into(),
        };
        let image = Self::new(&create_info, dev.memory_allocator(), dev.logical.clone())?;
        image.upload(&[data], dev)?;
        Ok(image)
    }

    /// Six-layer cube-compatible RGBA8 image, faces in +X, -X, +Y, -Y, +Z, -Z order
    pub fn new_cubemap(
        faces: [&[u8]; CUBE_FACE_COUNT as usize],
        width: u32,
        height: u32,
        name: &str,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let create_info = ImageCreateInfo {
            format: vk::Format::R8G8B8A8_SRGB,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            array_layers: CUBE_FACE_COUNT,
            flags: vk::ImageCreateFlags::CUBE_COMPATIBLE,
            view_type: vk::ImageViewType::CUBE,
            name: name.into(),
        };
        let image = Self::new(&create_info, dev.memory_allocator(), dev.logical.clone())?;
        image.upload(&faces, dev)?;
        Ok(image)
    }

    /// Depth attachment matching the swapchain extent
    pub fn new_depth_image(
        width: u32,
        height: u32,
        format: vk::Format,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let create_info = ImageCreateInfo {
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            view_type: vk::ImageViewType::TYPE_2D,
            name: "Depth Image".into(),
        };
        Self::new(&create_info, dev.memory_allocator(), dev.logical.clone())
    }

    /// Stages one byte slice per array layer and copies them in with a single
    /// transition on either side covering every layer
    fn upload(
        &self,
        layers: &[&[u8]],
        dev: &RenderDevice,
    ) -> Result<()> {
        let layer_size = self.extent.width as u64 * self.extent.height as u64 * 4;
        if layers.len() as u32 != self.array_layers {
            return Err(eyre!(
                "Expected {} image layers, got {}",
                self.array_layers,
                layers.len(),
            ));
        }
        if let Some(layer) = layers.iter().find(|layer| layer.len() as u64 != layer_size) {
            return Err(eyre!(
                "Image layer has {} bytes, expected {} for {}x{} RGBA8",
                layer.len(),
                layer_size,
                self.extent.width,
                self.extent.height,
            ));
        }

        let mut staging_buffer = Buffer::new(
            layer_size * self.array_layers as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "Image staging buffer",
            MemoryLocation::CpuToGpu,
            self.memory_allocator.clone(),
            self.device.clone(),
        )?;
        for (i, layer) in layers.iter().enumerate() {
            staging_buffer.write(*layer, i * layer_size as usize)?;
        }

        let regions = layer_copy_regions(self.extent, self.array_layers, layer_size);
        dev.immediate_submit(|cmd: vk::CommandBuffer, device: &ash::Device| {
            ImageTransition::undefined_to_transfer_dst(self.array_layers)
                .record(cmd, self.image, device);

            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    staging_buffer.buffer,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
            }

            ImageTransition::transfer_dst_to_shader_read(self.array_layers)
                .record(cmd, self.image, device);
            Ok(())
        })
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                if let Err(e) = self.memory_allocator.free(allocation) {
                    log::error!("Failed to free image memory: {e}");
                }
            }
            self.device.destroy_image(self.image, None);
        }
    }
}

/// One tightly-packed buffer region per layer, laid out back to back
pub fn layer_copy_regions(
    extent: vk::Extent3D,
    layer_count: u32,
    layer_size: u64,
) -> Vec<vk::BufferImageCopy> {
    (0..layer_count)
        .map(|layer| vk::BufferImageCopy {
            buffer_offset: layer as u64 * layer_size,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: layer,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: extent,
        })
        .collect()
}

pub struct Sampler {
    pub sampler: vk::Sampler,
    device: Arc<ash::Device>,
}

impl Sampler {
    pub fn new(
        filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(0.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);
        let sampler = unsafe { device.create_sampler(&info, None)? };
        Ok(Self { sampler, device })
    }

    /// Material textures: crisp texels, no wrapping
    pub fn nearest_clamp(device: Arc<ash::Device>) -> Result<Self> {
        Self::new(vk::Filter::NEAREST, vk::SamplerAddressMode::CLAMP_TO_EDGE, device)
    }

    pub fn linear_repeat(device: Arc<ash::Device>) -> Result<Self> {
        Self::new(vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT, device)
    }

    /// Cubemaps, so face seams do not bleed
    pub fn linear_clamp(device: Arc<ash::Device>) -> Result<Self> {
        Self::new(vk::Filter::LINEAR, vk::SamplerAddressMode::CLAMP_TO_EDGE, device)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_land_in_consecutive_layers() {
        let extent = vk::Extent3D { width: 4, height: 4, depth: 1 };
        let layer_size = 4 * 4 * 4;
        let regions = layer_copy_regions(extent, CUBE_FACE_COUNT, layer_size);

        assert_eq!(regions.len(), 6);
        for (i, region) in regions.iter().enumerate() {
            assert_eq!(region.buffer_offset, i as u64 * layer_size);
            assert_eq!(region.image_subresource.base_array_layer, i as u32);
            assert_eq!(region.image_subresource.layer_count, 1);
            assert_eq!(region.image_extent.width, 4);
        }
    }
}
