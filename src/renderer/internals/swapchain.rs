use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;

/// Everything needed to (re)build a swapchain for one surface
pub struct SwapchainDesc<'a> {
    pub surface: vk::SurfaceKHR,
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub window_extent: vk::Extent2D,
    pub queue_family_indices: &'a [u32],
    /// Retired by the new swapchain, or null on first creation
    pub old_swapchain: vk::SwapchainKHR,
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,

    loader: ash::khr::swapchain::Device,
    device: Arc<ash::Device>,
}

impl Swapchain {
    pub fn new(
        desc: &SwapchainDesc,
        loader: ash::khr::swapchain::Device,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let surface_capabilities = unsafe {
            desc.surface_loader
                .get_physical_device_surface_capabilities(desc.physical_device, desc.surface)?
        };

        let extent = choose_extent(&surface_capabilities, desc.window_extent);
        let min_image_count = choose_image_count(&surface_capabilities);
        let pre_transform = if surface_capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            surface_capabilities.current_transform
        };

        // Graphics and present may live on different families
        let (sharing_mode, family_indices): (_, &[u32]) = if desc.queue_family_indices.len() > 1 {
            (vk::SharingMode::CONCURRENT, desc.queue_family_indices)
        } else {
            (vk::SharingMode::EXCLUSIVE, &[])
        };

        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(min_image_count)
            .image_format(desc.surface_format.format)
            .image_color_space(desc.surface_format.color_space)
            .image_extent(extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(desc.old_swapchain);

        let swapchain = unsafe {
            loader.create_swapchain(&swapchain_info, None)?
        };

        let images = unsafe { loader.get_swapchain_images(swapchain)? };
        let image_views = match create_image_views(&images, desc.surface_format.format, &device) {
            Ok(views) => views,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        log::debug!(
            "Created swapchain: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            images.len(),
            desc.present_mode,
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            extent,
            loader,
            device,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// `Ok((index, suboptimal))`, or `Err(ERROR_OUT_OF_DATE_KHR)` when the surface changed
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                signal,
                vk::Fence::null(),
            )
        }
    }

    /// `Ok(true)` means the presentation was suboptimal
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        unsafe { self.loader.queue_present(queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_image_views(
    images: &[vk::Image],
    format: vk::Format,
    device: &ash::Device,
) -> VkResult<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|image| {
            let view_info = vk::ImageViewCreateInfo::default()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(*image);
            unsafe { device.create_image_view(&view_info, None) }
        })
        .collect::<VkResult<Vec<vk::ImageView>>>()
}

/// The surface's fixed extent when it has one, otherwise the window size clamped to the surface limits
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum so the driver never makes us wait, capped by the maximum (0 = unbounded)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    if max > 0 && min + 1 > max {
        max
    } else {
        min + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2048 },
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let caps = capabilities((800, 600), 2, 3);
        let extent = choose_extent(&caps, vk::Extent2D { width: 1920, height: 1080 });
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn window_extent_is_clamped_when_surface_is_flexible() {
        let caps = capabilities((u32::MAX, u32::MAX), 2, 3);
        let extent = choose_extent(&caps, vk::Extent2D { width: 8000, height: 0 });
        assert_eq!((extent.width, extent.height), (4096, 1));
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 3)), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), 3, 3)), 3);
        assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0)), 3);
    }
}
