use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;
use winit::window::Window;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::RenderDeviceContext;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::internals::swapchain::{Swapchain, SwapchainDesc};
use crate::renderer::resources::image::Image;

/// What the renderer keeps of the render target to rebuild the swapchain on its own
struct SurfaceInfo {
    window: Arc<Window>,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    queue_family_indices: Vec<u32>,
}

impl SurfaceInfo {
    fn window_extent(&self) -> vk::Extent2D {
        let size = self.window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }

    fn swapchain_desc(&self, old_swapchain: vk::SwapchainKHR) -> SwapchainDesc<'_> {
        SwapchainDesc {
            surface: self.surface,
            surface_loader: &self.surface_loader,
            physical_device: self.physical_device,
            surface_format: self.surface_format,
            present_mode: self.present_mode,
            window_extent: self.window_extent(),
            queue_family_indices: &self.queue_family_indices,
            old_swapchain,
        }
    }
}

/// The swapchain and the depth buffer sized to match it
pub struct Presentation {
    pub depth_image: Image,
    pub swapchain: Swapchain,

    depth_format: vk::Format,
    loader: ash::khr::swapchain::Device,
    surface: SurfaceInfo,
}

impl Presentation {
    pub fn new(dev_ctx: &RenderDeviceContext, config: &RenderConfig) -> Result<Self> {
        let device = &dev_ctx.device;
        let target = &dev_ctx.target;

        let graphics_family = device.graphics_queue.family.index;
        let present_family = device.present_queue.family.index;
        let mut queue_family_indices = vec![graphics_family];
        if present_family != graphics_family {
            queue_family_indices.push(present_family);
        }

        let surface = SurfaceInfo {
            window: target.window.clone(),
            surface: target.surface,
            surface_loader: target.surface_loader.clone(),
            physical_device: device.physical,
            surface_format: target.surface_format,
            present_mode: target.present_mode(config.vsync),
            queue_family_indices,
        };
        log::info!("Present mode {:?}", surface.present_mode);

        let loader = ash::khr::swapchain::Device::new(&dev_ctx.instance.instance, &device.logical);
        let swapchain = Swapchain::new(
            &surface.swapchain_desc(vk::SwapchainKHR::null()),
            loader.clone(),
            device.logical.clone(),
        )?;
        log::info!(
            "Swapchain extent {}x{}",
            swapchain.extent.width,
            swapchain.extent.height,
        );
        let depth_image = Image::new_depth_image(
            swapchain.extent.width,
            swapchain.extent.height,
            config.depth_format,
            device,
        )?;

        Ok(Self {
            depth_image,
            swapchain,
            depth_format: config.depth_format,
            loader,
            surface,
        })
    }

    pub fn color_format(&self) -> vk::Format {
        self.surface.surface_format.format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Waits for the device to go idle, then replaces the swapchain, its views and the depth buffer
    pub fn rebuild(&mut self, device: &RenderDevice) -> Result<()> {
        device.wait_idle()?;

        let swapchain = Swapchain::new(
            &self.surface.swapchain_desc(self.swapchain.swapchain),
            self.loader.clone(),
            device.logical.clone(),
        )?;
        // Dropping the old one destroys its views and the retired swapchain
        self.swapchain = swapchain;
        self.depth_image = Image::new_depth_image(
            self.swapchain.extent.width,
            self.swapchain.extent.height,
            self.depth_format,
            device,
        )?;

        log::debug!(
            "Recreated swapchain at {}x{}",
            self.swapchain.extent.width,
            self.swapchain.extent.height,
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Image(u32),
    OutOfDate,
}

/// A suboptimal acquire still renders; presentation reports it again and triggers the rebuild
pub fn acquire_outcome(result: VkResult<(u32, bool)>) -> Result<Acquired> {
    match result {
        Ok((image_index, _suboptimal)) => Ok(Acquired::Image(image_index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
        Err(e) => Err(e.into()),
    }
}

/// Whether the swapchain must be rebuilt after presenting
pub fn present_outcome(result: VkResult<bool>, resize_pending: bool) -> Result<bool> {
    match result {
        Ok(suboptimal) => Ok(suboptimal || resize_pending),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_date_acquire_abandons_the_frame() {
        assert_eq!(
            acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            Acquired::OutOfDate,
        );
        assert_eq!(acquire_outcome(Ok((2, true))).unwrap(), Acquired::Image(2));
    }

    #[test]
    fn device_lost_on_acquire_is_fatal() {
        assert!(acquire_outcome(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn present_recreates_on_suboptimal_out_of_date_or_resize() {
        assert!(!present_outcome(Ok(false), false).unwrap());
        assert!(present_outcome(Ok(true), false).unwrap());
        assert!(present_outcome(Ok(false), true).unwrap());
        assert!(present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap());
        assert!(present_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR), false).is_err());
    }
}
