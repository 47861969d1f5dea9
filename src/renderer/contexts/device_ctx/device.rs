use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_descriptor::{DescriptorAllocator, DescriptorSet, DescriptorSetLayoutCreateFlags};
use crate::renderer::contexts::device_ctx::descriptor_device::DescriptorAshDevice;
use crate::renderer::contexts::device_ctx::queue::{Queue, QueueFamily, QueueFamilySelection};
use crate::renderer::contexts::device_ctx::transfer_ctx::TransferContext;
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayout;
use crate::renderer::internals::memory::MemoryAllocator;

pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Up to this many descriptor sets are carved out of each pool
const DESCRIPTOR_POOL_CAPACITY: u32 = 1024;

pub type DescriptorSetAllocator = DescriptorAllocator<vk::DescriptorPool, vk::DescriptorSet>;

/// Physical + logical device, queues and the primitives everything else builds resources with
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,

    pub graphics_queue: Arc<Queue>,
    pub present_queue: Arc<Queue>,

    command_pool: vk::CommandPool,
    memory_allocator: ManuallyDrop<MemoryAllocator>,
    descriptor_allocator: ManuallyDrop<Mutex<DescriptorSetAllocator>>,
    descriptor_device: DescriptorAshDevice,
    transfer_context: ManuallyDrop<TransferContext>,
}

impl RenderDevice {
    pub fn new(
        instance: &ash::Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self> {
        log::info!("Selecting physical device");
        let (physical_device, queue_families) = Self::select_physical_device(
            instance,
            surface,
            surface_loader,
        )?;
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Using {:?} ({:?}), graphics family {}, present family {}",
            properties.device_name_as_c_str().unwrap_or(c"<unknown>"),
            properties.device_type,
            queue_families.graphics.index,
            queue_families.present.index,
        );

        log::info!("Creating logical device");
        let (
            logical_device,
            graphics_queue,
            present_queue,
        ) = Self::create_logical_device(
            instance,
            physical_device,
            &queue_families,
        )?;

        let memory_properties = unsafe {
            instance.get_physical_device_memory_properties(physical_device)
        };
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: logical_device.clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        let logical_device = Arc::new(logical_device);
        let graphics_queue = Arc::new(graphics_queue);
        let present_queue = Arc::new(present_queue);

        let command_pool = unsafe {
            logical_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(graphics_queue.family.index)
                    // Frame command buffers are reset one at a time
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
                None,
            )?
        };

        let transfer_context = TransferContext::new(
            graphics_queue.clone(),
            logical_device.clone(),
        )?;

        Ok(Self {
            descriptor_device: DescriptorAshDevice::from(logical_device.clone()),
            logical: logical_device,
            physical: physical_device,
            properties,

            graphics_queue,
            present_queue,

            command_pool,
            memory_allocator: ManuallyDrop::new(MemoryAllocator::new(allocator, memory_properties)),
            descriptor_allocator: ManuallyDrop::new(Mutex::new(DescriptorAllocator::new(DESCRIPTOR_POOL_CAPACITY))),
            transfer_context: ManuallyDrop::new(transfer_context),
        })
    }

    pub fn memory_allocator(&self) -> MemoryAllocator {
        (*self.memory_allocator).clone()
    }

    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    /// Records and runs a one-off command buffer, returning once the GPU has finished it
    pub fn immediate_submit<F>(
        &self,
        func: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer, &ash::Device) -> Result<()>,
    {
        self.transfer_context.immediate_submit(func)
    }

    pub fn allocate_command_buffers(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .command_buffer_count(count)
            .level(vk::CommandBufferLevel::PRIMARY);
        Ok(unsafe { self.logical.allocate_command_buffers(&info)? })
    }

    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.logical.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    pub fn allocate_descriptor_sets(
        &self,
        layout: &DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<DescriptorSet<vk::DescriptorSet>>> {
        let mut allocator = self
            .descriptor_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?;
        Ok(unsafe {
            allocator.allocate(
                &self.descriptor_device,
                &layout.layout,
                DescriptorSetLayoutCreateFlags::empty(),
                &layout.descriptor_count,
                count,
            )?
        })
    }

    pub fn free_descriptor_sets(
        &self,
        sets: impl IntoIterator<Item = DescriptorSet<vk::DescriptorSet>>,
    ) {
        match self.descriptor_allocator.lock() {
            Ok(mut allocator) => unsafe {
                allocator.free(&self.descriptor_device, sets);
            },
            Err(e) => log::error!("Descriptor allocator poisoned: {e}"),
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.logical.device_wait_idle()? };
        Ok(())
    }

    fn select_physical_device(
        instance: &ash::Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<(vk::PhysicalDevice, QueueFamilySelection)> {
        let required_extensions = Self::get_required_device_extensions();

        let candidates = unsafe { instance.enumerate_physical_devices()? }
            .into_iter()
            .filter_map(|device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                let name = properties
                    .device_name_as_c_str()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();

                let supported_extensions = unsafe {
                    instance
                        .enumerate_device_extension_properties(device)
                        .unwrap_or_default()
                };
                let supported_extensions = supported_extensions
                    .iter()
                    .filter_map(|ext| ext.extension_name_as_c_str().ok())
                    .collect::<Vec<&CStr>>();

                let queue_families = unsafe {
                    instance.get_physical_device_queue_family_properties(device)
                }
                    .iter()
                    .enumerate()
                    .map(|(i, props)| {
                        let supports_present = unsafe {
                            surface_loader
                                .get_physical_device_surface_support(device, i as u32, surface)
                                .unwrap_or(false)
                        };
                        QueueFamily::new(i as u32, props.queue_flags, supports_present)
                    })
                    .collect::<Vec<_>>();

                match check_device_suitability(
                    properties.api_version,
                    &queue_families,
                    &supported_extensions,
                    &required_extensions,
                ) {
                    Ok(selection) => Some((device, properties.device_type, selection)),
                    Err(reason) => {
                        log::info!("Skipping device {name}: {reason}");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        let chosen = preferred_device_index(candidates.iter().map(|(_, ty, _)| *ty))
            .ok_or_eyre("No suitable physical device found")?;
        let (device, _, selection) = candidates
            .into_iter()
            .nth(chosen)
            .ok_or_eyre("No suitable physical device found")?;
        Ok((device, selection))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: &QueueFamilySelection,
    ) -> Result<(ash::Device, Queue, Queue)> {
        let queue_priorities = [1.0];
        let queue_create_infos = queue_families
            .unique_indices()
            .into_iter()
            .map(|index| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(index)
                    .queue_priorities(&queue_priorities)
            })
            .collect::<Vec<_>>();

        let device = {
            let enabled_extension_names = Self::get_required_device_extensions()
                .iter()
                .map(|ext| ext.as_ptr())
                .collect::<Vec<*const c_char>>();

            let features = vk::PhysicalDeviceFeatures::default();
            let mut vulkan_11_features = vk::PhysicalDeviceVulkan11Features::default()
                .shader_draw_parameters(true);
            let mut vulkan_13_features = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&enabled_extension_names)
                .enabled_features(&features)
                .push_next(&mut vulkan_11_features)
                .push_next(&mut vulkan_13_features);

            unsafe {
                instance.create_device(physical_device, &device_create_info, None)?
            }
        };

        let graphics_queue = unsafe {
            let queue = device.get_device_queue(queue_families.graphics.index, 0);
            Queue::new(queue_families.graphics.clone(), queue)
        };
        let present_queue = unsafe {
            let queue = device.get_device_queue(queue_families.present.index, 0);
            Queue::new(queue_families.present.clone(), queue)
        };

        Ok((device, graphics_queue, present_queue))
    }

    fn get_required_device_extensions() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,
            ash::khr::spirv_1_4::NAME,
            ash::khr::synchronization2::NAME,
            ash::khr::create_renderpass2::NAME,
            ash::khr::dynamic_rendering::NAME,

            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.logical.device_wait_idle() {
                log::error!("Failed to wait for device idle on shutdown: {e}");
            }

            ManuallyDrop::drop(&mut self.transfer_context);

            let mut descriptor_allocator = ManuallyDrop::take(&mut self.descriptor_allocator);
            if let Ok(allocator) = descriptor_allocator.get_mut() {
                allocator.cleanup(&self.descriptor_device);
            }
            drop(descriptor_allocator);

            // The allocator releases its memory blocks on drop, which needs a live device
            ManuallyDrop::drop(&mut self.memory_allocator);

            self.logical.destroy_command_pool(self.command_pool, None);
            self.logical.destroy_device(None);
        }
    }
}

/// Why a device cannot be used, or the queue families it would be used with
pub fn check_device_suitability(
    api_version: u32,
    queue_families: &[QueueFamily],
    supported_extensions: &[&CStr],
    required_extensions: &[&CStr],
) -> std::result::Result<QueueFamilySelection, String> {
    if api_version < MIN_API_VERSION {
        return Err(format!(
            "API version {}.{} is below 1.3",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
        ));
    }

    let missing = required_extensions
        .iter()
        .filter(|req| !supported_extensions.contains(*req))
        .map(|req| req.to_string_lossy())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(format!("missing device extensions {}", missing.join(", ")));
    }

    QueueFamilySelection::from_families(queue_families)
        .ok_or_else(|| "no graphics and present capable queue families".to_string())
}

/// Discrete GPUs first, otherwise whichever suitable device was listed first
pub fn preferred_device_index(
    device_types: impl IntoIterator<Item = vk::PhysicalDeviceType>,
) -> Option<usize> {
    device_types
        .into_iter()
        .enumerate()
        .min_by_key(|(_, device_type)| match *device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 0,
            _ => 1,
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graphics_family() -> Vec<QueueFamily> {
        vec![QueueFamily::new(0, vk::QueueFlags::GRAPHICS, true)]
    }

    #[test]
    fn discrete_gpu_is_preferred() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(preferred_device_index(types), Some(1));
    }

    #[test]
    fn first_suitable_device_without_discrete() {
        let types = [
            vk::PhysicalDeviceType::VIRTUAL_GPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
        ];
        assert_eq!(preferred_device_index(types), Some(0));
        assert_eq!(preferred_device_index([]), None);
    }

    #[test]
    fn old_api_versions_are_rejected() {
        let reason = check_device_suitability(
            vk::API_VERSION_1_2,
            &graphics_family(),
            &[ash::khr::swapchain::NAME],
            &[ash::khr::swapchain::NAME],
        )
        .unwrap_err();
        assert!(reason.contains("1.2"));
    }

    #[test]
    fn missing_extensions_are_reported() {
        let reason = check_device_suitability(
            vk::API_VERSION_1_3,
            &graphics_family(),
            &[],
            &[ash::khr::swapchain::NAME],
        )
        .unwrap_err();
        assert!(reason.contains("VK_KHR_swapchain"));
    }

    #[test]
    fn suitable_device_yields_queue_families() {
        let selection = check_device_suitability(
            vk::API_VERSION_1_3,
            &graphics_family(),
            &[ash::khr::swapchain::NAME],
            &[ash::khr::swapchain::NAME],
        )
        .unwrap();
        assert_eq!(selection.graphics.index, 0);
    }
}
