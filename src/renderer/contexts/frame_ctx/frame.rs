use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::internals::buffer::Buffer;
use crate::renderer::shader_data::CameraUniform;

/// Per frame-in-flight command buffer, synchronization and camera uniform
pub struct Frame {
    pub command_buffer: vk::CommandBuffer,

    /// Signaled once the acquired swapchain image can be rendered to
    pub image_available: vk::Semaphore,

    /// Signaled when this frame's GPU work has finished; created signaled
    pub in_flight: vk::Fence,

    pub camera_buffer: Buffer,
    pub camera_set: vk::DescriptorSet,
}

impl Frame {
    pub fn new(
        index: usize,
        command_buffer: vk::CommandBuffer,
        camera_set: vk::DescriptorSet,
        device: &RenderDevice,
    ) -> Result<Self> {
        let logical = &device.logical;
        let image_available = unsafe {
            logical.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        let in_flight = unsafe {
            logical.create_fence(
                &vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED),
                None,
            )?
        };

        let camera_buffer = Buffer::new(
            size_of::<CameraUniform>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            &format!("Camera Uniform {index}"),
            MemoryLocation::CpuToGpu,
            device.memory_allocator(),
            logical.clone(),
        )?;

        let buffer_info = [vk::DescriptorBufferInfo {
            buffer: camera_buffer.buffer,
            offset: 0,
            range: size_of::<CameraUniform>() as u64,
        }];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(camera_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe { logical.update_descriptor_sets(&[write], &[]) };

        Ok(Self {
            command_buffer,
            image_available,
            in_flight,
            camera_buffer,
            camera_set,
        })
    }

    /// Blocks until the GPU has finished the last submission that used this frame
    pub fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe {
            device
                .wait_for_fences(&[self.in_flight], true, u64::MAX)
                .map_err(|e| eyre!("Device unable to wait for fence to signal: {e}"))
        }
    }

    pub fn destroy_sync_objects(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}
