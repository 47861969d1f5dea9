use ash::vk;
use color_eyre::eyre::{eyre, Result};
use gpu_allocator::{
    vulkan::{Allocation, AllocationScheme},
    MemoryLocation,
};
use std::sync::Arc;
use crate::renderer::internals::memory::MemoryAllocator;

pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: u64,

    allocation: Option<Allocation>,
    memory_allocator: MemoryAllocator,
    device: Arc<ash::Device>,
}

impl Buffer {
    pub fn new(
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_loc: MemoryLocation,
        memory_allocator: MemoryAllocator,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let buffer_info = vk::BufferCreateInfo {
                size,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                ..Default::default()
            };
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let requirements = unsafe {
            device.get_buffer_memory_requirements(buffer)
        };
        let allocation = match memory_allocator.allocate(
            name,
            requirements,
            mem_loc,
            AllocationScheme::DedicatedBuffer(buffer),
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // Drop releases both the buffer and its memory if binding fails
        let buffer = Self {
            buffer,
            size,

            allocation: Some(allocation),
            memory_allocator,
            device,
        };
        if let Some(allocation) = buffer.allocation.as_ref() {
            unsafe {
                buffer.device.bind_buffer_memory(
                    buffer.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }
        Ok(buffer)
    }

    /// Copies `data` into the mapped allocation at byte offset `start_offset`.
    /// Only valid for host-visible buffers.
    pub fn write<T>(
        &mut self,
        data: &[T],
        start_offset: usize,
    ) -> Result<presser::CopyRecord>
    where
        T: Copy,
    {
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| eyre!("Buffer has no backing allocation"))?;
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| eyre!("Buffer memory is not host visible"))?;
        let mut raw =
            presser::RawAllocation::from_raw_parts(mapped.cast::<u8>(), allocation.size() as usize);
        // The mapping stays valid for as long as the allocation is alive
        let mut slab = unsafe { raw.borrow_as_slab() };
        Ok(presser::copy_from_slice_to_offset(
            data,
            &mut slab,
            start_offset,
        )?)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.memory_allocator.free(allocation) {
                log::error!("Failed to free buffer memory: {e}");
            }
        }
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}
