use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};

/// Rounds `size` up to a multiple of `alignment`.
/// Anything that fits inside a single alignment unit takes the whole unit.
pub fn align_stride(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return size;
    }
    if size <= alignment {
        alignment
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// Index of the first memory type allowed by `type_bits` that has every flag in `required`
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    properties.memory_types[..properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .position(|(i, memory_type)| {
            (type_bits & (1 << i)) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|i| i as u32)
        .ok_or_else(|| eyre!(
            "No suitable memory type found (type bits {:#b}, flags {:?})",
            type_bits,
            required,
        ))
}

/// The minimum property flags a memory location cannot do without
pub fn required_memory_flags(location: MemoryLocation) -> vk::MemoryPropertyFlags {
    match location {
        MemoryLocation::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        MemoryLocation::CpuToGpu | MemoryLocation::GpuToCpu => vk::MemoryPropertyFlags::HOST_VISIBLE,
        MemoryLocation::Unknown => vk::MemoryPropertyFlags::empty(),
    }
}

/// Shared handle to the device memory allocator.
/// Every allocation is checked against the device's memory types first so a
/// missing type fails with a clear message instead of a generic allocator error.
#[derive(Clone)]
pub struct MemoryAllocator {
    allocator: Arc<Mutex<Allocator>>,
    properties: vk::PhysicalDeviceMemoryProperties,
}

impl MemoryAllocator {
    pub fn new(
        allocator: Allocator,
        properties: vk::PhysicalDeviceMemoryProperties,
    ) -> Self {
        Self {
            allocator: Arc::new(Mutex::new(allocator)),
            properties,
        }
    }

    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        scheme: AllocationScheme,
    ) -> Result<Allocation> {
        let linear = matches!(scheme, AllocationScheme::DedicatedBuffer(_));
        let memory_type = find_memory_type(
            &self.properties,
            requirements.memory_type_bits,
            required_memory_flags(location),
        )?;
        log::trace!(
            "Allocating {} bytes for \"{}\" ({:?}, first matching memory type {})",
            requirements.size,
            name,
            location,
            memory_type,
        );

        Ok(self
            .allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: scheme,
            })?)
    }

    pub fn free(&self, allocation: Allocation) -> Result<()> {
        self.allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))?
            .free(allocation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            properties.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        properties
    }

    #[test]
    fn align_stride_examples() {
        assert_eq!(align_stride(16, 256), 256);
        assert_eq!(align_stride(256, 256), 256);
        assert_eq!(align_stride(300, 256), 512);
        assert_eq!(align_stride(32, 64), 64);
        assert_eq!(align_stride(65, 64), 128);
    }

    #[test]
    fn align_stride_is_aligned_covering_and_idempotent() {
        for alignment in [1u64, 4, 16, 64, 256] {
            for size in 1u64..=600 {
                let stride = align_stride(size, alignment);
                assert_eq!(stride % alignment, 0);
                assert!(stride >= size);
                assert_eq!(align_stride(stride, alignment), stride);
            }
        }
    }

    #[test]
    fn finds_first_type_matching_bits_and_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(), 0);
        assert_eq!(find_memory_type(&props, 0b111, host).unwrap(), 2);
        // Type 1 is excluded by the bitmask even though its flags match
        assert_eq!(find_memory_type(&props, 0b101, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(), 2);
    }

    #[test]
    fn missing_memory_type_is_an_error() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(err.to_string().contains("No suitable memory type found"));

        // Bits beyond the reported type count are ignored
        assert!(find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::empty()).is_err());
    }
}
