use color_eyre::Result;
use ash::vk;
use gpu_descriptor::DescriptorTotalCount;

pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        descriptor_count: u32,
        stages: vk::ShaderStageFlags,
        immutable_samplers: Option<&'a [vk::Sampler]>,
    ) -> Self {
        let mut binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(descriptor_count)
            .stage_flags(stages);

        if let Some(immutable_samplers) = immutable_samplers {
            binding = binding.immutable_samplers(immutable_samplers);
        }

        self.bindings.push(binding);
        self
    }

    /// Per-type totals for one set of this layout, as the descriptor allocator wants them
    pub fn descriptor_count(&self) -> DescriptorTotalCount {
        let mut count = DescriptorTotalCount::default();
        for binding in &self.bindings {
            let n = binding.descriptor_count;
            match binding.descriptor_type {
                vk::DescriptorType::SAMPLER => count.sampler += n,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER => count.combined_image_sampler += n,
                vk::DescriptorType::SAMPLED_IMAGE => count.sampled_image += n,
                vk::DescriptorType::STORAGE_IMAGE => count.storage_image += n,
                vk::DescriptorType::UNIFORM_TEXEL_BUFFER => count.uniform_texel_buffer += n,
                vk::DescriptorType::STORAGE_TEXEL_BUFFER => count.storage_texel_buffer += n,
                vk::DescriptorType::UNIFORM_BUFFER => count.uniform_buffer += n,
                vk::DescriptorType::STORAGE_BUFFER => count.storage_buffer += n,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC => count.uniform_buffer_dynamic += n,
                vk::DescriptorType::STORAGE_BUFFER_DYNAMIC => count.storage_buffer_dynamic += n,
                vk::DescriptorType::INPUT_ATTACHMENT => count.input_attachment += n,
                _ => log::warn!("Descriptor type {:?} is not counted", binding.descriptor_type),
            }
        }
        count
    }

    pub fn build(
        self,
        flags: vk::DescriptorSetLayoutCreateFlags,
        device: &ash::Device,
    ) -> Result<DescriptorSetLayout> {
        let descriptor_count = self.descriptor_count();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings)
            .flags(flags);
        let layout = unsafe {
            device.create_descriptor_set_layout(&layout_info, None)?
        };
        Ok(DescriptorSetLayout {
            layout,
            descriptor_count,
        })
    }
}

/// A layout together with the descriptor totals needed to allocate one set of it.
/// The owner is responsible for destroying `layout`.
pub struct DescriptorSetLayout {
    pub layout: vk::DescriptorSetLayout,
    pub descriptor_count: DescriptorTotalCount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_layout_counts_each_descriptor_type() {
        let builder = DescriptorSetLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 1, vk::ShaderStageFlags::FRAGMENT, None)
            .add_binding(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1, vk::ShaderStageFlags::FRAGMENT, None);
        let count = builder.descriptor_count();

        assert_eq!(count.uniform_buffer_dynamic, 1);
        assert_eq!(count.combined_image_sampler, 1);
        assert_eq!(count.uniform_buffer, 0);
    }
}
