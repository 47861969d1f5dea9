use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::internals::descriptor_set_layout_builder::{DescriptorSetLayout, DescriptorSetLayoutBuilder};

/// The descriptor set layouts shared by the frame context, resource cache and pipelines.
/// Set 0 is always the camera, set 1 is either a material or a skybox.
pub struct DescriptorLayouts {
    pub camera: DescriptorSetLayout,
    pub material: DescriptorSetLayout,
    pub skybox: DescriptorSetLayout,
    device: Arc<ash::Device>,
}

impl DescriptorLayouts {
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        let camera = DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                1,
                vk::ShaderStageFlags::VERTEX,
                None,
            )
            .build(vk::DescriptorSetLayoutCreateFlags::empty(), &device)?;

        let material = match DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                1,
                vk::ShaderStageFlags::FRAGMENT,
                None,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                1,
                vk::ShaderStageFlags::FRAGMENT,
                None,
            )
            .build(vk::DescriptorSetLayoutCreateFlags::empty(), &device)
        {
            Ok(layout) => layout,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(camera.layout, None) };
                return Err(e);
            }
        };

        let skybox = match DescriptorSetLayoutBuilder::new()
            .add_binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                1,
                vk::ShaderStageFlags::FRAGMENT,
                None,
            )
            .build(vk::DescriptorSetLayoutCreateFlags::empty(), &device)
        {
            Ok(layout) => layout,
            Err(e) => {
                unsafe {
                    device.destroy_descriptor_set_layout(camera.layout, None);
                    device.destroy_descriptor_set_layout(material.layout, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            camera,
            material,
            skybox,
            device,
        })
    }

    pub fn geometry_set_layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.camera.layout, self.material.layout]
    }

    pub fn skybox_set_layouts(&self) -> [vk::DescriptorSetLayout; 2] {
        [self.camera.layout, self.skybox.layout]
    }
}

impl Drop for DescriptorLayouts {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.skybox.layout, None);
            self.device.destroy_descriptor_set_layout(self.material.layout, None);
            self.device.destroy_descriptor_set_layout(self.camera.layout, None);
        }
    }
}
