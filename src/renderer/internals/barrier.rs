use ash::vk;

/// One image layout change with explicit synchronization scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub aspect: vk::ImageAspectFlags,
    pub layer_count: u32,
}

impl ImageTransition {
    /// Swapchain image, before anything is drawn into it
    pub fn undefined_to_color_attachment() -> Self {
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            aspect: vk::ImageAspectFlags::COLOR,
            layer_count: 1,
        }
    }

    pub fn color_attachment_to_present() -> Self {
        Self {
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            dst_access: vk::AccessFlags2::NONE,
            aspect: vk::ImageAspectFlags::COLOR,
            layer_count: 1,
        }
    }

    /// The previous frame's depth contents are discarded
    pub fn undefined_to_depth_attachment() -> Self {
        let depth_stages = vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            src_stage: depth_stages,
            src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_stage: depth_stages,
            dst_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            aspect: vk::ImageAspectFlags::DEPTH,
            layer_count: 1,
        }
    }

    pub fn undefined_to_transfer_dst(layer_count: u32) -> Self {
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::TRANSFER,
            dst_access: vk::AccessFlags2::TRANSFER_WRITE,
            aspect: vk::ImageAspectFlags::COLOR,
            layer_count,
        }
    }

    pub fn transfer_dst_to_shader_read(layer_count: u32) -> Self {
        Self {
            old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::TRANSFER,
            src_access: vk::AccessFlags2::TRANSFER_WRITE,
            dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            dst_access: vk::AccessFlags2::SHADER_READ,
            aspect: vk::ImageAspectFlags::COLOR,
            layer_count,
        }
    }

    pub fn barrier(&self, image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.src_stage)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stage)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: self.layer_count,
            })
    }

    pub fn record(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        device: &ash::Device,
    ) {
        let barriers = [self.barrier(image)];
        let dep_info = vk::DependencyInfo::default()
            .image_memory_barriers(&barriers);

        unsafe {
            device.cmd_pipeline_barrier2(cmd, &dep_info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubemap_transition_covers_all_layers() {
        let barrier = ImageTransition::undefined_to_transfer_dst(6).barrier(vk::Image::null());
        assert_eq!(barrier.subresource_range.base_array_layer, 0);
        assert_eq!(barrier.subresource_range.layer_count, 6);
        assert_eq!(barrier.new_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        let barrier = ImageTransition::transfer_dst_to_shader_read(6).barrier(vk::Image::null());
        assert_eq!(barrier.subresource_range.layer_count, 6);
        assert_eq!(barrier.old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags2::SHADER_READ);
    }

    #[test]
    fn present_transition_waits_for_color_writes() {
        let t = ImageTransition::color_attachment_to_present();
        assert_eq!(t.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(t.dst_stage, vk::PipelineStageFlags2::BOTTOM_OF_PIPE);
        assert_eq!(t.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn depth_transition_uses_depth_aspect() {
        let barrier = ImageTransition::undefined_to_depth_attachment().barrier(vk::Image::null());
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert!(barrier.dst_stage_mask.contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS));
        assert_eq!(barrier.new_layout, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);
    }
}
