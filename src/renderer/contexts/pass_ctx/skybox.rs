use ash::vk;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::pass_ctx::{PassContext, RenderPass};
use crate::renderer::contexts::resource_ctx::layouts::DescriptorLayouts;
use crate::renderer::resources::pipeline::{GraphicsPipelineBuilder, Pipeline};
use crate::renderer::resources::shader::GraphicsShader;

/// Clears the colour target and fills it with the active skybox, if any
pub struct SkyboxPass {
    pipeline: Pipeline,
}

impl SkyboxPass {
    pub fn new(
        color_format: vk::Format,
        layouts: &DescriptorLayouts,
        device: &RenderDevice,
    ) -> Result<Self> {
        let shader = GraphicsShader::new("skybox", device.logical.clone())?;
        // Rendered without a depth attachment, so the depth state never applies
        let pipeline = GraphicsPipelineBuilder::new(
            device.logical.clone(),
            device.limits().max_push_constants_size,
        )
            .with_shader(shader)
            .with_descriptor_set_layouts(&layouts.skybox_set_layouts())
            .with_cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            .with_depth_test(vk::CompareOp::LESS_OR_EQUAL)
            .with_color_attachment_format(color_format)
            .build()?;

        Ok(Self { pipeline })
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &'static str {
        "Skybox"
    }

    fn record_commands(&self, ctx: &PassContext) -> Result<()> {
        let cmd = ctx.command_buffer;
        let device = ctx.device;

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(ctx.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: ctx.clear_color,
                },
            })];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: ctx.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);

        unsafe { device.cmd_begin_rendering(cmd, &rendering_info) };

        let skybox = match (ctx.resources, ctx.skybox) {
            (Some(resources), Some(handle)) => Some(resources.gpu_skybox(handle)?),
            _ => None,
        };
        if let Some(skybox) = skybox {
            self.pipeline.bind_pipeline(cmd);
            ctx.set_viewport_and_scissor();
            self.pipeline.bind_descriptor_sets(
                cmd,
                0,
                &[ctx.camera_set, skybox.descriptor_sets[ctx.frame_index]],
                &[],
            );
            unsafe { device.cmd_draw(cmd, 3, 1, 0, 0) };
        }

        unsafe { device.cmd_end_rendering(cmd) };
        Ok(())
    }
}
