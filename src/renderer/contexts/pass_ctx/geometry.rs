use ash::vk;
use color_eyre::Result;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::pass_ctx::{PassContext, RenderPass};
use crate::renderer::contexts::resource_ctx::layouts::DescriptorLayouts;
use crate::renderer::internals::barrier::ImageTransition;
use crate::renderer::resources::pipeline::{GraphicsPipelineBuilder, Pipeline};
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::resources::vertex::VertexInputDescription;
use crate::renderer::shader_data::GeometryPushConstants;

/// Draws every mesh in submission order on top of whatever the earlier passes left
pub struct GeometryPass {
    pipeline: Pipeline,
}

impl GeometryPass {
    pub fn new(
        color_format: vk::Format,
        depth_format: vk::Format,
        layouts: &DescriptorLayouts,
        device: &RenderDevice,
    ) -> Result<Self> {
        let shader = GraphicsShader::new("basic", device.logical.clone())?;
        let pipeline = GraphicsPipelineBuilder::new(
            device.logical.clone(),
            device.limits().max_push_constants_size,
        )
            .with_shader(shader)
            .with_descriptor_set_layouts(&layouts.geometry_set_layouts())
            .with_push_constants(
                vk::ShaderStageFlags::VERTEX,
                size_of::<GeometryPushConstants>() as u32,
            )
            .with_vertex_input(VertexInputDescription::for_vertex())
            .with_cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
            .with_depth_test(vk::CompareOp::LESS)
            .with_depth_write()
            .with_color_attachment_format(color_format)
            .with_depth_attachment_format(depth_format)
            .build()?;

        Ok(Self { pipeline })
    }
}

impl RenderPass for GeometryPass {
    fn name(&self) -> &'static str {
        "Geometry"
    }

    fn record_commands(&self, ctx: &PassContext) -> Result<()> {
        let cmd = ctx.command_buffer;
        let device = ctx.device;

        ImageTransition::undefined_to_depth_attachment().record(cmd, ctx.depth_image, device);

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(ctx.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(ctx.depth_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: ctx.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe { device.cmd_begin_rendering(cmd, &rendering_info) };

        let buffers = ctx
            .resources
            .and_then(|resources| resources.geometry_buffers().map(|b| (resources, b)));
        if let Some((resources, (vertex_buffer, index_buffer))) = buffers {
            self.pipeline.bind_pipeline(cmd);
            ctx.set_viewport_and_scissor();
            unsafe {
                device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[0]);
                device.cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
            }
            self.pipeline.bind_descriptor_sets(cmd, 0, &[ctx.camera_set], &[]);

            for draw in ctx.draws {
                let mesh = resources.gpu_mesh(draw.mesh)?;

                let push_constants = GeometryPushConstants::new(draw.transform);
                self.pipeline.update_push_constants(
                    cmd,
                    vk::ShaderStageFlags::VERTEX,
                    bytemuck::bytes_of(&push_constants),
                );

                if let Some(material) = draw.resolve_material(mesh.material) {
                    let material = resources.gpu_material(material)?;
                    self.pipeline.bind_descriptor_sets(
                        cmd,
                        1,
                        &[material.descriptor_sets[ctx.frame_index]],
                        &[material.offset],
                    );
                }

                unsafe {
                    device.cmd_draw_indexed(
                        cmd,
                        mesh.index_count,
                        1,
                        mesh.index_offset,
                        mesh.vertex_offset as i32,
                        0,
                    );
                }
            }
        }

        unsafe { device.cmd_end_rendering(cmd) };
        Ok(())
    }
}
