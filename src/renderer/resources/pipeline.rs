use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::resources::vertex::VertexInputDescription;

/// A graphics pipeline and the layout it was built with
pub struct Pipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    device: Arc<ash::Device>,
}

impl Pipeline {
    pub fn bind_pipeline(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    pub fn bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                first_set,
                descriptor_sets,
                dynamic_offsets,
            );
        }
    }

    pub fn update_push_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        stage_flags: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                stage_flags,
                0,
                data,
            );
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

pub fn check_push_constant_size(size: u32, limit: u32) -> Result<()> {
    if size > limit {
        return Err(eyre!(
            "Push constant size {} exceeds device limit {}",
            size,
            limit,
        ));
    }
    Ok(())
}

/// Builds a pipeline for dynamic rendering with dynamic viewport and scissor
pub struct GraphicsPipelineBuilder {
    device: Arc<ash::Device>,

    shader: Option<GraphicsShader>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_range: Option<vk::PushConstantRange>,
    max_push_constants_size: u32,
    vertex_input: VertexInputDescription,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth: DepthState,
    color_attachment_format: vk::Format,
    depth_attachment_format: vk::Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DepthState {
    test: bool,
    write: bool,
    compare: vk::CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: false,
            write: false,
            compare: vk::CompareOp::ALWAYS,
        }
    }
}

impl DepthState {
    fn create_info(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.test)
            .depth_write_enable(self.write)
            .depth_compare_op(self.compare)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
    }
}

impl GraphicsPipelineBuilder {
    pub fn new(device: Arc<ash::Device>, max_push_constants_size: u32) -> Self {
        Self {
            device,

            shader: None,
            set_layouts: Vec::new(),
            push_constant_range: None,
            max_push_constants_size,
            vertex_input: VertexInputDescription::default(),
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth: DepthState::default(),
            color_attachment_format: vk::Format::UNDEFINED,
            depth_attachment_format: vk::Format::UNDEFINED,
        }
    }

    pub fn with_shader(mut self, shader: GraphicsShader) -> Self {
        let _ = self.shader.replace(shader);
        self
    }

    pub fn with_descriptor_set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    pub fn with_push_constants(mut self, stage_flags: vk::ShaderStageFlags, size: u32) -> Self {
        self.push_constant_range = Some(vk::PushConstantRange {
            stage_flags,
            offset: 0,
            size,
        });
        self
    }

    pub fn with_vertex_input(mut self, description: VertexInputDescription) -> Self {
        self.vertex_input = description;
        self
    }

    pub fn with_cull_mode(
        mut self,
        cull_mode: vk::CullModeFlags,
        front_face: vk::FrontFace,
    ) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Turns the depth test on. Writes stay off unless `with_depth_write` is also called.
    pub fn with_depth_test(mut self, compare: vk::CompareOp) -> Self {
        self.depth.test = true;
        self.depth.compare = compare;
        self
    }

    pub fn with_depth_write(mut self) -> Self {
        self.depth.write = true;
        self
    }

    pub fn with_color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_attachment_format = format;
        self
    }

    pub fn with_depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_attachment_format = format;
        self
    }

    pub fn build(mut self) -> Result<Pipeline> {
        let device = self.device.clone();

        let shader = self
            .shader
            .take()
            .ok_or_eyre("No shader provided for GraphicsPipelineBuilder")?;

        let push_constant_ranges = match self.push_constant_range {
            Some(range) => {
                check_push_constant_size(range.size, self.max_push_constants_size)?;
                vec![range]
            }
            None => Vec::new(),
        };
        let pipeline_layout = unsafe {
            device.create_pipeline_layout(
                &vk::PipelineLayoutCreateInfo::default()
                    .set_layouts(&self.set_layouts)
                    .push_constant_ranges(&push_constant_ranges),
                None,
            )?
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shader.vert_mod)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shader.frag_mod)
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_attribute_descriptions(&self.vertex_input.attributes)
            .vertex_binding_descriptions(&self.vertex_input.bindings)
            .flags(self.vertex_input.flags);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false);
        // 1 sample per pixel means no multisampling
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);
        let depth_stencil = self.depth.create_info();
        let color_blend_attachments = [
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
        ];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let color_attachment_formats = [self.color_attachment_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_attachment_formats)
            .depth_attachment_format(self.depth_attachment_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .push_next(&mut rendering_info)
            .stages(&shader_stages)
            .layout(pipeline_layout)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_info);

        let pipeline = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(eyre!("Failed to create graphics pipeline: {err}"));
            }
        };

        // Shader modules are no longer needed once the pipeline exists
        drop(shader);

        Ok(Pipeline {
            pipeline,
            pipeline_layout,
            device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_within_limit_are_accepted() {
        assert!(check_push_constant_size(128, 128).is_ok());
        assert!(check_push_constant_size(64, 256).is_ok());
    }

    #[test]
    fn depth_test_without_writes_keeps_writes_off() {
        let state = DepthState {
            test: true,
            compare: vk::CompareOp::LESS_OR_EQUAL,
            ..DepthState::default()
        };
        let info = state.create_info();
        assert_eq!(info.depth_test_enable, vk::TRUE);
        assert_eq!(info.depth_write_enable, vk::FALSE);
        assert_eq!(info.depth_compare_op, vk::CompareOp::LESS_OR_EQUAL);
    }

    #[test]
    fn default_depth_state_is_disabled() {
        let info = DepthState::default().create_info();
        assert_eq!(info.depth_test_enable, vk::FALSE);
        assert_eq!(info.depth_write_enable, vk::FALSE);
    }

    #[test]
    fn oversized_push_constants_are_fatal() {
        let err = check_push_constant_size(256, 128).unwrap_err();
        assert!(err.to_string().contains("exceeds device limit"));
    }
}
