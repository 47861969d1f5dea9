pub mod camera;
pub mod config;
pub mod contexts;
pub mod draw;

mod internals;
mod presentation;
mod resources;
mod shader_data;
mod state;

use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::assets::{AssetCollection, AssetHandle, Skybox};
use crate::renderer::camera::Camera;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::RenderDeviceContext;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::frame_ctx::{write_uniform, RenderFrameContext};
use crate::renderer::contexts::pass_ctx::{GeometryPass, PassContext, RenderPass, SkyboxPass};
use crate::renderer::contexts::resource_ctx::ResourceCache;
use crate::renderer::contexts::resource_ctx::layouts::DescriptorLayouts;
use crate::renderer::draw::DrawCommand;
use crate::renderer::internals::barrier::ImageTransition;
use crate::renderer::presentation::{acquire_outcome, present_outcome, Acquired, Presentation};
use crate::renderer::state::RenderState;

/// Drives frames from acquire to present. Fields drop in declaration order,
/// after `Drop` has waited for the device to go idle.
pub struct Renderer {
    /// Recorded in this order every frame
    passes: Vec<Box<dyn RenderPass>>,
    resources: Option<ResourceCache>,
    frames: RenderFrameContext,
    presentation: Presentation,
    layouts: DescriptorLayouts,

    state: RenderState,
    config: RenderConfig,
    device: Arc<RenderDevice>,
}

impl Renderer {
    pub fn new(dev_ctx: &RenderDeviceContext, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        let device = dev_ctx.device.clone();

        let presentation = Presentation::new(dev_ctx, &config)?;
        let layouts = DescriptorLayouts::new(device.logical.clone())?;
        let frames = RenderFrameContext::new(
            config.frames_in_flight,
            presentation.swapchain.image_count(),
            &layouts.camera,
            device.clone(),
        )?;

        let passes: Vec<Box<dyn RenderPass>> = vec![
            Box::new(SkyboxPass::new(presentation.color_format(), &layouts, &device)?),
            Box::new(GeometryPass::new(
                presentation.color_format(),
                presentation.depth_format(),
                &layouts,
                &device,
            )?),
        ];
        log::info!(
            "Renderer ready with passes [{}]",
            passes.iter().map(|pass| pass.name()).collect::<Vec<_>>().join(", "),
        );

        Ok(Self {
            passes,
            resources: None,
            frames,
            presentation,
            layouts,

            state: RenderState::default(),
            config,
            device,
        })
    }

    /// Uploads the collection once. Calling it again replaces every GPU resource.
    pub fn set_resources(&mut self, collection: &AssetCollection) -> Result<()> {
        if self.resources.is_some() {
            log::warn!("Replacing already uploaded resources");
            self.device.wait_idle()?;
            self.resources = None;
        }
        self.resources = Some(ResourceCache::new(
            collection,
            &self.layouts,
            self.config.frames_in_flight,
            self.device.clone(),
        )?);
        Ok(())
    }

    pub fn window_resized(&mut self, width: u32, height: u32) {
        self.state.window_resized(width, height);
    }

    pub fn render_frame(
        &mut self,
        camera: &Camera,
        skybox: Option<AssetHandle<Skybox>>,
        draws: &[DrawCommand],
    ) -> Result<()> {
        if self.state.is_minimized() {
            return Ok(());
        }
        let logical = self.device.logical.clone();

        // The GPU is done with this slot's command buffer and uniforms once the fence signals
        self.frames.current().wait(&logical)?;

        let acquired = self
            .presentation
            .swapchain
            .acquire_next_image(self.frames.current().image_available);
        let image_index = match acquire_outcome(acquired)? {
            Acquired::Image(image_index) => image_index,
            Acquired::OutOfDate => {
                self.recreate_swapchain()?;
                return Ok(());
            }
        };

        let frame_index = self.frames.frame_index();
        let frame = self.frames.current_mut();
        let command_buffer = frame.command_buffer;
        write_uniform(&mut frame.camera_buffer, &camera.uniform())?;

        unsafe {
            logical.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            logical.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
        }

        let swapchain = &self.presentation.swapchain;
        let color_image = swapchain.images[image_index as usize];
        ImageTransition::undefined_to_color_attachment().record(command_buffer, color_image, &logical);

        let pass_ctx = PassContext {
            frame_index,
            command_buffer,
            color_view: swapchain.image_views[image_index as usize],
            depth_image: self.presentation.depth_image.image,
            depth_view: self.presentation.depth_image.view,
            extent: swapchain.extent,
            clear_color: self.config.clear_color,
            camera_set: self.frames.current().camera_set,
            resources: self.resources.as_ref(),
            skybox,
            draws,
            device: &logical,
        };
        for pass in &self.passes {
            pass.record_commands(&pass_ctx)?;
        }

        ImageTransition::color_attachment_to_present().record(command_buffer, color_image, &logical);
        unsafe { logical.end_command_buffer(command_buffer)? };

        self.submit(command_buffer, image_index)?;

        let render_finished = self.frames.render_finished(image_index);
        let presented = self.presentation.swapchain.present(
            self.device.present_queue.handle,
            image_index,
            render_finished,
        );
        if present_outcome(presented, self.state.resize_pending())? {
            self.recreate_swapchain()?;
        }

        self.frames.advance();
        Ok(())
    }

    fn submit(&self, command_buffer: vk::CommandBuffer, image_index: u32) -> Result<()> {
        let frame = self.frames.current();
        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(frame.image_available)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.frames.render_finished(image_index))
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_buffer_infos = [vk::CommandBufferSubmitInfo::default()
            .command_buffer(command_buffer)];
        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos)
            .command_buffer_infos(&command_buffer_infos);

        unsafe {
            self.device.logical.reset_fences(&[frame.in_flight])?;
            self.device.logical.queue_submit2(
                self.device.graphics_queue.handle,
                &[submit_info],
                frame.in_flight,
            )?;
        }
        Ok(())
    }

    /// Rebuilds the swapchain, its views and the depth buffer, unless the window is minimized
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        self.state.recreate_with(|| {
            self.presentation.rebuild(&self.device)?;
            self.frames
                .resize_render_finished(self.presentation.swapchain.image_count())
        })?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {e}");
        }
    }
}
