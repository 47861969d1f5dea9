mod frame;
pub mod slots;

use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use gpu_descriptor::DescriptorSet;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::frame_ctx::frame::Frame;
use crate::renderer::contexts::frame_ctx::slots::FrameSlots;
use crate::renderer::internals::descriptor_set_layout_builder::DescriptorSetLayout;

pub use slots::write_uniform;

/// Responsibilities:
/// - Manage per-frame command buffers and camera uniforms
/// - Manage synchronization between frames
/// - Rotate through the frames in flight
pub struct RenderFrameContext {
    frames: Vec<Frame>,
    camera_sets: Vec<DescriptorSet<vk::DescriptorSet>>,

    /// One per swapchain image, since presentation does not follow the frame slot cadence
    render_finished: Vec<vk::Semaphore>,

    slots: FrameSlots,
    device: Arc<RenderDevice>,
}

impl RenderFrameContext {
    pub fn new(
        frames_in_flight: usize,
        swapchain_image_count: usize,
        camera_layout: &DescriptorSetLayout,
        device: Arc<RenderDevice>,
    ) -> Result<Self> {
        let slots = FrameSlots::new(frames_in_flight)?;
        let count = slots.count();

        let command_buffers = device.allocate_command_buffers(count as u32)?;
        let camera_sets = match device.allocate_descriptor_sets(camera_layout, count as u32) {
            Ok(sets) => sets,
            Err(e) => {
                device.free_command_buffers(&command_buffers);
                return Err(e);
            }
        };

        let mut ctx = Self {
            frames: Vec::with_capacity(count),
            camera_sets,
            render_finished: Vec::new(),
            slots,
            device: device.clone(),
        };
        // From here on Drop cleans up whatever was created
        for (index, command_buffer) in command_buffers.iter().enumerate() {
            let camera_set = *ctx.camera_sets[index].raw();
            match Frame::new(index, *command_buffer, camera_set, &device) {
                Ok(frame) => ctx.frames.push(frame),
                Err(e) => {
                    device.free_command_buffers(&command_buffers[index..]);
                    return Err(e);
                }
            }
        }
        ctx.resize_render_finished(swapchain_image_count)?;

        log::info!("Created {count} frames in flight");
        Ok(ctx)
    }

    pub fn current(&self) -> &Frame {
        &self.frames[self.slots.current()]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.slots.current()]
    }

    pub fn frame_index(&self) -> usize {
        self.slots.current()
    }

    pub fn advance(&mut self) {
        self.slots.advance();
    }

    pub fn render_finished(&self, image_index: u32) -> vk::Semaphore {
        self.render_finished[image_index as usize]
    }

    /// Keeps one render-finished semaphore per swapchain image.
    /// Only call while the device is idle.
    pub fn resize_render_finished(&mut self, image_count: usize) -> Result<()> {
        while self.render_finished.len() > image_count {
            if let Some(semaphore) = self.render_finished.pop() {
                unsafe { self.device.logical.destroy_semaphore(semaphore, None) };
            }
        }
        while self.render_finished.len() < image_count {
            let semaphore = unsafe {
                self.device
                    .logical
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
            };
            self.render_finished.push(semaphore);
        }
        Ok(())
    }
}

impl Drop for RenderFrameContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle: {e}");
        }
        let logical = &self.device.logical;
        let command_buffers: Vec<vk::CommandBuffer> = self
            .frames
            .iter()
            .map(|frame| frame.command_buffer)
            .collect();
        for frame in &self.frames {
            frame.destroy_sync_objects(logical);
        }
        for semaphore in self.render_finished.drain(..) {
            unsafe { logical.destroy_semaphore(semaphore, None) };
        }
        self.device.free_command_buffers(&command_buffers);
        self.device.free_descriptor_sets(self.camera_sets.drain(..));
        // Camera buffers go with the frames
        self.frames.clear();
    }
}
