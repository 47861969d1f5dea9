mod geometry;
mod skybox;

pub use geometry::GeometryPass;
pub use skybox::SkyboxPass;

use ash::vk;
use color_eyre::Result;
use crate::assets::{AssetHandle, Skybox};
use crate::renderer::contexts::resource_ctx::ResourceCache;
use crate::renderer::draw::DrawCommand;

/// Everything a pass may touch while recording one frame
pub struct PassContext<'a> {
    pub frame_index: usize,
    pub command_buffer: vk::CommandBuffer,

    pub color_view: vk::ImageView,
    pub depth_image: vk::Image,
    pub depth_view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],

    pub camera_set: vk::DescriptorSet,
    /// `None` until resources have been handed to the renderer
    pub resources: Option<&'a ResourceCache>,
    pub skybox: Option<AssetHandle<Skybox>>,
    pub draws: &'a [DrawCommand],

    pub device: &'a ash::Device,
}

impl PassContext<'_> {
    pub fn set_viewport_and_scissor(&self) {
        let (viewport, scissor) = full_viewport(self.extent);
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }
}

/// One graphics pipeline and the commands it records each frame.
/// The renderer runs its passes in a fixed order against the same targets.
pub trait RenderPass {
    fn name(&self) -> &'static str;

    fn record_commands(&self, ctx: &PassContext) -> Result<()>;
}

pub fn full_viewport(extent: vk::Extent2D) -> (vk::Viewport, vk::Rect2D) {
    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    };
    (viewport, scissor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_covers_whole_target() {
        let extent = vk::Extent2D { width: 1280, height: 720 };
        let (viewport, scissor) = full_viewport(extent);
        assert_eq!(viewport.width, 1280.0);
        assert_eq!(viewport.height, 720.0);
        assert_eq!(viewport.max_depth, 1.0);
        assert_eq!(scissor.extent, extent);
    }
}
