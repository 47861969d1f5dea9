pub mod descriptor_device;
pub mod device;
pub mod instance;
pub mod queue;
pub mod target;
pub mod transfer_ctx;

use std::sync::Arc;
use color_eyre::Result;
use winit::window::Window;
use crate::renderer::contexts::device_ctx::device::RenderDevice;
use crate::renderer::contexts::device_ctx::instance::RenderInstance;
use crate::renderer::contexts::device_ctx::target::RenderTarget;

/// Everything tied to the GPU and the window surface, owned by the application shell.
/// Fields drop in declaration order: surface, then device, then instance.
pub struct RenderDeviceContext {
    pub target: RenderTarget,
    pub device: Arc<RenderDevice>,
    pub instance: RenderInstance,
}

impl RenderDeviceContext {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let instance = RenderInstance::new(&window)?;
        let (surface, surface_loader) = instance.create_surface(&window)?;

        let device = match RenderDevice::new(&instance.instance, surface, &surface_loader) {
            Ok(device) => Arc::new(device),
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let target = RenderTarget::new(window, (surface, surface_loader), device.physical)?;

        Ok(Self {
            target,
            device,
            instance,
        })
    }
}
