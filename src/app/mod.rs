mod camera_controller;
mod demo_scene;
mod pointer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use color_eyre::eyre::Report;
use color_eyre::Result;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};
use crate::app::camera_controller::CameraController;
use crate::app::demo_scene::DemoScene;
use crate::app::pointer::PointerState;
use crate::renderer::Renderer;
use crate::renderer::camera::Camera;
use crate::renderer::config::RenderConfig;
use crate::renderer::contexts::device_ctx::RenderDeviceContext;

pub struct App {
    // Dropped before the device context it was created from
    renderer: Option<Renderer>,
    device_ctx: Option<RenderDeviceContext>,
    window: Option<Arc<Window>>,

    scene: DemoScene,
    camera_controller: CameraController,

    // State
    pointer: PointerState,
    prev_frame_time: Instant,
    delta_time_secs: f32,
    request_redraws: bool,
    close_requested: bool,
    error: Option<Report>,
}

impl App {
    pub fn new(texture_path: Option<PathBuf>) -> Result<Self> {
        let scene = DemoScene::new(texture_path.as_deref())?;
        let mut camera = Camera::new();
        camera.set_position(glam::Vec3::new(2.5, 1.5, 4.0));

        Ok(Self {
            renderer: None,
            device_ctx: None,
            window: None,

            scene,
            camera_controller: CameraController::new(camera),

            pointer: PointerState::default(),
            prev_frame_time: Instant::now(),
            delta_time_secs: 0.0,
            request_redraws: true,
            close_requested: false,
            error: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;

        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn init_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(event_loop.create_window(
            Window::default_attributes().with_title("vireo"),
        )?);
        let size = window.inner_size();
        self.camera_controller
            .camera_mut()
            .set_aspect_ratio(size.width, size.height);

        let device_ctx = RenderDeviceContext::new(window.clone())?;
        let mut renderer = Renderer::new(&device_ctx, RenderConfig::default())?;
        renderer.set_resources(&self.scene.assets)?;
        self.scene.release_pixels();

        self.window = Some(window);
        self.device_ctx = Some(device_ctx);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(renderer)) = (self.window.as_ref(), self.renderer.as_mut()) else {
            return Ok(());
        };

        self.camera_controller
            .process_input(&mut self.pointer, window, self.delta_time_secs);
        self.pointer.end_frame();
        self.scene.update(self.delta_time_secs);

        renderer.render_frame(
            self.camera_controller.camera(),
            self.scene.skybox,
            &self.scene.draws(),
        )
    }

    /// Remembers the first error and shuts the event loop down
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Report) {
        log::error!("{error:?}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        let curr_frame_time = Instant::now();
        self.delta_time_secs = curr_frame_time.duration_since(self.prev_frame_time).as_secs_f32();
        self.prev_frame_time = curr_frame_time;
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        if let Err(e) = self.init_renderer(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent
    ) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        self.pointer.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                self.camera_controller
                    .camera_mut()
                    .set_aspect_ratio(new_size.width, new_size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.window_resized(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                KeyEvent {
                    logical_key: key,
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => match key.as_ref() {
                Key::Character("r") => {
                    self.request_redraws = !self.request_redraws;
                    log::info!("request_redraws: {}", self.request_redraws);
                }
                Key::Named(NamedKey::Escape) => {
                    self.close_requested = true;
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.request_redraws {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }

        if self.close_requested {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Child objects before the device, the device before the window
        self.renderer = None;
        self.device_ctx = None;
        self.window = None;
    }
}
