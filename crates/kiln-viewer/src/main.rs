//! Textured pyramid viewer.
//!
//! WASD moves, Space/Control rise and sink, Shift boosts, dragging with the
//! left button looks around. Escape quits.

mod config;
mod scene;

use anyhow::Result;

use kiln_engine::camera::{Camera, CameraController};
use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::device::GpuInit;
use kiln_engine::input::Key;
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::render::{FrameRenderer, RenderConfig};
use kiln_engine::resource::BindState;
use kiln_engine::window::{LogicalSize, Runtime, RuntimeConfig};

use config::ViewerConfig;
use scene::PyramidScene;

struct Viewer {
    config: ViewerConfig,
    state: BindState,
    renderer: FrameRenderer,
    controller: CameraController,
    camera: Option<Camera>,
    scene: Option<PyramidScene>,
    cursor_hidden: bool,
}

impl Viewer {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            state: BindState::default(),
            renderer: FrameRenderer::new(RenderConfig::default()),
            controller: CameraController::default(),
            camera: None,
            scene: None,
            cursor_hidden: false,
        }
    }

    /// Resources are created on the first frame, once the device exists.
    fn load(&mut self, ctx: &FrameCtx<'_, '_>) -> Result<()> {
        let scene = PyramidScene::load(ctx.gpu.device(), ctx.gpu.queue(), &mut self.state, &self.config)?;
        let (width, height) = ctx.window.size();
        self.camera = Some(Camera::new(width, height, self.config.camera_position)?);
        self.scene = Some(scene);
        Ok(())
    }
}

impl App for Viewer {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.key_pressed(Key::Escape) {
            return AppControl::Exit;
        }

        if self.scene.is_none() {
            if let Err(e) = self.load(ctx) {
                log::error!("start-up failed: {e:#}");
                return AppControl::Exit;
            }
        }

        let (Some(scene), Some(camera)) = (self.scene.as_mut(), self.camera.as_mut()) else {
            return AppControl::Exit;
        };

        let input = self.controller.input(camera, ctx.input, ctx.input_frame);
        let looking = self.controller.is_looking();
        if looking != self.cursor_hidden {
            ctx.window.set_cursor_visible(!looking);
            self.cursor_hidden = looking;
        }

        let dt = ctx.time.dt;
        let (renderer, state) = (&mut self.renderer, &mut self.state);
        ctx.render(|rctx, target| scene.draw(renderer, rctx, target, state, camera, &input, dt))
    }

    fn on_exit(&mut self) {
        if let Some(scene) = self.scene.take() {
            scene.delete(&mut self.state);
        }
        self.renderer.clear_caches();
        log::info!("viewer resources released");
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = ViewerConfig::from_env();
    log::info!("loading assets: {:?}, {:?}, {:?}", config.vertex_shader, config.fragment_shader, config.texture);

    let runtime = RuntimeConfig {
        title: config.title.clone(),
        initial_size: LogicalSize::new(config.width, config.height),
    };

    Runtime::run(runtime, GpuInit::default(), Viewer::new(config))
}
