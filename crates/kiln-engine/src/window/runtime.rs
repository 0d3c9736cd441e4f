use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::winit::translate_window_event;
use crate::input::{InputFrame, InputState};
use crate::time::FrameClock;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_string(),
            initial_size: LogicalSize::new(800.0, 800.0),
        }
    }
}

/// Requests the app can make of the runtime during a frame.
///
/// Applied after `on_frame` returns.
#[derive(Debug, Default)]
pub struct RuntimeCtx {
    exit: bool,
}

impl RuntimeCtx {
    /// Closes the window after the current frame.
    pub fn exit(&mut self) {
        self.exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window with its GPU context and drives `app` until the
    /// window closes or the app asks to exit.
    ///
    /// Window or GPU initialization failures are returned once the event loop
    /// has stopped.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        state.startup_error.map_or(Ok(()), Err)
    }
}

/// The window and the GPU context whose surface borrows it.
#[self_referencing]
struct WindowEntry {
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Lifecycle {
    /// No window yet, or waiting for `resumed`.
    Pending,
    Running,
    /// `on_exit` has run and the window is gone.
    Finished,
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    lifecycle: Lifecycle,
    startup_error: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            lifecycle: Lifecycle::Pending,
            startup_error: None,
        }
    }

    fn open_window(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let gpu_init = self.gpu_init.clone();

        WindowEntryTryBuilder {
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init)).context("GPU initialization failed")
            },
        }
        .try_build()
    }

    /// Lets the app release its GPU resources, then drops the GPU context and
    /// the window, in that order.
    fn release(&mut self) {
        if self.lifecycle == Lifecycle::Finished {
            return;
        }
        self.lifecycle = Lifecycle::Finished;
        self.app.on_exit();
        self.entry = None;
        log::debug!("window closed");
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        self.release();
        event_loop.exit();
    }

    /// `None` re-reads the size from the window.
    fn resize(&mut self, size: Option<PhysicalSize<u32>>) {
        let Some(entry) = self.entry.as_mut() else { return };
        entry.with_mut(|fields| {
            let size = size.unwrap_or_else(|| fields.window.inner_size());
            fields.gpu.resize(size);
            fields.window.request_redraw();
        });
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else { return };
        let app = &mut self.app;
        let mut runtime = RuntimeCtx::default();
        let mut control = AppControl::Continue;

        entry.with_mut(|fields| {
            // A minimized window has no drawable; keep input flowing.
            let size = fields.window.inner_size();
            if size.width == 0 || size.height == 0 {
                fields.clock.reset();
                fields.input_frame.clear();
                return;
            }

            let time = fields.clock.tick();
            {
                let mut ctx = FrameCtx {
                    window: WindowCtx {
                        window: fields.window,
                    },
                    gpu: fields.gpu,
                    input: fields.input_state,
                    input_frame: fields.input_frame,
                    time,
                    runtime: &mut runtime,
                };
                control = app.on_frame(&mut ctx);
            }

            fields.input_frame.clear();
        });

        if control == AppControl::Exit || runtime.exit_requested() {
            self.finish(event_loop);
        }
    }

    fn is_own_window(&self, id: WindowId) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|entry| entry.with_window(|w| w.id() == id))
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.lifecycle != Lifecycle::Pending {
            return;
        }

        match self.open_window(event_loop) {
            Ok(entry) => {
                entry.with_window(|w| {
                    log::debug!("window {:?} opened", w.id());
                    w.request_redraw();
                });
                self.entry = Some(entry);
                self.lifecycle = Lifecycle::Running;
            }
            Err(e) => {
                log::error!("failed to open window: {e:#}");
                self.startup_error = Some(e);
                self.lifecycle = Lifecycle::Finished;
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: the camera integrates input every frame.
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.lifecycle != Lifecycle::Running || !self.is_own_window(window_id) {
            return;
        }

        let mut control = AppControl::Continue;
        if let Some(entry) = self.entry.as_mut() {
            let app = &mut self.app;
            entry.with_mut(|fields| {
                if let Some(ev) = translate_window_event(fields.input_state, &event) {
                    fields.input_state.apply_event(fields.input_frame, ev);
                }
                control = app.on_window_event(&event);
            });
        }
        if control == AppControl::Exit {
            self.finish(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.finish(event_loop),
            WindowEvent::Resized(size) => self.resize(Some(size)),
            WindowEvent::ScaleFactorChanged { .. } => self.resize(None),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_square() {
        let config = RuntimeConfig::default();
        assert_eq!(config.title, "kiln");
        assert_eq!(config.initial_size, LogicalSize::new(800.0, 800.0));
    }

    #[test]
    fn exit_request_is_recorded() {
        let mut ctx = RuntimeCtx::default();
        assert!(!ctx.exit_requested());
        ctx.exit();
        assert!(ctx.exit_requested());
    }
}
