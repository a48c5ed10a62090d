//! Window and event handling for the viewer

use crate::Args;
use crate::pattern::{self, PatternConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use videobus_viewer::{BlitRenderer, ChannelSink, FrameForwarder, SurfaceController, VideoFrame};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

/// Two presses within this window count as a double click
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

/// Everything that exists once the window is up
struct ViewerContext {
    /// Window handle, shared with the wgpu surface
    window: Arc<Window>,
    /// Render-thread side of the pipeline
    controller: SurfaceController,
    /// Consuming end of the frame queue
    frames: Receiver<VideoFrame>,
    /// Publisher shutdown flag
    stop: Arc<AtomicBool>,
    /// Timestamp of the previous left-button press
    last_click: Option<Instant>,
}

/// The viewer application
pub struct ViewerApp {
    args: Args,
    context: Option<ViewerContext>,
}

impl ViewerApp {
    pub fn new(args: Args) -> Self {
        Self { args, context: None }
    }
}

impl ApplicationHandler for ViewerApp {
    /// Creates the window, the GPU renderer, and the publisher thread
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = Arc::new(
            event_loop
                .create_window(WindowAttributes::default().with_resizable(true).with_title("Video Bus Viewer"))
                .unwrap(),
        );
        let _ = window.request_inner_size(PhysicalSize::new(self.args.width, self.args.height));
        let size = window.inner_size();

        // GPU setup: surface, adapter, device. All GPU resources stay on
        // this thread for the rest of the session.
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone()).unwrap();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .unwrap();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer device"),
            ..Default::default()
        }))
        .unwrap();

        let renderer = BlitRenderer::new(surface, &adapter, device, queue, size.width, size.height);

        let mut controller = SurfaceController::with_reference_size((self.args.width, self.args.height));
        controller.surface_ready(renderer);
        controller.resize(size.width, size.height);

        // Delivery path: publisher thread -> listener -> bounded sink -> us.
        let (sink, frames) = ChannelSink::bounded();
        let forwarder = Arc::new(FrameForwarder::new());
        forwarder.install_sink(Box::new(sink));

        let stop = Arc::new(AtomicBool::new(false));
        let config = PatternConfig {
            width: self.args.width,
            height: self.args.height,
            fps: self.args.fps,
            format: self.args.format.pixel_format(),
        };
        {
            let forwarder = forwarder.clone();
            let stop = stop.clone();
            std::thread::spawn(move || pattern::run_publisher(forwarder, config, stop));
        }

        self.context = Some(ViewerContext {
            window: window.clone(),
            controller,
            frames,
            stop,
            last_click: None,
        });

        window.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(context) = self.context.as_mut() else {
            return;
        };

        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
                ..
            }
            | WindowEvent::CloseRequested => {
                context.stop.store(true, Ordering::Relaxed);
                event_loop.exit();
            }

            // Double click toggles fullscreen
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                let now = Instant::now();
                let is_double = context.last_click.is_some_and(|prev| now - prev <= DOUBLE_CLICK_WINDOW);
                context.last_click = Some(now);

                if is_double {
                    if context.window.fullscreen().is_some() {
                        context.window.set_fullscreen(None);
                    } else {
                        context.window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                    }
                    context.last_click = None;
                }
            }

            WindowEvent::Resized(new_size) => {
                context.controller.resize(new_size.width, new_size.height);
                context.window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                // Drain the queue; for display the latest frame wins.
                let mut latest = None;
                while let Ok(frame) = context.frames.try_recv() {
                    latest = Some(frame);
                }

                let result = match latest {
                    Some(frame) => context.controller.present_frame(&frame),
                    None => context.controller.paint(),
                };
                if let Err(e) = result {
                    tracing::debug!(error = %e, "frame not presented");
                }

                context.window.request_redraw();
            }

            _ => {}
        }
    }
}
