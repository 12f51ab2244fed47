use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::Key;
use winit::window::{Window, WindowId};
use softbuffer::Surface;

use crate::ui::state::ViewerState;

pub mod render;
pub mod state;

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: ViewerState,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    pub next_redraw: Option<Instant>,
    /// Size the surface was last resized to; frames are rendered at this size.
    pub surface_size: (u32, u32),
}

impl App {
    pub fn new(state: ViewerState) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
            next_redraw: None,
            surface_size: (0, 0),
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let w = NonZeroU32::new(width.max(1)).unwrap_or(NonZeroU32::MIN);
        let h = NonZeroU32::new(height.max(1)).unwrap_or(NonZeroU32::MIN);
        if let Some(ref mut surface) = self.surface {
            match surface.resize(w, h) {
                Ok(()) => self.surface_size = (w.get(), h.get()),
                Err(e) => log::warn!("could not resize surface: {}", e),
            }
        }
        self.state.resize(w.get(), h.get());
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn create_surface(
        &mut self,
        event_loop: &ActiveEventLoop,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let attrs = Window::default_attributes()
            .with_title(self.state.title())
            .with_inner_size(LogicalSize::new(1280u32, 720u32))
            .with_min_inner_size(LogicalSize::new(100u32, 50u32));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let context = softbuffer::Context::new(Arc::clone(&window))?;
        let surface = Surface::new(&context, Arc::clone(&window))?;

        let size = window.inner_size();
        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
        self.resize_surface(size.width, size.height);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_surface(event_loop) {
            log::error!("could not create window: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.resize_surface(width, height);
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                match &event.logical_key {
                    Key::Named(named) => {
                        if pressed {
                            if !event.repeat {
                                self.state.keys_pressed.insert(*named);
                            }
                            self.state.keys_down.insert(*named);
                        } else {
                            self.state.keys_down.remove(named);
                        }
                    }
                    Key::Character(s) => {
                        if let Some(c) = s.chars().next() {
                            let c = c.to_ascii_lowercase();
                            if pressed {
                                if !event.repeat {
                                    self.state.chars_pressed.insert(c);
                                }
                                self.state.chars_down.insert(c);
                            } else {
                                self.state.chars_down.remove(&c);
                            }
                        }
                    }
                    _ => {}
                }
                self.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else {
                    return;
                };
                if self.state.update(&window) {
                    event_loop.exit();
                    return;
                }

                let (fb_w, fb_h) = self.surface_size;
                if fb_w == 0 || fb_h == 0 {
                    return;
                }
                if let Some(ref mut surface) = self.surface {
                    match surface.buffer_mut() {
                        Ok(mut buffer) => {
                            self.state.render(&mut buffer, fb_w, fb_h);
                            if let Err(e) = buffer.present() {
                                log::warn!("could not present frame: {}", e);
                            }
                        }
                        Err(e) => log::warn!("could not get frame buffer: {}", e),
                    }
                }

                // Schedule next redraw only for key-hold repeat
                if self.state.nav_keys_held() {
                    let delay = if !self.state.nav_past_initial {
                        self.state.initial_delay
                    } else {
                        self.state.repeat_delay
                    };
                    let delay_ms = ((delay * 1000.0) as u64).max(1);
                    self.next_redraw = Some(Instant::now() + Duration::from_millis(delay_ms));
                } else {
                    self.next_redraw = None;
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(when) = self.next_redraw {
            if Instant::now() >= when {
                self.next_redraw = None;
                self.request_redraw();
            } else {
                event_loop.set_control_flow(ControlFlow::WaitUntil(when));
            }
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}
