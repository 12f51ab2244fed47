use std::collections::HashSet;
use std::time::Instant;
use winit::keyboard::NamedKey;
use winit::window::{Fullscreen, Window};

use crate::error::Result;
use crate::navigator::{NavState, Navigator};
use crate::ui::render::{blit_element, rgb, BG_COLOR};

const WINDOW_TITLE: &str = "ivtrack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nav {
    Next,
    Previous,
    First,
    Last,
    Refresh,
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub navigator: Navigator,

    pub zoom: Option<f32>, // None = fit to window
    pub is_fullscreen: bool,
    pub view_size: (u32, u32),

    // Key-hold repeat state
    pub initial_delay: f64,
    pub repeat_delay: f64,
    pub nav_hold_timer: f64,
    pub nav_past_initial: bool,
    pub last_frame: Instant,

    // Track which keys are currently held
    pub keys_down: HashSet<NamedKey>,
    pub chars_down: HashSet<char>,

    // Track keys that were just pressed this frame
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,
}

impl ViewerState {
    pub fn new(navigator: Navigator, initial_delay: f64, repeat_delay: f64) -> Self {
        Self {
            navigator,
            zoom: None,
            is_fullscreen: false,
            view_size: (1, 1),
            initial_delay,
            repeat_delay,
            nav_hold_timer: 0.0,
            nav_past_initial: false,
            last_frame: Instant::now(),
            keys_down: HashSet::new(),
            chars_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
        }
    }

    pub fn is_key_pressed_named(&self, k: NamedKey) -> bool {
        self.keys_pressed.contains(&k)
    }

    pub fn is_char_pressed(&self, c: char) -> bool {
        self.chars_pressed.contains(&c)
    }

    pub fn is_key_down_named(&self, k: NamedKey) -> bool {
        self.keys_down.contains(&k)
    }

    pub fn is_char_down(&self, c: char) -> bool {
        self.chars_down.contains(&c)
    }

    pub fn nav_keys_held(&self) -> bool {
        self.is_key_down_named(NamedKey::ArrowRight)
            || self.is_key_down_named(NamedKey::ArrowLeft)
            || self.is_key_down_named(NamedKey::Space)
            || self.is_char_down('l')
            || self.is_char_down('h')
    }

    /// Run the per-frame logic: input handling and navigation.
    /// Returns true if the app should quit.
    pub fn update(&mut self, window: &Window) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        // ------------------------------------------------------------------
        // Quit
        // ------------------------------------------------------------------
        if self.is_key_pressed_named(NamedKey::Escape) || self.is_char_pressed('q') {
            return true;
        }

        // ------------------------------------------------------------------
        // Navigation
        // ------------------------------------------------------------------
        let mut request = None;

        let fwd_down = self.is_key_down_named(NamedKey::ArrowRight)
            || self.is_key_down_named(NamedKey::Space)
            || self.is_char_down('l');
        let bwd_down = self.is_key_down_named(NamedKey::ArrowLeft) || self.is_char_down('h');
        let fwd_pressed = self.is_key_pressed_named(NamedKey::ArrowRight)
            || self.is_key_pressed_named(NamedKey::Space)
            || self.is_char_pressed('l');
        let bwd_pressed =
            self.is_key_pressed_named(NamedKey::ArrowLeft) || self.is_char_pressed('h');
        let step = |forward: bool| if forward { Nav::Next } else { Nav::Previous };

        if fwd_pressed || bwd_pressed {
            request = Some(step(fwd_pressed));
            self.nav_hold_timer = 0.0;
            self.nav_past_initial = false;
        } else if fwd_down || bwd_down {
            self.nav_hold_timer += dt;
            if !self.nav_past_initial {
                if self.nav_hold_timer >= self.initial_delay {
                    request = Some(step(fwd_down));
                    self.nav_hold_timer = 0.0;
                    self.nav_past_initial = true;
                }
            } else if self.nav_hold_timer >= self.repeat_delay {
                request = Some(step(fwd_down));
                self.nav_hold_timer -= self.repeat_delay;
            }
        } else {
            self.nav_hold_timer = 0.0;
            self.nav_past_initial = false;
        }

        if self.is_key_pressed_named(NamedKey::Home) {
            request = Some(Nav::First);
        } else if self.is_key_pressed_named(NamedKey::End) {
            request = Some(Nav::Last);
        } else if self.is_char_pressed('r') || self.is_key_pressed_named(NamedKey::F5) {
            request = Some(Nav::Refresh);
        }

        if let Some(request) = request {
            if let Err(e) = self.navigate(request) {
                log::error!("navigation failed: {}", e);
                return true;
            }
            self.zoom = None;
            self.relayout();
            self.update_title(window);
        }

        // ------------------------------------------------------------------
        // Fullscreen toggle
        // ------------------------------------------------------------------
        if self.is_char_pressed('f') {
            self.is_fullscreen = !self.is_fullscreen;
            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
        }

        // ------------------------------------------------------------------
        // Zoom: z = 1:1 / fit toggle
        // ------------------------------------------------------------------
        if self.is_char_pressed('z') {
            self.zoom = match self.zoom {
                Some(_) => None,
                None => Some(1.0),
            };
            self.relayout();
        }

        // Clear per-frame input state
        self.keys_pressed.clear();
        self.chars_pressed.clear();

        false
    }

    fn navigate(&mut self, request: Nav) -> Result<bool> {
        let shown = match request {
            Nav::Next => self.navigator.next()?.is_some(),
            Nav::Previous => self.navigator.previous()?.is_some(),
            Nav::First => self.navigator.first()?.is_some(),
            Nav::Last => self.navigator.last()?.is_some(),
            Nav::Refresh => self.navigator.refresh()?.is_some(),
        };
        log::debug!("[nav] {:?} -> {:?}", request, self.navigator.position());
        Ok(shown)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.view_size = (width.max(1), height.max(1));
        self.relayout();
    }

    /// Fit (or zoom) and center the active element in the current view.
    pub fn relayout(&mut self) {
        let (w, h) = self.view_size;
        let zoom = self.zoom;
        if let Some(element) = self.navigator.active_element_mut() {
            element.layout(w, h, zoom);
        }
    }

    pub fn title(&self) -> String {
        let Some(path) = self.navigator.active_path() else {
            return match self.navigator.state() {
                NavState::ShutDown => WINDOW_TITLE.to_string(),
                _ => format!(
                    "{} - no images in {}",
                    WINDOW_TITLE,
                    self.navigator.index().working_directory().display()
                ),
            };
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (pos, total) = self.navigator.position().unwrap_or((0, 0));
        let record = self.navigator.active_record();
        match (self.navigator.loaded(), record.and_then(|r| r.failure())) {
            (Some(_), _) => format!("{} - {} [{}/{}]", WINDOW_TITLE, name, pos, total),
            (None, Some(reason)) => format!(
                "{} - {} [{}/{}] (unavailable: {})",
                WINDOW_TITLE, name, pos, total, reason
            ),
            (None, None) => format!("{} - {} [{}/{}] (unavailable)", WINDOW_TITLE, name, pos, total),
        }
    }

    pub fn update_title(&self, window: &Window) {
        window.set_title(&self.title());
    }

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let bg = rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]);
        frame.fill(bg);

        if let Some(element) = self.navigator.loaded() {
            blit_element(frame, fb_w, fb_h, element);
        }
    }
}
