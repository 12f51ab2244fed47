use crate::codec::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

/// Decoded pixels plus where and how large they are drawn.
///
/// Not `Clone`: an element has exactly one owner and is handed
/// back to its [`Renderer`] to be destroyed.
pub struct Element {
    id: ElementId,
    pixels: PixelBuffer,
    x: f32,
    y: f32,
    scale: f32,
}

impl Element {
    pub fn new(id: ElementId, pixels: PixelBuffer) -> Self {
        Self {
            id,
            pixels,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn draw_width(&self) -> f32 {
        self.pixels.width as f32 * self.scale
    }

    pub fn draw_height(&self) -> f32 {
        self.pixels.height as f32 * self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.max(0.01);
    }

    /// Scale to fit inside the viewport (or use `zoom` when given) and center.
    pub fn layout(&mut self, view_w: u32, view_h: u32, zoom: Option<f32>) {
        let (vw, vh) = (view_w.max(1) as f32, view_h.max(1) as f32);
        let scale = zoom.unwrap_or_else(|| {
            fit_scale(self.pixels.width as f32, self.pixels.height as f32, vw, vh)
        });
        self.set_scale(scale);
        self.x = (vw - self.draw_width()) / 2.0;
        self.y = (vh - self.draw_height()) / 2.0;
    }
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    if img_w <= 0.0 || img_h <= 0.0 {
        return 1.0;
    }
    (win_w / img_w).min(win_h / img_h)
}

/// Allocates and releases displayable elements.
pub trait Renderer {
    fn create_element(&mut self, pixels: PixelBuffer) -> Element;
    fn destroy_element(&mut self, element: Element);
}

// ---------------------------------------------------------------------------
// In-process element allocator used by the softbuffer front end
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ElementPool {
    next_id: u64,
    live: usize,
    used_bytes: u64,
}

impl ElementPool {
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }
}

impl Renderer for ElementPool {
    fn create_element(&mut self, pixels: PixelBuffer) -> Element {
        self.next_id += 1;
        self.live += 1;
        self.used_bytes += pixels.mem_size();
        let element = Element::new(ElementId(self.next_id), pixels);
        log::trace!(
            "created element {:?} ({}x{}, {} live, {} bytes)",
            element.id(),
            element.width(),
            element.height(),
            self.live(),
            self.used_bytes()
        );
        element
    }

    fn destroy_element(&mut self, element: Element) {
        self.live = self.live.saturating_sub(1);
        self.used_bytes = self.used_bytes.saturating_sub(element.pixels.mem_size());
        log::trace!(
            "destroyed element {:?} ({} live, {} bytes)",
            element.id(),
            self.live(),
            self.used_bytes()
        );
    }
}
