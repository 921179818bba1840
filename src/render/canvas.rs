use bytemuck::{Pod, Zeroable};

use super::text::TextOverlay;

/// 8-bit RGBA pixel, laid out as the encoder expects (`rgba` raw video)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Source-over blend of `self` onto an opaque `dst`, with extra coverage `alpha` (0.0-1.0)
    pub fn blend_over(self, dst: Rgba, alpha: f32) -> Rgba {
        let a = (self.a as f32 / 255.0 * alpha).clamp(0.0, 1.0);
        let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
        Rgba::rgb(mix(self.r, dst.r), mix(self.g, dst.g), mix(self.b, dst.b))
    }

    /// Linear interpolation between two colours, `t` in 0.0-1.0
    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba::rgba(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// HSL lightness on the 0-255 scale
    pub fn lightness(self) -> f32 {
        let max = self.r.max(self.g).max(self.b) as f32;
        let min = self.r.min(self.g).min(self.b) as f32;
        (max + min) / 2.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rectangular copy of canvas pixels, row-major
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBlock {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl PixelBlock {
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }
}

/// Pixel count of a `width` x `height` buffer, computed without `u32` overflow
pub fn area(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Raster surface the compositor and axis renderer draw on.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    /// Copies the pixels under `rect`; parts outside the canvas read as transparent black.
    fn get_pixels(&self, rect: Rect) -> PixelBlock;

    /// Writes `block` with its top-left corner at `(x, y)`, clipped to the canvas.
    fn put_pixels(&mut self, x: i32, y: i32, block: &PixelBlock);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    /// One-pixel line from `from` to `to` inclusive, alpha blended
    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), color: Rgba);

    /// Text with its top-left corner at `at`
    fn draw_text(&mut self, text: &str, at: (i32, i32), color: Rgba);

    /// `(width, height)` `text` would cover, or `None` when the canvas draws no text
    fn measure_text(&self, _text: &str) -> Option<(u32, u32)> {
        None
    }
}

/// In-memory RGBA canvas
pub struct RgbaCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
    text: Option<TextOverlay>,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![background; area(width, height)],
            text: None,
        }
    }

    pub fn with_text(mut self, text: TextOverlay) -> Self {
        self.text = Some(text);
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.index(x as i32, y as i32).map(|i| self.pixels[i])
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba, alpha: f32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color.blend_over(self.pixels[i], alpha);
        }
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Frame bytes in `rgba` order for the encoder
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.right().min(self.width as i32);
        let y1 = rect.bottom().min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Canvas for RgbaCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn get_pixels(&self, rect: Rect) -> PixelBlock {
        let mut pixels = vec![Rgba::default(); area(rect.width, rect.height)];
        if let Some((x0, y0, x1, y1)) = self.clip(rect) {
            let run = (x1 - x0) as usize;
            for y in y0..y1 {
                let src = y as usize * self.width as usize + x0 as usize;
                let dst_x = (x0 as i32 - rect.x) as usize;
                let dst = (y as i32 - rect.y) as usize * rect.width as usize + dst_x;
                pixels[dst..dst + run].copy_from_slice(&self.pixels[src..src + run]);
            }
        }
        PixelBlock {
            width: rect.width,
            height: rect.height,
            pixels,
        }
    }

    fn put_pixels(&mut self, x: i32, y: i32, block: &PixelBlock) {
        let target = Rect::new(x, y, block.width, block.height);
        let Some((x0, y0, x1, y1)) = self.clip(target) else {
            return;
        };
        let run = (x1 - x0) as usize;
        for row in y0..y1 {
            let src_x = (x0 as i32 - x) as usize;
            let src = (row as i32 - y) as usize * block.width as usize + src_x;
            let dst = row as usize * self.width as usize + x0 as usize;
            self.pixels[dst..dst + run].copy_from_slice(&block.pixels[src..src + run]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            let (start, end) = (row + x0 as usize, row + x1 as usize);
            if color.a == 255 {
                self.pixels[start..end].fill(color);
            } else {
                for px in &mut self.pixels[start..end] {
                    *px = color.blend_over(*px, 1.0);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), color: Rgba) {
        // Bresenham
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.blend_pixel(x, y, color, 1.0);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn draw_text(&mut self, text: &str, at: (i32, i32), color: Rgba) {
        let Some(overlay) = self.text.take() else {
            return;
        };
        overlay.composite(self, text, at.0, at.1, color);
        self.text = Some(overlay);
    }

    fn measure_text(&self, text: &str) -> Option<(u32, u32)> {
        let overlay = self.text.as_ref()?;
        Some((overlay.measure_width(text), overlay.line_height()))
    }
}
