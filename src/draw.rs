// Software drawing target used by the render loop and the effects.
// Visual effects provided here:
// 1) Compositing the live camera frame (optionally mirrored, resampled to fit).
// 2) Radial gradient fills (vignettes and glows) with normal or additive blending.
// 3) Self-copies at an offset (glitch tearing, channel split).

use std::ops::{Deref, DerefMut};

use crate::types::{BlendMode, PixelBuffer, Rgba};

/// Geometric transform applied when a frame is composited onto the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// Horizontal flip. Visual: the picture behaves like a mirror.
    MirrorX,
}

/// A pixel buffer plus the drawing state (transform, blend mode) effects can change.
pub struct Canvas {
    buf: PixelBuffer,
    transform: Transform,
    blend: BlendMode,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: PixelBuffer::new(width, height),
            transform: Transform::Identity,
            blend: BlendMode::SourceOver,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut PixelBuffer {
        &mut self.buf
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    /// Switch the transform until the returned guard drops.
    /// The previous transform comes back on every exit path, including `?` and panics.
    pub fn scoped_transform(&mut self, transform: Transform) -> TransformGuard<'_> {
        let saved = self.transform;
        self.transform = transform;
        TransformGuard { canvas: self, saved }
    }

    /// Visual: the whole canvas becomes transparent black.
    pub fn clear(&mut self) {
        self.buf.fill([0, 0, 0, 0]);
    }

    /// Composite `src` over the whole canvas, resampling (nearest neighbour) when
    /// the sizes differ and honouring the current transform and blend mode.
    pub fn draw_frame(&mut self, src: &PixelBuffer) {
        let (w, h) = self.buf.dimensions();
        let (sw, sh) = src.dimensions();
        if w == 0 || h == 0 || sw == 0 || sh == 0 {
            return;
        }
        let mirror = self.transform == Transform::MirrorX;
        let blend = self.blend;

        for y in 0..h {
            let sy = (y as u64 * sh as u64 / h as u64) as u32;
            for x in 0..w {
                let tx = if mirror { w - 1 - x } else { x };
                let sx = (tx as u64 * sw as u64 / w as u64) as u32;
                let [r, g, b, a] = src.get(sx, sy);
                let i = self.buf.index(x, y);
                blend_px(&mut self.buf.pixels_mut()[i..i + 4], r, g, b, a as f32 / 255.0, blend);
            }
        }
    }

    /// Draw a same-size copy of `src` shifted by (dx, dy), scaled by `alpha`.
    /// Visual: a ghost of the image slides sideways (used by glitches).
    pub fn draw_offset(&mut self, src: &PixelBuffer, dx: i32, dy: i32, alpha: f32) {
        let (w, h) = self.buf.dimensions();
        let blend = self.blend;
        for y in 0..h as i32 {
            let sy = y - dy;
            if sy < 0 || sy >= src.height() as i32 {
                continue;
            }
            for x in 0..w as i32 {
                let sx = x - dx;
                if sx < 0 || sx >= src.width() as i32 {
                    continue;
                }
                let [r, g, b, a] = src.get(sx as u32, sy as u32);
                let i = self.buf.index(x as u32, y as u32);
                let eff = alpha * (a as f32 / 255.0);
                blend_px(&mut self.buf.pixels_mut()[i..i + 4], r, g, b, eff, blend);
            }
        }
    }

    /// Copy rows `[y, y + height)` onto themselves shifted by `dx` pixels.
    /// Visual: a horizontal band of the picture tears sideways.
    pub fn shift_strip(&mut self, y: u32, height: u32, dx: i32) {
        let w = self.buf.width();
        let y_end = (y + height).min(self.buf.height());
        if y >= y_end || dx == 0 {
            return;
        }
        let start = self.buf.index(0, y);
        let end = self.buf.index(0, y_end);
        let strip = self.buf.pixels()[start..end].to_vec();
        let row_bytes = w as usize * 4;

        for (row, src_row) in strip.chunks_exact(row_bytes).enumerate() {
            let yy = y + row as u32;
            for x in 0..w as i32 {
                let tx = x + dx;
                if tx < 0 || tx >= w as i32 {
                    continue;
                }
                let s = x as usize * 4;
                let i = self.buf.index(tx as u32, yy);
                self.buf.pixels_mut()[i..i + 4].copy_from_slice(&src_row[s..s + 4]);
            }
        }
    }

    /// Fill the whole canvas with a radial gradient using the current blend mode.
    pub fn fill_radial_gradient(&mut self, gradient: &RadialGradient) {
        let (w, h) = self.buf.dimensions();
        let blend = self.blend;
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 + 0.5 - gradient.cx;
                let dy = y as f32 + 0.5 - gradient.cy;
                let c = gradient.color_at((dx * dx + dy * dy).sqrt());
                if c.a <= 0.0 {
                    continue;
                }
                let i = self.buf.index(x, y);
                blend_px(&mut self.buf.pixels_mut()[i..i + 4], c.r, c.g, c.b, c.a, blend);
            }
        }
    }
}

/// Restores the saved transform on drop. Derefs to the canvas.
pub struct TransformGuard<'a> {
    canvas: &'a mut Canvas,
    saved: Transform,
}

impl Deref for TransformGuard<'_> {
    type Target = Canvas;
    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for TransformGuard<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for TransformGuard<'_> {
    fn drop(&mut self) {
        self.canvas.transform = self.saved;
    }
}

/* ---------- Gradients ---------- */

/// Two-stop radial gradient, padded with the end colours outside [inner, outer].
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    pub cx: f32,
    pub cy: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub inner: Rgba,
    pub outer: Rgba,
}

impl RadialGradient {
    /// Gradient centred on a `width` x `height` canvas.
    pub fn centered(width: u32, height: u32, outer_radius: f32, inner: Rgba, outer: Rgba) -> Self {
        Self {
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            inner_radius: 0.0,
            outer_radius,
            inner,
            outer,
        }
    }

    /// Interpolated colour at distance `d` from the centre.
    pub fn color_at(&self, d: f32) -> Rgba {
        let span = self.outer_radius - self.inner_radius;
        let t = if span <= f32::EPSILON {
            if d < self.inner_radius { 0.0 } else { 1.0 }
        } else {
            ((d - self.inner_radius) / span).clamp(0.0, 1.0)
        };
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8;
        Rgba {
            r: lerp(self.inner.r, self.outer.r),
            g: lerp(self.inner.g, self.outer.g),
            b: lerp(self.inner.b, self.outer.b),
            a: (self.inner.a + (self.outer.a - self.inner.a) * t).clamp(0.0, 1.0),
        }
    }
}

/* ---------- Per-pixel blending ---------- */

/// Blend one straight-alpha colour into an RGBA pixel, saturating to 255.
/// Visual: SourceOver tints the pixel; Lighter brightens it and repeated draws stack.
#[inline]
fn blend_px(dst: &mut [u8], r: u8, g: u8, b: u8, alpha: f32, mode: BlendMode) {
    let a = alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let da = dst[3] as f32;
    match mode {
        BlendMode::SourceOver => {
            let inv = 1.0 - a;
            let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * inv).round().clamp(0.0, 255.0) as u8;
            dst[0] = mix(r, dst[0]);
            dst[1] = mix(g, dst[1]);
            dst[2] = mix(b, dst[2]);
            dst[3] = (a * 255.0 + da * inv).round().clamp(0.0, 255.0) as u8;
        }
        BlendMode::Lighter => {
            let add = |s: u8, d: u8| (d as f32 + s as f32 * a).round().min(255.0) as u8;
            dst[0] = add(r, dst[0]);
            dst[1] = add(g, dst[1]);
            dst[2] = add(b, dst[2]);
            dst[3] = (da + a * 255.0).round().min(255.0) as u8;
        }
    }
}
