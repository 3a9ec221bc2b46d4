// Per-pixel image analysis kernels: luma, inversion, duotone threshold, Laplacian edges.
// Visual expectation: these are the "looks" themselves; fx.rs decides when and in
// what order they run on the composited camera frame.

use crate::types::PixelBuffer;

/// BT.601 luma weights in per-mille. `luma * 1000 = 299 R + 587 G + 114 B`.
/// Integer weights keep threshold comparisons exact.
pub const LUMA_WEIGHTS_MILLI: [u32; 3] = [299, 587, 114];

/// Edge threshold on the Laplacian of luma.
pub const EDGE_THRESHOLD: i32 = 20;
pub const EDGE_COLOR: [u8; 4] = [255, 255, 255, 255];
pub const FLAT_COLOR: [u8; 4] = [20, 20, 20, 255];

/// Luma at or below this crushes to black in the duotone.
pub const DUOTONE_CUTOFF: u32 = 55;

/// Luma scaled by 1000.
#[inline]
pub fn luma_milli(r: u8, g: u8, b: u8) -> u32 {
    LUMA_WEIGHTS_MILLI[0] * r as u32 + LUMA_WEIGHTS_MILLI[1] * g as u32 + LUMA_WEIGHTS_MILLI[2] * b as u32
}

/// Luma as a float in [0, 255].
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f32 {
    luma_milli(r, g, b) as f32 / 1000.0
}

/// Invert R, G, B in place; alpha untouched.
/// Visual: a photographic negative.
pub fn invert_rgb(buf: &mut PixelBuffer) {
    for px in buf.pixels_mut().chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}

/// Red/black duotone. Dark pixels go black; the rest become red at 1.8x luma.
pub fn duotone_red(buf: &mut PixelBuffer) {
    for px in buf.pixels_mut().chunks_exact_mut(4) {
        let l = luma_milli(px[0], px[1], px[2]);
        if l <= DUOTONE_CUTOFF * 1000 {
            px[0] = 0;
        } else {
            // round(l / 1000 * 1.8) == round(l * 9 / 5000)
            px[0] = ((l * 9 + 2500) / 5000).min(255) as u8;
        }
        px[1] = 0;
        px[2] = 0;
    }
}

/// Outline edges: white where |Laplacian(luma)| > 20, dark grey elsewhere.
///
/// Border pixels copy the nearest interior result. A buffer with no interior
/// (width or height below 3) has no measurable edges and goes dark grey.
pub fn laplacian_outline(buf: &mut PixelBuffer) {
    let (w, h) = buf.dimensions();
    if w < 3 || h < 3 {
        buf.fill(FLAT_COLOR);
        return;
    }
    let (w, h) = (w as usize, h as usize);

    // 1) Luma plane (x1000) from the untouched input.
    let lum: Vec<i32> = buf
        .pixels()
        .chunks_exact(4)
        .map(|px| luma_milli(px[0], px[1], px[2]) as i32)
        .collect();

    // 2) Interior pixels: 4-neighbour Laplacian.
    let threshold = EDGE_THRESHOLD * 1000;
    let out = buf.pixels_mut();
    for y in 1..h - 1 {
        let row = y * w;
        for x in 1..w - 1 {
            let i = row + x;
            let v = 4 * lum[i] - lum[i - 1] - lum[i + 1] - lum[i - w] - lum[i + w];
            let color = if v.abs() > threshold { EDGE_COLOR } else { FLAT_COLOR };
            out[i * 4..i * 4 + 4].copy_from_slice(&color);
        }
    }

    // 3) Border: copy the nearest interior pixel.
    for y in 0..h {
        for x in 0..w {
            if x > 0 && x < w - 1 && y > 0 && y < h - 1 {
                continue;
            }
            let nx = x.clamp(1, w - 2);
            let ny = y.clamp(1, h - 2);
            let s = (ny * w + nx) * 4;
            let d = (y * w + x) * 4;
            out.copy_within(s..s + 4, d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_luma_equals_channel_value() {
        assert_eq!(luma_milli(55, 55, 55), 55_000);
        assert_eq!(luma(128, 128, 128), 128.0);
    }

    #[test]
    fn duotone_crushes_luma_55_to_black() {
        let mut buf = PixelBuffer::filled(1, 1, [55, 55, 55, 200]);
        duotone_red(&mut buf);
        assert_eq!(buf.get(0, 0), [0, 0, 0, 200]);
    }

    #[test]
    fn duotone_turns_luma_56_red() {
        let mut buf = PixelBuffer::filled(1, 1, [56, 56, 56, 255]);
        duotone_red(&mut buf);
        // 56 * 1.8 = 100.8
        assert_eq!(buf.get(0, 0), [101, 0, 0, 255]);
    }

    #[test]
    fn duotone_clamps_bright_pixels() {
        let mut buf = PixelBuffer::filled(1, 1, [250, 250, 250, 255]);
        duotone_red(&mut buf);
        assert_eq!(buf.get(0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn double_inversion_restores_rgb() {
        let mut buf = PixelBuffer::new(3, 2);
        for (i, b) in buf.pixels_mut().iter_mut().enumerate() {
            *b = (i * 37 % 256) as u8;
        }
        let original = buf.clone();
        invert_rgb(&mut buf);
        assert_ne!(buf, original);
        invert_rgb(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let mut buf = PixelBuffer::filled(6, 5, [90, 140, 30, 255]);
        laplacian_outline(&mut buf);
        for y in 0..5 {
            for x in 0..6 {
                assert_eq!(buf.get(x, y), FLAT_COLOR, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn single_bright_pixel_produces_white_ring() {
        let mut buf = PixelBuffer::filled(7, 7, [10, 10, 10, 255]);
        buf.set(3, 3, [255, 255, 255, 255]);
        laplacian_outline(&mut buf);

        for (x, y) in [(2, 3), (4, 3), (3, 2), (3, 4), (3, 3)] {
            assert_eq!(buf.get(x, y), EDGE_COLOR, "pixel ({x},{y})");
        }
        for (x, y) in [(2, 2), (4, 4), (1, 1), (5, 3)] {
            assert_eq!(buf.get(x, y), FLAT_COLOR, "pixel ({x},{y})");
        }
    }

    #[test]
    fn border_copies_nearest_interior() {
        let mut buf = PixelBuffer::filled(5, 5, [0, 0, 0, 255]);
        buf.set(1, 1, [255, 255, 255, 255]);
        laplacian_outline(&mut buf);
        assert_eq!(buf.get(0, 0), buf.get(1, 1));
        assert_eq!(buf.get(4, 2), buf.get(3, 2));
        assert_eq!(buf.get(2, 4), buf.get(2, 3));
    }

    #[test]
    fn tiny_buffers_go_flat() {
        let mut buf = PixelBuffer::filled(2, 9, [255, 0, 0, 255]);
        laplacian_outline(&mut buf);
        assert!(buf.pixels().chunks_exact(4).all(|px| px == FLAT_COLOR));
    }
}
