// FX: the five archetype looks, composed from canvas fills and vision kernels.
// Visual outcomes:
// - Self: a faint warm glow creeping in from the edges.
// - Persona: a photographic negative under a soft vignette.
// - Shadow: a heavy dark vignette with occasional tearing and colour-split flashes.
// - Anima: white outlines on near-black.
// - Trickster: a red/black duotone.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::draw::{Canvas, RadialGradient};
use crate::types::{BlendMode, Rgba};
use crate::vision;

// ----------------------------- randomness ----------------------------------------------

/// Seedable RNG for glitches and the spin.
/// Visual: decides when Shadow tears and which effect the spin lands on.
pub struct FxRng {
    rng: Xoshiro256StarStar,
}

impl FxRng {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: Xoshiro256StarStar::seed_from_u64(seed) }
    }

    /// Seed from the wall clock; used by the binary.
    pub fn from_time() -> Self {
        let seed = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        Self::from_seed(seed)
    }

    /// True with probability `p` (clamped to [0,1]).
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform index in `0..n`. `n` must be non-zero.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }

    /// Uniform integer in `[min, max]`.
    #[inline]
    pub fn range_i32(&mut self, min: i32, max: i32) -> i32 {
        self.rng.random_range(min..=max)
    }
}

// ----------------------------- per-session effect state --------------------------------

/// Glitch odds for Shadow, per frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlitchConfig {
    pub slice_probability: f64,
    pub channel_split_probability: f64,
}

impl Default for GlitchConfig {
    fn default() -> Self {
        Self {
            slice_probability: 0.15,
            channel_split_probability: 0.05,
        }
    }
}

/// Mutable state effects may consult while drawing.
pub struct FxContext {
    pub rng: FxRng,
    pub glitch: GlitchConfig,
}

impl FxContext {
    pub fn new(rng: FxRng, glitch: GlitchConfig) -> Self {
        Self { rng, glitch }
    }
}

/// Signature of every pre-draw and post-draw step.
pub type FxFn = fn(&mut Canvas, &mut FxContext);

// ----------------------------- pre-draw ------------------------------------------------

/// Shared pre-draw: drop any blend mode a previous overlay left behind.
pub fn reset_blend(canvas: &mut Canvas, _ctx: &mut FxContext) {
    canvas.set_blend(BlendMode::SourceOver);
}

// ----------------------------- overlays ------------------------------------------------

const WARM_GLOW: Rgba = Rgba::new(255, 170, 90, 0.0);
const WARM_GLOW_PEAK_ALPHA: f32 = 0.15;
const WARM_GLOW_RADIUS: f32 = 0.3;

/// Half the diagonal: the farthest any pixel sits from the centre.
fn far_edge(canvas: &Canvas) -> f32 {
    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    (w * w + h * h).sqrt() / 2.0
}

/// Self: additive warm glow, zero at the centre rising to 0.15 at 0.3 x min(w, h).
/// Leaves the canvas in `Lighter`; the next pre-draw resets it.
pub fn self_glow(canvas: &mut Canvas, _ctx: &mut FxContext) {
    let radius = WARM_GLOW_RADIUS * canvas.width().min(canvas.height()) as f32;
    let glow = RadialGradient::centered(
        canvas.width(),
        canvas.height(),
        radius,
        WARM_GLOW,
        Rgba { a: WARM_GLOW_PEAK_ALPHA, ..WARM_GLOW },
    );
    canvas.set_blend(BlendMode::Lighter);
    canvas.fill_radial_gradient(&glow);
}

/// Persona: full negative, then a pale-centre / dark-edge vignette.
pub fn persona(canvas: &mut Canvas, _ctx: &mut FxContext) {
    vision::invert_rgb(canvas.buffer_mut());
    let vignette = RadialGradient::centered(
        canvas.width(),
        canvas.height(),
        far_edge(canvas),
        Rgba::new(240, 240, 240, 0.08),
        Rgba::new(10, 10, 10, 0.35),
    );
    canvas.set_blend(BlendMode::SourceOver);
    canvas.fill_radial_gradient(&vignette);
}

/// The vignette Shadow draws before any glitch.
pub fn shadow_vignette(width: u32, height: u32) -> RadialGradient {
    let far = ((width as f32).powi(2) + (height as f32).powi(2)).sqrt() / 2.0;
    RadialGradient::centered(
        width,
        height,
        far,
        Rgba::new(0, 0, 0, 0.0),
        Rgba::new(0, 0, 0, 0.85),
    )
}

const SLICE_MIN_HEIGHT: i32 = 10;
const SLICE_MAX_HEIGHT: i32 = 40;
const SLICE_MAX_SHIFT: i32 = 20;
const SPLIT_MAX_SHIFT: i32 = 5;
const SPLIT_ALPHA: f32 = 0.5;

/// Shadow: dark vignette, then (maybe) slice tearing, then (maybe) a channel split.
/// The glitches run on the already-dimmed image.
pub fn shadow(canvas: &mut Canvas, ctx: &mut FxContext) {
    canvas.set_blend(BlendMode::SourceOver);
    canvas.fill_radial_gradient(&shadow_vignette(canvas.width(), canvas.height()));

    if ctx.rng.chance(ctx.glitch.slice_probability) {
        slice_glitch(canvas, ctx);
    }
    if ctx.rng.chance(ctx.glitch.channel_split_probability) {
        channel_split(canvas, ctx);
    }
}

/// Visual: one or two horizontal bands jump sideways.
fn slice_glitch(canvas: &mut Canvas, ctx: &mut FxContext) {
    let height = canvas.height() as i32;
    if height == 0 {
        return;
    }
    let slices = ctx.rng.range_i32(1, 2);
    for _ in 0..slices {
        let strip_h = ctx.rng.range_i32(SLICE_MIN_HEIGHT, SLICE_MAX_HEIGHT).min(height);
        let y = ctx.rng.range_i32(0, height - strip_h);
        let dx = ctx.rng.range_i32(-SLICE_MAX_SHIFT, SLICE_MAX_SHIFT);
        tracing::trace!(y, strip_h, dx, "slice glitch");
        canvas.shift_strip(y as u32, strip_h as u32, dx);
    }
}

/// Visual: the frame doubles up at opposite offsets, brightening like chromatic fringes.
fn channel_split(canvas: &mut Canvas, ctx: &mut FxContext) {
    let d = ctx.rng.range_i32(1, SPLIT_MAX_SHIFT);
    let frame = canvas.buffer().clone();
    canvas.set_blend(BlendMode::Lighter);
    canvas.draw_offset(&frame, d, 0, SPLIT_ALPHA);
    canvas.draw_offset(&frame, -d, 0, SPLIT_ALPHA);
    canvas.set_blend(BlendMode::SourceOver);
}

/// Anima: Laplacian edge outline.
pub fn anima(canvas: &mut Canvas, _ctx: &mut FxContext) {
    vision::laplacian_outline(canvas.buffer_mut());
}

/// Trickster: red/black duotone.
pub fn trickster(canvas: &mut Canvas, _ctx: &mut FxContext) {
    vision::duotone_red(canvas.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(seed: u64, slice: f64, split: f64) -> FxContext {
        FxContext::new(
            FxRng::from_seed(seed),
            GlitchConfig {
                slice_probability: slice,
                channel_split_probability: split,
            },
        )
    }

    fn noisy_canvas(w: u32, h: u32) -> Canvas {
        let mut canvas = Canvas::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 31 + y * 17) % 256) as u8;
                canvas.buffer_mut().set(x, y, [v, 255 - v, v / 2, 255]);
            }
        }
        canvas
    }

    const OVERLAYS: [FxFn; 5] = [self_glow, persona, shadow, anima, trickster];

    #[test]
    fn overlays_never_change_dimensions() {
        for (w, h) in [(1, 1), (2, 3), (3, 3), (17, 9), (64, 48)] {
            for overlay in OVERLAYS {
                let mut canvas = noisy_canvas(w, h);
                overlay(&mut canvas, &mut ctx(3, 1.0, 1.0));
                assert_eq!(canvas.buffer().dimensions(), (w, h));
                assert_eq!(canvas.buffer().pixels().len(), (w * h * 4) as usize);
            }
        }
    }

    #[test]
    fn reset_blend_restores_source_over() {
        let mut canvas = Canvas::new(4, 4);
        let mut c = ctx(1, 0.0, 0.0);
        self_glow(&mut canvas, &mut c);
        assert_eq!(canvas.blend(), BlendMode::Lighter);
        reset_blend(&mut canvas, &mut c);
        assert_eq!(canvas.blend(), BlendMode::SourceOver);
    }

    #[test]
    fn self_glow_is_faint_at_centre_and_warms_corners() {
        let mut canvas = Canvas::new(40, 40);
        canvas.buffer_mut().fill([50, 50, 50, 255]);
        self_glow(&mut canvas, &mut ctx(1, 0.0, 0.0));
        let [r, _, _, _] = canvas.buffer().get(20, 20);
        assert!(r <= 53, "centre {r}");
        let [r, g, b, _] = canvas.buffer().get(0, 0);
        assert!(r > g && g > b && b > 50, "corner {r},{g},{b}");
    }

    #[test]
    fn persona_inverts_before_vignette() {
        let mut canvas = Canvas::new(41, 41);
        canvas.buffer_mut().fill([0, 0, 0, 255]);
        persona(&mut canvas, &mut ctx(1, 0.0, 0.0));
        let [r, _, _, a] = canvas.buffer().get(20, 20);
        assert!(r > 230, "centre should be near white, got {r}");
        assert_eq!(a, 255);
    }

    #[test]
    fn shadow_without_glitches_darkens_outward() {
        let mut canvas = Canvas::new(60, 40);
        canvas.buffer_mut().fill([255, 255, 255, 255]);
        shadow(&mut canvas, &mut ctx(9, 0.0, 0.0));
        let mut last = u8::MAX;
        for x in 30..60 {
            let [r, _, _, _] = canvas.buffer().get(x, 20);
            assert!(r <= last, "x={x}: {r} > {last}");
            last = r;
        }
        assert!(last < 80);
        assert_eq!(canvas.blend(), BlendMode::SourceOver);
    }

    #[test]
    fn forced_glitches_alter_the_image_deterministically() {
        let run = |seed| {
            let mut canvas = noisy_canvas(80, 60);
            shadow(&mut canvas, &mut ctx(seed, 1.0, 1.0));
            canvas.buffer().clone()
        };
        let mut plain = noisy_canvas(80, 60);
        shadow(&mut plain, &mut ctx(5, 0.0, 0.0));

        assert_eq!(run(5), run(5));
        assert_ne!(run(5), *plain.buffer());
    }

    #[test]
    fn rng_index_stays_in_range() {
        let mut rng = FxRng::from_seed(11);
        for _ in 0..1000 {
            assert!(rng.index(5) < 5);
            let v = rng.range_i32(-20, 20);
            assert!((-20..=20).contains(&v));
        }
        assert!(rng.chance(1.0));
        assert!(!rng.chance(0.0));
    }

    #[test]
    fn anima_and_trickster_only_emit_their_palettes() {
        let mut canvas = noisy_canvas(16, 16);
        anima(&mut canvas, &mut ctx(1, 0.0, 0.0));
        for px in canvas.buffer().pixels().chunks_exact(4) {
            assert!(px == vision::EDGE_COLOR || px == vision::FLAT_COLOR);
        }

        let mut canvas = noisy_canvas(16, 16);
        trickster(&mut canvas, &mut ctx(1, 0.0, 0.0));
        for px in canvas.buffer().pixels().chunks_exact(4) {
            assert_eq!((px[1], px[2]), (0, 0));
        }
    }
}
