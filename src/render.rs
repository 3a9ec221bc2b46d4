// The per-frame compositing loop.
// Visual expectation: every `tick` produces one mirrored, effect-styled frame in
// `output()`, ready to push to the window or hand to the recorder.

use crate::catalog::EffectId;
use crate::draw::{Canvas, Transform};
use crate::error::Error;
use crate::fx::FxContext;
use crate::types::PixelBuffer;

/// Where live frames come from (the camera in the binary, fakes in tests).
pub trait FrameSource {
    /// Latest frame, or `Error::SourceNotReady` while the source warms up.
    fn current_frame(&mut self) -> Result<&PixelBuffer, Error>;

    /// Native resolution once known.
    fn native_size(&self) -> Option<(u32, u32)>;
}

pub struct RenderLoop {
    live: Canvas,
    scratch: Canvas,
    frames: u64,
}

impl RenderLoop {
    /// Size the output buffer once; it stays fixed for the session.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            live: Canvas::new(width, height),
            scratch: Canvas::new(width, height),
            frames: 0,
        }
    }

    /// The displayed buffer (last completed frame).
    pub fn output(&self) -> &PixelBuffer {
        self.live.buffer()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Render one frame. Returns `false` (and leaves the last frame alone)
    /// when the source has nothing to show yet.
    pub fn tick(&mut self, source: &mut dyn FrameSource, effect: EffectId, ctx: &mut FxContext) -> bool {
        let frame = match source.current_frame() {
            Ok(frame) => frame,
            Err(Error::SourceNotReady) => {
                tracing::trace!("source not ready, skipping tick");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "frame unavailable, skipping tick");
                return false;
            }
        };

        let mut canvas = self.live.scoped_transform(Transform::MirrorX);
        compose(&mut canvas, frame, effect, ctx);
        drop(canvas);

        self.frames += 1;
        true
    }

    /// Render one extra frame un-mirrored into a scratch buffer and return a copy.
    /// The live buffer and its transform are not touched.
    pub fn snapshot(
        &mut self,
        source: &mut dyn FrameSource,
        effect: EffectId,
        ctx: &mut FxContext,
    ) -> Result<PixelBuffer, Error> {
        let frame = source.current_frame()?;
        let mut canvas = self.scratch.scoped_transform(Transform::Identity);
        compose(&mut canvas, frame, effect, ctx);
        Ok(canvas.buffer().clone())
    }
}

/// Clear, pre-draw, composite, overlay.
fn compose(canvas: &mut Canvas, frame: &PixelBuffer, effect: EffectId, ctx: &mut FxContext) {
    let def = effect.definition();
    canvas.clear();
    (def.pre_draw)(canvas, ctx);
    canvas.draw_frame(frame);
    (def.post_overlay)(canvas, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::{FxRng, GlitchConfig};
    use crate::types::BlendMode;

    struct StubSource {
        frame: Option<PixelBuffer>,
    }

    impl FrameSource for StubSource {
        fn current_frame(&mut self) -> Result<&PixelBuffer, Error> {
            self.frame.as_ref().ok_or(Error::SourceNotReady)
        }
        fn native_size(&self) -> Option<(u32, u32)> {
            self.frame.as_ref().map(|f| f.dimensions())
        }
    }

    fn left_right_frame() -> PixelBuffer {
        // Left half dark grey, right half white.
        let mut f = PixelBuffer::filled(8, 4, [40, 40, 40, 255]);
        for y in 0..4 {
            for x in 4..8 {
                f.set(x, y, [255, 255, 255, 255]);
            }
        }
        f
    }

    fn quiet_ctx() -> FxContext {
        FxContext::new(
            FxRng::from_seed(1),
            GlitchConfig {
                slice_probability: 0.0,
                channel_split_probability: 0.0,
            },
        )
    }

    #[test]
    fn tick_is_noop_until_source_ready() {
        let mut source = StubSource { frame: None };
        let mut render = RenderLoop::new(8, 4);
        let mut ctx = quiet_ctx();
        assert!(!render.tick(&mut source, EffectId::Trickster, &mut ctx));
        assert_eq!(render.frames_rendered(), 0);
        assert!(render.output().pixels().iter().all(|&b| b == 0));

        source.frame = Some(left_right_frame());
        assert!(render.tick(&mut source, EffectId::Trickster, &mut ctx));
        assert_eq!(render.frames_rendered(), 1);
    }

    #[test]
    fn live_output_is_mirrored_and_snapshot_is_not() {
        let mut source = StubSource { frame: Some(left_right_frame()) };
        let mut render = RenderLoop::new(8, 4);
        let mut ctx = quiet_ctx();

        render.tick(&mut source, EffectId::Trickster, &mut ctx);
        // Mirrored: white now on the left -> red in the duotone.
        assert_eq!(render.output().get(0, 0)[0], 255);
        assert_eq!(render.output().get(7, 0), [0, 0, 0, 255]);

        let before = render.output().clone();
        let shot = render.snapshot(&mut source, EffectId::Trickster, &mut ctx).unwrap();
        assert_eq!(shot.get(0, 0), [0, 0, 0, 255]);
        assert_eq!(shot.get(7, 0)[0], 255);
        assert_eq!(render.output(), &before);
    }

    #[test]
    fn overlay_blend_does_not_leak_into_next_frame() {
        let mut source = StubSource { frame: Some(PixelBuffer::filled(10, 10, [100, 100, 100, 255])) };
        let mut render = RenderLoop::new(10, 10);
        let mut ctx = quiet_ctx();

        render.tick(&mut source, EffectId::Self_, &mut ctx);
        assert_eq!(render.live.blend(), BlendMode::Lighter);

        // Plain copy after the reset: grey 100 -> red 100 * 1.8.
        render.tick(&mut source, EffectId::Trickster, &mut ctx);
        assert_eq!(render.output().get(5, 5), [180, 0, 0, 255]);
        assert_eq!(render.live.transform(), Transform::Identity);
    }

    #[test]
    fn snapshot_fails_when_source_not_ready() {
        let mut source = StubSource { frame: None };
        let mut render = RenderLoop::new(4, 4);
        let err = render.snapshot(&mut source, EffectId::Anima, &mut quiet_ctx()).unwrap_err();
        assert!(matches!(err, Error::SourceNotReady));
    }
}
