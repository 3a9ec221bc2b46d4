// One running mirror: render loop, selector, recorder and the events they raise.
// Visual expectation: the binary calls `tick` once per displayed frame and shows
// `output()`; everything the user triggers goes through the methods below.

use std::time::Instant;

use crate::capture::{self, Recorder, RecorderState, RecordingPolicy};
use crate::catalog::EffectId;
use crate::encoder::EncoderBackend;
use crate::error::Error;
use crate::fx::{FxContext, FxRng, GlitchConfig};
use crate::render::{FrameSource, RenderLoop};
use crate::selector::{EffectSelector, SpinPolicy};
use crate::types::PixelBuffer;

/// Signals for whatever drives the controls (window title, UI, tests).
#[derive(Clone, Debug, PartialEq)]
pub enum ControlEvent {
    SpinStarted,
    /// A cosmetic spin tick; the description does not change.
    SpinPreview(EffectId),
    SpinEnded,
    EffectChanged {
        id: EffectId,
        name: &'static str,
        description: &'static str,
    },
    RecordingStarted {
        mime: String,
    },
    /// `delivered` is false when the clip was discarded.
    RecordingEnded {
        delivered: bool,
    },
    SnapshotTaken {
        filename: String,
    },
}

/// Where finished snapshots and clips go.
pub trait DeliverySink {
    fn deliver(&mut self, bytes: Vec<u8>, suggested_filename: &str) -> Result<(), Error>;
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub initial: Option<EffectId>,
    pub spin: SpinPolicy,
    pub recording: RecordingPolicy,
    pub glitch: GlitchConfig,
}

pub struct Session {
    render: RenderLoop,
    selector: EffectSelector,
    recorder: Recorder,
    ctx: FxContext,
    events: Vec<ControlEvent>,
    ended: bool,
}

impl Session {
    /// Output size is fixed here for the lifetime of the session.
    pub fn new(width: u32, height: u32, options: SessionOptions, rng: FxRng) -> Self {
        let initial = options.initial.unwrap_or(EffectId::Self_);
        tracing::info!(width, height, effect = %initial, "session started");
        Self {
            render: RenderLoop::new(width, height),
            selector: EffectSelector::new(initial, options.spin),
            recorder: Recorder::new(options.recording),
            ctx: FxContext::new(rng, options.glitch),
            events: Vec::new(),
            ended: false,
        }
    }

    pub fn current_effect(&self) -> EffectId {
        self.selector.current()
    }

    pub fn output(&self) -> &PixelBuffer {
        self.render.output()
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn is_spinning(&self) -> bool {
        self.selector.is_spinning()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Take every event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance spin timers, render one frame and feed the recorder.
    /// Returns whether a new frame was rendered.
    pub fn tick(&mut self, now: Instant, source: &mut dyn FrameSource, sink: &mut dyn DeliverySink) -> bool {
        if self.ended {
            return false;
        }
        let spin_events = self.selector.poll(now, &mut self.ctx.rng);
        self.events.extend(spin_events);

        let rendered = self.render.tick(source, self.selector.current(), &mut self.ctx);

        if self.recorder.state() != RecorderState::Idle {
            let frame = rendered.then(|| self.render.output());
            match self.recorder.tick(now, frame) {
                Ok(Some(clip)) => {
                    let delivered = match sink.deliver(clip.bytes, &clip.filename) {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!(error = %e, filename = %clip.filename, "clip delivery failed");
                            false
                        }
                    };
                    self.events.push(ControlEvent::RecordingEnded { delivered });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "recording failed");
                    self.events.push(ControlEvent::RecordingEnded { delivered: false });
                }
            }
        }
        rendered
    }

    pub fn select(&mut self, id: &str) -> Result<(), Error> {
        if self.ended {
            return Ok(());
        }
        let event = self.selector.select(id)?;
        self.events.push(event);
        Ok(())
    }

    pub fn select_id(&mut self, id: EffectId) -> Result<(), Error> {
        if self.ended {
            return Ok(());
        }
        let event = self.selector.select_id(id)?;
        self.events.push(event);
        Ok(())
    }

    /// Returns false if a spin is already running.
    pub fn trigger_spin(&mut self, now: Instant) -> bool {
        if self.ended {
            return false;
        }
        match self.selector.trigger_spin(now) {
            Some(event) => {
                self.events.push(event);
                true
            }
            None => false,
        }
    }

    /// Render an un-mirrored frame, encode it as PNG and hand it to `sink`.
    pub fn snapshot(&mut self, source: &mut dyn FrameSource, sink: &mut dyn DeliverySink) -> Result<(), Error> {
        if self.ended {
            return Ok(());
        }
        let frame = self.render.snapshot(source, self.selector.current(), &mut self.ctx)?;
        let shot = capture::snapshot_deliverable(&frame)?;
        sink.deliver(shot.bytes, &shot.filename)?;
        tracing::info!(filename = %shot.filename, "snapshot taken");
        self.events.push(ControlEvent::SnapshotTaken { filename: shot.filename });
        Ok(())
    }

    pub fn start_recording(&mut self, backend: &dyn EncoderBackend, now: Instant) -> Result<(), Error> {
        if self.ended {
            return Ok(());
        }
        let (w, h) = self.render.output().dimensions();
        let profile = self.recorder.start(backend, w, h, now)?;
        let mime = profile.mime.clone();
        self.events.push(ControlEvent::RecordingStarted { mime });
        Ok(())
    }

    /// Stop early; the clip is delivered on a later `tick`.
    pub fn stop_recording(&mut self) -> Result<(), Error> {
        if self.ended {
            return Ok(());
        }
        if let Err(e) = self.recorder.stop() {
            self.events.push(ControlEvent::RecordingEnded { delivered: false });
            return Err(e);
        }
        Ok(())
    }

    /// Cancel any spin, discard any recording. Later calls do nothing.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.selector.cancel();
        if self.recorder.state() != RecorderState::Idle {
            self.recorder.abort();
            self.events.push(ControlEvent::RecordingEnded { delivered: false });
        }
        self.ended = true;
        tracing::info!(frames = self.render.frames_rendered(), "session ended");
    }
}
