//! Snapshot export and fixed-duration clip recording.
//!
//! The [`Recorder`] is a small state machine driven from the render loop:
//! `Idle -> Recording -> Finalizing -> Idle`. It taps the composited output on
//! its own cadence, keeps every encoded segment in order, and only produces a
//! [`Deliverable`] once the encoder has flushed cleanly.

use std::io::Cursor;
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::encoder::{default_profiles, EncoderBackend, EncodingProfile, StreamEncoder};
use crate::error::Error;
use crate::types::PixelBuffer;

/// A finished artefact ready for the delivery sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deliverable {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

/// Encode a frame as PNG.
pub fn encode_png(frame: &PixelBuffer) -> Result<Vec<u8>, Error> {
    let (w, h) = frame.dimensions();
    let img = RgbaImage::from_raw(w, h, frame.pixels().to_vec()).ok_or(Error::BufferSize {
        width: w,
        height: h,
        expected: (w as usize) * (h as usize) * 4,
        actual: frame.pixels().len(),
    })?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Snapshot deliverable: PNG bytes plus a timestamped name.
pub fn snapshot_deliverable(frame: &PixelBuffer) -> Result<Deliverable, Error> {
    Ok(Deliverable {
        bytes: encode_png(frame)?,
        filename: timestamped_filename("png"),
        mime: "image/png".to_string(),
    })
}

pub fn timestamped_filename(extension: &str) -> String {
    format!(
        "archetype-{}.{extension}",
        chrono::Local::now().format("%Y%m%d-%H%M%S%3f")
    )
}

/// First profile the backend supports, in preference order.
pub fn negotiate<'a>(
    profiles: &'a [EncodingProfile],
    backend: &dyn EncoderBackend,
) -> Result<&'a EncodingProfile, Error> {
    profiles
        .iter()
        .find(|p| {
            let ok = backend.supports(p);
            tracing::debug!(backend = backend.name(), mime = %p.mime, supported = ok, "probing profile");
            ok
        })
        .ok_or(Error::NoSupportedProfile)
}

/// Recording knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingPolicy {
    pub duration_ms: u64,
    /// Tap rate of the recorded stream.
    pub tap_fps: u32,
    /// Preference list for negotiation.
    pub profiles: Vec<EncodingProfile>,
}

impl Default for RecordingPolicy {
    fn default() -> Self {
        Self {
            duration_ms: 5000,
            tap_fps: 30,
            profiles: default_profiles(),
        }
    }
}

impl RecordingPolicy {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    fn tap_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tap_fps.max(1) as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Finalizing,
}

/// The one in-flight recording.
pub struct RecordingSession {
    profile: EncodingProfile,
    started_at: Instant,
    stop_at: Instant,
    next_tap_at: Instant,
    chunks: Vec<Vec<u8>>,
    frames: u64,
    encoder: Box<dyn StreamEncoder>,
}

impl RecordingSession {
    pub fn profile(&self) -> &EncodingProfile {
        &self.profile
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

pub struct Recorder {
    state: RecorderState,
    session: Option<RecordingSession>,
    policy: RecordingPolicy,
}

impl Recorder {
    pub fn new(policy: RecordingPolicy) -> Self {
        Self {
            state: RecorderState::Idle,
            session: None,
            policy,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Negotiate a profile, open the encoder and arm the stop timer.
    pub fn start(
        &mut self,
        backend: &dyn EncoderBackend,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Result<&EncodingProfile, Error> {
        if self.state != RecorderState::Idle {
            return Err(Error::AlreadyRecording);
        }
        let profile = negotiate(&self.policy.profiles, backend)?.clone();
        let encoder = backend
            .open(&profile, width, height, self.policy.tap_fps)
            .map_err(|e| match e {
                Error::EncodingFailure(_) => e,
                other => Error::encoding(other.to_string()),
            })?;

        tracing::info!(
            mime = %profile.mime,
            backend = backend.name(),
            duration_ms = self.policy.duration_ms,
            "recording started"
        );
        self.state = RecorderState::Recording;
        let session = self.session.insert(RecordingSession {
            profile,
            started_at: now,
            stop_at: now + self.policy.duration(),
            next_tap_at: now,
            chunks: Vec::new(),
            frames: 0,
            encoder,
        });
        Ok(&session.profile)
    }

    /// Request the encoder flush. No-op unless recording.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state != RecorderState::Recording {
            return Ok(());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        tracing::debug!(frames = session.frames, "finalizing recording");
        if let Err(e) = session.encoder.finalize() {
            self.abort();
            return Err(e);
        }
        self.state = RecorderState::Finalizing;
        Ok(())
    }

    /// Drop everything recorded so far. Nothing is delivered.
    pub fn abort(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(
                chunks = session.chunks.len(),
                "recording discarded"
            );
        }
        self.state = RecorderState::Idle;
    }

    /// Drive the recorder from the render loop.
    ///
    /// Taps `frame` when due, collects segments, handles timer expiry, and
    /// returns the deliverable once finalization completes. Any encoder error
    /// aborts the recording and is returned as `EncodingFailure`.
    pub fn tick(&mut self, now: Instant, frame: Option<&PixelBuffer>) -> Result<Option<Deliverable>, Error> {
        match self.advance(now, frame) {
            Ok(done) => Ok(done),
            Err(e) => {
                self.abort();
                Err(match e {
                    Error::EncodingFailure(_) => e,
                    other => Error::encoding(other.to_string()),
                })
            }
        }
    }

    fn advance(&mut self, now: Instant, frame: Option<&PixelBuffer>) -> Result<Option<Deliverable>, Error> {
        if self.state == RecorderState::Recording {
            let expired = self.session.as_ref().is_some_and(|s| now >= s.stop_at);
            if expired {
                self.stop()?;
            } else if let (Some(session), Some(frame)) = (self.session.as_mut(), frame) {
                if now >= session.next_tap_at {
                    session.encoder.push_frame(frame)?;
                    session.frames += 1;
                    session.next_tap_at += self.policy.tap_interval();
                    if session.next_tap_at < now {
                        // Render stalled; don't try to catch up with a burst.
                        session.next_tap_at = now + self.policy.tap_interval();
                    }
                }
            }
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        let segments = session.encoder.take_segments()?;
        session.chunks.extend(segments);

        if self.state == RecorderState::Finalizing && session.encoder.is_finished() {
            let Some(session) = self.session.take() else {
                return Ok(None);
            };
            self.state = RecorderState::Idle;
            let bytes = session.chunks.concat();
            tracing::info!(
                bytes = bytes.len(),
                chunks = session.chunks.len(),
                frames = session.frames,
                "recording finalized"
            );
            return Ok(Some(Deliverable {
                bytes,
                filename: timestamped_filename(session.profile.extension()),
                mime: session.profile.mime,
            }));
        }
        Ok(None)
    }
}
