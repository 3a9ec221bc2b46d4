//! Stream encoder seam and the ffmpeg-backed implementation.
//!
//! The recorder only sees [`EncoderBackend`] (capability query + factory) and
//! [`StreamEncoder`] (push frames, collect ordered segments). The shipped
//! backend pipes raw RGBA frames into an `ffmpeg` child process and forwards
//! its muxed stdout as segments.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::PixelBuffer;

/// Output container; decides the delivered file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Single-file muxed format.
    Mp4,
    /// Streaming format.
    Webm,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Webm => "webm",
        }
    }
}

/// A (container, codec) pairing the recorder may negotiate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    /// Descriptor, e.g. `video/webm;codecs=vp9`.
    pub mime: String,
    pub container: Container,
    /// Codec tag (`avc1`, `vp9`, `vp8`); `None` lets the backend pick.
    #[serde(default)]
    pub codec: Option<String>,
}

impl EncodingProfile {
    pub fn new(mime: &str, container: Container, codec: Option<&str>) -> Self {
        Self {
            mime: mime.to_string(),
            container,
            codec: codec.map(str::to_string),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.container.extension()
    }
}

/// Most-compatible first: muxed mp4, two higher-quality webm codecs, then plain webm.
pub fn default_profiles() -> Vec<EncodingProfile> {
    vec![
        EncodingProfile::new("video/mp4;codecs=avc1", Container::Mp4, Some("avc1")),
        EncodingProfile::new("video/webm;codecs=vp9", Container::Webm, Some("vp9")),
        EncodingProfile::new("video/webm;codecs=vp8", Container::Webm, Some("vp8")),
        EncodingProfile::new("video/webm", Container::Webm, None),
    ]
}

/// Platform capability query plus encoder factory.
pub trait EncoderBackend {
    fn name(&self) -> &str;

    fn supports(&self, profile: &EncodingProfile) -> bool;

    fn open(
        &self,
        profile: &EncodingProfile,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn StreamEncoder>, Error>;
}

/// A running encoder. Segments come back strictly in production order.
pub trait StreamEncoder {
    /// Queue one frame. Must not block the render tick.
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), Error>;

    /// Segments produced since the last call. Never blocks.
    fn take_segments(&mut self) -> Result<Vec<Vec<u8>>, Error>;

    /// Ask the encoder to flush; trailing segments arrive via `take_segments`.
    fn finalize(&mut self) -> Result<(), Error>;

    /// True once every segment (including the trailer) has been handed out.
    fn is_finished(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ffmpeg backend
// ---------------------------------------------------------------------------

/// Frames queued for ffmpeg before new ones get dropped.
const FRAME_QUEUE_DEPTH: usize = 16;
const READ_CHUNK: usize = 64 * 1024;

pub struct FfmpegBackend {
    available: bool,
    encoders: String,
}

impl FfmpegBackend {
    /// Probe `ffmpeg` on `PATH` once; `supports` answers from the cached result.
    pub fn detect() -> Self {
        let available = command_exists("ffmpeg");
        let encoders = if available {
            Command::new("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .stderr(Stdio::null())
                .output()
                .map(|out| String::from_utf8_lossy(&out.stdout).into_owned())
                .unwrap_or_default()
        } else {
            String::new()
        };
        tracing::info!(available, "ffmpeg probe finished");
        Self { available, encoders }
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.encoders
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(name))
    }
}

/// ffmpeg encoder name for a profile.
fn ffmpeg_codec(profile: &EncodingProfile) -> &'static str {
    match (profile.container, profile.codec.as_deref()) {
        (_, Some("avc1")) | (Container::Mp4, None) => "libx264",
        (_, Some("vp9")) => "libvpx-vp9",
        _ => "libvpx",
    }
}

fn ffmpeg_args(profile: &EncodingProfile, width: u32, height: u32, fps: u32) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.extend([
        "-s".to_string(),
        format!("{width}x{height}"),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        ffmpeg_codec(profile).to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);
    match profile.container {
        Container::Mp4 => args.extend(
            ["-movflags", "frag_keyframe+empty_moov+default_base_moof", "-f", "mp4"]
                .iter()
                .map(|s| s.to_string()),
        ),
        Container::Webm => args.extend(["-f", "webm"].iter().map(|s| s.to_string())),
    }
    args.push("pipe:1".to_string());
    args
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn supports(&self, profile: &EncodingProfile) -> bool {
        self.available && self.has_encoder(ffmpeg_codec(profile))
    }

    fn open(
        &self,
        profile: &EncodingProfile,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn StreamEncoder>, Error> {
        let args = ffmpeg_args(profile, width, height, fps);
        tracing::debug!(?args, "spawning ffmpeg");
        let encoder = FfmpegEncoder::spawn(&args)?;
        Ok(Box::new(encoder))
    }
}

enum Output {
    Segment(Vec<u8>),
    Eof,
    Failed(String),
}

struct FfmpegEncoder {
    child: Child,
    frames: Option<SyncSender<Vec<u8>>>,
    output: Receiver<Output>,
    writer: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
    dropped_frames: u64,
}

impl FfmpegEncoder {
    fn spawn(args: &[String]) -> Result<Self, Error> {
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::encoding(format!("failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::encoding("failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::encoding("failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::encoding("failed to capture ffmpeg stderr"))?;

        // Frame writer: dropping the sender closes stdin, which makes ffmpeg flush.
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Vec<u8>>(FRAME_QUEUE_DEPTH);
        let writer = std::thread::spawn(move || write_frames(stdin, frame_rx));

        // Segment reader: forwards stdout chunks in order.
        let (out_tx, out_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => {
                        let _ = out_tx.send(Output::Eof);
                        break;
                    }
                    Ok(n) => {
                        if out_tx.send(Output::Segment(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = out_tx.send(Output::Failed(format!("reading ffmpeg output: {e}")));
                        break;
                    }
                }
            }
        });

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || {
            let mut text = String::new();
            match stderr.read_to_string(&mut text) {
                Ok(_) => text,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(pid = child.id(), "ffmpeg encoder started");
        Ok(Self {
            child,
            frames: Some(frame_tx),
            output: out_rx,
            writer: Some(writer),
            stderr: Some(stderr_task),
            finished: false,
            dropped_frames: 0,
        })
    }

    fn wait_for_exit(&mut self) -> Result<(), Error> {
        self.frames = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        let status = self
            .child
            .wait()
            .map_err(|e| Error::encoding(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(Error::encoding(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }
        if self.dropped_frames > 0 {
            tracing::warn!(dropped = self.dropped_frames, "encoder fell behind and dropped frames");
        }
        Ok(())
    }
}

fn write_frames(mut stdin: ChildStdin, frames: Receiver<Vec<u8>>) {
    for frame in frames {
        if let Err(e) = stdin.write_all(&frame) {
            tracing::warn!(error = %e, "ffmpeg stdin closed early");
            return;
        }
    }
}

impl StreamEncoder for FfmpegEncoder {
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), Error> {
        let Some(tx) = self.frames.as_ref() else {
            return Err(Error::encoding("frame pushed after finalize"));
        };
        match tx.try_send(frame.pixels().to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::encoding("ffmpeg stopped accepting frames")),
        }
    }

    fn take_segments(&mut self) -> Result<Vec<Vec<u8>>, Error> {
        let mut segments = Vec::new();
        while !self.finished {
            match self.output.try_recv() {
                Ok(Output::Segment(bytes)) => segments.push(bytes),
                Ok(Output::Eof) => {
                    self.finished = true;
                    self.wait_for_exit()?;
                }
                Ok(Output::Failed(msg)) => return Err(Error::EncodingFailure(msg)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(Error::encoding("ffmpeg output reader vanished"));
                }
            }
        }
        Ok(segments)
    }

    fn finalize(&mut self) -> Result<(), Error> {
        self.frames = None;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if !self.finished {
            self.frames = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles_are_most_compatible_first() {
        let profiles = default_profiles();
        let mimes: Vec<&str> = profiles.iter().map(|p| p.mime.as_str()).collect();
        assert_eq!(
            mimes,
            ["video/mp4;codecs=avc1", "video/webm;codecs=vp9", "video/webm;codecs=vp8", "video/webm"]
        );
        assert_eq!(profiles[0].extension(), "mp4");
        assert!(profiles[1..].iter().all(|p| p.extension() == "webm"));
    }

    #[test]
    fn profiles_map_to_ffmpeg_codecs() {
        let p = default_profiles();
        assert_eq!(ffmpeg_codec(&p[0]), "libx264");
        assert_eq!(ffmpeg_codec(&p[1]), "libvpx-vp9");
        assert_eq!(ffmpeg_codec(&p[2]), "libvpx");
        assert_eq!(ffmpeg_codec(&p[3]), "libvpx");
    }

    #[test]
    fn mp4_args_use_fragmented_output_on_stdout() {
        let args = ffmpeg_args(&default_profiles()[0], 640, 480, 30);
        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "640x480"));
        assert!(args.iter().any(|a| a.contains("empty_moov")));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn encoder_listing_is_parsed_by_name_column() {
        let backend = FfmpegBackend {
            available: true,
            encoders: " V....D libvpx               libvpx VP8 (codec vp8)\n V....D libvpx-vp9           libvpx VP9 (codec vp9)\n".to_string(),
        };
        let p = default_profiles();
        assert!(!backend.supports(&p[0]));
        assert!(backend.supports(&p[1]));
        assert!(backend.supports(&p[2]));

        let missing = FfmpegBackend { available: false, ..backend };
        assert!(!missing.supports(&p[1]));
    }

    #[test]
    fn profile_list_deserializes_from_json() {
        let json = r#"[{"mime":"video/webm","container":"webm"}]"#;
        let profiles: Vec<EncodingProfile> = serde_json::from_str(json).unwrap();
        assert_eq!(profiles[0], EncodingProfile::new("video/webm", Container::Webm, None));
    }
}
