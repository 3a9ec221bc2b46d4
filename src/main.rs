// What you SEE:
// • Your mirrored camera image, restyled by the current archetype.
// • 1-5 pick Self / Persona / Shadow / Anima / Trickster.
// • Space spins: the look flickers through effects, then lands on a new one.
// • P saves a PNG snapshot, R records a short clip (R again stops early).
// • ESC quits.

mod camera;
mod window;

use std::path::PathBuf;
use std::time::Instant;

use archetype_mirror::capture::RecorderState;
use archetype_mirror::catalog::EffectId;
use archetype_mirror::config::AppConfig;
use archetype_mirror::encoder::FfmpegBackend;
use archetype_mirror::error::Error;
use archetype_mirror::fx::FxRng;
use archetype_mirror::logging::init_logging;
use archetype_mirror::render::FrameSource;
use archetype_mirror::session::{ControlEvent, DeliverySink, Session};

use camera::CameraCapture;
use window::{Command, Drawer};

const APP_TITLE: &str = "Archetype Mirror";

/// Writes deliverables into one directory, creating it on first use.
struct DirectorySink {
    dir: PathBuf,
}

impl DeliverySink for DirectorySink {
    fn deliver(&mut self, bytes: Vec<u8>, suggested_filename: &str) -> Result<(), Error> {
        let path = self.dir.join(suggested_filename);
        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, &bytes))
            .map_err(|e| Error::Delivery(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(())
    }
}

/// What the title bar shows.
struct TitleState {
    effect: EffectId,
    spinning: bool,
    recording: bool,
    note: Option<String>,
}

impl TitleState {
    fn apply(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::SpinStarted => self.spinning = true,
            ControlEvent::SpinPreview(id) => self.effect = *id,
            ControlEvent::SpinEnded => self.spinning = false,
            ControlEvent::EffectChanged { id, .. } => {
                self.effect = *id;
                self.note = None;
            }
            ControlEvent::RecordingStarted { .. } => self.recording = true,
            ControlEvent::RecordingEnded { delivered } => {
                self.recording = false;
                self.note = Some(if *delivered { "clip saved" } else { "clip discarded" }.to_string());
            }
            ControlEvent::SnapshotTaken { filename } => self.note = Some(format!("saved {filename}")),
        }
    }

    fn render(&self) -> String {
        let def = self.effect.definition();
        let mut title = if self.spinning {
            format!("{APP_TITLE} | spinning... {}", def.name)
        } else {
            format!("{APP_TITLE} | {}: {}", def.name, def.description)
        };
        if self.recording {
            title.push_str(" | REC");
        }
        if let Some(note) = &self.note {
            title.push_str(" | ");
            title.push_str(note);
        }
        title
    }
}

fn main() -> Result<(), Error> {
    /* --- Config + logging --- */
    let config = AppConfig::load();
    init_logging(&config.logging);
    let options = config.session_options()?;

    /* --- Camera + window setup ---
       Visual: window opens, black until the first camera frame arrives. */
    let mut cam = CameraCapture::new(config.camera.index, config.camera.width, config.camera.height)?;
    let (w, h) = cam
        .native_size()
        .unwrap_or((config.camera.width, config.camera.height));
    let mut drawer = Drawer::new(APP_TITLE, w as usize, h as usize)?;

    let backend = FfmpegBackend::detect();
    let mut sink = DirectorySink { dir: config.output_dir.clone() };
    let mut session = Session::new(w, h, options, FxRng::from_time());

    let mut title = TitleState {
        effect: session.current_effect(),
        spinning: false,
        recording: false,
        note: None,
    };
    drawer.set_title(&title.render());

    /* ------------------------------ Main loop ------------------------------ */
    'frames: while drawer.is_open() {
        let now = Instant::now();
        let mut title_dirty = false;

        /* 1) Controls. Failures are shown in the title, never fatal. */
        for command in drawer.commands() {
            let result = match command {
                Command::Quit => break 'frames,
                Command::Select(id) => session.select_id(id),
                Command::Spin => {
                    session.trigger_spin(now);
                    Ok(())
                }
                Command::Snapshot => session.snapshot(&mut cam, &mut sink),
                Command::ToggleRecording => match session.recorder_state() {
                    RecorderState::Idle => session.start_recording(&backend, now),
                    RecorderState::Recording => session.stop_recording(),
                    RecorderState::Finalizing => Ok(()),
                },
            };
            if let Err(e) = result {
                if !e.is_recoverable() {
                    return Err(e);
                }
                tracing::warn!(?command, error = %e, "command failed");
                title.note = Some(e.to_string());
                title_dirty = true;
            }
        }

        /* 2) Render + feed the recorder.
           Visual: the window shows the new frame below. */
        session.tick(now, &mut cam, &mut sink);

        /* 3) Title bar follows the session events. */
        let events = session.drain_events();
        if !events.is_empty() || title_dirty {
            for event in &events {
                title.apply(event);
            }
            drawer.set_title(&title.render());
        }

        drawer.present(session.output())?;
    }

    session.end();
    Ok(())
}
