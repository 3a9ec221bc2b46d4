// Window + keyboard controls.
// Visual effects provided here:
// 1) A window that shows the styled mirror image.
// 2) A title bar that names the current effect and recording state.

use archetype_mirror::catalog::EffectId;
use archetype_mirror::error::Error;
use archetype_mirror::types::PixelBuffer;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// One keypress worth of intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Select(EffectId),
    Spin,
    Snapshot,
    ToggleRecording,
    Quit,
}

const EFFECT_KEYS: [Key; 5] = [Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5];

pub struct Drawer {
    window: Window,
    // 0x00RRGGBB scratch, reused every frame
    packed: Vec<u32>,
}

impl Drawer {
    /// Create a window sized to the output buffer.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self {
            window,
            packed: vec![0; width * height],
        })
    }

    /// Push an RGBA frame to the screen.
    /// Visual: the window immediately displays the new image.
    pub fn present(&mut self, frame: &PixelBuffer) -> Result<(), Error> {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        self.packed.resize(w * h, 0);
        for (dst, px) in self.packed.iter_mut().zip(frame.pixels().chunks_exact(4)) {
            *dst = ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32;
        }
        self.window
            .update_with_buffer(&self.packed, w, h)
            .map_err(|e| Error::WindowUpdate(e.to_string()))
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// Keys pressed since the last frame, in a fixed order.
    pub fn commands(&self) -> Vec<Command> {
        let mut out = Vec::new();
        if self.window.is_key_pressed(Key::Escape, KeyRepeat::No) {
            out.push(Command::Quit);
        }
        for (key, id) in EFFECT_KEYS.iter().zip(EffectId::ALL) {
            if self.window.is_key_pressed(*key, KeyRepeat::No) {
                out.push(Command::Select(id));
            }
        }
        if self.window.is_key_pressed(Key::Space, KeyRepeat::No) {
            out.push(Command::Spin);
        }
        if self.window.is_key_pressed(Key::P, KeyRepeat::No) {
            out.push(Command::Snapshot);
        }
        if self.window.is_key_pressed(Key::R, KeyRepeat::No) {
            out.push(Command::ToggleRecording);
        }
        out
    }
}
