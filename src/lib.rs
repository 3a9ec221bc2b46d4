//! Archetype Mirror: a live mirror that restyles the camera feed as one of
//! five archetypes, with a randomized "spin", PNG snapshots and short clips.
//!
//! The library is platform-free: frames come in through
//! [`render::FrameSource`], finished files leave through
//! [`session::DeliverySink`], and video encoding sits behind
//! [`encoder::EncoderBackend`]. The binary wires these to a camera, a window
//! and the local filesystem.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod draw;
pub mod encoder;
pub mod error;
pub mod fx;
pub mod logging;
pub mod render;
pub mod selector;
pub mod session;
pub mod types;
pub mod vision;

pub use error::{Error, Result};
pub use session::{ControlEvent, DeliverySink, Session};
