// Opens a camera and hands its frames to the render loop as RGBA buffers.
// Visual expectation: each `current_frame()` is the newest camera image,
// un-mirrored; the render loop does the mirroring.

use archetype_mirror::error::Error;
use archetype_mirror::render::FrameSource;
use archetype_mirror::types::PixelBuffer;

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
    latest: Option<PixelBuffer>,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution and start streaming.
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        let fmt = CameraFormat::new(Resolution::new(width, height), FrameFormat::YUYV, 30);
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(CameraIndex::Index(index), req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The stream may settle on a slightly different resolution.
        let actual = cam.resolution();
        tracing::info!(index, width = actual.width(), height = actual.height(), "camera opened");

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
            latest: None,
        })
    }

    fn grab(&mut self) -> Result<PixelBuffer, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        let rgb = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb.dimensions();
        let mut rgba = Vec::with_capacity((w as usize) * (h as usize) * 4);
        for px in rgb.pixels() {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        PixelBuffer::from_raw(w, h, rgba)
    }
}

impl FrameSource for CameraCapture {
    /// Blocks until the camera delivers. Before the first good frame every
    /// failure reads as "not ready"; afterwards the last good frame is reused.
    fn current_frame(&mut self) -> Result<&PixelBuffer, Error> {
        match self.grab() {
            Ok(frame) => self.latest = Some(frame),
            Err(e) if self.latest.is_some() => {
                tracing::warn!(error = %e, "camera frame dropped, reusing last frame");
            }
            Err(e) => {
                tracing::debug!(error = %e, "camera warming up");
            }
        }
        self.latest.as_ref().ok_or(Error::SourceNotReady)
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}
