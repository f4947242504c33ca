use anyhow::{anyhow, Context, Result};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraIndex, CameraInfo, RequestedFormat, RequestedFormatType},
    Camera,
};
use tracing::{debug, info};

use crate::error::Error;
use crate::types::Frame;

/// Something that yields video frames for the frame loop.
pub trait VideoSource {
    /// The current frame, or `None` while the stream has nothing decodable
    /// yet.
    fn current_frame(&mut self) -> Result<Option<Frame>>;
}

/// Lists capture devices, failing with [`Error::UnsupportedEnvironment`] when
/// the host cannot capture video at all.
pub fn ensure_capture_supported() -> crate::error::Result<Vec<CameraInfo>> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| Error::UnsupportedEnvironment(format!("video capture unavailable: {e}")))?;
    if cameras.is_empty() {
        return Err(Error::UnsupportedEnvironment(
            "no video capture device found".to_string(),
        ));
    }
    Ok(cameras)
}

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn new(index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| Error::Camera(e.to_string()))
            .context("Failed to create camera instance")?;

        camera
            .open_stream()
            .map_err(|e| anyhow!(e))
            .context("Failed to open camera stream")?;

        info!(
            camera = %camera.info().human_name(),
            format = %camera.camera_format(),
            "Opened camera"
        );

        Ok(Self { camera })
    }

    pub fn width(&self) -> u32 {
        self.camera.resolution().width()
    }

    pub fn height(&self) -> u32 {
        self.camera.resolution().height()
    }

    pub fn name(&self) -> String {
        self.camera.info().human_name()
    }
}

impl VideoSource for CameraSource {
    fn current_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match self.camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "No frame available yet");
                return Ok(None);
            }
        };
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow!(e))
            .context("Failed to decode frame")?;
        Ok(Some(decoded))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}
