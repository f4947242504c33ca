use image::{ImageBuffer, Rgb};

/// Camera frame as delivered by the video source.
pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// A single detector keypoint in pixel space.
///
/// `z` is the relative depth reported by the landmark model. Detectors that
/// only produce 2D points leave it empty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub const fn flat(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub fn depth(&self) -> f32 {
        self.z.unwrap_or(0.0)
    }
}

/// Face bounding box in pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Pixel dimensions of the video frame a detection was run on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSize {
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn of(frame: &Frame) -> Self {
        Self {
            width: frame.width() as f32,
            height: frame.height() as f32,
        }
    }
}

/// One detected face: the ordered landmark sequence plus its box.
#[derive(Debug, Clone, Default)]
pub struct Face {
    pub keypoints: Vec<Keypoint>,
    pub bbox: Rect,
}

impl Face {
    pub fn new(keypoints: Vec<Keypoint>, bbox: Rect) -> Self {
        Self { keypoints, bbox }
    }
}
