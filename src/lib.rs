//! Live 3D reconstruction of facial landmarks.
//!
//! Each camera frame runs through the landmark detector. The first face's
//! keypoints are split into anatomical regions ([`regions`]), mapped into
//! scene space ([`transform`]) and turned into one colored primitive per
//! region ([`geometry`]). [`frame_loop`] drives this once per frame and
//! replaces the whole scene every cycle.

pub mod app;
pub mod args;
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod frame_loop;
pub mod geometry;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod regions;
pub mod scene;
pub mod telemetry;
pub mod transform;
pub mod types;
pub mod view;

pub use config::{Color, ConfigStore, RegionColorConfig};
pub use error::{Error, Result};
pub use frame_loop::{CycleOutcome, FrameLoop, LoopExit, LoopState};
pub use geometry::{PrimitiveKind, RenderPrimitive};
pub use pipeline::FaceDetector;
pub use regions::{categorize, FeatureIndexMap};
pub use scene::{HostEvent, Scene};
pub use types::{Face, Frame, FrameSize, Keypoint, Rect};
