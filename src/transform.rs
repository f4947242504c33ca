//! Detector pixel space to scene space.
//!
//! The constants below are calibrated together with the default viewer camera
//! (50° FOV at z = 50). Changing one means recalibrating the other.

use std::f32::consts::PI;

use nalgebra::Point3;

use crate::types::{FrameSize, Keypoint, Rect};

const FRAME_CENTER_DIVISOR: f32 = 2.1;
const BOX_X_DIVISOR: f32 = 18.0;
const BOX_Y_DIVISOR: f32 = 20.0;
const SCENE_SCALE: f32 = 10.0;

/// Rotation applied to every built primitive. The detector's y axis points
/// down, the scene's points up.
pub const FLIP_ANGLE: f32 = PI;

/// Maps one keypoint into scene coordinates.
pub fn to_scene(keypoint: &Keypoint, frame: FrameSize, bbox: &Rect) -> Point3<f32> {
    Point3::new(
        (keypoint.x - frame.width / FRAME_CENTER_DIVISOR - bbox.width / BOX_X_DIVISOR) / SCENE_SCALE,
        (keypoint.y - frame.height / FRAME_CENTER_DIVISOR - bbox.height / BOX_Y_DIVISOR)
            / SCENE_SCALE,
        keypoint.depth() / SCENE_SCALE,
    )
}

pub fn to_scene_all(keypoints: &[Keypoint], frame: FrameSize, bbox: &Rect) -> Vec<Point3<f32>> {
    keypoints.iter().map(|kp| to_scene(kp, frame, bbox)).collect()
}
