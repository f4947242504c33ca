//! Perspective camera orbiting the scene origin.

use nalgebra::{Isometry3, Perspective3, Point2, Point3, Vector3};

pub const FOV_Y_DEGREES: f32 = 50.0;
pub const NEAR: f32 = 0.01;
pub const FAR: f32 = 200.0;
pub const START_DISTANCE: f32 = 50.0;

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_STEP: f32 = 0.95;
const MIN_DISTANCE: f32 = 1.0;
const MAX_POLAR: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A point projected into window pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub pixel: Point2<f32>,
    /// Distance from the camera along its view axis.
    pub depth: f32,
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    azimuth: f32,
    elevation: f32,
    distance: f32,
    target: Point3<f32>,
    viewport: (f32, f32),
}

impl OrbitCamera {
    /// Camera at (0, 0, 50) looking at the origin.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            distance: START_DISTANCE,
            target: Point3::origin(),
            viewport: (width as f32, height as f32),
        }
    }

    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.viewport = (width as f32, height as f32);
    }

    /// Orbits by a mouse drag of `(dx, dy)` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.azimuth -= dx * ROTATE_SPEED;
        self.elevation = (self.elevation + dy * ROTATE_SPEED).clamp(-MAX_POLAR, MAX_POLAR);
    }

    /// Positive `steps` move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * ZOOM_STEP.powf(steps)).clamp(MIN_DISTANCE, FAR);
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        self.target
            + Vector3::new(sin_az * cos_el, sin_el, cos_az * cos_el) * self.distance
    }

    fn view(&self) -> Isometry3<f32> {
        Isometry3::look_at_rh(&self.eye(), &self.target, &Vector3::y())
    }

    fn perspective(&self) -> Perspective3<f32> {
        let (w, h) = self.viewport;
        Perspective3::new(w / h.max(1.0), FOV_Y_DEGREES.to_radians(), NEAR, FAR)
    }

    /// Projects a world point. `None` when it lies outside the near/far
    /// range.
    pub fn project(&self, point: &Point3<f32>) -> Option<Projected> {
        let in_view = self.view() * point;
        let depth = -in_view.z;
        if !(NEAR..=FAR).contains(&depth) {
            return None;
        }
        let ndc = self.perspective().project_point(&in_view);
        let (w, h) = self.viewport;
        Some(Projected {
            pixel: Point2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h),
            depth,
        })
    }

    /// On-screen size in pixels of a world-space length at `depth`.
    pub fn pixels_at(&self, world_size: f32, depth: f32) -> f32 {
        let half_fov = (FOV_Y_DEGREES.to_radians() / 2.0).tan();
        world_size * self.viewport.1 / (2.0 * half_fov * depth)
    }
}
