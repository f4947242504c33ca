//! Colored drawables built from categorized keypoints.

use nalgebra::{Point3, Rotation3, Vector3};

use crate::config::{Color, ColorKey, RegionColorConfig};
use crate::regions::{categorize, FeatureIndexMap};
use crate::transform::{to_scene_all, FLIP_ANGLE};
use crate::types::{Face, FrameSize};

/// Name given to the primitive holding the unclassified keypoints.
pub const RESIDUAL_REGION: &str = "dots";

/// World-space size of a rendered dot.
pub const POINT_SIZE: f32 = 0.33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Points,
    Line,
}

/// A single drawable: ordered vertices, one color, one orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPrimitive {
    pub region: String,
    pub kind: PrimitiveKind,
    pub points: Vec<Point3<f32>>,
    pub color: Color,
    pub rotation: Rotation3<f32>,
}

impl RenderPrimitive {
    pub fn new(
        region: impl Into<String>,
        kind: PrimitiveKind,
        points: Vec<Point3<f32>>,
        color: Color,
    ) -> Self {
        Self {
            region: region.into(),
            kind,
            points,
            color,
            rotation: Rotation3::identity(),
        }
    }

    /// Rotates the primitive about its local x axis.
    pub fn rotate_x(&mut self, angle: f32) {
        self.rotation *= Rotation3::from_axis_angle(&Vector3::x_axis(), angle);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertices with the primitive's rotation applied.
    pub fn world_points(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.points.iter().map(move |p| self.rotation * p)
    }
}

/// Which config slot colors a region. `None` for regions outside the table.
pub fn color_key(region: &str) -> Option<ColorKey> {
    match region {
        "faceOval" => Some(ColorKey::FaceOval),
        "lips" => Some(ColorKey::Lips),
        "leftEyebrow" | "rightEyebrow" => Some(ColorKey::Eyebrow),
        "leftEye" | "rightEye" => Some(ColorKey::Eye),
        "leftIris" | "rightIris" => Some(ColorKey::Iris),
        RESIDUAL_REGION => Some(ColorKey::Dots),
        _ => None,
    }
}

/// Color for `region`, falling back to the dots color.
pub fn resolve_color(region: &str, config: &RegionColorConfig) -> Color {
    color_key(region)
        .and_then(|key| config.color(key))
        .unwrap_or(config.dots_color)
}

/// Builds one primitive from already transformed points, flipped into scene
/// orientation.
pub fn build_primitive(
    region: &str,
    points: Vec<Point3<f32>>,
    color: Color,
    kind: PrimitiveKind,
) -> RenderPrimitive {
    let mut primitive = RenderPrimitive::new(region, kind, points, color);
    primitive.rotate_x(FLIP_ANGLE);
    primitive
}

/// Full per-face build: residual point cloud first, then one polyline per
/// region of `map`, in map order.
pub fn build_face_primitives(
    face: &Face,
    frame: FrameSize,
    map: &FeatureIndexMap,
    config: &RegionColorConfig,
) -> Vec<RenderPrimitive> {
    let partition = categorize(&face.keypoints, map);

    let mut primitives = Vec::with_capacity(partition.regions.len() + 1);
    primitives.push(build_primitive(
        RESIDUAL_REGION,
        to_scene_all(&partition.residual, frame, &face.bbox),
        config.dots_color,
        PrimitiveKind::Points,
    ));
    primitives.extend(partition.regions.iter().map(|region| {
        build_primitive(
            region.name,
            to_scene_all(&region.keypoints, frame, &face.bbox),
            resolve_color(region.name, config),
            PrimitiveKind::Line,
        )
    }));
    primitives
}
