use anyhow::Result;
use std::f32::consts::TAU;
use std::path::Path;
use tracing::{info, warn};

use crate::inference::MeshDetector;
use crate::types::{Face, Frame, Keypoint, Rect};

/// Landmark detector as seen by the frame loop.
///
/// `estimate_faces` is the only point where a cycle yields. Implementations
/// return an empty list when no face is visible.
#[allow(async_fn_in_trait)]
pub trait FaceDetector {
    fn name(&self) -> String;
    async fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<Face>>;
}

/// Stand-in detector that animates a synthetic face. Used when the ONNX
/// models are not available.
pub struct SyntheticDetector {
    frame_count: u32,
    landmark_count: usize,
}

impl SyntheticDetector {
    pub fn new(refine_landmarks: bool) -> Self {
        Self {
            frame_count: 0,
            landmark_count: if refine_landmarks { 478 } else { 468 },
        }
    }

    /// Concentric ellipses around the frame center. The radius breathes and
    /// the rings turn as frames advance.
    pub fn face_at(&self, width: f32, height: f32) -> Face {
        let t = self.frame_count as f32 * 0.05;
        let cx = width / 2.0;
        let cy = height / 2.0;
        let radius = height * 0.25 + (t * 2.0).sin() * height * 0.02;

        let rings = 6;
        let per_ring = self.landmark_count.div_ceil(rings);
        let keypoints = (0..self.landmark_count)
            .map(|i| {
                let ring = (i / per_ring) as f32 + 1.0;
                let angle = (i % per_ring) as f32 / per_ring as f32 * TAU + t;
                let r = radius * ring / rings as f32;
                Keypoint::new(
                    cx + angle.cos() * r * 0.8,
                    cy + angle.sin() * r,
                    (angle * 3.0).sin() * 10.0,
                )
            })
            .collect();

        let bbox = Rect::new(cx - radius * 0.8, cy - radius, radius * 1.6, radius * 2.0);
        Face::new(keypoints, bbox)
    }
}

impl FaceDetector for SyntheticDetector {
    fn name(&self) -> String {
        format!("Synthetic Face ({} pts)", self.landmark_count)
    }

    async fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<Face>> {
        self.frame_count = self.frame_count.wrapping_add(1);
        Ok(vec![self.face_at(frame.width() as f32, frame.height() as f32)])
    }
}

/// Model files expected in the models directory.
pub const FACE_DETECTION_MODEL: &str = "face_detection.onnx";
pub const FACE_MESH_MODEL: &str = "face_mesh.onnx";
pub const FACE_MESH_REFINED_MODEL: &str = "face_mesh_refined.onnx";

/// The detectors the application can run with.
pub enum DetectorBackend {
    Mesh(MeshDetector),
    Synthetic(SyntheticDetector),
}

impl DetectorBackend {
    /// Builds the detector once for the lifetime of a pipeline run. The
    /// refinement flag picks the refined mesh model.
    pub fn create(models_dir: &Path, refine_landmarks: bool, synthetic: bool) -> Result<Self> {
        if synthetic {
            return Ok(Self::Synthetic(SyntheticDetector::new(refine_landmarks)));
        }

        let mesh_model = models_dir.join(if refine_landmarks {
            FACE_MESH_REFINED_MODEL
        } else {
            FACE_MESH_MODEL
        });
        if !mesh_model.exists() {
            warn!(
                model = %mesh_model.display(),
                "Face mesh model not found, falling back to synthetic face"
            );
            return Ok(Self::Synthetic(SyntheticDetector::new(refine_landmarks)));
        }

        let detection_model = models_dir.join(FACE_DETECTION_MODEL);
        let detector = MeshDetector::new(&mesh_model, &detection_model, refine_landmarks)?;
        info!(detector = %detector.name(), refine_landmarks, "Detector ready");
        Ok(Self::Mesh(detector))
    }
}

impl FaceDetector for DetectorBackend {
    fn name(&self) -> String {
        match self {
            Self::Mesh(d) => d.name(),
            Self::Synthetic(d) => d.name(),
        }
    }

    async fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<Face>> {
        match self {
            Self::Mesh(d) => d.estimate_faces(frame).await,
            Self::Synthetic(d) => d.estimate_faces(frame).await,
        }
    }
}
