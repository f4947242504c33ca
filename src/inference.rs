use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::detector::BoxDetector;
use crate::pipeline::FaceDetector;
use crate::types::{Face, Frame, Keypoint, Rect};

const MESH_INPUT: u32 = 192;
const ROI_PADDING: f32 = 0.25;

/// Face mesh landmark model plus the optional box detector that crops
/// its input.
struct MeshEngine {
    mesh_session: Session,
    boxes: Option<BoxDetector>,
    landmark_count: usize,
}

impl MeshEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Face>> {
        // Without a box detector the whole frame is treated as the face.
        let bbox = match &mut self.boxes {
            Some(det) => match det.detect(frame)? {
                Some(rect) => rect,
                None => return Ok(Vec::new()),
            },
            None => Rect::new(0.0, 0.0, frame.width() as f32, frame.height() as f32),
        };

        let roi = padded_roi(&bbox, frame.width() as f32, frame.height() as f32);
        let crop = image::imageops::crop_imm(
            frame,
            roi.x as u32,
            roi.y as u32,
            (roi.width as u32).max(1),
            (roi.height as u32).max(1),
        )
        .to_image();

        let resized = image::imageops::resize(&crop, MESH_INPUT, MESH_INPUT, FilterType::Triangle);
        let mut input_data = Vec::with_capacity((MESH_INPUT * MESH_INPUT * 3) as usize);
        for pixel in resized.pixels() {
            for c in 0..3 {
                input_data.push(pixel[c] as f32 / 127.5 - 1.0);
            }
        }

        let shape = vec![1, 192, 192, 3];
        let input = ort::value::Tensor::from_array((shape, input_data))?;
        let outputs = self.mesh_session.run(ort::inputs![input])?;
        let (_output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;

        let keypoints = decode_landmarks(output_data, self.landmark_count, &roi);
        if keypoints.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Face::new(keypoints, bbox)])
    }
}

/// Grows the face box by [`ROI_PADDING`] and clips it to the frame.
fn padded_roi(bbox: &Rect, frame_w: f32, frame_h: f32) -> Rect {
    let pad_w = bbox.width * ROI_PADDING;
    let pad_h = bbox.height * ROI_PADDING;
    let x = (bbox.x - pad_w / 2.0).max(0.0);
    let y = (bbox.y - pad_h / 2.0).max(0.0);
    let w = (bbox.width + pad_w).min(frame_w - x);
    let h = (bbox.height + pad_h).min(frame_h - y);
    Rect::new(x, y, w, h)
}

/// Mesh output is (x, y, z) triples in model input pixels. Maps them back
/// into frame pixels through the crop.
fn decode_landmarks(raw: &[f32], expected: usize, roi: &Rect) -> Vec<Keypoint> {
    let available = raw.len() / 3;
    if available < expected {
        warn!(available, expected, "Mesh output shorter than expected");
    }
    let scale_x = roi.width / MESH_INPUT as f32;
    let scale_y = roi.height / MESH_INPUT as f32;
    raw.chunks_exact(3)
        .take(expected)
        .map(|p| Keypoint::new(roi.x + p[0] * scale_x, roi.y + p[1] * scale_y, p[2]))
        .collect()
}

/// ONNX FaceMesh detector. Inference runs on tokio's blocking pool so the
/// frame loop only suspends while the model works.
pub struct MeshDetector {
    engine: Arc<Mutex<MeshEngine>>,
    landmark_count: usize,
}

impl MeshDetector {
    pub fn new(mesh_model: &Path, detection_model: &Path, refine_landmarks: bool) -> Result<Self> {
        let boxes = if detection_model.exists() {
            info!(model = %detection_model.display(), "Loading face detector");
            Some(BoxDetector::new(detection_model)?)
        } else {
            warn!("Face detector not found, using the full frame. Accuracy will be poor.");
            None
        };

        info!(model = %mesh_model.display(), "Loading face mesh");
        let mesh_session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(mesh_model)?;

        let landmark_count = if refine_landmarks { 478 } else { 468 };
        Ok(Self {
            engine: Arc::new(Mutex::new(MeshEngine {
                mesh_session,
                boxes,
                landmark_count,
            })),
            landmark_count,
        })
    }
}

impl FaceDetector for MeshDetector {
    fn name(&self) -> String {
        format!("Face Mesh ({} pts)", self.landmark_count)
    }

    async fn estimate_faces(&mut self, frame: &Frame) -> Result<Vec<Face>> {
        let engine = Arc::clone(&self.engine);
        let frame = frame.clone();
        tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| anyhow!("face mesh engine poisoned"))?;
            engine.infer(&frame)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_roi_is_clipped() {
        let roi = padded_roi(&Rect::new(10.0, 10.0, 200.0, 100.0), 640.0, 480.0);
        assert_eq!(roi.x, 0.0);
        assert_eq!(roi.y, 0.0);
        assert_eq!(roi.width, 250.0);
        assert_eq!(roi.height, 125.0);

        let roi = padded_roi(&Rect::new(500.0, 400.0, 200.0, 100.0), 640.0, 480.0);
        assert_eq!(roi.x, 475.0);
        assert_eq!(roi.width, 165.0);
        assert_eq!(roi.y, 387.5);
        assert_eq!(roi.height, 92.5);
    }

    #[test]
    fn test_decode_maps_into_frame() {
        let roi = Rect::new(100.0, 50.0, 384.0, 192.0);
        let raw = vec![0.0, 0.0, 1.5, 96.0, 96.0, -2.0, 192.0, 192.0, 0.0];

        let points = decode_landmarks(&raw, 3, &roi);

        assert_eq!(points[0], Keypoint::new(100.0, 50.0, 1.5));
        assert_eq!(points[1], Keypoint::new(292.0, 146.0, -2.0));
        assert_eq!(points[2], Keypoint::new(484.0, 242.0, 0.0));
    }

    #[test]
    fn test_decode_truncates_to_expected() {
        let raw = vec![1.0; 478 * 3];
        let roi = Rect::new(0.0, 0.0, 192.0, 192.0);
        assert_eq!(decode_landmarks(&raw, 468, &roi).len(), 468);
        assert_eq!(decode_landmarks(&raw[..30], 468, &roi).len(), 10);
    }
}
