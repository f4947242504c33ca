use anyhow::Result;
use image::imageops::FilterType;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

use crate::types::{Frame, Rect};

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const SCORE_THRESHOLD: f32 = 0.7;
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

/// (cx, cy, w, h), normalized to the model input.
type Anchor = (f32, f32, f32, f32);

/// UltraFace box detector. Finds the most confident face rectangle.
pub struct BoxDetector {
    session: Session,
    anchors: Vec<Anchor>,
}

impl BoxDetector {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;

        let anchors = generate_anchors(INPUT_WIDTH as usize, INPUT_HEIGHT as usize);
        Ok(Self { session, anchors })
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<Option<Rect>> {
        // NCHW [1, 3, 240, 320]
        let input = Tensor::from_array((vec![1, 3, 240, 320], to_nchw(frame)))?;
        let outputs = self.session.run(ort::inputs![input])?;

        let (_scores_shape, scores) = outputs["scores"].try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes) = outputs["boxes"].try_extract_tensor::<f32>()?;

        let Some(rect) = best_box(&self.anchors, scores, boxes, SCORE_THRESHOLD) else {
            return Ok(None);
        };

        // Model input space back to the frame.
        let sx = frame.width() as f32 / INPUT_WIDTH as f32;
        let sy = frame.height() as f32 / INPUT_HEIGHT as f32;
        Ok(Some(Rect::new(
            rect.x * sx,
            rect.y * sy,
            rect.width * sx,
            rect.height * sy,
        )))
    }
}

/// Resizes to the model input and lays the channels out planar, normalized
/// as (p - 127) / 128.
fn to_nchw(frame: &Frame) -> Vec<f32> {
    let resized = image::imageops::resize(frame, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);
    let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
    let mut data = vec![0.0; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 - 127.0) / 128.0;
        }
    }
    data
}

/// Decodes the highest scoring anchor above `threshold`, in model input
/// pixels.
fn best_box(anchors: &[Anchor], scores: &[f32], boxes: &[f32], threshold: f32) -> Option<Rect> {
    let mut best_score = 0.0;
    let mut best_rect = None;

    for (i, &(ax, ay, aw, ah)) in anchors.iter().enumerate() {
        let Some(&score) = scores.get(i * 2 + 1) else {
            break;
        };
        if score <= threshold || score <= best_score {
            continue;
        }
        let Some(enc) = boxes.get(i * 4..i * 4 + 4) else {
            break;
        };

        let cx = enc[0] * CENTER_VARIANCE * aw + ax;
        let cy = enc[1] * CENTER_VARIANCE * ah + ay;
        let w = (enc[2] * SIZE_VARIANCE).exp() * aw;
        let h = (enc[3] * SIZE_VARIANCE).exp() * ah;

        best_score = score;
        best_rect = Some(Rect::new(
            (cx - w / 2.0) * INPUT_WIDTH as f32,
            (cy - h / 2.0) * INPUT_HEIGHT as f32,
            w * INPUT_WIDTH as f32,
            h * INPUT_HEIGHT as f32,
        ));
    }

    best_rect
}

fn generate_anchors(width: usize, height: usize) -> Vec<Anchor> {
    let shrinkage_list = [8, 16, 32, 64];
    let min_boxes: [&[f32]; 4] = [
        &[10.0, 16.0, 24.0],
        &[32.0, 48.0],
        &[64.0, 96.0],
        &[128.0, 192.0, 256.0],
    ];
    let mut anchors = Vec::new();

    let w = width as f32;
    let h = height as f32;

    for (&shrinkage, sizes) in shrinkage_list.iter().zip(min_boxes) {
        let shrinkage = shrinkage as f32;
        let feature_h = (h / shrinkage).ceil() as usize;
        let feature_w = (w / shrinkage).ceil() as usize;

        for v in 0..feature_h {
            for u in 0..feature_w {
                let cx = (u as f32 * shrinkage + shrinkage / 2.0) / w;
                let cy = (v as f32 * shrinkage + shrinkage / 2.0) / h;
                for &min_box in sizes {
                    anchors.push((cx, cy, min_box / w, min_box / h));
                }
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_count() {
        // 40x30*3 + 20x15*2 + 10x8*2 + 5x4*3
        assert_eq!(generate_anchors(320, 240).len(), 4420);
    }

    #[test]
    fn test_best_box_picks_highest_score() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1), (0.25, 0.25, 0.2, 0.2)];
        let scores = vec![0.1, 0.8, 0.05, 0.95];
        let boxes = vec![0.0; 8];

        let rect = best_box(&anchors, &scores, &boxes, SCORE_THRESHOLD).unwrap();

        assert!((rect.width - 0.2 * 320.0).abs() < 1e-3);
        assert!((rect.x - (0.25 - 0.1) * 320.0).abs() < 1e-3);
    }

    #[test]
    fn test_best_box_below_threshold() {
        let anchors = vec![(0.5, 0.5, 0.1, 0.1)];
        assert!(best_box(&anchors, &[0.5, 0.5], &[0.0; 4], SCORE_THRESHOLD).is_none());
    }

    #[test]
    fn test_nchw_layout() {
        let frame = Frame::from_pixel(640, 480, image::Rgb([255, 127, 0]));
        let data = to_nchw(&frame);
        let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
        assert_eq!(data.len(), 3 * plane);
        assert!((data[0] - 1.0).abs() < 0.01);
        assert!(data[plane].abs() < 1e-6);
        assert!((data[2 * plane] + 127.0 / 128.0).abs() < 1e-6);
    }
}
