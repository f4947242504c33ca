//! Partitioning of a face's keypoints into named anatomical regions.
//!
//! A region is nothing more than a name and an ordered list of keypoint
//! indices. New regions are added by extending the [`FeatureIndexMap`], the
//! rest of the pipeline treats them uniformly.

use std::collections::HashSet;

use crate::types::Keypoint;

/// MediaPipe FaceMesh contours, each listed in drawing order.
const LIPS: &[usize] = &[
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 185, 40, 39, 37, 0, 267, 269, 270, 409,
    78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 191, 80, 81, 82, 13, 312, 311, 310, 415,
];
const LEFT_EYE: &[usize] = &[
    263, 249, 390, 373, 374, 380, 381, 382, 362, 466, 388, 387, 386, 385, 384, 398,
];
const LEFT_EYEBROW: &[usize] = &[276, 283, 282, 295, 285, 300, 293, 334, 296, 336];
const LEFT_IRIS: &[usize] = &[474, 475, 476, 477];
const RIGHT_EYE: &[usize] = &[
    33, 7, 163, 144, 145, 153, 154, 155, 133, 246, 161, 160, 159, 158, 157, 173,
];
const RIGHT_EYEBROW: &[usize] = &[46, 53, 52, 65, 55, 70, 63, 105, 66, 107];
const RIGHT_IRIS: &[usize] = &[469, 470, 471, 472];
const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// A named region and the keypoint indices that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub indices: Vec<usize>,
}

/// Fixed mapping from region name to ordered keypoint indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureIndexMap {
    regions: Vec<Region>,
}

impl FeatureIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contour topology of the MediaPipe FaceMesh model.
    pub fn mediapipe_face_mesh() -> Self {
        Self::new()
            .with_region("lips", LIPS)
            .with_region("leftEye", LEFT_EYE)
            .with_region("leftEyebrow", LEFT_EYEBROW)
            .with_region("leftIris", LEFT_IRIS)
            .with_region("rightEye", RIGHT_EYE)
            .with_region("rightEyebrow", RIGHT_EYEBROW)
            .with_region("rightIris", RIGHT_IRIS)
            .with_region("faceOval", FACE_OVAL)
    }

    /// Appends a region. Regions keep insertion order.
    pub fn with_region(mut self, name: impl Into<String>, indices: &[usize]) -> Self {
        self.regions.push(Region {
            name: name.into(),
            indices: indices.to_vec(),
        });
        self
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Every index claimed by at least one region.
    pub fn reserved(&self) -> HashSet<usize> {
        self.regions
            .iter()
            .flat_map(|r| r.indices.iter().copied())
            .collect()
    }
}

/// Keypoints resolved for one region. `indices[i]` is the source index of
/// `keypoints[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionKeypoints<'m> {
    pub name: &'m str,
    pub indices: Vec<usize>,
    pub keypoints: Vec<Keypoint>,
}

impl RegionKeypoints<'_> {
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Result of [`categorize`]: named regions plus the unclassified residual.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<'m> {
    pub regions: Vec<RegionKeypoints<'m>>,
    pub residual_indices: Vec<usize>,
    pub residual: Vec<Keypoint>,
}

impl<'m> Partition<'m> {
    pub fn region(&self, name: &str) -> Option<&RegionKeypoints<'m>> {
        self.regions.iter().find(|r| r.name == name)
    }
}

/// Splits `keypoints` by the regions of `map`.
///
/// Region order and index order follow the map. Indices past the end of
/// `keypoints` are skipped. The residual keeps the original keypoint order
/// and holds every keypoint whose index no region claims.
pub fn categorize<'m>(keypoints: &[Keypoint], map: &'m FeatureIndexMap) -> Partition<'m> {
    let regions = map
        .regions()
        .iter()
        .map(|region| {
            let (indices, points) = region
                .indices
                .iter()
                .filter_map(|&i| keypoints.get(i).map(|kp| (i, *kp)))
                .unzip();
            RegionKeypoints {
                name: region.name.as_str(),
                indices,
                keypoints: points,
            }
        })
        .collect();

    let reserved = map.reserved();
    let (residual_indices, residual) = keypoints
        .iter()
        .enumerate()
        .filter(|(i, _)| !reserved.contains(i))
        .map(|(i, kp)| (i, *kp))
        .unzip();

    Partition {
        regions,
        residual_indices,
        residual,
    }
}
