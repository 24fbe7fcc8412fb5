use featmatch_core::{
    DetectorKind, FastParams, FeatureResult, HarrisParams, Keypoint, ResponseGrid, ShiTomasiParams,
};
use featmatch_filter::KeypointFilter;
use image::GrayImage;
use imageproc::corners::corners_fast9;
use log::debug;

use crate::akaze::AkazeDetector;
use crate::orb::OrbDetector;
use crate::response::{harris_response, min_eigen_response};

/// Overlap percentage above which two FAST corners count as one. With the
/// fixed size of 7 this merges corners at most one diagonal step apart.
const FAST_NMS_OVERLAP: f32 = 50.0;

/// Keypoint detection capability
pub trait Detector: Send + Sync {
    /// Name used in log output, e.g. `HARRIS`
    fn name(&self) -> &'static str;

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>>;
}

/// Good-features-to-track: minimum-eigenvalue corners with a minimum spacing
#[derive(Debug, Clone)]
pub struct ShiTomasiDetector {
    params: ShiTomasiParams,
}

impl ShiTomasiDetector {
    pub fn new(params: ShiTomasiParams) -> FeatureResult<Self> {
        DetectorKind::ShiTomasi(params.clone()).validate()?;
        Ok(Self { params })
    }

    /// Pixels above the quality level that are also 3x3 local maxima
    fn candidates(grid: &ResponseGrid, threshold: f32) -> Vec<Keypoint> {
        let (width, height) = (grid.width(), grid.height());
        let mut candidates = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let v = grid.get(x, y);
                if v <= threshold {
                    continue;
                }

                let mut is_max = true;
                'neighbours: for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        if grid.get(nx, ny) > v {
                            is_max = false;
                            break 'neighbours;
                        }
                    }
                }

                if is_max {
                    candidates.push(Keypoint::new(x as f32, y as f32, 0.0, v));
                }
            }
        }

        candidates
    }

    /// Greedy spacing: strongest first, reject anything closer than `min_distance`
    /// to an already accepted corner, stop at `max_corners`
    fn enforce_spacing(mut candidates: Vec<Keypoint>, min_distance: f32, max_corners: usize) -> Vec<Keypoint> {
        candidates.sort_by(|a, b| b.response.total_cmp(&a.response));

        let min_distance_sq = min_distance * min_distance;
        let mut accepted: Vec<Keypoint> = Vec::new();

        for candidate in candidates {
            if accepted.len() >= max_corners {
                break;
            }

            let too_close = accepted.iter().any(|kp| {
                let dx = kp.x - candidate.x;
                let dy = kp.y - candidate.y;
                dx * dx + dy * dy < min_distance_sq
            });

            if !too_close {
                accepted.push(candidate);
            }
        }

        accepted
    }
}

impl Detector for ShiTomasiDetector {
    fn name(&self) -> &'static str {
        "SHITOMASI"
    }

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        let grid = min_eigen_response(img, self.params.block_size)?;
        let max = match grid.min_max() {
            Some((_, max)) if max > 0.0 => max,
            _ => return Ok(Vec::new()),
        };

        let candidates = Self::candidates(&grid, self.params.quality_level * max);
        let n_candidates = candidates.len();
        let max_corners = self.params.max_corners(grid.width(), grid.height());
        let size = self.params.block_size as f32;

        let keypoints: Vec<Keypoint> = Self::enforce_spacing(candidates, self.params.min_distance(), max_corners)
            .into_iter()
            .map(|kp| Keypoint::new(kp.x, kp.y, size, kp.response))
            .collect();

        debug!(
            "SHITOMASI kept {} of {} local maxima (min distance {:.1})",
            keypoints.len(),
            n_candidates,
            self.params.min_distance()
        );
        Ok(keypoints)
    }
}

/// Harris corners, normalised to [0, 255] and de-duplicated by overlap
#[derive(Debug, Clone)]
pub struct HarrisDetector {
    params: HarrisParams,
    filter: KeypointFilter,
}

impl HarrisDetector {
    pub fn new(params: HarrisParams) -> FeatureResult<Self> {
        DetectorKind::Harris(params.clone()).validate()?;
        let filter = KeypointFilter::new(
            params.min_response,
            params.overlap_threshold(),
            params.keypoint_size(),
        )?;
        Ok(Self { params, filter })
    }

    /// Raw response normalised to [0, 255], the scale `min_response` is expressed in
    pub fn response(&self, img: &GrayImage) -> FeatureResult<ResponseGrid> {
        Ok(harris_response(img, self.params.block_size, self.params.k)?.normalize_min_max(0.0, 255.0))
    }
}

impl Detector for HarrisDetector {
    fn name(&self) -> &'static str {
        "HARRIS"
    }

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        Ok(self.filter.filter(&self.response(img)?))
    }
}

/// FAST-9 segment test corners
#[derive(Debug, Clone)]
pub struct FastDetector {
    params: FastParams,
    nms: Option<KeypointFilter>,
}

impl FastDetector {
    pub fn new(params: FastParams) -> FeatureResult<Self> {
        DetectorKind::Fast(params.clone()).validate()?;
        let nms = if params.non_max_suppression {
            Some(KeypointFilter::new(0.0, FAST_NMS_OVERLAP, FastParams::KEYPOINT_SIZE)?)
        } else {
            None
        };
        Ok(Self { params, nms })
    }
}

impl Detector for FastDetector {
    fn name(&self) -> &'static str {
        "FAST"
    }

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        let corners = corners_fast9(img, self.params.threshold);
        let keypoints = corners
            .iter()
            .map(|c| Keypoint::new(c.x as f32, c.y as f32, FastParams::KEYPOINT_SIZE, c.score));

        Ok(match &self.nms {
            Some(filter) => filter.suppress(keypoints),
            None => keypoints.collect(),
        })
    }
}

/// Instantiate the configured detector
pub fn build_detector(kind: &DetectorKind) -> FeatureResult<Box<dyn Detector>> {
    Ok(match kind {
        DetectorKind::ShiTomasi(p) => Box::new(ShiTomasiDetector::new(p.clone())?),
        DetectorKind::Harris(p) => Box::new(HarrisDetector::new(p.clone())?),
        DetectorKind::Fast(p) => Box::new(FastDetector::new(p.clone())?),
        DetectorKind::Orb(p) => Box::new(OrbDetector::new(p.clone())?),
        DetectorKind::Akaze(p) => Box::new(AkazeDetector::new(p.clone())?),
    })
}
