use featmatch_core::{DescriptorKind, DetectorKind, FastParams, FeatureResult, Keypoint, OrbParams};
use featmatch_filter::KeypointFilter;
use image::imageops::{resize, FilterType};
use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::descriptor::{DescriptorSet, Extractor, ORB_DESCRIPTOR_BYTES};
use crate::detector::Detector;
use crate::response::harris_response;

/// Harris window used to rank FAST corners
const HARRIS_BLOCK: usize = 7;
const HARRIS_K: f32 = 0.04;

/// Same merge rule as plain FAST: corners one diagonal step apart are one corner
const LEVEL_NMS_OVERLAP: f32 = 50.0;

/// Fixed so that every process draws the same test pattern
const PATTERN_SEED: u64 = 0x6f72_625f_7061_7474;

/// Smoothing applied before the binary tests
const PATCH_SIGMA: f32 = 2.0;

/// Downscaled copies of the input, level 0 is the input itself.
///
/// Levels too small to hold one full patch are not built.
pub fn build_pyramid(img: &GrayImage, params: &OrbParams) -> Vec<GrayImage> {
    let (width, height) = img.dimensions();
    let min_side = 2 * params.border() + 1;
    let mut levels = Vec::with_capacity(params.n_levels);

    for octave in 0..params.n_levels as u32 {
        let scale = params.level_scale(octave);
        let w = (width as f32 / scale).round() as u32;
        let h = (height as f32 / scale).round() as u32;
        if w < min_side || h < min_side {
            break;
        }

        if octave == 0 {
            levels.push(img.clone());
        } else {
            levels.push(resize(img, w, h, FilterType::Triangle));
        }
    }

    levels
}

fn inside_border(x: u32, y: u32, width: u32, height: u32, border: u32) -> bool {
    x >= border && y >= border && x + border < width && y + border < height
}

/// Intensity centroid orientation over a disc of `radius` around (x, y), in
/// degrees [0, 360). The caller keeps the disc inside the image.
pub fn intensity_centroid_angle(img: &GrayImage, x: u32, y: u32, radius: u32) -> f32 {
    let r = radius as i64;
    let (cx, cy) = (x as i64, y as i64);
    let mut m10 = 0i64;
    let mut m01 = 0i64;

    for dy in -r..=r {
        let span = ((r * r - dy * dy) as f64).sqrt() as i64;
        for dx in -span..=span {
            let pixel = img.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0] as i64;
            m10 += pixel * dx;
            m01 += pixel * dy;
        }
    }

    if m10 == 0 && m01 == 0 {
        return 0.0;
    }
    let angle = (m01 as f32).atan2(m10 as f32).to_degrees();
    if angle < 0.0 { (angle + 360.0) % 360.0 } else { angle }
}

/// Oriented FAST over an image pyramid, ranked by Harris score
#[derive(Debug, Clone)]
pub struct OrbDetector {
    params: OrbParams,
    nms: KeypointFilter,
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> FeatureResult<Self> {
        DetectorKind::Orb(params.clone()).validate()?;
        let nms = KeypointFilter::new(0.0, LEVEL_NMS_OVERLAP, FastParams::KEYPOINT_SIZE)?;
        Ok(Self { params, nms })
    }

    /// Keypoints of one level, in level 0 coordinates
    fn detect_level(&self, level: &GrayImage, octave: u32) -> FeatureResult<Vec<Keypoint>> {
        let (width, height) = level.dimensions();
        let border = self.params.border();
        let harris = harris_response(level, HARRIS_BLOCK, HARRIS_K)?;

        let candidates = corners_fast9(level, self.params.fast_threshold)
            .into_iter()
            .filter(|c| inside_border(c.x, c.y, width, height, border))
            .map(|c| {
                let score = harris.get(c.x as usize, c.y as usize);
                Keypoint::new(c.x as f32, c.y as f32, FastParams::KEYPOINT_SIZE, score)
            });

        let scale = self.params.level_scale(octave);
        let radius = (self.params.patch_size / 2) as u32;
        let size = self.params.patch_size as f32 * scale;

        Ok(self
            .nms
            .suppress(candidates)
            .into_iter()
            .map(|kp| {
                let (x, y) = kp.pixel();
                let angle = intensity_centroid_angle(level, x, y, radius);
                Keypoint::new(kp.x * scale, kp.y * scale, size, kp.response)
                    .with_angle(angle)
                    .with_octave(octave)
            })
            .collect())
    }
}

impl Detector for OrbDetector {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        let pyramid = build_pyramid(img, &self.params);

        let per_level = pyramid
            .par_iter()
            .enumerate()
            .map(|(octave, level)| self.detect_level(level, octave as u32))
            .collect::<FeatureResult<Vec<_>>>()?;

        let mut keypoints: Vec<Keypoint> = per_level.into_iter().flatten().collect();
        let found = keypoints.len();
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(self.params.n_features);

        debug!(
            "ORB kept {} of {} corners over {} levels",
            keypoints.len(),
            found,
            pyramid.len()
        );
        Ok(keypoints)
    }
}

/// One binary test: compare the smoothed intensity at two patch offsets
type TestPoints = (i32, i32, i32, i32);

/// Rotation-steered BRIEF on the ORB patch.
///
/// The 256 test pairs lie inside the patch disc and come from a fixed seed,
/// so descriptors of different runs are comparable.
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    params: OrbParams,
    pattern: Vec<TestPoints>,
}

impl OrbExtractor {
    pub fn new(params: OrbParams) -> FeatureResult<Self> {
        DescriptorKind::Orb(params.clone()).validate()?;
        let pattern = Self::pattern((params.patch_size / 2) as i32);
        Ok(Self { params, pattern })
    }

    fn pattern(radius: i32) -> Vec<TestPoints> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(PATTERN_SEED);
        let mut point = || loop {
            let x = rng.gen_range(-radius..=radius);
            let y = rng.gen_range(-radius..=radius);
            if x * x + y * y <= radius * radius {
                return (x, y);
            }
        };

        (0..ORB_DESCRIPTOR_BYTES * 8)
            .map(|_| {
                let (x1, y1) = point();
                let (x2, y2) = point();
                (x1, y1, x2, y2)
            })
            .collect()
    }

    fn bilinear_sample(img: &GrayImage, x: f32, y: f32) -> f32 {
        let (w, h) = img.dimensions();
        let x0 = x.floor().clamp(0.0, (w - 1) as f32) as u32;
        let y0 = y.floor().clamp(0.0, (h - 1) as f32) as u32;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let dx = (x - x0 as f32).clamp(0.0, 1.0);
        let dy = (y - y0 as f32).clamp(0.0, 1.0);

        let p = |x: u32, y: u32| img.get_pixel(x, y)[0] as f32;
        let top = p(x0, y0) * (1.0 - dx) + p(x1, y0) * dx;
        let bottom = p(x0, y1) * (1.0 - dx) + p(x1, y1) * dx;
        top * (1.0 - dy) + bottom * dy
    }

    /// Describe `kp` on its own pyramid level; `None` when the patch leaves the level
    fn describe_one(&self, levels: &[GrayImage], kp: &mut Keypoint) -> Option<[u8; ORB_DESCRIPTOR_BYTES]> {
        let level = levels.get(kp.octave as usize)?;
        let scale = self.params.level_scale(kp.octave);
        let (lx, ly) = ((kp.x / scale).round(), (kp.y / scale).round());
        if lx < 0.0 || ly < 0.0 {
            return None;
        }

        let (width, height) = level.dimensions();
        if !inside_border(lx as u32, ly as u32, width, height, self.params.border()) {
            return None;
        }

        // Keypoints from detectors without orientation get one here
        if kp.angle < 0.0 {
            kp.angle = intensity_centroid_angle(level, lx as u32, ly as u32, (self.params.patch_size / 2) as u32);
        }

        let (s, c) = kp.angle.to_radians().sin_cos();
        let mut code = [0u8; ORB_DESCRIPTOR_BYTES];
        for (i, &(x1, y1, x2, y2)) in self.pattern.iter().enumerate() {
            let (x1, y1, x2, y2) = (x1 as f32, y1 as f32, x2 as f32, y2 as f32);
            let a = Self::bilinear_sample(level, lx + c * x1 - s * y1, ly + s * x1 + c * y1);
            let b = Self::bilinear_sample(level, lx + c * x2 - s * y2, ly + s * x2 + c * y2);
            code[i / 8] |= ((a < b) as u8) << (i % 8);
        }
        Some(code)
    }
}

impl Extractor for OrbExtractor {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn describe(&self, img: &GrayImage, keypoints: &mut Vec<Keypoint>) -> FeatureResult<DescriptorSet> {
        let levels: Vec<GrayImage> = build_pyramid(img, &self.params)
            .par_iter()
            .map(|level| gaussian_blur_f32(level, PATCH_SIGMA))
            .collect();

        let described: Vec<(Keypoint, Option<[u8; ORB_DESCRIPTOR_BYTES]>)> = keypoints
            .par_iter()
            .map(|kp| {
                let mut kp = *kp;
                let code = self.describe_one(&levels, &mut kp);
                (kp, code)
            })
            .collect();

        let before = keypoints.len();
        keypoints.clear();
        let mut codes = Vec::with_capacity(before);
        for (kp, code) in described {
            if let Some(code) = code {
                keypoints.push(kp);
                codes.push(code);
            }
        }

        if keypoints.len() < before {
            debug!("ORB dropped {} keypoints without a full patch", before - keypoints.len());
        }
        Ok(DescriptorSet::Orb(codes))
    }
}
