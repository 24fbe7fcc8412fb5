use std::collections::HashMap;

use ::akaze::Akaze;
use featmatch_core::{AkazeParams, DescriptorKind, DetectorKind, FeatureError, FeatureResult, Keypoint};
use image::GrayImage;
use log::debug;

use crate::descriptor::{DescriptorSet, Extractor, AKAZE_DESCRIPTOR_BYTES};
use crate::detector::Detector;

/// The nonlinear scale space needs at least this many pixels on the short side
pub const AKAZE_MIN_SIDE: u32 = 40;

pub type AkazeFeature = (Keypoint, [u8; AKAZE_DESCRIPTOR_BYTES]);

fn engine(params: &AkazeParams) -> Akaze {
    Akaze {
        detector_threshold: params.threshold,
        max_octave_evolution: params.octaves,
        num_sublevels: params.sublevels,
        ..Akaze::default()
    }
}

/// Keypoints and MLDB descriptors of one frame.
///
/// Sizes are converted to diameters and angles to degrees.
pub fn extract_akaze(img: &GrayImage, params: &AkazeParams) -> FeatureResult<Vec<AkazeFeature>> {
    let (width, height) = img.dimensions();
    if width.min(height) < AKAZE_MIN_SIDE {
        debug!("AKAZE skipped {}x{} frame", width, height);
        return Ok(Vec::new());
    }

    let gray = akaze_image::GrayImage::from_raw(width, height, img.as_raw().clone())
        .ok_or_else(|| FeatureError::input(format!("{}x{} frame has a short pixel buffer", width, height)))?;
    let (keypoints, descriptors) = engine(params).extract(&akaze_image::DynamicImage::ImageLuma8(gray));

    if keypoints.len() != descriptors.len() {
        return Err(FeatureError::Extraction(format!(
            "AKAZE produced {} descriptors for {} keypoints",
            descriptors.len(),
            keypoints.len()
        )));
    }

    Ok(keypoints
        .iter()
        .zip(descriptors.iter())
        .map(|(kp, code)| {
            let (x, y) = kp.point;
            let keypoint = Keypoint::new(x, y, kp.size * 2.0, kp.response)
                .with_angle(kp.angle.to_degrees().rem_euclid(360.0))
                .with_octave(kp.octave as u32);
            (keypoint, *code.bytes())
        })
        .collect())
}

/// Accelerated-KAZE keypoints from the nonlinear scale space
#[derive(Debug, Clone)]
pub struct AkazeDetector {
    params: AkazeParams,
}

impl AkazeDetector {
    pub fn new(params: AkazeParams) -> FeatureResult<Self> {
        DetectorKind::Akaze(params.clone()).validate()?;
        Ok(Self { params })
    }
}

impl Detector for AkazeDetector {
    fn name(&self) -> &'static str {
        "AKAZE"
    }

    fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        Ok(extract_akaze(img, &self.params)?.into_iter().map(|(kp, _)| kp).collect())
    }
}

/// MLDB descriptors for AKAZE keypoints.
///
/// The scale space is rebuilt from the frame and every input keypoint is
/// paired with the extracted keypoint at the same position and octave.
/// Keypoints without a counterpart are removed.
#[derive(Debug, Clone)]
pub struct AkazeExtractor {
    params: AkazeParams,
}

impl AkazeExtractor {
    pub fn new(params: AkazeParams) -> FeatureResult<Self> {
        DescriptorKind::Akaze(params.clone()).validate()?;
        Ok(Self { params })
    }

    fn key(kp: &Keypoint) -> (u32, u32, u32) {
        (kp.x.to_bits(), kp.y.to_bits(), kp.octave)
    }
}

impl Extractor for AkazeExtractor {
    fn name(&self) -> &'static str {
        "AKAZE"
    }

    fn describe(&self, img: &GrayImage, keypoints: &mut Vec<Keypoint>) -> FeatureResult<DescriptorSet> {
        let features = extract_akaze(img, &self.params)?;
        let by_position: HashMap<(u32, u32, u32), usize> = features
            .iter()
            .enumerate()
            .map(|(i, (kp, _))| (Self::key(kp), i))
            .collect();

        let before = keypoints.len();
        let mut codes = Vec::with_capacity(before);
        keypoints.retain(|kp| match by_position.get(&Self::key(kp)) {
            Some(&i) => {
                codes.push(features[i].1);
                true
            }
            None => false,
        });

        if keypoints.len() < before {
            debug!(
                "AKAZE dropped {} keypoints not found in the scale space",
                before - keypoints.len()
            );
        }
        Ok(DescriptorSet::Akaze(codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Dark blobs of different radii on a bright 160x120 background
    fn create_blob_image() -> GrayImage {
        let blobs = [(40.0f32, 40.0f32, 9.0f32), (110.0, 50.0, 14.0), (70.0, 90.0, 6.0)];
        GrayImage::from_fn(160, 120, |x, y| {
            let inside = blobs.iter().any(|&(cx, cy, r)| {
                let (dx, dy) = (x as f32 - cx, y as f32 - cy);
                dx * dx + dy * dy <= r * r
            });
            if inside { Luma([25]) } else { Luma([230]) }
        })
    }

    #[test]
    fn test_small_frames_yield_nothing() {
        let detector = AkazeDetector::new(AkazeParams::default()).unwrap();
        assert!(detector.detect(&GrayImage::new(39, 200)).unwrap().is_empty());
        assert!(detector.detect(&GrayImage::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_blobs_are_detected_and_described() {
        let img = create_blob_image();
        let detector = AkazeDetector::new(AkazeParams::default()).unwrap();
        let extractor = AkazeExtractor::new(AkazeParams::default()).unwrap();

        let mut kps = detector.detect(&img).unwrap();
        assert!(!kps.is_empty());
        for kp in &kps {
            assert!(kp.size > 0.0);
            assert!((0.0..360.0).contains(&kp.angle));
        }

        let n = kps.len();
        let set = extractor.describe(&img, &mut kps).unwrap();
        assert_eq!(set.kind(), "AKAZE");
        assert_eq!(kps.len(), n);
        assert_eq!(set.len(), n);
        for i in 0..n {
            assert_eq!(set.distance(i, &set, i), Some(0));
        }
    }

    #[test]
    fn test_foreign_keypoints_are_dropped() {
        let extractor = AkazeExtractor::new(AkazeParams::default()).unwrap();
        let mut kps = vec![Keypoint::new(3.5, 7.25, 6.0, 1.0)];
        let set = extractor.describe(&create_blob_image(), &mut kps).unwrap();
        assert!(kps.is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let err = AkazeDetector::new(AkazeParams {
            threshold: -1.0,
            ..AkazeParams::default()
        })
        .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidConfiguration(_)));
        assert!(AkazeExtractor::new(AkazeParams {
            sublevels: 0,
            ..AkazeParams::default()
        })
        .is_err());
    }
}
