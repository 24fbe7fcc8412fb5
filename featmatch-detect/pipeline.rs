use std::time::{Duration, Instant};

use featmatch_core::{FeatureResult, Keypoint, Match, PipelineConfig};
use image::GrayImage;
use log::info;

use crate::descriptor::{build_extractor, DescriptorSet, Extractor};
use crate::detector::{build_detector, Detector};
use crate::matcher::{build_matcher, select_matches, DescriptorMatcher};

/// Keypoints and their descriptors for one frame
#[derive(Debug, Default)]
pub struct FrameFeatures {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: DescriptorSet,
    pub detection_time: Duration,
    pub extraction_time: Duration,
}

/// Matches between two frames, indices into the query (earlier) and train (later) frame
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub matches: Vec<Match>,
    pub elapsed: Duration,
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Detector, extractor and matcher built from one validated [`PipelineConfig`]
pub struct FeaturePipeline {
    config: PipelineConfig,
    detector: Box<dyn Detector>,
    extractor: Box<dyn Extractor>,
    matcher: Box<dyn DescriptorMatcher>,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> FeatureResult<Self> {
        config.validate()?;
        let detector = build_detector(&config.detector)?;
        let extractor = build_extractor(&config.descriptor)?;
        let matcher = build_matcher(&config.matcher);

        Ok(Self {
            config,
            detector,
            extractor,
            matcher,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detect(&self, img: &GrayImage) -> FeatureResult<Vec<Keypoint>> {
        let start = Instant::now();
        let keypoints = self.detector.detect(img)?;
        info!(
            "{} detection with n={} keypoints in {:.3} ms",
            self.detector.name(),
            keypoints.len(),
            millis(start.elapsed())
        );
        Ok(keypoints)
    }

    pub fn describe(&self, img: &GrayImage, keypoints: &mut Vec<Keypoint>) -> FeatureResult<DescriptorSet> {
        let start = Instant::now();
        let descriptors = self.extractor.describe(img, keypoints)?;
        info!(
            "{} descriptor extraction in {:.3} ms",
            self.extractor.name(),
            millis(start.elapsed())
        );
        Ok(descriptors)
    }

    /// Detect and describe one frame
    pub fn process(&self, img: &GrayImage) -> FeatureResult<FrameFeatures> {
        let start = Instant::now();
        let mut keypoints = self.detect(img)?;
        let detection_time = start.elapsed();

        let start = Instant::now();
        let descriptors = self.describe(img, &mut keypoints)?;
        let extraction_time = start.elapsed();

        Ok(FrameFeatures {
            keypoints,
            descriptors,
            detection_time,
            extraction_time,
        })
    }

    /// Match `query` (earlier frame) against `train` (later frame)
    pub fn match_frames(&self, query: &FrameFeatures, train: &FrameFeatures) -> FeatureResult<MatchReport> {
        let start = Instant::now();
        let matches = select_matches(
            self.matcher.as_ref(),
            &self.config.selector,
            &query.descriptors,
            &train.descriptors,
        )?;
        let elapsed = start.elapsed();

        info!(
            "Matched {} keypoints using {} in {:.3} ms",
            matches.len(),
            self.config.selector.name(),
            millis(elapsed)
        );
        Ok(MatchReport { matches, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featmatch_core::{FeatureError, LshParams, MatcherKind, SelectorKind};
    use image::Luma;

    /// Two bright squares of different size on a dark 128x128 background
    fn create_scene() -> GrayImage {
        GrayImage::from_fn(128, 128, |x, y| {
            let a = (30..60).contains(&x) && (30..60).contains(&y);
            let b = (75..100).contains(&x) && (40..90).contains(&y);
            if a || b {
                Luma([220])
            } else {
                Luma([35])
            }
        })
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let mut config = PipelineConfig::default();
        config.matcher = MatcherKind::Lsh(LshParams::default());
        config.selector = SelectorKind::KNearest(Default::default());
        assert!(matches!(
            FeaturePipeline::new(config),
            Err(FeatureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_process_aligns_keypoints_and_descriptors() {
        for config in [
            PipelineConfig::default(),
            PipelineConfig::harris_knn_preset(),
            PipelineConfig::fast_lsh_preset(),
            PipelineConfig::orb_preset(),
        ] {
            let pipeline = FeaturePipeline::new(config).unwrap();
            let frame = pipeline.process(&create_scene()).unwrap();
            assert!(!frame.keypoints.is_empty());
            assert_eq!(frame.keypoints.len(), frame.descriptors.len());
        }

        let pipeline = FeaturePipeline::new(PipelineConfig::akaze_knn_preset()).unwrap();
        let frame = pipeline.process(&create_scene()).unwrap();
        assert_eq!(frame.keypoints.len(), frame.descriptors.len());
        assert_eq!(frame.descriptors.kind(), "AKAZE");
    }

    #[test]
    fn test_orb_frame_matches_itself() {
        let pipeline = FeaturePipeline::new(PipelineConfig::orb_preset()).unwrap();
        let img = create_scene();
        let first = pipeline.process(&img).unwrap();
        let second = pipeline.process(&img).unwrap();

        let report = pipeline.match_frames(&first, &second).unwrap();
        assert!(!report.matches.is_empty());
        for m in &report.matches {
            assert_eq!(m.distance, 0.0);
        }
    }

    #[test]
    fn test_frames_of_different_families_do_not_match() {
        let brief = FeaturePipeline::new(PipelineConfig::default()).unwrap();
        let orb = FeaturePipeline::new(PipelineConfig::orb_preset()).unwrap();
        let img = create_scene();

        let a = brief.process(&img).unwrap();
        let b = orb.process(&img).unwrap();
        assert!(matches!(brief.match_frames(&a, &b), Err(FeatureError::InvalidInput(_))));
    }

    #[test]
    fn test_frame_matches_itself() {
        let pipeline = FeaturePipeline::new(PipelineConfig::default()).unwrap();
        let img = create_scene();
        let first = pipeline.process(&img).unwrap();
        let second = pipeline.process(&img).unwrap();

        let report = pipeline.match_frames(&first, &second).unwrap();
        assert_eq!(report.matches.len(), first.keypoints.len());
        for m in &report.matches {
            assert_eq!(m.distance, 0.0);
            assert!(m.train_idx < second.keypoints.len());
        }
    }

    #[test]
    fn test_knn_selection_at_most_one_match_per_query() {
        let pipeline = FeaturePipeline::new(PipelineConfig::harris_knn_preset()).unwrap();
        let img = create_scene();
        let first = pipeline.process(&img).unwrap();
        let second = pipeline.process(&img).unwrap();

        let report = pipeline.match_frames(&first, &second).unwrap();
        assert!(report.matches.len() <= first.keypoints.len());
        assert!(report
            .matches
            .windows(2)
            .all(|w| w[0].query_idx < w[1].query_idx));
    }

    #[test]
    fn test_knn_against_empty_frame_is_invalid_input() {
        let pipeline = FeaturePipeline::new(PipelineConfig::harris_knn_preset()).unwrap();
        let frame = pipeline.process(&create_scene()).unwrap();
        let empty = FrameFeatures::default();

        assert!(matches!(
            pipeline.match_frames(&frame, &empty),
            Err(FeatureError::InvalidInput(_))
        ));
        // Nothing to match from an empty query frame
        assert!(pipeline.match_frames(&empty, &frame).unwrap().matches.is_empty());
    }
}
