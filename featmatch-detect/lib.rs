//! Detectors, descriptors and matchers for two-view keypoint correspondence.
//!
//! Corner responses come from Sobel gradients, FAST-9 and BRIEF from
//! `imageproc`, AKAZE from the `akaze` crate; ORB is built here on top of
//! FAST and Harris. Duplicate suppression and the ratio test come from
//! `featmatch-filter`. [`FeaturePipeline`] wires one configured backend of
//! each kind together.

pub mod akaze;
pub mod descriptor;
pub mod detector;
pub mod matcher;
pub mod orb;
pub mod pipeline;
pub mod response;

pub use crate::akaze::{extract_akaze, AkazeDetector, AkazeExtractor, AKAZE_MIN_SIDE};
pub use descriptor::{
    build_extractor, BriefExtractor, DescriptorSet, Extractor, HammingCode, AKAZE_DESCRIPTOR_BYTES, BRIEF_BORDER,
    ORB_DESCRIPTOR_BYTES,
};
pub use detector::{build_detector, Detector, FastDetector, HarrisDetector, ShiTomasiDetector};
pub use orb::{build_pyramid, intensity_centroid_angle, OrbDetector, OrbExtractor};
pub use matcher::{
    best_hamming, build_matcher, knn_hamming, select_matches, BruteForceMatcher, DescriptorMatcher,
    LshMatcher,
};
pub use pipeline::{FeaturePipeline, FrameFeatures, MatchReport};
pub use response::{harris_response, min_eigen_response};
