//! Post-processing of raw detector and matcher output.
//!
//! * [`KeypointFilter`] turns a corner-response grid into de-duplicated keypoints
//! * [`MatchFilter`] applies the k-NN ratio test to candidate matches

pub mod keypoint_filter;
pub mod match_filter;

pub use keypoint_filter::{KeypointFilter, filter_keypoints};
pub use match_filter::{MatchFilter, ratio_test};
