pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AkazeParams, BriefParams, BruteForceParams, DescriptorKind, DetectorKind, FastParams,
    HarrisParams, KnnParams, LshParams, MatcherKind, OrbParams, PipelineConfig, SelectorKind,
    ShiTomasiParams, check_ratio,
};
pub use error::{FeatureError, FeatureResult};
pub use types::{CandidatePair, Keypoint, Match, ResponseGrid};

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
