//! `featmatch` command line tool: detect, describe and match keypoints over
//! an image sequence, with optional visualization and JSON reporting.

pub mod args;
pub mod error;
pub mod report;
pub mod visualize;

use std::fs;
use std::path::Path;

use featmatch_core::{FeatureError, init_thread_pool};
use featmatch_detect::{FeaturePipeline, FrameFeatures};
use image::{GrayImage, ImageReader};
use tracing::{info, warn};

pub use args::CliArgs;
pub use error::{CliError, CliResult};
pub use report::{FrameStats, PairStats, RunReport};
pub use visualize::{draw_keypoints, draw_matches};

/// Decode any supported image format to 8-bit grayscale
pub fn load_gray(path: &Path) -> CliResult<GrayImage> {
    Ok(ImageReader::open(path)?.decode()?.to_luma8())
}

/// Process every image in order, matching each frame against the previous one
pub fn run(args: &CliArgs) -> CliResult<RunReport> {
    let config = args.pipeline_config()?;
    info!("{}", config.summary());

    if let Err(e) = init_thread_pool(config.n_threads) {
        warn!("using existing thread pool: {}", e);
    }

    let pipeline = FeaturePipeline::new(config)?;
    let mut report = RunReport::new(pipeline.config());

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)?;
    }

    // Only the previous frame is kept alive
    let mut previous: Option<(GrayImage, FrameFeatures)> = None;

    for (index, path) in args.images.iter().enumerate() {
        let img = load_gray(path)?;
        let frame = pipeline.process(&img)?;
        info!("frame {} ({}): {} keypoints", index, path.display(), frame.keypoints.len());
        report.frames.push(FrameStats::new(path, img.dimensions(), &frame));

        if let Some(dir) = &args.out_dir {
            draw_keypoints(&img, &frame.keypoints).save(dir.join(format!("frame_{:03}_keypoints.png", index)))?;
        }

        if let Some((prev_img, prev_frame)) = &previous {
            let query = index - 1;
            match pipeline.match_frames(prev_frame, &frame) {
                Ok(matched) => {
                    report.pairs.push(PairStats::matched(query, index, &matched));
                    if let Some(dir) = &args.out_dir {
                        draw_matches(prev_img, &prev_frame.keypoints, &img, &frame.keypoints, &matched.matches)?
                            .save(dir.join(format!("matches_{:03}_{:03}.png", query, index)))?;
                    }
                }
                Err(FeatureError::InvalidInput(reason)) => {
                    warn!("skipping pair {}-{}: {}", query, index, reason);
                    report.pairs.push(PairStats::skipped(query, index, reason));
                }
                Err(e) => return Err(e.into()),
            }
        }

        previous = Some((img, frame));
    }

    if let Some(path) = &args.report {
        fs::write(path, report.to_json()?)?;
        info!("wrote report to {}", path.display());
    }

    Ok(report)
}
