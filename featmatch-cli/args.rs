use std::path::PathBuf;

use clap::Parser;
use clap::builder::RangedU64ValueParser;
use featmatch_core::PipelineConfig;

use crate::error::{CliError, CliResult};

/// Detects keypoints in every image and matches each image against the previous one.
///
/// Set RUST_LOG to change log verbosity (default: info).
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "featmatch", version, about)]
pub struct CliArgs {
    /// Image sequence, matched in the given order.
    #[arg(value_name = "IMAGE", required = true, num_args = 1..)]
    pub images: Vec<PathBuf>,
    /// SHITOMASI | HARRIS | FAST | ORB | AKAZE
    #[arg(long, value_name = "NAME")]
    pub detector: Option<String>,
    /// BRIEF | ORB | AKAZE
    #[arg(long, value_name = "NAME")]
    pub descriptor: Option<String>,
    /// MAT_BF | MAT_LSH | MAT_FLANN
    #[arg(long, value_name = "NAME")]
    pub matcher: Option<String>,
    /// SEL_NN | SEL_KNN
    #[arg(long, value_name = "NAME")]
    pub selector: Option<String>,
    /// Pipeline configuration file (.toml or .json).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Worker threads.
    #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub threads: Option<usize>,
    /// Write keypoint and match visualizations as PNG.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
    /// Write per-frame statistics as JSON.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl CliArgs {
    /// Configuration file (or defaults) with the command-line overrides applied
    pub fn pipeline_config(&self) -> CliResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path).map_err(|e| CliError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            None => PipelineConfig::default(),
        };

        if let Some(name) = &self.detector {
            config.detector = name.parse()?;
        }
        if let Some(name) = &self.descriptor {
            config.descriptor = name.parse()?;
        }
        if let Some(name) = &self.matcher {
            config.matcher = name.parse()?;
        }
        if let Some(name) = &self.selector {
            config.selector = name.parse()?;
        }
        if let Some(n) = self.threads {
            config.n_threads = n;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;
    use featmatch_core::{DescriptorKind, DetectorKind, FeatureError, SelectorKind};

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("featmatch").chain(args.iter().copied()))
    }

    #[test]
    fn test_command_definition() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_options_and_images() {
        let args = parse(&[
            "--detector", "harris", "a.png", "--selector", "SEL_KNN", "--threads", "3", "b.png",
        ])
        .unwrap();
        assert_eq!(args.images, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(args.detector.as_deref(), Some("harris"));
        assert_eq!(args.threads, Some(3));

        let config = args.pipeline_config().unwrap();
        assert!(matches!(config.detector, DetectorKind::Harris(_)));
        assert!(matches!(config.selector, SelectorKind::KNearest(_)));
        assert_eq!(config.n_threads, 3);
    }

    #[test]
    fn test_help() {
        let err = parse(&["a.png", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_usage_errors() {
        for args in [&[][..], &["a.png", "--detector"][..], &["--bogus", "a.png"][..], &["--threads", "0", "a.png"][..]] {
            let err = parse(args).unwrap_err();
            assert_ne!(err.kind(), ErrorKind::DisplayHelp, "{:?}", args);
            assert_eq!(err.exit_code(), 2, "{:?}", args);
        }
    }

    #[test]
    fn test_orb_and_akaze_overrides() {
        let config = parse(&["--detector", "ORB", "--descriptor", "orb", "a.png"])
            .unwrap()
            .pipeline_config()
            .unwrap();
        assert!(matches!(config.detector, DetectorKind::Orb(_)));
        assert!(matches!(config.descriptor, DescriptorKind::Orb(_)));

        let err = parse(&["--detector", "ORB", "--descriptor", "AKAZE", "a.png"])
            .unwrap()
            .pipeline_config()
            .unwrap_err();
        assert!(matches!(err, CliError::Feature(FeatureError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_algorithm_name() {
        let err = parse(&["--descriptor", "SIFT", "a.png"]).unwrap().pipeline_config().unwrap_err();
        assert!(matches!(err, CliError::Feature(FeatureError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unsupported_combination() {
        let args = parse(&["--matcher", "MAT_FLANN", "--selector", "SEL_KNN", "a.png"]).unwrap();
        assert!(matches!(
            args.pipeline_config(),
            Err(CliError::Feature(FeatureError::InvalidConfiguration(_)))
        ));
    }
}
