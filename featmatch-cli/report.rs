use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use featmatch_core::PipelineConfig;
use featmatch_detect::{FrameFeatures, MatchReport};
use serde::{Deserialize, Serialize};

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub keypoints: usize,
    pub detection_ms: f64,
    pub extraction_ms: f64,
}

impl FrameStats {
    pub fn new(path: &Path, (width, height): (u32, u32), frame: &FrameFeatures) -> Self {
        Self {
            path: path.display().to_string(),
            width,
            height,
            keypoints: frame.keypoints.len(),
            detection_ms: millis(frame.detection_time),
            extraction_ms: millis(frame.extraction_time),
        }
    }
}

/// Outcome of matching frame `train` against its predecessor `query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStats {
    pub query: usize,
    pub train: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_ms: Option<f64>,
    /// Reason the pair was not matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl PairStats {
    pub fn matched(query: usize, train: usize, report: &MatchReport) -> Self {
        Self {
            query,
            train,
            matches: Some(report.matches.len()),
            matching_ms: Some(millis(report.elapsed)),
            skipped: None,
        }
    }

    pub fn skipped(query: usize, train: usize, reason: impl Into<String>) -> Self {
        Self {
            query,
            train,
            matches: None,
            matching_ms: None,
            skipped: Some(reason.into()),
        }
    }
}

/// Everything one run measured, written by `--report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: String,
    pub frames: Vec<FrameStats>,
    pub pairs: Vec<PairStats>,
}

impl RunReport {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.summary(),
            frames: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn total_keypoints(&self) -> usize {
        self.frames.iter().map(|f| f.keypoints).sum()
    }

    pub fn total_matches(&self) -> usize {
        self.pairs.iter().filter_map(|p| p.matches).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One row per frame; the match column refers to the pair ending at that frame
    pub fn summary_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.config);
        let _ = writeln!(
            out,
            "{:>5}  {:>9}  {:>9}  {:>9}  {:>8}  path",
            "frame", "keypoints", "detect ms", "desc ms", "matches"
        );

        for (index, frame) in self.frames.iter().enumerate() {
            let matches = self
                .pairs
                .iter()
                .find(|p| p.train == index)
                .map(|p| match p.matches {
                    Some(n) => n.to_string(),
                    None => "skipped".to_string(),
                })
                .unwrap_or_else(|| "-".to_string());

            let _ = writeln!(
                out,
                "{:>5}  {:>9}  {:>9.2}  {:>9.2}  {:>8}  {}",
                index, frame.keypoints, frame.detection_ms, frame.extraction_ms, matches, frame.path
            );
        }

        let _ = write!(
            out,
            "total: {} keypoints, {} matches over {} pairs",
            self.total_keypoints(),
            self.total_matches(),
            self.pairs.len()
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        let mut report = RunReport::new(&PipelineConfig::default().with_name("test"));
        for (i, n) in [120usize, 95, 0].iter().enumerate() {
            report.frames.push(FrameStats {
                path: format!("frame{}.png", i),
                width: 64,
                height: 48,
                keypoints: *n,
                detection_ms: 1.5,
                extraction_ms: 0.25,
            });
        }
        report.pairs.push(PairStats {
            query: 0,
            train: 1,
            matches: Some(80),
            matching_ms: Some(0.5),
            skipped: None,
        });
        report.pairs.push(PairStats::skipped(1, 2, "query 0 has 0 candidates, expected 2"));
        report
    }

    #[test]
    fn test_totals() {
        let report = sample_report();
        assert_eq!(report.total_keypoints(), 215);
        assert_eq!(report.total_matches(), 80);
    }

    #[test]
    fn test_summary_table_rows() {
        let table = sample_report().summary_table();
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("PipelineConfig 'test'"));
        assert_eq!(lines.len(), 6);
        assert!(lines[2].contains("frame0.png") && lines[2].contains(" - "));
        assert!(lines[3].contains("80"));
        assert!(lines[4].contains("skipped"));
        assert!(lines[5].starts_with("total: 215 keypoints, 80 matches over 2 pairs"));
    }

    #[test]
    fn test_json_omits_empty_fields() {
        let json = sample_report().to_json().unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_report());
        assert!(!json.contains("\"skipped\": null"));
    }
}
