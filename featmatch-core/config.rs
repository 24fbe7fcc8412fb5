use std::fmt;
use std::str::FromStr;

use crate::error::{FeatureError, FeatureResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shi-Tomasi (minimum eigenvalue) detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ShiTomasiParams {
    /// Window over which the gradient covariance is accumulated
    pub block_size: usize,
    /// Maximum permissible overlap between two features, in [0, 1]
    pub max_overlap: f32,
    /// Minimal accepted corner quality relative to the strongest corner
    pub quality_level: f32,
}

impl Default for ShiTomasiParams {
    fn default() -> Self {
        Self {
            block_size: 4,
            max_overlap: 0.0,
            quality_level: 0.01,
        }
    }
}

impl ShiTomasiParams {
    pub fn min_distance(&self) -> f32 {
        (1.0 - self.max_overlap) * self.block_size as f32
    }

    pub fn max_corners(&self, width: usize, height: usize) -> usize {
        ((width * height) as f32 / self.min_distance().max(1.0)) as usize
    }
}

/// Harris detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct HarrisParams {
    pub block_size: usize,
    /// Sobel aperture; only 3 is available from the gradient backend
    pub aperture_size: usize,
    /// Harris free parameter
    pub k: f32,
    /// Minimum normalised response in [0, 255]
    pub min_response: f32,
    /// Maximum permissible overlap between two kept keypoints, in [0, 1]
    pub max_overlap: f32,
}

impl Default for HarrisParams {
    fn default() -> Self {
        Self {
            block_size: 2,
            aperture_size: 3,
            k: 0.04,
            min_response: 100.0,
            max_overlap: 0.0,
        }
    }
}

impl HarrisParams {
    pub fn keypoint_size(&self) -> f32 {
        (2 * self.aperture_size) as f32
    }

    /// Overlap threshold as a percentage, as used by the keypoint filter
    pub fn overlap_threshold(&self) -> f32 {
        self.max_overlap * 100.0
    }
}

/// FAST-9 detector parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct FastParams {
    pub threshold: u8,
    pub non_max_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 10,
            non_max_suppression: true,
        }
    }
}

impl FastParams {
    pub const KEYPOINT_SIZE: f32 = 7.0;
}

/// Oriented FAST and rotated BRIEF, shared by the ORB detector and descriptor
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct OrbParams {
    /// Upper bound on keypoints per frame, strongest Harris score first
    pub n_features: usize,
    /// Downscale ratio between consecutive pyramid levels
    pub scale_factor: f32,
    pub n_levels: usize,
    pub fast_threshold: u8,
    /// Diameter of the orientation and descriptor patch at level 0
    pub patch_size: usize,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            fast_threshold: 20,
            patch_size: 31,
        }
    }
}

impl OrbParams {
    /// Distance from the border a level-local keypoint needs for a full patch
    pub fn border(&self) -> u32 {
        (self.patch_size / 2 + 1) as u32
    }

    /// Scale of pyramid level `octave` relative to the input image
    pub fn level_scale(&self, octave: u32) -> f32 {
        self.scale_factor.powi(octave as i32)
    }

    fn validate(&self, owner: &str) -> FeatureResult<()> {
        if self.n_features == 0 {
            return Err(FeatureError::config(format!("{} n_features must be > 0", owner)));
        }
        if !(self.scale_factor > 1.0 && self.scale_factor <= 2.0) {
            return Err(FeatureError::config(format!(
                "{} scale_factor {} outside (1, 2]",
                owner, self.scale_factor
            )));
        }
        if !(1..=16).contains(&self.n_levels) {
            return Err(FeatureError::config(format!(
                "{} n_levels {} outside 1-16",
                owner, self.n_levels
            )));
        }
        if self.fast_threshold == 0 || self.fast_threshold > 127 {
            return Err(FeatureError::config(format!(
                "{} fast_threshold {} outside 1-127",
                owner, self.fast_threshold
            )));
        }
        if self.patch_size % 2 == 0 || !(7..=63).contains(&self.patch_size) {
            return Err(FeatureError::config(format!(
                "{} patch_size {} must be odd and within 7-63",
                owner, self.patch_size
            )));
        }
        Ok(())
    }
}

/// Accelerated-KAZE nonlinear scale space parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct AkazeParams {
    /// Detector response threshold on the normalised image
    pub threshold: f64,
    pub octaves: u32,
    pub sublevels: u32,
}

impl Default for AkazeParams {
    fn default() -> Self {
        Self {
            threshold: 0.001,
            octaves: 4,
            sublevels: 4,
        }
    }
}

impl AkazeParams {
    fn validate(&self, owner: &str) -> FeatureResult<()> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(FeatureError::config(format!(
                "{} threshold {} must be positive",
                owner, self.threshold
            )));
        }
        if !(1..=8).contains(&self.octaves) || !(1..=8).contains(&self.sublevels) {
            return Err(FeatureError::config(format!(
                "{} octaves {} and sublevels {} must be within 1-8",
                owner, self.octaves, self.sublevels
            )));
        }
        Ok(())
    }
}

/// Keypoint detection algorithm
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind"))]
pub enum DetectorKind {
    #[cfg_attr(feature = "serde", serde(rename = "SHITOMASI"))]
    ShiTomasi(ShiTomasiParams),
    #[cfg_attr(feature = "serde", serde(rename = "HARRIS"))]
    Harris(HarrisParams),
    #[cfg_attr(feature = "serde", serde(rename = "FAST"))]
    Fast(FastParams),
    #[cfg_attr(feature = "serde", serde(rename = "ORB"))]
    Orb(OrbParams),
    #[cfg_attr(feature = "serde", serde(rename = "AKAZE"))]
    Akaze(AkazeParams),
}

impl DetectorKind {
    pub const NAMES: [&'static str; 5] = ["SHITOMASI", "HARRIS", "FAST", "ORB", "AKAZE"];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::ShiTomasi(_) => "SHITOMASI",
            DetectorKind::Harris(_) => "HARRIS",
            DetectorKind::Fast(_) => "FAST",
            DetectorKind::Orb(_) => "ORB",
            DetectorKind::Akaze(_) => "AKAZE",
        }
    }

    pub fn validate(&self) -> FeatureResult<()> {
        match self {
            DetectorKind::ShiTomasi(p) => {
                if p.block_size == 0 {
                    return Err(FeatureError::config("SHITOMASI block_size must be > 0"));
                }
                check_unit_interval("SHITOMASI max_overlap", p.max_overlap)?;
                if !(p.quality_level > 0.0 && p.quality_level <= 1.0) {
                    return Err(FeatureError::config(format!(
                        "SHITOMASI quality_level {} outside (0, 1]",
                        p.quality_level
                    )));
                }
            }
            DetectorKind::Harris(p) => {
                if p.block_size == 0 {
                    return Err(FeatureError::config("HARRIS block_size must be > 0"));
                }
                if p.aperture_size != 3 {
                    return Err(FeatureError::config(format!(
                        "HARRIS aperture_size {} unsupported (only 3)",
                        p.aperture_size
                    )));
                }
                if !p.k.is_finite() || !p.min_response.is_finite() {
                    return Err(FeatureError::config("HARRIS k and min_response must be finite"));
                }
                check_unit_interval("HARRIS max_overlap", p.max_overlap)?;
            }
            DetectorKind::Fast(p) => {
                if p.threshold == 0 || p.threshold > 127 {
                    return Err(FeatureError::config(format!(
                        "FAST threshold {} outside 1-127",
                        p.threshold
                    )));
                }
            }
            DetectorKind::Orb(p) => p.validate("ORB")?,
            DetectorKind::Akaze(p) => p.validate("AKAZE")?,
        }
        Ok(())
    }
}

impl FromStr for DetectorKind {
    type Err = FeatureError;

    fn from_str(s: &str) -> FeatureResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHITOMASI" => Ok(DetectorKind::ShiTomasi(ShiTomasiParams::default())),
            "HARRIS" => Ok(DetectorKind::Harris(HarrisParams::default())),
            "FAST" => Ok(DetectorKind::Fast(FastParams::default())),
            "ORB" => Ok(DetectorKind::Orb(OrbParams::default())),
            "AKAZE" => Ok(DetectorKind::Akaze(AkazeParams::default())),
            _ => Err(unknown_name("detector", s, &Self::NAMES)),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::ShiTomasi(p) => write!(
                f,
                "SHITOMASI(block={}, quality={}, overlap={})",
                p.block_size, p.quality_level, p.max_overlap
            ),
            DetectorKind::Harris(p) => write!(
                f,
                "HARRIS(block={}, aperture={}, k={}, min_response={}, overlap={})",
                p.block_size, p.aperture_size, p.k, p.min_response, p.max_overlap
            ),
            DetectorKind::Fast(p) => write!(
                f,
                "FAST(threshold={}, nms={})",
                p.threshold, p.non_max_suppression
            ),
            DetectorKind::Orb(p) => write!(f, "ORB({})", orb_fields(p)),
            DetectorKind::Akaze(p) => write!(f, "AKAZE({})", akaze_fields(p)),
        }
    }
}

/// BRIEF descriptor parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BriefParams {
    /// Descriptor length in bits
    pub length: usize,
}

impl Default for BriefParams {
    fn default() -> Self {
        Self { length: 256 }
    }
}

/// Descriptor extraction algorithm
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind"))]
pub enum DescriptorKind {
    #[cfg_attr(feature = "serde", serde(rename = "BRIEF"))]
    Brief(BriefParams),
    /// Steered BRIEF on the ORB patch, 256 bits
    #[cfg_attr(feature = "serde", serde(rename = "ORB"))]
    Orb(OrbParams),
    /// Modified local difference binary descriptor, 486 bits in 64 bytes
    #[cfg_attr(feature = "serde", serde(rename = "AKAZE"))]
    Akaze(AkazeParams),
}

impl DescriptorKind {
    pub const NAMES: [&'static str; 3] = ["BRIEF", "ORB", "AKAZE"];

    pub fn name(&self) -> &'static str {
        match self {
            DescriptorKind::Brief(_) => "BRIEF",
            DescriptorKind::Orb(_) => "ORB",
            DescriptorKind::Akaze(_) => "AKAZE",
        }
    }

    pub fn validate(&self) -> FeatureResult<()> {
        match self {
            DescriptorKind::Brief(p) => {
                if p.length == 0 || p.length % 128 != 0 || p.length > 512 {
                    return Err(FeatureError::config(format!(
                        "BRIEF length {} must be 128, 256, 384 or 512",
                        p.length
                    )));
                }
            }
            DescriptorKind::Orb(p) => p.validate("ORB")?,
            DescriptorKind::Akaze(p) => p.validate("AKAZE")?,
        }
        Ok(())
    }
}

impl FromStr for DescriptorKind {
    type Err = FeatureError;

    fn from_str(s: &str) -> FeatureResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRIEF" => Ok(DescriptorKind::Brief(BriefParams::default())),
            "ORB" => Ok(DescriptorKind::Orb(OrbParams::default())),
            "AKAZE" => Ok(DescriptorKind::Akaze(AkazeParams::default())),
            _ => Err(unknown_name("descriptor", s, &Self::NAMES)),
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Brief(p) => write!(f, "BRIEF(length={})", p.length),
            DescriptorKind::Orb(p) => write!(f, "ORB({})", orb_fields(p)),
            DescriptorKind::Akaze(p) => write!(f, "AKAZE({})", akaze_fields(p)),
        }
    }
}

fn orb_fields(p: &OrbParams) -> String {
    format!(
        "features={}, levels={}, scale={}, fast={}, patch={}",
        p.n_features, p.n_levels, p.scale_factor, p.fast_threshold, p.patch_size
    )
}

fn akaze_fields(p: &AkazeParams) -> String {
    format!(
        "threshold={}, octaves={}, sublevels={}",
        p.threshold, p.octaves, p.sublevels
    )
}

/// Exhaustive Hamming matcher parameters
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BruteForceParams {
    /// Keep a match only when it is also the best match in the reverse direction
    pub cross_check: bool,
}

/// Locality-sensitive-hashing matcher parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct LshParams {
    /// Largest Hamming distance accepted as a match
    pub max_distance: u32,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            max_distance: 40,
            seed: Some(0xc0),
        }
    }
}

/// Descriptor matching backend
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind"))]
pub enum MatcherKind {
    #[cfg_attr(feature = "serde", serde(rename = "MAT_BF"))]
    BruteForce(BruteForceParams),
    #[cfg_attr(feature = "serde", serde(rename = "MAT_LSH", alias = "MAT_FLANN"))]
    Lsh(LshParams),
}

impl MatcherKind {
    pub const NAMES: [&'static str; 3] = ["MAT_BF", "MAT_LSH", "MAT_FLANN"];

    pub fn name(&self) -> &'static str {
        match self {
            MatcherKind::BruteForce(_) => "MAT_BF",
            MatcherKind::Lsh(_) => "MAT_LSH",
        }
    }
}

impl FromStr for MatcherKind {
    type Err = FeatureError;

    fn from_str(s: &str) -> FeatureResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAT_BF" => Ok(MatcherKind::BruteForce(BruteForceParams::default())),
            "MAT_LSH" | "MAT_FLANN" => Ok(MatcherKind::Lsh(LshParams::default())),
            _ => Err(unknown_name("matcher", s, &Self::NAMES)),
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherKind::BruteForce(p) => write!(f, "MAT_BF(cross_check={})", p.cross_check),
            MatcherKind::Lsh(p) => write!(f, "MAT_LSH(max_distance={})", p.max_distance),
        }
    }
}

/// k-NN selection parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct KnnParams {
    /// Ratio-test threshold in (0, 1]
    pub ratio: f32,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { ratio: 0.8 }
    }
}

/// How matches are selected from the matcher output
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(tag = "kind"))]
pub enum SelectorKind {
    /// Single best match per query
    #[cfg_attr(feature = "serde", serde(rename = "SEL_NN"))]
    NearestNeighbor,
    /// Two nearest neighbours filtered by the ratio test
    #[cfg_attr(feature = "serde", serde(rename = "SEL_KNN"))]
    KNearest(KnnParams),
}

impl SelectorKind {
    pub const NAMES: [&'static str; 2] = ["SEL_NN", "SEL_KNN"];

    pub fn name(&self) -> &'static str {
        match self {
            SelectorKind::NearestNeighbor => "SEL_NN",
            SelectorKind::KNearest(_) => "SEL_KNN",
        }
    }

    pub fn validate(&self) -> FeatureResult<()> {
        if let SelectorKind::KNearest(p) = self {
            check_ratio(p.ratio)?;
        }
        Ok(())
    }
}

impl FromStr for SelectorKind {
    type Err = FeatureError;

    fn from_str(s: &str) -> FeatureResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SEL_NN" => Ok(SelectorKind::NearestNeighbor),
            "SEL_KNN" => Ok(SelectorKind::KNearest(KnnParams::default())),
            _ => Err(unknown_name("selector", s, &Self::NAMES)),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::NearestNeighbor => write!(f, "SEL_NN"),
            SelectorKind::KNearest(p) => write!(f, "SEL_KNN(ratio={:.2})", p.ratio),
        }
    }
}

/// Validates a ratio-test threshold, which must lie in (0, 1]
pub fn check_ratio(ratio: f32) -> FeatureResult<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(FeatureError::config(format!("ratio {} outside (0, 1]", ratio)))
    }
}

fn check_unit_interval(what: &str, value: f32) -> FeatureResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FeatureError::config(format!("{} {} outside [0, 1]", what, value)))
    }
}

fn unknown_name(family: &str, given: &str, supported: &[&str]) -> FeatureError {
    FeatureError::config(format!(
        "unknown {} '{}' (supported: {})",
        family,
        given,
        supported.join(", ")
    ))
}

/// Complete detector / descriptor / matcher selection
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PipelineConfig {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    pub n_threads: usize,
    pub detector: DetectorKind,
    pub descriptor: DescriptorKind,
    pub matcher: MatcherKind,
    pub selector: SelectorKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: None,
            n_threads: num_cpus::get().max(1),
            detector: DetectorKind::ShiTomasi(ShiTomasiParams::default()),
            descriptor: DescriptorKind::Brief(BriefParams::default()),
            matcher: MatcherKind::BruteForce(BruteForceParams::default()),
            selector: SelectorKind::NearestNeighbor,
        }
    }
}

impl PipelineConfig {
    pub fn new(
        detector: DetectorKind,
        descriptor: DescriptorKind,
        matcher: MatcherKind,
        selector: SelectorKind,
    ) -> Self {
        Self {
            detector,
            descriptor,
            matcher,
            selector,
            ..Self::default()
        }
    }

    /// Parse the four algorithm names with default parameters and validate the result
    pub fn from_names(
        detector: &str,
        descriptor: &str,
        matcher: &str,
        selector: &str,
    ) -> FeatureResult<Self> {
        let config = Self::new(
            detector.parse()?,
            descriptor.parse()?,
            matcher.parse()?,
            selector.parse()?,
        );
        config.validate()?;
        Ok(config)
    }

    /// Harris corners, BRIEF, brute force k-NN with ratio test
    pub fn harris_knn_preset() -> Self {
        Self::new(
            DetectorKind::Harris(HarrisParams::default()),
            DescriptorKind::Brief(BriefParams::default()),
            MatcherKind::BruteForce(BruteForceParams::default()),
            SelectorKind::KNearest(KnnParams::default()),
        )
        .with_name("Harris k-NN")
    }

    /// FAST corners, BRIEF, approximate LSH nearest neighbour
    pub fn fast_lsh_preset() -> Self {
        Self::new(
            DetectorKind::Fast(FastParams::default()),
            DescriptorKind::Brief(BriefParams::default()),
            MatcherKind::Lsh(LshParams::default()),
            SelectorKind::NearestNeighbor,
        )
        .with_name("FAST LSH")
    }

    /// Multi-scale ORB with steered BRIEF, brute force cross-checked nearest neighbour
    pub fn orb_preset() -> Self {
        Self::new(
            DetectorKind::Orb(OrbParams::default()),
            DescriptorKind::Orb(OrbParams::default()),
            MatcherKind::BruteForce(BruteForceParams { cross_check: true }),
            SelectorKind::NearestNeighbor,
        )
        .with_name("ORB")
    }

    /// AKAZE keypoints and descriptors, brute force k-NN with ratio test
    pub fn akaze_knn_preset() -> Self {
        Self::new(
            DetectorKind::Akaze(AkazeParams::default()),
            DescriptorKind::Akaze(AkazeParams::default()),
            MatcherKind::BruteForce(BruteForceParams::default()),
            SelectorKind::KNearest(KnnParams::default()),
        )
        .with_name("AKAZE k-NN")
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Validate every parameter and reject unsupported algorithm combinations
    pub fn validate(&self) -> FeatureResult<()> {
        self.detector.validate()?;
        self.descriptor.validate()?;
        self.selector.validate()?;

        if self.n_threads == 0 {
            return Err(FeatureError::config("n_threads must be > 0"));
        }

        match (&self.matcher, &self.selector) {
            (MatcherKind::Lsh(_), SelectorKind::KNearest(_)) => {
                return Err(FeatureError::config(
                    "MAT_LSH yields a single match per query and cannot be used with SEL_KNN",
                ));
            }
            (MatcherKind::BruteForce(p), SelectorKind::KNearest(_)) if p.cross_check => {
                return Err(FeatureError::config(
                    "MAT_BF cross_check is only available with SEL_NN",
                ));
            }
            (MatcherKind::Lsh(_), _) if !matches!(self.descriptor, DescriptorKind::Brief(_)) => {
                return Err(FeatureError::config(format!(
                    "MAT_LSH supports BRIEF descriptors only, got {}",
                    self.descriptor.name()
                )));
            }
            _ => {}
        }

        // AKAZE descriptors are computed on the detector's own scale space
        if matches!(self.descriptor, DescriptorKind::Akaze(_)) && !matches!(self.detector, DetectorKind::Akaze(_)) {
            return Err(FeatureError::config(format!(
                "AKAZE descriptor requires AKAZE keypoints, got {}",
                self.detector.name()
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "PipelineConfig{}: detector={}, descriptor={}, matcher={}, selector={}, threads={}",
            self.name
                .as_deref()
                .map(|n| format!(" '{}'", n))
                .unwrap_or_default(),
            self.detector,
            self.descriptor,
            self.matcher,
            self.selector,
            self.n_threads
        )
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` or `.toml` file, chosen by extension
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Err(FeatureError::config(format!(
                "unsupported config file '{}' (expected .json or .toml)",
                path.display()
            ))
            .into()),
        }
    }

    /// Save to a `.json` or `.toml` file, chosen by extension
    #[cfg(feature = "serde")]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.to_json()?,
            Some("toml") => self.to_toml()?,
            _ => {
                return Err(FeatureError::config(format!(
                    "unsupported config file '{}' (expected .json or .toml)",
                    path.display()
                ))
                .into());
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("HARRIS".parse::<DetectorKind>().unwrap().name(), "HARRIS");
        assert_eq!("shitomasi".parse::<DetectorKind>().unwrap().name(), "SHITOMASI");
        assert_eq!(" FAST ".parse::<DetectorKind>().unwrap().name(), "FAST");
        assert_eq!("BRIEF".parse::<DescriptorKind>().unwrap().name(), "BRIEF");
        assert_eq!("MAT_FLANN".parse::<MatcherKind>().unwrap().name(), "MAT_LSH");
        assert_eq!("SEL_KNN".parse::<SelectorKind>().unwrap(), SelectorKind::KNearest(KnnParams { ratio: 0.8 }));
    }

    #[test]
    fn test_unknown_names_are_configuration_errors() {
        for name in ["SIFT", "HARRISS", ""] {
            assert!(matches!(
                name.parse::<DetectorKind>(),
                Err(FeatureError::InvalidConfiguration(_))
            ));
        }
        assert!(matches!("FREAK".parse::<DescriptorKind>(), Err(FeatureError::InvalidConfiguration(_))));
        assert!(matches!("BRISK".parse::<DetectorKind>(), Err(FeatureError::InvalidConfiguration(_))));
        assert!(matches!("MAT_XX".parse::<MatcherKind>(), Err(FeatureError::InvalidConfiguration(_))));
        assert!(matches!("SEL_3NN".parse::<SelectorKind>(), Err(FeatureError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_name_lists_supported() {
        let err = "SURF".parse::<DetectorKind>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SURF"));
        assert!(msg.contains("SHITOMASI, HARRIS, FAST, ORB, AKAZE"));
    }

    #[test]
    fn test_shi_tomasi_derived_values() {
        let p = ShiTomasiParams::default();
        assert_eq!(p.min_distance(), 4.0);
        assert_eq!(p.max_corners(100, 40), 1000);
    }

    #[test]
    fn test_default_and_presets_validate() {
        PipelineConfig::default().validate().unwrap();
        PipelineConfig::harris_knn_preset().validate().unwrap();
        PipelineConfig::fast_lsh_preset().validate().unwrap();
        PipelineConfig::orb_preset().validate().unwrap();
        PipelineConfig::akaze_knn_preset().validate().unwrap();
    }

    #[test]
    fn test_orb_and_akaze_names() {
        assert_eq!("orb".parse::<DetectorKind>().unwrap(), DetectorKind::Orb(OrbParams::default()));
        assert_eq!("AKAZE".parse::<DescriptorKind>().unwrap().name(), "AKAZE");

        let config = PipelineConfig::from_names("ORB", "ORB", "MAT_BF", "SEL_KNN").unwrap();
        assert!(config.summary().contains("detector=ORB(features=500"));
        PipelineConfig::from_names("ORB", "BRIEF", "MAT_BF", "SEL_NN").unwrap();
        PipelineConfig::from_names("AKAZE", "AKAZE", "MAT_BF", "SEL_NN").unwrap();
        PipelineConfig::from_names("AKAZE", "ORB", "MAT_BF", "SEL_NN").unwrap();
    }

    #[test]
    fn test_akaze_descriptor_requires_akaze_keypoints() {
        for detector in ["SHITOMASI", "HARRIS", "FAST", "ORB"] {
            let result = PipelineConfig::from_names(detector, "AKAZE", "MAT_BF", "SEL_NN");
            assert!(matches!(result, Err(FeatureError::InvalidConfiguration(_))), "{}", detector);
        }
    }

    #[test]
    fn test_lsh_accepts_brief_only() {
        PipelineConfig::from_names("FAST", "BRIEF", "MAT_LSH", "SEL_NN").unwrap();
        let err = PipelineConfig::from_names("ORB", "ORB", "MAT_LSH", "SEL_NN").unwrap_err();
        assert!(err.to_string().contains("BRIEF descriptors only"));
    }

    #[test]
    fn test_orb_and_akaze_parameter_ranges() {
        let invalid = [
            OrbParams { scale_factor: 1.0, ..OrbParams::default() },
            OrbParams { n_levels: 0, ..OrbParams::default() },
            OrbParams { patch_size: 30, ..OrbParams::default() },
            OrbParams { fast_threshold: 0, ..OrbParams::default() },
            OrbParams { n_features: 0, ..OrbParams::default() },
        ];
        for p in invalid {
            assert!(DetectorKind::Orb(p.clone()).validate().is_err(), "{:?}", p);
            assert!(DescriptorKind::Orb(p).validate().is_err());
        }

        assert!(DetectorKind::Akaze(AkazeParams { threshold: 0.0, ..AkazeParams::default() })
            .validate()
            .is_err());
        assert!(DetectorKind::Akaze(AkazeParams { octaves: 9, ..AkazeParams::default() })
            .validate()
            .is_err());

        let p = OrbParams::default();
        assert_eq!(p.border(), 16);
        assert!((p.level_scale(2) - 1.44).abs() < 1e-5);
    }

    #[test]
    fn test_from_names() {
        let config = PipelineConfig::from_names("HARRIS", "BRIEF", "MAT_BF", "SEL_KNN").unwrap();
        assert_eq!(config.detector.name(), "HARRIS");
        assert_eq!(config.selector.name(), "SEL_KNN");
    }

    #[test]
    fn test_lsh_with_knn_rejected() {
        let result = PipelineConfig::from_names("FAST", "BRIEF", "MAT_LSH", "SEL_KNN");
        assert!(matches!(result, Err(FeatureError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_cross_check_with_knn_rejected() {
        let mut config = PipelineConfig::harris_knn_preset();
        config.matcher = MatcherKind::BruteForce(BruteForceParams { cross_check: true });
        assert!(config.validate().is_err());

        config.selector = SelectorKind::NearestNeighbor;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parameter_ranges() {
        let mut config = PipelineConfig::default();
        config.detector = DetectorKind::Harris(HarrisParams {
            aperture_size: 5,
            ..HarrisParams::default()
        });
        assert!(config.validate().is_err());

        config.detector = DetectorKind::Fast(FastParams {
            threshold: 0,
            ..FastParams::default()
        });
        assert!(config.validate().is_err());

        config.detector = DetectorKind::ShiTomasi(ShiTomasiParams {
            quality_level: 1.5,
            ..ShiTomasiParams::default()
        });
        assert!(config.validate().is_err());

        config.detector = DetectorKind::ShiTomasi(ShiTomasiParams::default());
        config.descriptor = DescriptorKind::Brief(BriefParams { length: 100 });
        assert!(config.validate().is_err());

        config.descriptor = DescriptorKind::Brief(BriefParams::default());
        config.selector = SelectorKind::KNearest(KnnParams { ratio: 0.0 });
        assert!(config.validate().is_err());

        config.selector = SelectorKind::NearestNeighbor;
        config.n_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_all_stages() {
        let summary = PipelineConfig::harris_knn_preset().with_threads(2).summary();
        assert!(summary.contains("'Harris k-NN'"));
        assert!(summary.contains("HARRIS("));
        assert!(summary.contains("BRIEF(length=256)"));
        assert!(summary.contains("MAT_BF"));
        assert!(summary.contains("SEL_KNN(ratio=0.80)"));
        assert!(summary.contains("threads=2"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_config_file() {
        let text = r#"
            n_threads = 2

            [detector]
            kind = "HARRIS"
            min_response = 120.0

            [descriptor]
            kind = "BRIEF"

            [matcher]
            kind = "MAT_BF"

            [selector]
            kind = "SEL_KNN"
            ratio = 0.7
        "#;
        let config = PipelineConfig::from_toml(text).unwrap();
        match &config.detector {
            DetectorKind::Harris(p) => {
                assert_eq!(p.min_response, 120.0);
                assert_eq!(p.block_size, 2);
            }
            other => panic!("unexpected detector {:?}", other),
        }
        assert_eq!(config.selector, SelectorKind::KNearest(KnnParams { ratio: 0.7 }));
        assert_eq!(config.n_threads, 2);

        let reparsed = PipelineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_config_rejects_invalid_combination() {
        let json = r#"{
            "detector": { "kind": "FAST" },
            "matcher": { "kind": "MAT_FLANN" },
            "selector": { "kind": "SEL_KNN" }
        }"#;
        assert!(PipelineConfig::from_json(json).is_err());

        let json = r#"{ "detector": { "kind": "SIFT" } }"#;
        assert!(PipelineConfig::from_json(json).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_orb_config_file() {
        let text = r#"
            [detector]
            kind = "ORB"
            n_features = 200
            n_levels = 4

            [descriptor]
            kind = "ORB"

            [matcher]
            kind = "MAT_BF"
            cross_check = true

            [selector]
            kind = "SEL_NN"
        "#;
        let config = PipelineConfig::from_toml(text).unwrap();
        match &config.detector {
            DetectorKind::Orb(p) => {
                assert_eq!((p.n_features, p.n_levels), (200, 4));
                assert_eq!(p.patch_size, 31);
            }
            other => panic!("unexpected detector {:?}", other),
        }
        assert_eq!(config.descriptor, DescriptorKind::Orb(OrbParams::default()));

        let reparsed = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }
}
