use std::fmt;
use std::sync::OnceLock;

use featmatch_core::{BriefParams, DescriptorKind, FeatureError, FeatureResult, Keypoint};
use image::GrayImage;
use imageproc::binary_descriptors::brief::{brief, BriefDescriptor, TestPair};
use imageproc::binary_descriptors::BinaryDescriptor;
use imageproc::point::Point;
use log::debug;

use crate::akaze::AkazeExtractor;
use crate::orb::OrbExtractor;

/// Keypoints closer than this to any image border have no complete BRIEF patch
pub const BRIEF_BORDER: u32 = 16;

/// Bit-string descriptors compared by Hamming distance
pub trait HammingCode {
    fn hamming(&self, other: &Self) -> u32;
}

impl HammingCode for BriefDescriptor {
    fn hamming(&self, other: &Self) -> u32 {
        BinaryDescriptor::hamming_distance(self, other)
    }
}

impl HammingCode for Vec<u8> {
    fn hamming(&self, other: &Self) -> u32 {
        self.iter().zip(other.iter()).map(|(a, b)| (a ^ b).count_ones()).sum()
    }
}

impl<const N: usize> HammingCode for [u8; N] {
    fn hamming(&self, other: &Self) -> u32 {
        self.iter().zip(other.iter()).map(|(a, b)| (a ^ b).count_ones()).sum()
    }
}

/// Bytes in a steered BRIEF descriptor
pub const ORB_DESCRIPTOR_BYTES: usize = 32;

/// Bytes in an AKAZE MLDB descriptor (486 bits used)
pub const AKAZE_DESCRIPTOR_BYTES: usize = 64;

/// Descriptors of one frame, index-aligned with its keypoints.
///
/// Only sets of the same variant can be matched against each other.
pub enum DescriptorSet {
    Brief(Vec<BriefDescriptor>),
    Orb(Vec<[u8; ORB_DESCRIPTOR_BYTES]>),
    Akaze(Vec<[u8; AKAZE_DESCRIPTOR_BYTES]>),
}

impl Default for DescriptorSet {
    fn default() -> Self {
        DescriptorSet::Brief(Vec::new())
    }
}

impl DescriptorSet {
    pub fn len(&self) -> usize {
        match self {
            DescriptorSet::Brief(d) => d.len(),
            DescriptorSet::Orb(d) => d.len(),
            DescriptorSet::Akaze(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the descriptor family
    pub fn kind(&self) -> &'static str {
        match self {
            DescriptorSet::Brief(_) => "BRIEF",
            DescriptorSet::Orb(_) => "ORB",
            DescriptorSet::Akaze(_) => "AKAZE",
        }
    }

    pub fn as_brief(&self) -> Option<&[BriefDescriptor]> {
        match self {
            DescriptorSet::Brief(d) => Some(d),
            _ => None,
        }
    }

    /// Hamming distance between descriptor `a` of this set and `b` of `other`
    pub fn distance(&self, a: usize, other: &DescriptorSet, b: usize) -> Option<u32> {
        match (self, other) {
            (DescriptorSet::Brief(x), DescriptorSet::Brief(y)) => Some(x.get(a)?.hamming(y.get(b)?)),
            (DescriptorSet::Orb(x), DescriptorSet::Orb(y)) => Some(x.get(a)?.hamming(y.get(b)?)),
            (DescriptorSet::Akaze(x), DescriptorSet::Akaze(y)) => Some(x.get(a)?.hamming(y.get(b)?)),
            _ => None,
        }
    }
}

impl fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

/// Descriptor extraction capability
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Describe `keypoints` in place.
    ///
    /// Keypoints that cannot be described are removed, so on success
    /// `keypoints[i]` is described by the i-th returned descriptor.
    fn describe(&self, img: &GrayImage, keypoints: &mut Vec<Keypoint>) -> FeatureResult<DescriptorSet>;
}

/// BRIEF binary descriptor.
///
/// The random test pairs are drawn on first use and reused for every later
/// frame, so descriptors from different frames are comparable.
pub struct BriefExtractor {
    length: usize,
    test_pairs: OnceLock<Vec<TestPair>>,
}

impl BriefExtractor {
    pub fn new(params: BriefParams) -> FeatureResult<Self> {
        DescriptorKind::Brief(params.clone()).validate()?;
        Ok(Self {
            length: params.length,
            test_pairs: OnceLock::new(),
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn has_test_pairs(&self) -> bool {
        self.test_pairs.get().is_some()
    }

    fn inside_border(kp: &Keypoint, width: u32, height: u32) -> bool {
        let (x, y) = kp.pixel();
        x >= BRIEF_BORDER && y >= BRIEF_BORDER && x + BRIEF_BORDER <= width && y + BRIEF_BORDER <= height
    }
}

impl fmt::Debug for BriefExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BriefExtractor")
            .field("length", &self.length)
            .field("test_pairs", &self.test_pairs.get().map(Vec::len))
            .finish()
    }
}

impl Extractor for BriefExtractor {
    fn name(&self) -> &'static str {
        "BRIEF"
    }

    fn describe(&self, img: &GrayImage, keypoints: &mut Vec<Keypoint>) -> FeatureResult<DescriptorSet> {
        let (width, height) = img.dimensions();
        let before = keypoints.len();
        keypoints.retain(|kp| Self::inside_border(kp, width, height));
        if keypoints.len() < before {
            debug!("BRIEF dropped {} keypoints near the border", before - keypoints.len());
        }
        if keypoints.is_empty() {
            return Ok(DescriptorSet::Brief(Vec::new()));
        }

        let points: Vec<Point<u32>> = keypoints
            .iter()
            .map(|kp| {
                let (x, y) = kp.pixel();
                Point::new(x, y)
            })
            .collect();

        let descriptors = match self.test_pairs.get() {
            Some(pairs) => brief(img, &points, self.length, Some(pairs)).map(|(d, _)| d),
            None => brief(img, &points, self.length, None).and_then(|(d, pairs)| {
                match self.test_pairs.set(pairs) {
                    Ok(()) => Ok(d),
                    // Another frame stored its pairs first
                    Err(_) => match self.test_pairs.get() {
                        Some(stored) => brief(img, &points, self.length, Some(stored)).map(|(d, _)| d),
                        None => Ok(d),
                    },
                }
            }),
        }
        .map_err(|e| FeatureError::Extraction(e.to_string()))?;

        if descriptors.len() != keypoints.len() {
            return Err(FeatureError::Extraction(format!(
                "BRIEF produced {} descriptors for {} keypoints",
                descriptors.len(),
                keypoints.len()
            )));
        }

        Ok(DescriptorSet::Brief(descriptors))
    }
}

/// Instantiate the configured extractor
pub fn build_extractor(kind: &DescriptorKind) -> FeatureResult<Box<dyn Extractor>> {
    Ok(match kind {
        DescriptorKind::Brief(p) => Box::new(BriefExtractor::new(p.clone())?),
        DescriptorKind::Orb(p) => Box::new(OrbExtractor::new(p.clone())?),
        DescriptorKind::Akaze(p) => Box::new(AkazeExtractor::new(p.clone())?),
    })
}
