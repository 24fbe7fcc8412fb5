use crate::error::{FeatureError, FeatureResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Salient image location: position, support diameter, strength and orientation
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter of the support circle
    pub size: f32,
    pub response: f32,
    /// Degrees in [0, 360), -1 when not computed
    pub angle: f32,
    /// Pyramid level the keypoint was detected on, 0 for single-scale detectors
    pub octave: u32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, size: f32, response: f32) -> Self {
        Self {
            x,
            y,
            size,
            response,
            angle: -1.0,
            octave: 0,
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_octave(mut self, octave: u32) -> Self {
        self.octave = octave;
        self
    }

    /// Intersection-over-union of the two support circles, in [0, 1].
    ///
    /// One circle fully inside the other yields the ratio of their areas,
    /// disjoint circles yield 0.
    pub fn overlap(&self, other: &Keypoint) -> f32 {
        let a = self.size * 0.5;
        let b = other.size * 0.5;
        let a_2 = a * a;
        let b_2 = b * b;

        if a.max(b) <= 0.0 {
            return 0.0;
        }

        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let c = (dx * dx + dy * dy).sqrt();

        // Containment: no intersection points between the two circles
        if a.min(b) + c <= a.max(b) {
            return a_2.min(b_2) / a_2.max(b_2);
        }

        if c >= a + b {
            return 0.0;
        }

        let c_2 = c * c;
        let cos_alpha = ((b_2 + c_2 - a_2) / (other.size * c)).clamp(-1.0, 1.0);
        let cos_beta = ((a_2 + c_2 - b_2) / (self.size * c)).clamp(-1.0, 1.0);
        let alpha = cos_alpha.acos();
        let beta = cos_beta.acos();

        let segment_area_a = a_2 * beta;
        let segment_area_b = b_2 * alpha;
        let triangle_area_a = a_2 * beta.sin() * cos_beta;
        let triangle_area_b = b_2 * alpha.sin() * cos_alpha;

        let intersection = segment_area_a + segment_area_b - triangle_area_a - triangle_area_b;
        let union = (a_2 + b_2) * std::f32::consts::PI - intersection;

        intersection / union
    }

    /// Integer pixel position, rounded and clamped at zero
    pub fn pixel(&self) -> (u32, u32) {
        (self.x.round().max(0.0) as u32, self.y.round().max(0.0) as u32)
    }
}

/// Correspondence from a query descriptor to a train (reference) descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

impl Match {
    pub fn new(query_idx: usize, train_idx: usize, distance: f32) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

/// Nearest neighbours of one query descriptor, ascending by distance
pub type CandidatePair = Vec<Match>;

/// Row-major grid of per-pixel corner responses
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseGrid {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ResponseGrid {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> FeatureResult<Self> {
        if data.len() != width * height {
            return Err(FeatureError::input(format!(
                "response grid {}x{} needs {} values, got {}",
                width,
                height,
                width * height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Rasterise keypoint responses into an otherwise empty grid.
    ///
    /// Keypoints outside the grid are dropped; two keypoints landing on the
    /// same cell keep the stronger response.
    pub fn from_keypoints(width: usize, height: usize, keypoints: &[Keypoint]) -> Self {
        let mut grid = Self::zeros(width, height);
        for kp in keypoints {
            let (x, y) = kp.pixel();
            let (x, y) = (x as usize, y as usize);
            if x < width && y < height && kp.response > grid.get(x, y) {
                grid.set(x, y, kp.response);
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Smallest and largest finite response, `None` for an empty grid
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Linearly rescale responses so the minimum maps to `lo` and the maximum to `hi`.
    ///
    /// A constant grid maps entirely to `lo`.
    pub fn normalize_min_max(&self, lo: f32, hi: f32) -> ResponseGrid {
        let data = match self.min_max() {
            Some((min, max)) if max > min => {
                let scale = (hi - lo) / (max - min);
                self.data.iter().map(|&v| lo + (v - min) * scale).collect()
            }
            _ => vec![lo; self.data.len()],
        };
        ResponseGrid {
            width: self.width,
            height: self.height,
            data,
        }
    }
}
