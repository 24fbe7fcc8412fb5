use featmatch_core::{FeatureError, FeatureResult, Keypoint, ResponseGrid};
use log::debug;

/// Non-maximum suppression of corner responses by pairwise keypoint overlap.
///
/// Candidates are visited in order and compared with every keypoint accepted
/// so far. Two keypoints whose overlap (percent) exceeds the threshold are
/// duplicates of one physical corner and only the stronger one is kept, in
/// the slot of the entry that was accepted first. The output never contains
/// an overlapping pair.
#[derive(Debug, Clone)]
pub struct KeypointFilter {
    response_threshold: f32,
    overlap_threshold: f32,
    keypoint_size: f32,
}

impl KeypointFilter {
    /// Creates a filter with validation
    ///
    /// * `response_threshold` - pixels must respond strictly above this value
    /// * `overlap_threshold` - maximum overlap percentage in [0, 100] between kept keypoints
    /// * `keypoint_size` - diameter assigned to every emitted keypoint
    pub fn new(response_threshold: f32, overlap_threshold: f32, keypoint_size: f32) -> FeatureResult<Self> {
        if !response_threshold.is_finite() {
            return Err(FeatureError::config(format!(
                "response threshold {} must be finite",
                response_threshold
            )));
        }
        if !(0.0..=100.0).contains(&overlap_threshold) {
            return Err(FeatureError::config(format!(
                "overlap threshold {} outside [0, 100]",
                overlap_threshold
            )));
        }
        if !(keypoint_size.is_finite() && keypoint_size > 0.0) {
            return Err(FeatureError::config(format!(
                "keypoint size {} must be positive",
                keypoint_size
            )));
        }

        Ok(Self {
            response_threshold,
            overlap_threshold,
            keypoint_size,
        })
    }

    /// Scan the grid row by row and suppress overlapping candidates
    pub fn filter(&self, grid: &ResponseGrid) -> Vec<Keypoint> {
        let (width, height) = (grid.width(), grid.height());
        let candidates = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .filter_map(|(x, y)| {
                let response = grid.get(x, y);
                (response > self.response_threshold)
                    .then(|| Keypoint::new(x as f32, y as f32, self.keypoint_size, response))
            });

        let kept = self.suppress(candidates);
        debug!(
            "keypoint filter kept {} keypoints from {}x{} grid (threshold {}, overlap {}%)",
            kept.len(),
            width,
            height,
            self.response_threshold,
            self.overlap_threshold
        );
        kept
    }

    /// Suppress overlapping keypoints from an arbitrary candidate sequence.
    ///
    /// Candidates keep their own size; the response threshold is not applied.
    pub fn suppress<I>(&self, candidates: I) -> Vec<Keypoint>
    where
        I: IntoIterator<Item = Keypoint>,
    {
        let mut accepted: Vec<Keypoint> = Vec::new();
        for candidate in candidates {
            self.insert(&mut accepted, candidate);
        }
        accepted
    }

    /// `accepted` never holds two keypoints overlapping above the threshold.
    /// A candidate that beats every overlapping entry takes the slot of the
    /// first one and the rest are removed; otherwise it is dropped.
    fn insert(&self, accepted: &mut Vec<Keypoint>, candidate: Keypoint) {
        let overlapping: Vec<usize> = accepted
            .iter()
            .enumerate()
            .filter(|(_, existing)| existing.overlap(&candidate) * 100.0 > self.overlap_threshold)
            .map(|(i, _)| i)
            .collect();

        let Some((&first, rest)) = overlapping.split_first() else {
            accepted.push(candidate);
            return;
        };

        if overlapping.iter().any(|&i| accepted[i].response >= candidate.response) {
            return;
        }

        accepted[first] = candidate;
        for &i in rest.iter().rev() {
            accepted.remove(i);
        }
    }

    pub fn response_threshold(&self) -> f32 {
        self.response_threshold
    }

    pub fn overlap_threshold(&self) -> f32 {
        self.overlap_threshold
    }

    pub fn keypoint_size(&self) -> f32 {
        self.keypoint_size
    }
}

/// One-shot form of [`KeypointFilter::filter`]
pub fn filter_keypoints(
    grid: &ResponseGrid,
    response_threshold: f32,
    overlap_threshold: f32,
    keypoint_size: f32,
) -> FeatureResult<Vec<Keypoint>> {
    let filter = KeypointFilter::new(response_threshold, overlap_threshold, keypoint_size)?;
    Ok(filter.filter(grid))
}
