use featmatch_core::{CandidatePair, FeatureError, FeatureResult, Match, check_ratio};
use log::debug;

/// Lowe's ratio test over k=2 nearest-neighbour candidates.
///
/// A query keeps its best candidate only when
/// `best.distance <= ratio * second.distance`; ambiguous queries are dropped.
#[derive(Debug, Clone, Copy)]
pub struct MatchFilter {
    ratio: f32,
}

impl MatchFilter {
    pub fn new(ratio: f32) -> FeatureResult<Self> {
        check_ratio(ratio)?;
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Filter candidate pairs, preserving query order.
    ///
    /// Every entry must hold exactly two candidates ordered by ascending,
    /// finite distance; anything else is `InvalidInput`.
    pub fn filter(&self, candidates: &[CandidatePair]) -> FeatureResult<Vec<Match>> {
        let mut kept = Vec::with_capacity(candidates.len());

        for (position, pair) in candidates.iter().enumerate() {
            let (best, second) = match pair.as_slice() {
                [best, second] => (best, second),
                other => {
                    return Err(FeatureError::input(format!(
                        "query {} has {} candidates, expected 2",
                        position,
                        other.len()
                    )));
                }
            };

            if !best.distance.is_finite() || !second.distance.is_finite() {
                return Err(FeatureError::input(format!(
                    "query {} has non-finite candidate distances",
                    position
                )));
            }
            if best.distance > second.distance {
                return Err(FeatureError::input(format!(
                    "query {} candidates not ordered by distance ({} > {})",
                    position, best.distance, second.distance
                )));
            }

            if best.distance <= self.ratio * second.distance {
                kept.push(*best);
            }
        }

        debug!(
            "ratio test {:.2} kept {} of {} queries",
            self.ratio,
            kept.len(),
            candidates.len()
        );
        Ok(kept)
    }
}

/// One-shot form of [`MatchFilter::filter`]
pub fn ratio_test(candidates: &[CandidatePair], ratio: f32) -> FeatureResult<Vec<Match>> {
    MatchFilter::new(ratio)?.filter(candidates)
}
