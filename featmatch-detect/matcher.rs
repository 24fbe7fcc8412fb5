use std::collections::HashMap;

use featmatch_core::{CandidatePair, FeatureError, FeatureResult, LshParams, Match, MatcherKind, SelectorKind};
use featmatch_filter::MatchFilter;
use imageproc::binary_descriptors::brief::BriefDescriptor;
use imageproc::binary_descriptors::match_binary_descriptors;
use rayon::prelude::*;

use crate::descriptor::{DescriptorSet, HammingCode};

/// Run `$body` with `$q` and `$t` bound to the code slices of two sets of the
/// same family; sets of different families are `InvalidInput`.
macro_rules! with_codes {
    ($query:expr, $train:expr, |$q:ident, $t:ident| $body:expr) => {
        match ($query, $train) {
            (DescriptorSet::Brief($q), DescriptorSet::Brief($t)) => Ok($body),
            (DescriptorSet::Orb($q), DescriptorSet::Orb($t)) => Ok($body),
            (DescriptorSet::Akaze($q), DescriptorSet::Akaze($t)) => Ok($body),
            (q, t) => Err(FeatureError::input(format!(
                "cannot match {} descriptors against {} descriptors",
                q.kind(),
                t.kind()
            ))),
        }
    };
}

/// Descriptor matching capability
pub trait DescriptorMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// At most one match per query descriptor
    fn match_best(&self, query: &DescriptorSet, train: &DescriptorSet) -> FeatureResult<Vec<Match>>;

    /// Up to `k` candidates per query, ascending by distance
    fn knn_match(&self, query: &DescriptorSet, train: &DescriptorSet, k: usize) -> FeatureResult<Vec<CandidatePair>>;
}

/// The `k` nearest train descriptors of every query, in query order.
///
/// Ties keep the lower train index first. Queries get fewer than `k`
/// candidates only when `train` is shorter than `k`.
pub fn knn_hamming<D: HammingCode + Sync>(query: &[D], train: &[D], k: usize) -> Vec<CandidatePair> {
    query
        .par_iter()
        .enumerate()
        .map(|(query_idx, q)| {
            let mut nearest: Vec<Match> = Vec::with_capacity(k + 1);
            for (train_idx, t) in train.iter().enumerate() {
                let distance = q.hamming(t) as f32;
                let slot = nearest
                    .iter()
                    .position(|m| distance < m.distance)
                    .unwrap_or(nearest.len());
                if slot < k {
                    nearest.insert(slot, Match::new(query_idx, train_idx, distance));
                    nearest.truncate(k);
                }
            }
            nearest
        })
        .collect()
}

/// Best train descriptor of every query; with `cross_check` the query must
/// also be the best match of that train descriptor
pub fn best_hamming<D: HammingCode + Sync>(query: &[D], train: &[D], cross_check: bool) -> Vec<Match> {
    let forward: Vec<Match> = knn_hamming(query, train, 1).into_iter().flatten().collect();
    if !cross_check {
        return forward;
    }

    let backward: Vec<usize> = knn_hamming(train, query, 1)
        .into_iter()
        .map(|nearest| nearest.first().map_or(usize::MAX, |m| m.train_idx))
        .collect();

    forward
        .into_iter()
        .filter(|m| backward[m.train_idx] == m.query_idx)
        .collect()
}

/// Exhaustive Hamming distance matcher
#[derive(Debug, Clone, Default)]
pub struct BruteForceMatcher {
    cross_check: bool,
}

impl BruteForceMatcher {
    pub fn new(cross_check: bool) -> Self {
        Self { cross_check }
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn name(&self) -> &'static str {
        "MAT_BF"
    }

    fn match_best(&self, query: &DescriptorSet, train: &DescriptorSet) -> FeatureResult<Vec<Match>> {
        if query.is_empty() || train.is_empty() {
            return Ok(Vec::new());
        }
        with_codes!(query, train, |q, t| best_hamming(q, t, self.cross_check))
    }

    fn knn_match(&self, query: &DescriptorSet, train: &DescriptorSet, k: usize) -> FeatureResult<Vec<CandidatePair>> {
        if k == 0 {
            return Err(FeatureError::config("k must be > 0"));
        }
        if self.cross_check {
            return Err(FeatureError::config("cross-checked matching yields a single neighbour"));
        }
        // An empty set carries no family, so it pairs with anything
        if query.is_empty() || train.is_empty() {
            return Ok(vec![Vec::new(); query.len()]);
        }
        with_codes!(query, train, |q, t| knn_hamming(q, t, k))
    }
}

/// Approximate nearest neighbour over locality-sensitive hashes of the bit strings
#[derive(Debug, Clone)]
pub struct LshMatcher {
    params: LshParams,
}

impl LshMatcher {
    pub fn new(params: LshParams) -> Self {
        Self { params }
    }

    /// Position of every descriptor, keyed by address, so references returned
    /// by the hash matcher can be mapped back to indices
    fn positions(codes: &[BriefDescriptor]) -> HashMap<*const BriefDescriptor, usize> {
        codes.iter().enumerate().map(|(i, d)| (d as *const BriefDescriptor, i)).collect()
    }
}

impl DescriptorMatcher for LshMatcher {
    fn name(&self) -> &'static str {
        "MAT_LSH"
    }

    fn match_best(&self, query: &DescriptorSet, train: &DescriptorSet) -> FeatureResult<Vec<Match>> {
        if query.is_empty() || train.is_empty() {
            return Ok(Vec::new());
        }

        let (q, t) = match (query.as_brief(), train.as_brief()) {
            (Some(q), Some(t)) => (q, t),
            _ => {
                return Err(FeatureError::input(format!(
                    "MAT_LSH matches BRIEF descriptors only, got {} and {}",
                    query.kind(),
                    train.kind()
                )));
            }
        };

        let (q_pos, t_pos) = (Self::positions(q), Self::positions(t));
        let mut matches: Vec<Match> = match_binary_descriptors(q, t, self.params.max_distance, self.params.seed)
            .into_iter()
            .filter_map(|(a, b)| {
                let query_idx = *q_pos.get(&(a as *const BriefDescriptor))?;
                let train_idx = *t_pos.get(&(b as *const BriefDescriptor))?;
                Some(Match::new(query_idx, train_idx, a.hamming(b) as f32))
            })
            .collect();

        matches.sort_by_key(|m| m.query_idx);
        Ok(matches)
    }

    fn knn_match(&self, _query: &DescriptorSet, _train: &DescriptorSet, _k: usize) -> FeatureResult<Vec<CandidatePair>> {
        Err(FeatureError::config("MAT_LSH does not support k-nearest-neighbour queries"))
    }
}

/// Instantiate the configured matcher
pub fn build_matcher(kind: &MatcherKind) -> Box<dyn DescriptorMatcher> {
    match kind {
        MatcherKind::BruteForce(p) => Box::new(BruteForceMatcher::new(p.cross_check)),
        MatcherKind::Lsh(p) => Box::new(LshMatcher::new(p.clone())),
    }
}

/// Run the matcher and apply the selection strategy.
///
/// `SEL_KNN` asks for two neighbours and keeps those passing the ratio test;
/// a train set with fewer than two descriptors is `InvalidInput`.
pub fn select_matches(
    matcher: &dyn DescriptorMatcher,
    selector: &SelectorKind,
    query: &DescriptorSet,
    train: &DescriptorSet,
) -> FeatureResult<Vec<Match>> {
    match selector {
        SelectorKind::NearestNeighbor => matcher.match_best(query, train),
        SelectorKind::KNearest(p) => {
            let filter = MatchFilter::new(p.ratio)?;
            let candidates = matcher.knn_match(query, train, 2)?;
            filter.filter(&candidates)
        }
    }
}
