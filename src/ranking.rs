// ---------------------------------------------------------------------------
// Ranker — exclusion, ordering and truncation of candidate scores
// ---------------------------------------------------------------------------
//
// Pure functions. Ordering is total: descending score, then ascending item id,
// so identical inputs always rank identically.
// ---------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::RecommendError;
use crate::types::{Candidate, ItemId};

/// Convert a caller-supplied count into a usable K.
pub fn validate_k(k: i64) -> Result<usize, RecommendError> {
	if k <= 0 {
		return Err(RecommendError::InvalidK(k));
	}
	usize::try_from(k).map_err(|_| RecommendError::InvalidK(k))
}

/// Descending score, ties by ascending id.
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
	b.score
		.partial_cmp(&a.score)
		.unwrap_or(Ordering::Equal)
		.then(a.item.cmp(&b.item))
}

/// Drop excluded items, order the rest and keep the first `k`.
///
/// A short result is not an error: fewer than `k` survivors are all returned.
pub fn rank(
	mut candidates: Vec<Candidate>,
	excluded: &BTreeSet<ItemId>,
	k: usize,
) -> Result<Vec<Candidate>, RecommendError> {
	if k == 0 {
		return Err(RecommendError::InvalidK(0));
	}
	candidates.retain(|c| !excluded.contains(&c.item));
	candidates.sort_by(compare_candidates);
	candidates.truncate(k);
	Ok(candidates)
}
