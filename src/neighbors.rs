// ---------------------------------------------------------------------------
// Neighbor Similarity Scorer — user-based nearest neighbors
// ---------------------------------------------------------------------------
//
// The index searches the rating matrix rows by brute force under a fixed
// metric, using row magnitudes computed when it was fitted. Each unrated item
// then scores the similarity-weighted sum of the neighbors' ratings:
//
//     score(i) = sum_n sim(n) * rating(n, i)
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::cosine::{
	compute_magnitude, cosine_similarity_with_magnitude, euclidean_distance_with_magnitude,
	row_magnitude,
};
use crate::error::RecommendError;
use crate::ratings::RatingMatrix;
use crate::scoring::{finite_candidate, Scorer};
use crate::types::{Candidate, Strategy};
use crate::vectorize::QueryVector;

/// Neighborhood size used when an index does not specify one.
pub const DEFAULT_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
	/// Similarity is cosine similarity, i.e. `1 - cosine distance`.
	Cosine,
	/// Similarity is `1 / (1 + distance)`.
	Euclidean,
}

impl Default for DistanceMetric {
	fn default() -> Self {
		Self::Cosine
	}
}

/// A historical user row and how similar it is to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
	pub row: usize,
	pub similarity: f64,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Fitted nearest-neighbor structure over the rating matrix rows.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
	metric: DistanceMetric,
	n_neighbors: usize,
	row_magnitudes: Vec<f64>,
}

impl NeighborIndex {
	/// Precompute row magnitudes for every user in `ratings`.
	pub fn fit(ratings: &RatingMatrix, metric: DistanceMetric, n_neighbors: usize) -> Self {
		let row_magnitudes = (0..ratings.user_count())
			.map(|row| row_magnitude(ratings.row(row)))
			.collect();
		Self {
			metric,
			n_neighbors: n_neighbors.max(1),
			row_magnitudes,
		}
	}

	/// Rebuild an index from persisted parts.
	pub fn from_parts(
		metric: DistanceMetric,
		n_neighbors: usize,
		row_magnitudes: Vec<f64>,
	) -> Result<Self, RecommendError> {
		if n_neighbors == 0 {
			return Err(RecommendError::Corruption(
				"neighbor index has a neighborhood size of zero".into(),
			));
		}
		Ok(Self {
			metric,
			n_neighbors,
			row_magnitudes,
		})
	}

	pub fn metric(&self) -> DistanceMetric {
		self.metric
	}

	pub fn n_neighbors(&self) -> usize {
		self.n_neighbors
	}

	pub fn user_count(&self) -> usize {
		self.row_magnitudes.len()
	}

	pub fn row_magnitudes(&self) -> &[f64] {
		&self.row_magnitudes
	}

	/// The `n_neighbors` most similar rows, most similar first, ties broken
	/// by ascending row. Returns fewer when the matrix has fewer users.
	pub fn kneighbors(
		&self,
		ratings: &RatingMatrix,
		query: &[f64],
	) -> Result<Vec<Neighbor>, RecommendError> {
		let query_mag = compute_magnitude(query);
		let mut neighbors = Vec::with_capacity(self.row_magnitudes.len());

		for (row, &row_mag) in self.row_magnitudes.iter().enumerate() {
			let r = ratings.row(row);
			let similarity = match self.metric {
				DistanceMetric::Cosine => {
					cosine_similarity_with_magnitude(query, r, query_mag, row_mag)
				}
				DistanceMetric::Euclidean => {
					1.0 / (1.0 + euclidean_distance_with_magnitude(query, r, query_mag, row_mag))
				}
			};
			if !similarity.is_finite() {
				return Err(RecommendError::DegenerateSimilarity {
					row,
					value: similarity,
				});
			}
			neighbors.push(Neighbor { row, similarity });
		}

		neighbors.sort_by(|a, b| {
			b.similarity
				.partial_cmp(&a.similarity)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then(a.row.cmp(&b.row))
		});
		neighbors.truncate(self.n_neighbors);
		Ok(neighbors)
	}
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

pub struct NeighborScorer<'a> {
	index: &'a NeighborIndex,
	ratings: &'a RatingMatrix,
	catalog: &'a Catalog,
}

impl<'a> NeighborScorer<'a> {
	pub fn new(index: &'a NeighborIndex, ratings: &'a RatingMatrix, catalog: &'a Catalog) -> Self {
		Self {
			index,
			ratings,
			catalog,
		}
	}
}

impl Scorer for NeighborScorer<'_> {
	fn strategy(&self) -> Strategy {
		Strategy::Neighbor
	}

	fn score(&self, query: &QueryVector) -> Result<Vec<Candidate>, RecommendError> {
		let neighbors = self.index.kneighbors(self.ratings, &query.values)?;
		tracing::debug!(
			neighbors = neighbors.len(),
			top_similarity = neighbors.first().map(|n| n.similarity),
			"neighborhood selected"
		);

		let mut totals = vec![0.0f64; self.catalog.len()];
		for n in &neighbors {
			for (col, rating) in self.ratings.row(n.row).iter() {
				if let Some(slot) = totals.get_mut(col) {
					*slot += n.similarity * rating as f64;
				}
			}
		}

		self.catalog
			.item_ids()
			.iter()
			.zip(totals)
			.filter(|(id, _)| !query.is_rated(**id))
			.map(|(id, score)| finite_candidate(Strategy::Neighbor, *id, score))
			.collect()
	}
}
