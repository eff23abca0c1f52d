// ---------------------------------------------------------------------------
// ModelStore — immutable bundle of everything a request reads
// ---------------------------------------------------------------------------
//
// Built once (from a data directory or from in-memory fixtures), validated for
// cross-artifact consistency, then shared read-only behind an `Arc`. Nothing
// here is mutated after construction, so concurrent readers need no locking.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::path::Path;

use crate::catalog::{Catalog, CatalogTitles};
use crate::cosine::row_magnitude;
use crate::error::RecommendError;
use crate::factor::LatentFactorModel;
use crate::neighbors::NeighborIndex;
use crate::persistence::{self, PersistenceError};
use crate::ratings::RatingMatrix;
use crate::types::ItemId;

/// Relative slack allowed between persisted and recomputed row magnitudes.
const MAGNITUDE_TOLERANCE: f64 = 1e-9;

/// Loaded catalog, rating matrix and both model artifacts.
#[derive(Debug)]
pub struct ModelStore {
	catalog: Catalog,
	titles: CatalogTitles,
	ratings: RatingMatrix,
	factors: LatentFactorModel,
	neighbors: NeighborIndex,
}

fn from_persistence(e: PersistenceError) -> RecommendError {
	match e {
		PersistenceError::Io(io) => RecommendError::Io(io),
		PersistenceError::Missing(path) => RecommendError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("artifact not found: {}", path),
		)),
		PersistenceError::Corruption(msg) => RecommendError::Corruption(msg),
		PersistenceError::Serialization(msg) => RecommendError::Serialization(msg),
	}
}

impl ModelStore {
	/// Assemble a store from already-built parts, checking that every
	/// artifact lines up with the catalog and the rating matrix.
	pub fn from_parts(
		catalog: Catalog,
		titles: CatalogTitles,
		ratings: RatingMatrix,
		factors: LatentFactorModel,
		neighbors: NeighborIndex,
	) -> Result<Self, RecommendError> {
		if ratings.item_count() != catalog.len() {
			return Err(RecommendError::CatalogMismatch {
				artifact: "ratings".into(),
				detail: format!(
					"matrix has {} columns, catalog has {} items",
					ratings.item_count(),
					catalog.len()
				),
			});
		}
		if factors.item_count() != catalog.len() {
			return Err(RecommendError::CatalogMismatch {
				artifact: "factors".into(),
				detail: format!(
					"model covers {} items, catalog has {}",
					factors.item_count(),
					catalog.len()
				),
			});
		}
		if neighbors.user_count() != ratings.user_count() {
			return Err(RecommendError::CatalogMismatch {
				artifact: "neighbors".into(),
				detail: format!(
					"index was fitted on {} users, rating matrix has {}",
					neighbors.user_count(),
					ratings.user_count()
				),
			});
		}
		for (row, &stored) in neighbors.row_magnitudes().iter().enumerate() {
			let actual = row_magnitude(ratings.row(row));
			let tolerance = MAGNITUDE_TOLERANCE * actual.max(1.0);
			// NaN fails the comparison and is rejected with the rest.
			let consistent = (stored - actual).abs() <= tolerance;
			if !consistent {
				return Err(RecommendError::CatalogMismatch {
					artifact: "neighbors".into(),
					detail: format!(
						"row {} magnitude {} does not match rating matrix ({})",
						row, stored, actual
					),
				});
			}
		}
		Ok(Self {
			catalog,
			titles,
			ratings,
			factors,
			neighbors,
		})
	}

	/// Load every artifact from `dir`. Any failure is a model error: the
	/// engine refuses to serve from a partial or mismatched set.
	pub fn load(dir: &Path) -> Result<Self, RecommendError> {
		let entries = persistence::load_catalog(dir).map_err(from_persistence)?;
		let catalog = Catalog::new(entries.iter().map(|e| e.id).collect())?;
		let titles: HashMap<ItemId, String> = entries
			.into_iter()
			.filter_map(|e| e.title.map(|t| (e.id, t)))
			.collect();
		let titles = CatalogTitles::new(titles);

		let (stamp, triples) = persistence::load_ratings(dir).map_err(from_persistence)?;
		catalog.verify("ratings", &stamp.catalog_fingerprint, stamp.item_count)?;
		let ratings = RatingMatrix::from_triples(&catalog, &triples)?;

		let f = persistence::load_factors(dir).map_err(from_persistence)?;
		catalog.verify("factors", &f.stamp.catalog_fingerprint, f.stamp.item_count)?;
		let factors = LatentFactorModel::new(f.components, catalog.len(), f.item_factors, f.transform)?;

		let n = persistence::load_neighbors(dir).map_err(from_persistence)?;
		catalog.verify("neighbors", &n.stamp.catalog_fingerprint, n.stamp.item_count)?;
		let neighbors = NeighborIndex::from_parts(n.metric, n.n_neighbors, n.row_magnitudes)?;

		let store = Self::from_parts(catalog, titles, ratings, factors, neighbors)?;
		tracing::info!(
			dir = %dir.display(),
			items = store.catalog.len(),
			users = store.ratings.user_count(),
			ratings = store.ratings.nnz(),
			components = store.factors.components(),
			neighbors = store.neighbors.n_neighbors(),
			"model artifacts loaded"
		);
		Ok(store)
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn titles(&self) -> &CatalogTitles {
		&self.titles
	}

	pub fn ratings(&self) -> &RatingMatrix {
		&self.ratings
	}

	pub fn factors(&self) -> &LatentFactorModel {
		&self.factors
	}

	pub fn neighbors(&self) -> &NeighborIndex {
		&self.neighbors
	}

	/// Summary reported by `engine/initialize` and `engine/info`.
	pub fn summary(&self) -> serde_json::Value {
		serde_json::json!({
			"items": self.catalog.len(),
			"users": self.ratings.user_count(),
			"ratings": self.ratings.nnz(),
			"components": self.factors.components(),
			"neighbors": self.neighbors.n_neighbors(),
			"catalogFingerprint": self.catalog.fingerprint(),
		})
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
