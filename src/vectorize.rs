use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::error::RecommendError;
use crate::types::{ItemId, RatingScale, UserQuery};

/// Dense query row aligned to catalog order, plus the items the user rated.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
	pub values: Vec<f64>,
	pub rated: BTreeSet<ItemId>,
}

impl QueryVector {
	pub fn is_rated(&self, item: ItemId) -> bool {
		self.rated.contains(&item)
	}

	/// True when no rating carries any signal.
	pub fn is_cold(&self) -> bool {
		self.values.iter().all(|v| *v == 0.0)
	}
}

/// Turns a [`UserQuery`] into a [`QueryVector`]. The only place query input
/// is validated.
pub struct QueryVectorizer<'a> {
	catalog: &'a Catalog,
	scale: RatingScale,
}

impl<'a> QueryVectorizer<'a> {
	pub fn new(catalog: &'a Catalog, scale: RatingScale) -> Self {
		Self { catalog, scale }
	}

	pub fn vectorize(&self, query: &UserQuery) -> Result<QueryVector, RecommendError> {
		let mut values = vec![0.0; self.catalog.len()];
		let mut rated = BTreeSet::new();

		for (item, rating) in query.iter() {
			let pos = self
				.catalog
				.position(item)
				.ok_or(RecommendError::UnknownItem(item))?;
			if !self.scale.contains(rating) {
				return Err(RecommendError::RatingOutOfRange {
					item,
					rating,
					min: self.scale.min,
					max: self.scale.max,
				});
			}
			values[pos] = rating;
			rated.insert(item);
		}

		Ok(QueryVector { values, rated })
	}
}
