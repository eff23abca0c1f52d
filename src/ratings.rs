// ---------------------------------------------------------------------------
// Rating Matrix Provider — historical user x item ratings in CSR form
// ---------------------------------------------------------------------------
//
// Rows are historical users in ascending user-id order; columns are catalog
// positions. Only stored ratings are kept: unrated cells are absent and read
// as zero.
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::RecommendError;
use crate::types::ItemId;

/// One historical `(user, item, rating)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingTriple {
	pub user: u64,
	pub item: ItemId,
	pub rating: f32,
}

impl RatingTriple {
	pub fn new(user: u64, item: u32, rating: f32) -> Self {
		Self {
			user,
			item: ItemId(item),
			rating,
		}
	}
}

/// Borrowed view of one user's stored ratings, columns ascending.
#[derive(Debug, Clone, Copy)]
pub struct RatingRow<'a> {
	pub columns: &'a [usize],
	pub values: &'a [f32],
}

impl<'a> RatingRow<'a> {
	pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + 'a {
		self.columns.iter().copied().zip(self.values.iter().copied())
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}
}

/// Read-only compressed sparse row matrix of historical ratings.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
	user_ids: Vec<u64>,
	indptr: Vec<usize>,
	columns: Vec<usize>,
	values: Vec<f32>,
	item_count: usize,
}

impl RatingMatrix {
	/// Build the matrix from triples, aligning items to `catalog` columns.
	///
	/// Items outside the catalog, non-finite or negative ratings, and repeated
	/// `(user, item)` pairs are all treated as a corrupt source.
	pub fn from_triples(catalog: &Catalog, triples: &[RatingTriple]) -> Result<Self, RecommendError> {
		let mut cells: Vec<(u64, usize, f32)> = Vec::with_capacity(triples.len());
		for t in triples {
			let col = catalog
				.position(t.item)
				.ok_or_else(|| RecommendError::CatalogMismatch {
					artifact: "ratings".into(),
					detail: format!("item {} rated by user {} is not in the catalog", t.item, t.user),
				})?;
			if !t.rating.is_finite() || t.rating < 0.0 {
				return Err(RecommendError::Corruption(format!(
					"invalid rating {} for user {} item {}",
					t.rating, t.user, t.item
				)));
			}
			cells.push((t.user, col, t.rating));
		}
		cells.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

		let mut user_ids: Vec<u64> = Vec::new();
		let mut indptr: Vec<usize> = vec![0];
		let mut columns = Vec::with_capacity(cells.len());
		let mut values = Vec::with_capacity(cells.len());

		for (i, &(user, col, rating)) in cells.iter().enumerate() {
			if i > 0 {
				let (prev_user, prev_col, _) = cells[i - 1];
				if prev_user == user && prev_col == col {
					return Err(RecommendError::Corruption(format!(
						"duplicate rating for user {} item {}",
						user,
						catalog.item_at(col).unwrap_or(ItemId(0))
					)));
				}
			}
			if user_ids.last() != Some(&user) {
				if !user_ids.is_empty() {
					indptr.push(columns.len());
				}
				user_ids.push(user);
			}
			columns.push(col);
			values.push(rating);
		}
		if !user_ids.is_empty() {
			indptr.push(columns.len());
		}

		Ok(Self {
			user_ids,
			indptr,
			columns,
			values,
			item_count: catalog.len(),
		})
	}

	pub fn user_count(&self) -> usize {
		self.user_ids.len()
	}

	pub fn item_count(&self) -> usize {
		self.item_count
	}

	/// Number of stored ratings.
	pub fn nnz(&self) -> usize {
		self.values.len()
	}

	pub fn user_id(&self, row: usize) -> Option<u64> {
		self.user_ids.get(row).copied()
	}

	pub fn row(&self, row: usize) -> RatingRow<'_> {
		if row >= self.user_ids.len() {
			return RatingRow {
				columns: &[],
				values: &[],
			};
		}
		let (start, end) = (self.indptr[row], self.indptr[row + 1]);
		RatingRow {
			columns: &self.columns[start..end],
			values: &self.values[start..end],
		}
	}

	/// Stored rating at `(row, col)`, zero when absent.
	pub fn rating(&self, row: usize, col: usize) -> f32 {
		let r = self.row(row);
		match r.columns.binary_search(&col) {
			Ok(i) => r.values[i],
			Err(_) => 0.0,
		}
	}
}
