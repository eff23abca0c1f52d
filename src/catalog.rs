// ---------------------------------------------------------------------------
// Catalog Index — item identifiers <-> matrix column positions
// ---------------------------------------------------------------------------
//
// The catalog fixes the column order shared by the rating matrix, both model
// artifacts and every query vector. Its fingerprint is stamped into each
// persisted artifact so a model trained against another catalog is refused.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::error::RecommendError;
use crate::types::ItemId;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Ordered universe of item identifiers.
#[derive(Debug, Clone)]
pub struct Catalog {
	items: Vec<ItemId>,
	positions: HashMap<ItemId, usize>,
	fingerprint: String,
}

impl Catalog {
	/// Build a catalog from ids in column order. Duplicate ids mean the
	/// catalog source is corrupt.
	pub fn new(items: Vec<ItemId>) -> Result<Self, RecommendError> {
		let mut positions = HashMap::with_capacity(items.len());
		for (pos, id) in items.iter().enumerate() {
			if positions.insert(*id, pos).is_some() {
				return Err(RecommendError::Corruption(format!(
					"duplicate item id {} in catalog",
					id
				)));
			}
		}
		let fingerprint = fingerprint_of(&items);
		Ok(Self {
			items,
			positions,
			fingerprint,
		})
	}

	/// All item ids in column order.
	pub fn item_ids(&self) -> &[ItemId] {
		&self.items
	}

	pub fn position(&self, id: ItemId) -> Option<usize> {
		self.positions.get(&id).copied()
	}

	pub fn item_at(&self, position: usize) -> Option<ItemId> {
		self.items.get(position).copied()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	/// Check that an artifact was produced against this exact catalog.
	pub fn verify(
		&self,
		artifact: &str,
		fingerprint: &str,
		item_count: usize,
	) -> Result<(), RecommendError> {
		if item_count != self.len() {
			return Err(RecommendError::CatalogMismatch {
				artifact: artifact.to_string(),
				detail: format!(
					"artifact covers {} items, catalog has {}",
					item_count,
					self.len()
				),
			});
		}
		if fingerprint != self.fingerprint {
			return Err(RecommendError::CatalogMismatch {
				artifact: artifact.to_string(),
				detail: format!(
					"fingerprint {} does not match catalog {}",
					fingerprint, self.fingerprint
				),
			});
		}
		Ok(())
	}
}

/// FNV-1a over the little-endian bytes of each id, in order.
pub fn fingerprint_of(items: &[ItemId]) -> String {
	let mut hash = FNV_OFFSET_BASIS;
	for id in items {
		for byte in id.0.to_le_bytes() {
			hash ^= byte as u64;
			hash = hash.wrapping_mul(FNV_PRIME);
		}
	}
	format!("{:016x}", hash)
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Display metadata owned outside the scoring core.
pub trait TitleSource: Send + Sync {
	fn title(&self, id: ItemId) -> Option<String>;
}

/// In-memory titles shipped alongside the catalog file.
#[derive(Debug, Clone, Default)]
pub struct CatalogTitles {
	titles: HashMap<ItemId, String>,
}

impl CatalogTitles {
	pub fn new(titles: HashMap<ItemId, String>) -> Self {
		Self { titles }
	}

	pub fn len(&self) -> usize {
		self.titles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.titles.is_empty()
	}

	/// `(id, title)` for every catalog item, sorted by title then id.
	/// Items without a title sort last.
	pub fn listing(&self, catalog: &Catalog) -> Vec<(ItemId, Option<String>)> {
		let mut rows: Vec<(ItemId, Option<String>)> = catalog
			.item_ids()
			.iter()
			.map(|id| (*id, self.titles.get(id).cloned()))
			.collect();
		rows.sort_by(|a, b| match (&a.1, &b.1) {
			(Some(x), Some(y)) => x.cmp(y).then(a.0.cmp(&b.0)),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => a.0.cmp(&b.0),
		});
		rows
	}
}

impl TitleSource for CatalogTitles {
	fn title(&self, id: ItemId) -> Option<String> {
		self.titles.get(&id).cloned()
	}
}
