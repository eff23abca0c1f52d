use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RecommendError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable catalog identifier of a recommendable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u32> for ItemId {
	fn from(id: u32) -> Self {
		Self(id)
	}
}

// ---------------------------------------------------------------------------
// Ratings
// ---------------------------------------------------------------------------

/// Inclusive range of accepted rating values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
	pub min: f64,
	pub max: f64,
}

impl Default for RatingScale {
	fn default() -> Self {
		Self { min: 0.0, max: 5.0 }
	}
}

impl RatingScale {
	pub fn contains(&self, rating: f64) -> bool {
		rating.is_finite() && rating >= self.min && rating <= self.max
	}
}

/// Partial set of explicit ratings supplied by one user.
///
/// Keys are unvalidated until the query passes through
/// [`crate::vectorize::QueryVectorizer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserQuery {
	ratings: BTreeMap<ItemId, f64>,
}

impl UserQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, item: ItemId, rating: f64) -> Option<f64> {
		self.ratings.insert(item, rating)
	}

	pub fn rating(&self, item: ItemId) -> Option<f64> {
		self.ratings.get(&item).copied()
	}

	pub fn contains(&self, item: ItemId) -> bool {
		self.ratings.contains_key(&item)
	}

	pub fn len(&self) -> usize {
		self.ratings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ratings.is_empty()
	}

	/// Rated items in ascending id order.
	pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
		self.ratings.iter().map(|(id, r)| (*id, *r))
	}
}

impl FromIterator<(ItemId, f64)> for UserQuery {
	fn from_iter<I: IntoIterator<Item = (ItemId, f64)>>(iter: I) -> Self {
		Self {
			ratings: iter.into_iter().collect(),
		}
	}
}

impl<const N: usize> From<[(u32, f64); N]> for UserQuery {
	fn from(pairs: [(u32, f64); N]) -> Self {
		pairs.into_iter().map(|(id, r)| (ItemId(id), r)).collect()
	}
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Which precomputed model produces the candidate scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
	LatentFactor,
	Neighbor,
}

impl Strategy {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::LatentFactor => "nmf",
			Self::Neighbor => "neighbors",
		}
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Strategy {
	type Err = RecommendError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"nmf" | "latentFactor" | "latent-factor" | "latent_factor" => Ok(Self::LatentFactor),
			"neighbors" | "neighbor" => Ok(Self::Neighbor),
			other => Err(RecommendError::UnknownStrategy(other.to_string())),
		}
	}
}

impl Serialize for Strategy {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

// ---------------------------------------------------------------------------
// Scoring output
// ---------------------------------------------------------------------------

/// One entry of a Candidate Score List.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
	pub item: ItemId,
	pub score: f64,
}

/// A ranked recommendation with its display title, when one is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedItem {
	pub id: ItemId,
	pub score: f64,
	pub title: Option<String>,
}
