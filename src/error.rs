use thiserror::Error;

use crate::types::{ItemId, Strategy};

/// Broad class of a [`RecommendError`].
///
/// `Validation` failures come from the caller's input and leave the engine
/// healthy. `Model` failures mean the loaded artifacts cannot be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	Model,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Validation => "validation",
			Self::Model => "model",
		}
	}
}

#[derive(Debug, Error)]
pub enum RecommendError {
	// -- Validation ---------------------------------------------------------
	#[error("Engine not initialized: call engine/initialize first")]
	NotInitialized,
	#[error("Unknown strategy: {0:?} (expected one of nmf, neighbors)")]
	UnknownStrategy(String),
	#[error("Unknown item id in query: {0}")]
	UnknownItem(ItemId),
	#[error("Rating {rating} for item {item} is outside the scale [{min}, {max}]")]
	RatingOutOfRange {
		item: ItemId,
		rating: f64,
		min: f64,
		max: f64,
	},
	#[error("Invalid result count k={0}: must be a positive integer")]
	InvalidK(i64),
	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	// -- Model --------------------------------------------------------------
	#[error("Catalog mismatch in {artifact}: {detail}")]
	CatalogMismatch { artifact: String, detail: String },
	#[error("Non-finite {strategy} score for item {item}: {value}")]
	NonFinite {
		strategy: Strategy,
		item: ItemId,
		value: f64,
	},
	#[error("Non-finite similarity {value} for historical user row {row}")]
	DegenerateSimilarity { row: usize, value: f64 },
	#[error("Corrupt artifact: {0}")]
	Corruption(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl RecommendError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NotInitialized
			| Self::UnknownStrategy(_)
			| Self::UnknownItem(_)
			| Self::RatingOutOfRange { .. }
			| Self::InvalidK(_)
			| Self::InvalidRequest(_) => ErrorKind::Validation,
			Self::CatalogMismatch { .. }
			| Self::NonFinite { .. }
			| Self::DegenerateSimilarity { .. }
			| Self::Corruption(_)
			| Self::Io(_)
			| Self::Serialization(_) => ErrorKind::Model,
		}
	}

	pub fn code(&self) -> &str {
		match self {
			Self::NotInitialized => "RECOMMEND_NOT_LOADED",
			Self::UnknownStrategy(_) => "RECOMMEND_UNKNOWN_STRATEGY",
			Self::UnknownItem(_) => "RECOMMEND_UNKNOWN_ITEM",
			Self::RatingOutOfRange { .. } => "RECOMMEND_RATING_OUT_OF_RANGE",
			Self::InvalidK(_) => "RECOMMEND_INVALID_K",
			Self::InvalidRequest(_) => "RECOMMEND_INVALID_REQUEST",
			Self::CatalogMismatch { .. } => "MODEL_CATALOG_MISMATCH",
			Self::NonFinite { .. } => "MODEL_NON_FINITE",
			Self::DegenerateSimilarity { .. } => "MODEL_DEGENERATE_SIMILARITY",
			Self::Corruption(_) => "MODEL_CORRUPT",
			Self::Io(_) => "MODEL_IO",
			Self::Serialization(_) => "MODEL_SERIALIZATION",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"recommendCode": self.code(),
			"kind": self.kind().as_str(),
			"message": self.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caller_input_errors_are_validation_kind() {
		assert_eq!(RecommendError::InvalidK(0).kind(), ErrorKind::Validation);
		assert_eq!(
			RecommendError::UnknownItem(ItemId(42)).kind(),
			ErrorKind::Validation
		);
		assert_eq!(
			RecommendError::UnknownStrategy("svd".into()).kind(),
			ErrorKind::Validation
		);
	}

	#[test]
	fn artifact_errors_are_model_kind() {
		let err = RecommendError::NonFinite {
			strategy: Strategy::LatentFactor,
			item: ItemId(7),
			value: f64::NAN,
		};
		assert_eq!(err.kind(), ErrorKind::Model);
		assert_eq!(
			RecommendError::Corruption("bad".into()).kind(),
			ErrorKind::Model
		);
	}

	#[test]
	fn json_rpc_error_carries_code_and_context() {
		let err = RecommendError::UnknownItem(ItemId(999));
		let value = err.to_json_rpc_error();
		assert_eq!(value["recommendCode"], "RECOMMEND_UNKNOWN_ITEM");
		assert_eq!(value["kind"], "validation");
		assert!(value["message"].as_str().unwrap().contains("999"));
	}
}
