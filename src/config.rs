use std::path::PathBuf;

use crate::types::RatingScale;

/// Result count used when a request does not name one.
pub const DEFAULT_K: usize = 10;

/// Configuration for a recommendation engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Directory holding the catalog, ratings and model artifacts.
	pub data_dir: Option<PathBuf>,
	pub rating_scale: RatingScale,
	pub default_k: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			data_dir: None,
			rating_scale: RatingScale::default(),
			default_k: DEFAULT_K,
		}
	}
}
