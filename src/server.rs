// ---------------------------------------------------------------------------
// RecommendServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (NDJSON over stdin) to the
// `Recommender`: a main `run()` loop, a `dispatch()` match, a
// `with_engine` accessor and free-standing handler functions per method.
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::error::{ErrorKind, RecommendError};
use crate::protocol::*;
use crate::recommender::{RecommendRequest, Recommender};
use crate::store::ModelStore;
use crate::transport::NdjsonTransport;
use crate::types::{ItemId, RatingScale, Strategy, UserQuery};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC server that dispatches requests to a [`Recommender`].
pub struct RecommendServer {
	transport: NdjsonTransport,
	config: EngineConfig,
	engine: Option<Recommender>,
}

impl RecommendServer {
	/// Create a new server. Artifacts are loaded when `engine/initialize`
	/// is called.
	pub fn new(transport: NdjsonTransport) -> Self {
		Self {
			transport,
			config: EngineConfig::default(),
			engine: None,
		}
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to handlers.
	pub fn run(&mut self) -> Result<(), RecommendError> {
		let stdin = io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = match line_result {
				Ok(l) => l,
				Err(e) if e.kind() == io::ErrorKind::InvalidData => {
					tracing::error!("Skipping unreadable request line: {}", e);
					continue;
				}
				Err(e) => return Err(e.into()),
			};
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"engine/initialize" => self.handle_initialize(req.params),
			"engine/info" => self.with_engine(|e| Ok(engine_summary(e, &self.config))),

			// -- Recommendation ------------------------------------------
			"recommend" => {
				let default_k = self.config.default_k;
				self.with_engine(|e| handle_recommend(e, req.params, default_k))
			}

			// -- Catalog -------------------------------------------------
			"catalog/titles" => self.with_engine(|e| handle_titles(e, req.params)),
			"catalog/items" => self.with_engine(handle_items),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match e {
					RecommendError::InvalidRequest(_) => INVALID_PARAMS,
					_ => RECOMMEND_ERROR,
				};
				tracing::warn!(method = %req.method, code = e.code(), "{}", e);
				if e.kind() == ErrorKind::Model && self.engine.take().is_some() {
					tracing::error!(code = e.code(), "loaded model is untrustworthy, engine unloaded");
				}
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()));
			}
		}
	}

	// ── Engine accessor ───────────────────────────────────────────────────

	fn with_engine<F>(&self, f: F) -> Result<serde_json::Value, RecommendError>
	where
		F: FnOnce(&Recommender) -> Result<serde_json::Value, RecommendError>,
	{
		match &self.engine {
			Some(e) => f(e),
			None => Err(RecommendError::NotInitialized),
		}
	}

	// ── Initialize ────────────────────────────────────────────────────────

	fn handle_initialize(
		&mut self,
		params: serde_json::Value,
	) -> Result<serde_json::Value, RecommendError> {
		let p: InitializeParams = parse_params(params)?;

		let defaults = EngineConfig::default();
		let rating_scale = RatingScale {
			min: p.rating_min.unwrap_or(defaults.rating_scale.min),
			max: p.rating_max.unwrap_or(defaults.rating_scale.max),
		};
		if !(rating_scale.min.is_finite() && rating_scale.max.is_finite())
			|| rating_scale.min > rating_scale.max
		{
			return Err(RecommendError::InvalidRequest(format!(
				"invalid rating scale [{}, {}]",
				rating_scale.min, rating_scale.max
			)));
		}
		let default_k = match p.default_k {
			Some(k) => crate::ranking::validate_k(k)?,
			None => defaults.default_k,
		};

		let config = EngineConfig {
			data_dir: Some(PathBuf::from(&p.data_dir)),
			rating_scale,
			default_k,
		};

		let store = ModelStore::load(&PathBuf::from(&p.data_dir))?;
		let engine = Recommender::new(Arc::new(store), config.rating_scale);
		let summary = engine_summary(&engine, &config);
		self.engine = Some(engine);
		self.config = config;

		Ok(summary)
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, RecommendError> {
	serde_json::from_value(params)
		.map_err(|e| RecommendError::InvalidRequest(format!("Invalid params: {}", e)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
	data_dir: String,
	rating_min: Option<f64>,
	rating_max: Option<f64>,
	default_k: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendParams {
	#[serde(default)]
	query: BTreeMap<String, f64>,
	strategy: Option<String>,
	k: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitlesParams {
	ids: Vec<ItemId>,
}

/// Keys that spell the same id (`"1"`, `"01"`, `" 1"`) are rejected rather
/// than silently collapsed.
fn parse_query(raw: BTreeMap<String, f64>) -> Result<UserQuery, RecommendError> {
	let mut query = UserQuery::new();
	for (key, rating) in raw {
		let id = key.trim().parse::<u32>().map(ItemId).map_err(|_| {
			RecommendError::InvalidRequest(format!("item id {:?} is not an integer", key))
		})?;
		if query.insert(id, rating).is_some() {
			return Err(RecommendError::InvalidRequest(format!(
				"item {} is rated more than once (key {:?})",
				id, key
			)));
		}
	}
	Ok(query)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Store summary plus the settings this session was initialized with.
fn engine_summary(engine: &Recommender, config: &EngineConfig) -> serde_json::Value {
	let mut summary = engine.store().summary();
	summary["dataDir"] = serde_json::json!(config.data_dir.as_ref().map(|d| d.display().to_string()));
	summary["ratingMin"] = serde_json::json!(config.rating_scale.min);
	summary["ratingMax"] = serde_json::json!(config.rating_scale.max);
	summary["defaultK"] = serde_json::json!(config.default_k);
	summary
}

fn handle_recommend(
	engine: &Recommender,
	params: serde_json::Value,
	default_k: usize,
) -> Result<serde_json::Value, RecommendError> {
	let p: RecommendParams = parse_params(params)?;
	let strategy = p
		.strategy
		.unwrap_or_else(|| Strategy::Neighbor.as_str().to_string());
	let k = p.k.unwrap_or(default_k as i64);
	let request = RecommendRequest::new(parse_query(p.query)?, &strategy, k)?;

	let items = engine.recommend_with_titles(&request)?;
	let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
	let titles: Vec<Option<&str>> = items.iter().map(|i| i.title.as_deref()).collect();
	let scores: Vec<f64> = items.iter().map(|i| i.score).collect();

	Ok(serde_json::json!({
		"strategy": request.strategy,
		"items": ids,
		"titles": titles,
		"scores": scores,
	}))
}

fn handle_titles(
	engine: &Recommender,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: TitlesParams = parse_params(params)?;
	Ok(serde_json::json!({ "titles": engine.titles(&p.ids) }))
}

fn handle_items(engine: &Recommender) -> Result<serde_json::Value, RecommendError> {
	let store = engine.store();
	let items: Vec<serde_json::Value> = store
		.titles()
		.listing(store.catalog())
		.into_iter()
		.map(|(id, title)| serde_json::json!({ "id": id, "title": title }))
		.collect();
	Ok(serde_json::json!({ "items": items }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_query_accepts_numeric_keys() {
		let mut raw = BTreeMap::new();
		raw.insert("10".to_string(), 4.0);
		raw.insert(" 555 ".to_string(), 3.5);
		let query = parse_query(raw).unwrap();
		assert_eq!(query.rating(ItemId(10)), Some(4.0));
		assert_eq!(query.rating(ItemId(555)), Some(3.5));
	}

	#[test]
	fn parse_query_rejects_non_numeric_keys() {
		let mut raw = BTreeMap::new();
		raw.insert("Bambi".to_string(), 4.0);
		assert!(matches!(
			parse_query(raw),
			Err(RecommendError::InvalidRequest(_))
		));
	}

	#[test]
	fn parse_query_rejects_equivalent_keys() {
		let p: RecommendParams =
			parse_params(serde_json::json!({ "query": { "1": 5.0, "01": 0.5, "001": 2.0 } })).unwrap();
		for _ in 0..16 {
			let err = parse_query(p.query.clone()).unwrap_err();
			assert!(
				matches!(err, RecommendError::InvalidRequest(ref msg) if msg.contains("item 1 ")),
				"{:?}",
				err
			);
		}
	}

	#[test]
	fn recommend_params_default_to_empty_query() {
		let p: RecommendParams = parse_params(serde_json::json!({ "k": 3 })).unwrap();
		assert!(p.query.is_empty());
		assert_eq!(p.k, Some(3));
		assert!(p.strategy.is_none());
	}

	#[test]
	fn requests_before_initialize_fail() {
		let server = RecommendServer::new(NdjsonTransport::new());
		let err = server
			.with_engine(|e| Ok(e.store().summary()))
			.unwrap_err();
		assert!(matches!(err, RecommendError::NotInitialized));
	}
}
